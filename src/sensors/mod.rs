//! Sensor module for BLE trainer and heart-rate communication.

pub mod control;
pub mod discovery;
pub mod ftms;
pub mod link;
pub mod manager;
pub mod types;

pub use control::{ControlCommand, ErgControl};
pub use link::{LinkHandle, LinkRequest};
pub use manager::spawn_device_link;
pub use types::{
    BikeSample, DeviceRole, DeviceStatus, DiscoveredDevice, DiscoveryResult, HrSample, LinkState,
    SensorConfig, SensorError, SensorEvent, TrainerInfo,
};
