//! ZoneRide - Zone 2 Smart-Trainer Control Engine
//!
//! Drives a BLE smart trainer in ERG mode through structured and HR-targeted
//! workouts while watching heart rate for zone compliance, cardiac drift and
//! aerobic decoupling. Rides are recorded and exported as FIT activities.

pub mod audio;
pub mod metrics;
pub mod recording;
pub mod sensors;
pub mod session;
pub mod storage;
pub mod workouts;

// Re-export commonly used types
pub use audio::Notifier;
pub use metrics::analyzer::ZoneAnalyzer;
pub use recording::recorder::SessionRecorder;
pub use sensors::manager::spawn_device_link;
pub use session::coordinator::{SessionCoordinator, SessionHandle};
pub use storage::config::AppConfig;
pub use workouts::engine::WorkoutEngine;
