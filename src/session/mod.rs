//! Session module: the event/tick coordinator between devices, training
//! control, analysis and recording.

pub mod coordinator;
pub mod types;
pub mod writer;

pub use coordinator::{SessionCoordinator, SessionHandle, TICK_INTERVAL};
pub use types::{CoreEvent, SessionCommand, SessionError};
pub use writer::{ControlWrite, ControlWriter};
