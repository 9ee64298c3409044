//! Integration test modules.

mod sensor_mock;
mod session_flow_test;
mod zone_alert_test;
