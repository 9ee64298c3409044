//! Unit test modules.

mod adaptive_control_test;
mod cardiac_drift_test;
mod fit_export_test;
mod recorder_test;
mod segment_power_test;
mod wire_codec_test;
