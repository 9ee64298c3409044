//! Mock trainer, heart-rate monitor and link worker.
//!
//! `MockSensorData` produces raw notification frames. `MockLink` stands in for
//! the BLE worker: it answers every request successfully and keeps a log of
//! what was asked, so session tests can run without hardware.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use zoneride::sensors::ftms::{decode_cycling_power, decode_heart_rate, decode_indoor_bike_data};
use zoneride::sensors::link::{LinkHandle, LinkRequest};
use zoneride::sensors::types::{
    BikeSample, DeviceStatus, DiscoveryResult, HrSample, LinkState,
};

/// Mock sensor data generator for testing.
pub struct MockSensorData {
    /// Current power value
    pub power: u16,
    /// Current cadence (in 0.5 RPM)
    pub cadence: u16,
    /// Current speed (in 0.01 km/h)
    pub speed: u16,
    /// Current heart rate
    pub heart_rate: u8,
}

impl Default for MockSensorData {
    fn default() -> Self {
        Self {
            power: 200,
            cadence: 180, // 90 RPM
            speed: 3000,  // 30.0 km/h
            heart_rate: 145,
        }
    }
}

impl MockSensorData {
    /// Generate an Indoor Bike Data frame.
    pub fn indoor_bike_data(&self) -> Vec<u8> {
        // Flags: 0x0044 (instantaneous cadence + instantaneous power)
        let mut data = vec![0x44, 0x00];
        data.extend_from_slice(&self.speed.to_le_bytes());
        data.extend_from_slice(&self.cadence.to_le_bytes());
        data.extend_from_slice(&(self.power as i16).to_le_bytes());
        data
    }

    /// Generate a Cycling Power Measurement frame.
    pub fn cycling_power_measurement(&self) -> Vec<u8> {
        let mut data = vec![0x00, 0x00];
        data.extend_from_slice(&(self.power as i16).to_le_bytes());
        data
    }

    /// Generate an 8-bit Heart Rate Measurement frame.
    pub fn heart_rate_measurement(&self) -> Vec<u8> {
        vec![0x00, self.heart_rate]
    }
}

/// A request seen by [`MockLink`], without its reply channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    Scan,
    ConnectTrainer(Option<String>),
    ConnectHeartRate,
    DisconnectTrainer,
    DisconnectAll,
    SetTargetPower(i16),
    StopErg,
    SetFilters(Option<String>, Option<String>),
    Status,
    Shutdown,
}

/// Fake link worker answering every request with success.
pub struct MockLink {
    pub handle: LinkHandle,
    pub calls: Arc<Mutex<Vec<LinkCall>>>,
    pub bike_tx: watch::Sender<BikeSample>,
    pub hr_tx: watch::Sender<HrSample>,
}

impl MockLink {
    /// Spawn the responder. Must be called inside a tokio runtime.
    pub fn spawn(scan_result: DiscoveryResult) -> Self {
        let (tx, mut rx) = mpsc::channel(32);
        let (bike_tx, bike_rx) = watch::channel(BikeSample::default());
        let (hr_tx, hr_rx) = watch::channel(HrSample::default());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let log = calls.clone();
        tokio::spawn(async move {
            let mut status = DeviceStatus::default();
            while let Some(request) = rx.recv().await {
                let mut log = log.lock().unwrap();
                match request {
                    LinkRequest::Scan { reply } => {
                        log.push(LinkCall::Scan);
                        let _ = reply.send(Ok(scan_result.clone()));
                    }
                    LinkRequest::ConnectTrainer { address, reply, .. } => {
                        log.push(LinkCall::ConnectTrainer(address));
                        status.trainer_state = LinkState::ControlAcquired;
                        let _ = reply.send(Ok(()));
                    }
                    LinkRequest::ConnectHeartRate { reply } => {
                        log.push(LinkCall::ConnectHeartRate);
                        status.hr_state = LinkState::Subscribed;
                        let _ = reply.send(Ok(()));
                    }
                    LinkRequest::DisconnectTrainer { reply } => {
                        log.push(LinkCall::DisconnectTrainer);
                        status.trainer_state = LinkState::Disconnected;
                        let _ = reply.send(Ok(()));
                    }
                    LinkRequest::DisconnectAll { reply } => {
                        log.push(LinkCall::DisconnectAll);
                        status = DeviceStatus::default();
                        let _ = reply.send(Ok(()));
                    }
                    LinkRequest::SetTargetPower { watts, reply } => {
                        log.push(LinkCall::SetTargetPower(watts));
                        status.erg_active = true;
                        status.target_power = Some(watts);
                        let _ = reply.send(Ok(()));
                    }
                    LinkRequest::StopErg { reply } => {
                        log.push(LinkCall::StopErg);
                        status.erg_active = false;
                        status.target_power = None;
                        let _ = reply.send(Ok(()));
                    }
                    LinkRequest::SetFilters {
                        trainer,
                        heart_rate,
                    } => log.push(LinkCall::SetFilters(trainer, heart_rate)),
                    LinkRequest::DiscoveredTrainers { reply } => {
                        let _ = reply.send(Ok(scan_result.trainers.clone()));
                    }
                    LinkRequest::Status { reply } => {
                        log.push(LinkCall::Status);
                        let _ = reply.send(Ok(status.clone()));
                    }
                    LinkRequest::Shutdown => {
                        log.push(LinkCall::Shutdown);
                        break;
                    }
                }
            }
        });

        Self {
            handle: LinkHandle::new(
                tx,
                bike_rx,
                hr_rx,
                Duration::from_secs(30),
                Duration::from_secs(10),
            ),
            calls,
            bike_tx,
            hr_tx,
        }
    }

    /// Snapshot of the calls so far.
    pub fn calls(&self) -> Vec<LinkCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Power targets written so far, in order.
    pub fn power_targets(&self) -> Vec<i16> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LinkCall::SetTargetPower(watts) => Some(watts),
                _ => None,
            })
            .collect()
    }

    /// Number of times `call` was made.
    pub fn count(&self, call: &LinkCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }
}

#[test]
fn test_mock_bike_frame_decodes() {
    let mock = MockSensorData::default();
    let sample = decode_indoor_bike_data(&mock.indoor_bike_data(), Utc::now());

    assert!((sample.speed_kmh - 30.0).abs() < 0.1);
    assert_eq!(sample.cadence_rpm, 90);
    assert_eq!(sample.power_watts, 200);
}

#[test]
fn test_mock_power_and_hr_frames_decode() {
    for (power, hr) in [(0u16, 60u8), (150, 120), (420, 188)] {
        let mock = MockSensorData {
            power,
            heart_rate: hr,
            ..Default::default()
        };
        assert_eq!(
            decode_cycling_power(&mock.cycling_power_measurement()),
            Some(power as i16)
        );
        assert_eq!(
            decode_heart_rate(&mock.heart_rate_measurement(), Utc::now()).heart_rate_bpm,
            hr as u16
        );
    }
}

#[tokio::test]
async fn test_mock_link_answers_requests() {
    let link = MockLink::spawn(DiscoveryResult::default());

    link.handle.set_target_power(150).await.unwrap();
    let status = link.handle.status().await.unwrap();

    assert!(status.erg_active);
    assert_eq!(status.target_power, Some(150));
    assert_eq!(link.power_targets(), vec![150]);
}
