//! Handle to the device link worker.
//!
//! Callers never touch BLE state directly. Requests travel over an mpsc
//! channel to the worker task together with a oneshot reply, and every wait
//! is bounded. The latest bike and heart-rate samples are published through
//! watch channels so they can be read synchronously between events.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::sensors::types::{
    BikeSample, DeviceStatus, DiscoveredDevice, DiscoveryResult, HrSample, SensorError,
};

type Reply<T> = oneshot::Sender<Result<T, SensorError>>;

/// Requests understood by the link worker.
#[derive(Debug)]
pub enum LinkRequest {
    /// Scan for devices and auto-select filter matches
    Scan { reply: Reply<DiscoveryResult> },
    /// Connect the trainer at `address`, or the auto-selected one when `None`
    ConnectTrainer {
        address: Option<String>,
        name: Option<String>,
        reply: Reply<()>,
    },
    /// Connect the auto-selected heart-rate monitor
    ConnectHeartRate { reply: Reply<()> },
    /// Stop ERG if active, then drop the trainer connection
    DisconnectTrainer { reply: Reply<()> },
    /// Stop ERG if active, then drop both connections
    DisconnectAll { reply: Reply<()> },
    /// Write an ERG target power
    SetTargetPower { watts: i16, reply: Reply<()> },
    /// Leave ERG mode
    StopErg { reply: Reply<()> },
    /// Replace the trainer and/or HR name filters
    SetFilters {
        trainer: Option<String>,
        heart_rate: Option<String>,
    },
    /// Trainers classified during the last scan
    DiscoveredTrainers { reply: Reply<Vec<DiscoveredDevice>> },
    /// Current link status
    Status { reply: Reply<DeviceStatus> },
    /// Disconnect everything and end the worker
    Shutdown,
}

/// Cheap, clonable access to a running link worker.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    /// Send requests to the worker.
    request_tx: mpsc::Sender<LinkRequest>,
    /// Latest bike telemetry.
    bike_rx: watch::Receiver<BikeSample>,
    /// Latest heart rate.
    hr_rx: watch::Receiver<HrSample>,
    /// Bound for connect and write round trips.
    write_timeout: Duration,
    /// Bound for a scan round trip.
    scan_timeout: Duration,
}

impl LinkHandle {
    /// Wrap the channel ends of a worker.
    pub fn new(
        request_tx: mpsc::Sender<LinkRequest>,
        bike_rx: watch::Receiver<BikeSample>,
        hr_rx: watch::Receiver<HrSample>,
        write_timeout: Duration,
        scan_timeout: Duration,
    ) -> Self {
        Self {
            request_tx,
            bike_rx,
            hr_rx,
            write_timeout,
            scan_timeout,
        }
    }

    async fn request<T>(
        &self,
        limit: Duration,
        build: impl FnOnce(Reply<T>) -> LinkRequest,
    ) -> Result<T, SensorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = build(reply_tx);

        // Waiting for queue space counts against the bound.
        let exchange = async {
            if self.request_tx.send(request).await.is_err() {
                return Err(SensorError::LinkClosed);
            }
            match reply_rx.await {
                Ok(result) => result,
                Err(_) => Err(SensorError::LinkClosed),
            }
        };

        tokio::time::timeout(limit, exchange)
            .await
            .map_err(|_| SensorError::Timeout)?
    }

    /// Scan for devices.
    pub async fn scan(&self) -> Result<DiscoveryResult, SensorError> {
        self.request(self.scan_timeout + self.write_timeout, |reply| {
            LinkRequest::Scan { reply }
        })
        .await
    }

    /// Connect a trainer. With no address the last scan's selection is used.
    pub async fn connect_trainer(
        &self,
        address: Option<String>,
        name: Option<String>,
    ) -> Result<(), SensorError> {
        // Connect, service discovery and the control request each get the write bound.
        self.request(self.write_timeout * 3, |reply| LinkRequest::ConnectTrainer {
            address,
            name,
            reply,
        })
        .await
    }

    /// Connect the selected heart-rate monitor.
    pub async fn connect_hr_monitor(&self) -> Result<(), SensorError> {
        self.request(self.write_timeout * 2, |reply| LinkRequest::ConnectHeartRate {
            reply,
        })
        .await
    }

    /// Disconnect the trainer, stopping ERG first if it is active.
    pub async fn disconnect_trainer(&self) -> Result<(), SensorError> {
        self.request(self.write_timeout * 2, |reply| {
            LinkRequest::DisconnectTrainer { reply }
        })
        .await
    }

    /// Disconnect trainer and HR monitor.
    pub async fn disconnect_all(&self) -> Result<(), SensorError> {
        self.request(self.write_timeout * 3, |reply| LinkRequest::DisconnectAll {
            reply,
        })
        .await
    }

    /// Command an ERG target power.
    pub async fn set_target_power(&self, watts: i16) -> Result<(), SensorError> {
        // RequestControl may precede the power write.
        self.request(self.write_timeout * 2, |reply| LinkRequest::SetTargetPower {
            watts,
            reply,
        })
        .await
    }

    /// Return the trainer to free ride.
    pub async fn stop_erg(&self) -> Result<(), SensorError> {
        self.request(self.write_timeout, |reply| LinkRequest::StopErg { reply })
            .await
    }

    /// Change device name filters used by the next scan.
    pub async fn set_filters(
        &self,
        trainer: Option<String>,
        heart_rate: Option<String>,
    ) -> Result<(), SensorError> {
        let request = LinkRequest::SetFilters {
            trainer,
            heart_rate,
        };
        tokio::time::timeout(self.write_timeout, self.request_tx.send(request))
            .await
            .map_err(|_| SensorError::Timeout)?
            .map_err(|_| SensorError::LinkClosed)
    }

    /// Trainers found in the last scan.
    pub async fn discovered_trainers(&self) -> Result<Vec<DiscoveredDevice>, SensorError> {
        self.request(self.write_timeout, |reply| LinkRequest::DiscoveredTrainers {
            reply,
        })
        .await
    }

    /// Current status of both link slots.
    pub async fn status(&self) -> Result<DeviceStatus, SensorError> {
        self.request(self.write_timeout, |reply| LinkRequest::Status { reply })
            .await
    }

    /// Ask the worker to disconnect everything and exit.
    pub async fn shutdown(&self) {
        let send = self.request_tx.send(LinkRequest::Shutdown);
        let _ = tokio::time::timeout(self.write_timeout, send).await;
    }

    /// Most recent bike telemetry (default until the first notification).
    pub fn latest_bike(&self) -> BikeSample {
        *self.bike_rx.borrow()
    }

    /// Most recent heart rate (default until the first notification).
    pub fn latest_hr(&self) -> HrSample {
        *self.hr_rx.borrow()
    }
}
