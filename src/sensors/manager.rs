//! Device link worker owning all BLE session state.
//!
//! One tokio task owns the btleplug adapter, both peripherals and the ERG
//! control state. It serves [`LinkRequest`]s one at a time, so control point
//! writes are naturally serialized. Each connected peripheral gets its own
//! notification task that decodes frames, updates the latest-sample watch
//! channels and forwards [`SensorEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::sensors::control::{ControlCommand, ErgControl};
use crate::sensors::discovery::{build_discovery_result, describe_device, erg_capable};
use crate::sensors::ftms::{
    decode_cycling_power, decode_heart_rate, decode_indoor_bike_data, merge_cycling_power,
    CYCLING_POWER_MEASUREMENT_UUID, CYCLING_POWER_SERVICE_UUID, FTMS_CONTROL_POINT_UUID,
    FTMS_SERVICE_UUID, HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID,
    INDOOR_BIKE_DATA_UUID,
};
use crate::sensors::link::{LinkHandle, LinkRequest};
use crate::sensors::types::{
    BikeSample, DeviceRole, DeviceStatus, DiscoveredDevice, DiscoveryResult, HrSample, LinkState,
    SensorConfig, SensorError, SensorEvent,
};

/// Capacity of the request queue between handles and the worker.
const REQUEST_QUEUE_DEPTH: usize = 32;

/// A device the worker has connected to.
struct ConnectedDevice {
    peripheral: Peripheral,
    name: String,
    notifications: JoinHandle<()>,
}

/// Target picked for a role, either by scan or by an explicit connect.
#[derive(Debug, Clone)]
struct Selection {
    address: String,
    name: String,
}

/// A notification stream that ended without a local disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PeripheralLost {
    role: DeviceRole,
    connection: u64,
}

/// Senders shared between the worker and its notification tasks.
#[derive(Clone)]
struct SampleSinks {
    bike: Arc<watch::Sender<BikeSample>>,
    hr: Arc<watch::Sender<HrSample>>,
    events: mpsc::UnboundedSender<SensorEvent>,
    lost: mpsc::UnboundedSender<PeripheralLost>,
}

impl SampleSinks {
    fn send_event(&self, event: SensorEvent) {
        let _ = self.events.send(event);
    }
}

/// Spawn the link worker on the current tokio runtime.
///
/// Returns the request handle and the stream of decoded sensor events.
pub fn spawn_device_link(
    config: SensorConfig,
) -> (LinkHandle, mpsc::UnboundedReceiver<SensorEvent>) {
    let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (lost_tx, lost_rx) = mpsc::unbounded_channel();
    let (bike_tx, bike_rx) = watch::channel(BikeSample::default());
    let (hr_tx, hr_rx) = watch::channel(HrSample::default());

    let handle = LinkHandle::new(
        request_tx,
        bike_rx,
        hr_rx,
        Duration::from_secs(config.write_timeout_secs),
        Duration::from_secs(config.scan_timeout_secs),
    );

    let worker = DeviceLinkWorker::new(
        config,
        SampleSinks {
            bike: Arc::new(bike_tx),
            hr: Arc::new(hr_tx),
            events: event_tx,
            lost: lost_tx,
        },
    );
    tokio::spawn(worker.run(request_rx, lost_rx));

    (handle, event_rx)
}

/// Owner of the BLE adapter, peripherals and ERG control state.
struct DeviceLinkWorker {
    /// Configuration (filters are mutable at runtime)
    config: SensorConfig,
    /// BLE adapter, opened on first use
    adapter: Option<Adapter>,
    /// Sample and event outputs
    sinks: SampleSinks,
    /// Connected trainer
    trainer: Option<ConnectedDevice>,
    /// Connected HR monitor
    hr_monitor: Option<ConnectedDevice>,
    /// Trainer selected by scan or explicit connect
    trainer_selection: Option<Selection>,
    /// HR monitor selected by scan
    hr_selection: Option<Selection>,
    /// Trainers classified during the last scan
    discovered_trainers: Vec<DiscoveredDevice>,
    /// Whether the selected trainer accepts ERG
    trainer_has_erg: bool,
    /// Control point state of the trainer
    control: ErgControl,
    /// Per-role link state
    trainer_state: LinkState,
    hr_state: LinkState,
    /// Id of the live connection per role (0 when none)
    trainer_connection: u64,
    hr_connection: u64,
    /// Last connection id handed out
    connection_counter: u64,
}

impl DeviceLinkWorker {
    fn new(config: SensorConfig, sinks: SampleSinks) -> Self {
        Self {
            config,
            adapter: None,
            sinks,
            trainer: None,
            hr_monitor: None,
            trainer_selection: None,
            hr_selection: None,
            discovered_trainers: Vec::new(),
            trainer_has_erg: true,
            control: ErgControl::new(),
            trainer_state: LinkState::Disconnected,
            hr_state: LinkState::Disconnected,
            trainer_connection: 0,
            hr_connection: 0,
            connection_counter: 0,
        }
    }

    fn next_connection(&mut self) -> u64 {
        self.connection_counter += 1;
        self.connection_counter
    }

    fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.config.write_timeout_secs)
    }

    /// Serve requests until shutdown or until every handle is dropped.
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<LinkRequest>,
        mut lost: mpsc::UnboundedReceiver<PeripheralLost>,
    ) {
        tracing::info!("Device link worker started");

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => {
                        if !self.handle_request(request).await {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = lost.recv() => self.peripheral_lost(event),
            }
        }

        self.disconnect_all().await;
        tracing::info!("Device link worker stopped");
    }

    /// Serve one request. Returns false on shutdown.
    async fn handle_request(&mut self, request: LinkRequest) -> bool {
        match request {
            LinkRequest::Scan { reply } => {
                let _ = reply.send(self.scan().await);
            }
            LinkRequest::ConnectTrainer {
                address,
                name,
                reply,
            } => {
                let _ = reply.send(self.connect_trainer(address, name).await);
            }
            LinkRequest::ConnectHeartRate { reply } => {
                let _ = reply.send(self.connect_hr_monitor().await);
            }
            LinkRequest::DisconnectTrainer { reply } => {
                self.disconnect_trainer().await;
                let _ = reply.send(Ok(()));
            }
            LinkRequest::DisconnectAll { reply } => {
                self.disconnect_all().await;
                let _ = reply.send(Ok(()));
            }
            LinkRequest::SetTargetPower { watts, reply } => {
                let _ = reply.send(self.set_target_power(watts).await);
            }
            LinkRequest::StopErg { reply } => {
                let _ = reply.send(self.stop_erg().await);
            }
            LinkRequest::SetFilters {
                trainer,
                heart_rate,
            } => {
                if let Some(filter) = trainer {
                    self.config.trainer_filter = filter.to_uppercase();
                }
                if let Some(filter) = heart_rate {
                    self.config.hr_filter = filter.to_uppercase();
                }
                tracing::info!(
                    "Device filters: trainer={} hr={}",
                    self.config.trainer_filter,
                    self.config.hr_filter
                );
            }
            LinkRequest::DiscoveredTrainers { reply } => {
                let _ = reply.send(Ok(self.discovered_trainers.clone()));
            }
            LinkRequest::Status { reply } => {
                let _ = reply.send(Ok(self.status()));
            }
            LinkRequest::Shutdown => return false,
        }
        true
    }

    /// Drop the slot of a peripheral that went away on its own.
    ///
    /// Reports from an older connection of the same role are ignored.
    fn peripheral_lost(&mut self, lost: PeripheralLost) {
        let current = match lost.role {
            DeviceRole::Trainer => &mut self.trainer_connection,
            DeviceRole::HeartRateMonitor => &mut self.hr_connection,
        };
        if *current != lost.connection || lost.connection == 0 {
            tracing::debug!("Ignoring stale {} link loss", lost.role);
            return;
        }
        *current = 0;

        tracing::warn!("{} disconnected unexpectedly", lost.role);
        match lost.role {
            DeviceRole::Trainer => {
                self.trainer = None;
                self.control.clear();
            }
            DeviceRole::HeartRateMonitor => {
                self.hr_monitor = None;
            }
        }
        self.set_state(lost.role, LinkState::Disconnected);
    }

    fn status(&self) -> DeviceStatus {
        DeviceStatus {
            trainer_state: self.trainer_state,
            trainer_name: self
                .trainer
                .as_ref()
                .map(|t| t.name.clone())
                .or_else(|| self.trainer_selection.as_ref().map(|s| s.name.clone())),
            trainer_has_erg: self.trainer_has_erg,
            hr_state: self.hr_state,
            erg_active: self.control.erg_active(),
            target_power: self.control.target_power(),
        }
    }

    fn set_state(&mut self, role: DeviceRole, state: LinkState) {
        let slot = match role {
            DeviceRole::Trainer => &mut self.trainer_state,
            DeviceRole::HeartRateMonitor => &mut self.hr_state,
        };
        if *slot != state {
            *slot = state;
            tracing::debug!("{} link: {}", role, state);
            self.sinks.send_event(SensorEvent::StateChanged { role, state });
        }
    }

    /// Open the first BLE adapter if not done yet.
    async fn adapter(&mut self) -> Result<Adapter, SensorError> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }

        tracing::info!("Initializing BLE adapter");

        let manager = Manager::new()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?
            .into_iter()
            .next()
            .ok_or(SensorError::AdapterNotFound)?;

        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }

    async fn scan(&mut self) -> Result<DiscoveryResult, SensorError> {
        let adapter = self.adapter().await?;
        let scan_time = Duration::from_secs(self.config.scan_timeout_secs);

        tracing::info!("Scanning for BLE devices for {:?}", scan_time);

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| SensorError::ScanFailed(e.to_string()))?;
        tokio::time::sleep(scan_time).await;
        if let Err(e) = adapter.stop_scan().await {
            tracing::warn!("Failed to stop scan: {}", e);
        }

        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| SensorError::ScanFailed(e.to_string()))?;

        let mut devices = Vec::with_capacity(peripherals.len());
        for peripheral in peripherals {
            let properties = match peripheral.properties().await {
                Ok(Some(properties)) => properties,
                _ => continue,
            };
            let name = properties.local_name.unwrap_or_default();
            devices.push(describe_device(
                &peripheral.id().to_string(),
                &name,
                properties.rssi,
            ));
        }

        let result = build_discovery_result(
            devices,
            &self.config.trainer_filter,
            &self.config.hr_filter,
        );

        self.discovered_trainers = result.trainers.clone();
        if let Some(trainer) = &result.selected_trainer {
            self.trainer_has_erg = trainer.has_erg();
            self.trainer_selection = Some(Selection {
                address: trainer.address.clone(),
                name: trainer.name.clone(),
            });
        }
        if let Some(hr) = &result.selected_hr_monitor {
            self.hr_selection = Some(Selection {
                address: hr.address.clone(),
                name: hr.name.clone(),
            });
        }

        tracing::info!(
            "Scan complete: {} devices, {} trainers, {} HR monitors",
            result.all_devices.len(),
            result.trainers.len(),
            result.hr_monitors.len()
        );

        Ok(result)
    }

    async fn find_peripheral(&mut self, address: &str) -> Result<Peripheral, SensorError> {
        let adapter = self.adapter().await?;
        adapter
            .peripherals()
            .await
            .map_err(|e| SensorError::BleError(e.to_string()))?
            .into_iter()
            .find(|p| p.id().to_string() == address)
            .ok_or_else(|| SensorError::DeviceNotFound(address.to_string()))
    }

    /// Connect and discover services, bounded by the write timeout.
    async fn open(&mut self, address: &str) -> Result<Peripheral, SensorError> {
        let peripheral = self.find_peripheral(address).await?;
        let limit = self.write_timeout();

        tokio::time::timeout(limit, peripheral.connect())
            .await
            .map_err(|_| SensorError::Timeout)?
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        tokio::time::timeout(limit, peripheral.discover_services())
            .await
            .map_err(|_| SensorError::Timeout)?
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        Ok(peripheral)
    }

    async fn subscribe(peripheral: &Peripheral, characteristic: Uuid) -> Result<(), SensorError> {
        let target = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic)
            .ok_or(SensorError::Unsupported)?;

        peripheral
            .subscribe(&target)
            .await
            .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;

        tracing::debug!("Subscribed to characteristic: {}", characteristic);
        Ok(())
    }

    async fn connect_trainer(
        &mut self,
        address: Option<String>,
        name: Option<String>,
    ) -> Result<(), SensorError> {
        if self.trainer.is_some() {
            self.disconnect_trainer().await;
        }

        if let Some(address) = address {
            let name = name.unwrap_or_default();
            self.trainer_has_erg = erg_capable(&name);
            self.trainer_selection = Some(Selection { address, name });
        }

        let selection = self
            .trainer_selection
            .clone()
            .ok_or(SensorError::NoDeviceSelected(DeviceRole::Trainer))?;

        tracing::info!("Connecting to trainer {} ({})", selection.name, selection.address);
        self.set_state(DeviceRole::Trainer, LinkState::Connecting);

        let peripheral = match self.open(&selection.address).await {
            Ok(peripheral) => peripheral,
            Err(e) => {
                tracing::warn!("Failed to connect to trainer: {}", e);
                self.set_state(DeviceRole::Trainer, LinkState::Disconnected);
                return Err(e);
            }
        };

        let services: Vec<Uuid> = peripheral.services().iter().map(|s| s.uuid).collect();
        let mut subscribed = false;

        if services.contains(&FTMS_SERVICE_UUID) {
            match Self::subscribe(&peripheral, INDOOR_BIKE_DATA_UUID).await {
                Ok(()) => subscribed = true,
                Err(e) => tracing::warn!("Indoor Bike Data unavailable: {}", e),
            }
        }
        if services.contains(&CYCLING_POWER_SERVICE_UUID) {
            match Self::subscribe(&peripheral, CYCLING_POWER_MEASUREMENT_UUID).await {
                Ok(()) => subscribed = true,
                Err(e) => tracing::warn!("Cycling Power unavailable: {}", e),
            }
        }
        if !subscribed {
            tracing::warn!("Trainer {} advertises no telemetry service", selection.name);
        }

        let connection = self.next_connection();
        self.trainer_connection = connection;
        let notifications = tokio::spawn(handle_notifications(
            peripheral.clone(),
            DeviceRole::Trainer,
            connection,
            self.sinks.clone(),
        ));

        self.trainer = Some(ConnectedDevice {
            peripheral,
            name: selection.name.clone(),
            notifications,
        });
        self.control.clear();
        self.set_state(DeviceRole::Trainer, LinkState::Subscribed);
        tracing::info!("Connected to trainer at {}", selection.address);

        let plan = self.control.plan_connect();
        if let Err(e) = self.execute(plan).await {
            tracing::warn!("Initial control request failed: {}", e);
        }

        Ok(())
    }

    async fn connect_hr_monitor(&mut self) -> Result<(), SensorError> {
        let selection = self
            .hr_selection
            .clone()
            .ok_or(SensorError::NoDeviceSelected(DeviceRole::HeartRateMonitor))?;

        if let Some(existing) = self.hr_monitor.take() {
            self.hr_connection = 0;
            Self::close(existing).await;
        }

        tracing::info!("Connecting to HR monitor {} ({})", selection.name, selection.address);
        self.set_state(DeviceRole::HeartRateMonitor, LinkState::Connecting);

        let peripheral = match self.open(&selection.address).await {
            Ok(peripheral) => peripheral,
            Err(e) => {
                tracing::warn!("Failed to connect to HR monitor: {}", e);
                self.set_state(DeviceRole::HeartRateMonitor, LinkState::Disconnected);
                return Err(e);
            }
        };

        if !peripheral
            .services()
            .iter()
            .any(|s| s.uuid == HEART_RATE_SERVICE_UUID)
        {
            tracing::warn!("{} does not advertise the Heart Rate service", selection.name);
        }

        if let Err(e) = Self::subscribe(&peripheral, HEART_RATE_MEASUREMENT_UUID).await {
            let _ = peripheral.disconnect().await;
            self.set_state(DeviceRole::HeartRateMonitor, LinkState::Disconnected);
            return Err(e);
        }

        let connection = self.next_connection();
        self.hr_connection = connection;
        let notifications = tokio::spawn(handle_notifications(
            peripheral.clone(),
            DeviceRole::HeartRateMonitor,
            connection,
            self.sinks.clone(),
        ));

        self.hr_monitor = Some(ConnectedDevice {
            peripheral,
            name: selection.name,
            notifications,
        });
        self.set_state(DeviceRole::HeartRateMonitor, LinkState::Subscribed);

        Ok(())
    }

    async fn write_control_point(&self, bytes: &[u8]) -> Result<(), SensorError> {
        let trainer = self
            .trainer
            .as_ref()
            .ok_or(SensorError::NotConnected(DeviceRole::Trainer))?;

        let control_point = trainer
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == FTMS_CONTROL_POINT_UUID)
            .ok_or(SensorError::Unsupported)?;

        tokio::time::timeout(
            self.write_timeout(),
            trainer
                .peripheral
                .write(&control_point, bytes, WriteType::WithResponse),
        )
        .await
        .map_err(|_| SensorError::Timeout)?
        .map_err(|e| SensorError::WriteFailed(e.to_string()))
    }

    /// Write each planned command, confirming successes into [`ErgControl`].
    async fn execute(&mut self, plan: Vec<ControlCommand>) -> Result<(), SensorError> {
        for command in plan {
            match self.write_control_point(&command.encode()).await {
                Ok(()) => {
                    self.control.confirm(command);
                    match command {
                        ControlCommand::RequestControl => {
                            tracing::info!("Acquired trainer control for ERG mode");
                            self.set_state(DeviceRole::Trainer, LinkState::ControlAcquired);
                        }
                        ControlCommand::SetTargetPower(watts) => {
                            tracing::info!("ERG mode: target power set to {}W", watts);
                        }
                        ControlCommand::Reset => {
                            tracing::info!("ERG mode disabled - free ride");
                        }
                    }
                }
                Err(e) if command.is_best_effort() => {
                    tracing::warn!("Failed to request trainer control: {}", e);
                }
                Err(e) => {
                    tracing::warn!("Control point write {:?} failed: {}", command, e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn set_target_power(&mut self, watts: i16) -> Result<(), SensorError> {
        if self.trainer.is_none() {
            return Err(SensorError::NotConnected(DeviceRole::Trainer));
        }
        let plan = self.control.plan_set_target_power(watts);
        self.execute(plan).await
    }

    async fn stop_erg(&mut self) -> Result<(), SensorError> {
        if self.trainer.is_none() {
            return Err(SensorError::NotConnected(DeviceRole::Trainer));
        }
        let plan = self.control.plan_stop_erg();
        self.execute(plan).await
    }

    async fn close(device: ConnectedDevice) {
        device.notifications.abort();
        if let Err(e) = device.peripheral.disconnect().await {
            tracing::warn!("Disconnect from {} failed: {}", device.name, e);
        }
    }

    async fn disconnect_trainer(&mut self) {
        if self.trainer.is_some() {
            let plan = self.control.plan_disconnect();
            if let Err(e) = self.execute(plan).await {
                tracing::warn!("Could not stop ERG before disconnect: {}", e);
            }
        }

        self.trainer_connection = 0;
        if let Some(trainer) = self.trainer.take() {
            Self::close(trainer).await;
            tracing::info!("Disconnected from trainer");
        }
        self.control.clear();
        self.set_state(DeviceRole::Trainer, LinkState::Disconnected);
    }

    async fn disconnect_all(&mut self) {
        self.disconnect_trainer().await;
        self.hr_connection = 0;
        if let Some(hr) = self.hr_monitor.take() {
            Self::close(hr).await;
            tracing::info!("Disconnected from HR monitor");
        }
        self.set_state(DeviceRole::HeartRateMonitor, LinkState::Disconnected);
    }
}

/// Decode notifications from one peripheral until its stream ends.
///
/// An ended stream means the device dropped; the worker is told so it can
/// release the slot. Local disconnects abort this task first.
async fn handle_notifications(
    peripheral: Peripheral,
    role: DeviceRole,
    connection: u64,
    sinks: SampleSinks,
) {
    use futures::stream::StreamExt;

    let mut notification_stream = match peripheral.notifications().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("Failed to get notification stream: {}", e);
            sinks.send_event(SensorEvent::Error(format!("{} notifications: {}", role, e)));
            return;
        }
    };

    while let Some(notification) = notification_stream.next().await {
        if let Some(event) = dispatch_notification(notification.uuid, &notification.value, &sinks)
        {
            sinks.send_event(event);
        }
    }

    tracing::info!("{} notification stream ended", role);
    let _ = sinks.lost.send(PeripheralLost { role, connection });
}

/// Decode one notification, update the latest-sample cache and build its event.
fn dispatch_notification(
    characteristic: Uuid,
    data: &[u8],
    sinks: &SampleSinks,
) -> Option<SensorEvent> {
    let now = Utc::now();

    if characteristic == INDOOR_BIKE_DATA_UUID {
        let sample = decode_indoor_bike_data(data, now);
        sinks.bike.send_replace(sample);
        Some(SensorEvent::Bike(sample))
    } else if characteristic == CYCLING_POWER_MEASUREMENT_UUID {
        let watts = decode_cycling_power(data)?;
        sinks
            .bike
            .send_modify(|sample| merge_cycling_power(sample, watts, now));
        Some(SensorEvent::Bike(*sinks.bike.borrow()))
    } else if characteristic == HEART_RATE_MEASUREMENT_UUID {
        let sample = decode_heart_rate(data, now);
        sinks.hr.send_replace(sample);
        Some(SensorEvent::HeartRate(sample))
    } else {
        None
    }
}
