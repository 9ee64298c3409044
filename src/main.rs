//! ZoneRide - Zone 2 Smart-Trainer Control Engine
//!
//! Headless entry point: scans for the configured devices, runs the selected
//! workout and logs every core event. Ctrl-C stops the workout and saves the
//! ride.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zoneride::session::{CoreEvent, SessionCommand};
use zoneride::storage::config::{get_config_path, load_config};
use zoneride::{spawn_device_link, Notifier, SessionCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ZoneRide v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("loading configuration")?;
    tracing::info!(
        "FTP {}W, Zone 2 {}-{} BPM, workout '{}'",
        config.user.ftp,
        config.user.zone2_hr_low,
        config.user.zone2_hr_high,
        config.workout.workout_type
    );

    let (link, sensor_events) = spawn_device_link(config.sensor_config());
    let mut coordinator = SessionCoordinator::new(config, link.clone(), Notifier::default())
        .with_config_path(get_config_path());
    let events = coordinator.event_receiver();

    std::thread::spawn(move || {
        for event in events.iter() {
            log_event(&event);
        }
    });

    let (session, task) = coordinator.spawn(sensor_events);
    session.scan().await?;
    session.start_workout().await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("Interrupted, stopping workout");

    session.send(SessionCommand::StopWorkout).await?;
    session.shutdown().await?;
    task.await.context("session coordinator panicked")?;
    link.shutdown().await;

    Ok(())
}

fn log_event(event: &CoreEvent) {
    match event {
        CoreEvent::Bike {
            sample,
            target_power,
        } => tracing::debug!(
            "Bike: {}W (target {}W), {} rpm, {:.1} km/h",
            sample.power_watts,
            target_power,
            sample.cadence_rpm,
            sample.speed_kmh
        ),
        CoreEvent::HeartRate(sample) => tracing::debug!("HR: {} bpm", sample.heart_rate_bpm),
        CoreEvent::PhaseChange { phase, name } => tracing::info!("Phase {}: {}", phase, name),
        CoreEvent::PowerChange(watts) => tracing::info!("Target power {}W", watts),
        CoreEvent::Alert(alert) => tracing::warn!("[{}] {}", alert.kind, alert.message),
        CoreEvent::Stats(stats) => tracing::debug!(
            "Avg HR {:.0}, avg power {:.0}W, {:.0}% in zone",
            stats.avg_hr,
            stats.avg_power,
            stats.zone_percent()
        ),
        CoreEvent::WorkoutStatus(progress) => tracing::debug!("Workout: {:?}", progress),
        CoreEvent::WorkoutSummary(summary) => tracing::info!(
            "Workout '{}': {} segments, {} min",
            summary.workout_type,
            summary.segments.len(),
            summary.total_duration_minutes
        ),
        CoreEvent::LinkState { role, state } => tracing::info!("{:?} link: {:?}", role, state),
        CoreEvent::DeviceStatus(status) => tracing::debug!("Devices: {:?}", status),
        CoreEvent::ScanResult(result) => tracing::info!(
            "Scan: {} trainers, {} HR monitors",
            result.trainers.len(),
            result.hr_monitors.len()
        ),
        CoreEvent::WorkoutSaved(path) => tracing::info!("Saved {}", path.display()),
        CoreEvent::WorkoutComplete => tracing::info!("Workout complete"),
        CoreEvent::Notice { message, severity } => tracing::info!("[{:?}] {}", severity, message),
    }
}
