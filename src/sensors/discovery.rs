//! Name-based device classification for scans.

use crate::sensors::types::{DiscoveredDevice, DiscoveryResult, TrainerInfo};

/// Known trainer brands and whether they accept ERG commands.
pub const KNOWN_TRAINERS: &[(&str, bool)] = &[
    ("KICKR", true),
    ("WATTBIKE", true),
    ("TACX", true),
    ("ELITE", true),
    ("SARIS", true),
    // Power meters only
    ("STAGES", false),
    ("QUARQ", false),
    ("ASSIOMA", false),
];

/// Keywords that mark an unknown device as a probable FTMS trainer.
const GENERIC_TRAINER_KEYWORDS: &[&str] = &["BIKE", "TRAINER", "POWER"];

/// Keywords that mark a device as a probable heart-rate monitor.
const HR_MONITOR_KEYWORDS: &[&str] = &["HR", "HEART", "MYZONE", "POLAR", "GARMIN", "WAHOO"];

/// Classify a device name as a trainer, if it looks like one.
///
/// Known brands win over the generic keyword heuristic, which assumes ERG.
pub fn classify_trainer(name: &str) -> Option<TrainerInfo> {
    let upper = name.to_uppercase();

    if let Some((kind, has_erg)) = KNOWN_TRAINERS.iter().find(|(kind, _)| upper.contains(kind)) {
        return Some(TrainerInfo {
            kind: (*kind).to_string(),
            has_erg: *has_erg,
        });
    }

    if GENERIC_TRAINER_KEYWORDS.iter().any(|k| upper.contains(k)) {
        return Some(TrainerInfo {
            kind: "UNKNOWN".to_string(),
            has_erg: true,
        });
    }

    None
}

/// Whether a device name looks like a heart-rate monitor.
pub fn is_hr_monitor_name(name: &str) -> bool {
    let upper = name.to_uppercase();
    HR_MONITOR_KEYWORDS.iter().any(|k| upper.contains(k))
}

/// ERG capability for a name: known brands decide, anything else is assumed capable.
pub fn erg_capable(name: &str) -> bool {
    let upper = name.to_uppercase();
    KNOWN_TRAINERS
        .iter()
        .find(|(kind, _)| upper.contains(kind))
        .map(|(_, has_erg)| *has_erg)
        .unwrap_or(true)
}

/// Whether `name` matches a configured filter (case-insensitive substring).
///
/// An empty filter never matches.
pub fn matches_filter(name: &str, filter: &str) -> bool {
    !filter.is_empty() && name.to_uppercase().contains(&filter.to_uppercase())
}

/// Build a [`DiscoveredDevice`] from raw advertisement data.
pub fn describe_device(address: &str, name: &str, signal_strength: Option<i16>) -> DiscoveredDevice {
    DiscoveredDevice {
        address: address.to_string(),
        name: name.to_string(),
        signal_strength,
        trainer: classify_trainer(name),
        is_hr_monitor: is_hr_monitor_name(name),
    }
}

/// Sort scanned devices into a [`DiscoveryResult`], auto-selecting filter matches.
///
/// The last device matching a filter wins, mirroring scan order.
pub fn build_discovery_result(
    devices: Vec<DiscoveredDevice>,
    trainer_filter: &str,
    hr_filter: &str,
) -> DiscoveryResult {
    let mut result = DiscoveryResult::default();

    for device in devices {
        if device.trainer.is_some() {
            result.trainers.push(device.clone());
        }
        if device.is_hr_monitor {
            result.hr_monitors.push(device.clone());
        }
        if matches_filter(&device.name, trainer_filter) {
            tracing::info!(
                "Found trainer: {} ({}) - ERG: {}",
                device.name,
                device.address,
                device.has_erg()
            );
            result.selected_trainer = Some(device.clone());
        }
        if matches_filter(&device.name, hr_filter) {
            tracing::info!("Found HR monitor: {} ({})", device.name, device.address);
            result.selected_hr_monitor = Some(device.clone());
        }
        result.all_devices.push(device);
    }

    result
}
