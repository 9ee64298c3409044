//! Audio & voice notification hook.
//!
//! The training core never plays audio itself. It hands short phrases and
//! sound cues to a [`NotificationSink`]; delivery is fire-and-forget.

pub mod cues;

use crossbeam::channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::metrics::alerts::Alert;

pub use cues::{phase_announcement, spoken_alert};

/// Notification sound cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sound {
    /// Workout started
    Start,
    /// Workout stopped
    Stop,
    /// Training alert
    Alert,
}

impl std::fmt::Display for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sound::Start => write!(f, "start"),
            Sound::Stop => write!(f, "stop"),
            Sound::Alert => write!(f, "alert"),
        }
    }
}

/// Receiver of spoken phrases and sound cues.
pub trait NotificationSink: Send {
    /// Speak a phrase.
    fn announce(&self, text: &str);

    /// Play a sound cue.
    fn play_sound(&self, sound: Sound);

    /// Speak the short form of `alert`.
    fn alert(&self, alert: &Alert) {
        self.announce(&spoken_alert(alert.kind, alert.severity));
    }
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn announce(&self, text: &str) {
        tracing::info!("Announce: {}", text);
    }

    fn play_sound(&self, sound: Sound) {
        tracing::debug!("Sound: {}", sound);
    }
}

/// A notification as delivered by [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Speech(String),
    Sound(Sound),
}

/// Sink that forwards notifications to a channel, for an external player.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, Receiver<Notification>) {
        let (tx, rx) = crossbeam::channel::unbounded();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn announce(&self, text: &str) {
        let _ = self.tx.send(Notification::Speech(text.to_string()));
    }

    fn play_sound(&self, sound: Sound) {
        let _ = self.tx.send(Notification::Sound(sound));
    }
}

/// Gate in front of a sink, honouring the audio switch.
pub struct Notifier {
    sink: Box<dyn NotificationSink>,
    enabled: bool,
}

impl Notifier {
    pub fn new(sink: Box<dyn NotificationSink>, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn announce(&self, text: &str) {
        if self.enabled {
            self.sink.announce(text);
        }
    }

    pub fn play_sound(&self, sound: Sound) {
        if self.enabled {
            self.sink.play_sound(sound);
        }
    }

    pub fn alert(&self, alert: &Alert) {
        if self.enabled {
            self.sink.alert(alert);
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Box::new(LogNotifier), true)
    }
}
