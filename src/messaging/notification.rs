// Notifications - Non-fatal engine failures and job outcomes, tagged with the track they concern
//
// Built on the tick thread and pushed into the notification ring.

use crate::error::{EngineError, SinkError};
use std::fmt;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl NotificationLevel {
    /// Log level a consumer should forward this notification at
    pub fn log_level(self) -> log::Level {
        match self {
            NotificationLevel::Info => log::Level::Info,
            NotificationLevel::Warning => log::Level::Warn,
            NotificationLevel::Error => log::Level::Error,
        }
    }
}

/// Which part of the engine raised the notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    /// A synth sink call failed
    Synth,
    /// Overdubbing into a track failed
    Recording,
    /// A generation job finished or failed
    Generation,
    /// A track was rejected on load
    Track,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    /// Track slot concerned, if any
    pub slot: Option<usize>,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, category: NotificationCategory, message: String) -> Self {
        Self {
            level,
            category,
            slot: None,
            message,
        }
    }

    pub fn for_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    /// A generated track was installed into `slot`
    pub fn generation_loaded(slot: usize) -> Self {
        Self::new(
            NotificationLevel::Info,
            NotificationCategory::Generation,
            "Generated track loaded".to_string(),
        )
        .for_slot(slot)
    }

    /// A recorded event could not be merged into `slot`
    pub fn recording_failed(slot: usize, error: &EngineError) -> Self {
        Self::new(
            NotificationLevel::Warning,
            NotificationCategory::Recording,
            format!("Recording failed: {}", error),
        )
        .for_slot(slot)
    }
}

impl From<SinkError> for Notification {
    fn from(error: SinkError) -> Self {
        Self::new(
            NotificationLevel::Warning,
            NotificationCategory::Synth,
            error.to_string(),
        )
    }
}

impl From<EngineError> for Notification {
    fn from(error: EngineError) -> Self {
        let category = match &error {
            EngineError::GenerationJobFailure(_) => NotificationCategory::Generation,
            _ => NotificationCategory::Track,
        };
        let slot = match &error {
            EngineError::InvalidSlotIndex { index, .. } => Some(*index),
            _ => None,
        };

        Self {
            level: NotificationLevel::Error,
            category,
            slot,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            Some(slot) => write!(f, "[{:?}] track {}: {}", self.category, slot, self.message),
            None => write!(f, "[{:?}] {}", self.category, self.message),
        }
    }
}
