// Engine configuration, loaded from RON

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Session parameters. Fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bpm: f64,
    pub beats_per_loop: u32,
    pub track_count: usize,
    /// Used for metronome accents and the generation bar count
    pub beats_per_bar: u32,
    pub metronome_enabled: bool,
    /// Persist control changes while recording, not just monitor them
    pub record_control_changes: bool,
    pub default_volume: u8,
    pub export_ticks_per_beat: u32,
    pub input_queue_capacity: usize,
    pub notification_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_loop: 16,
            track_count: 8,
            beats_per_bar: 4,
            metronome_enabled: false,
            record_control_changes: false,
            default_volume: 127,
            export_ticks_per_beat: 480,
            input_queue_capacity: 512,
            notification_queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Shorthand for the three parameters every session must pick
    pub fn new(bpm: f64, beats_per_loop: u32, track_count: usize) -> Self {
        Self {
            bpm,
            beats_per_loop,
            track_count,
            ..Self::default()
        }
    }

    pub fn from_ron_str(ron_data: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(ron_data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_data = std::fs::read_to_string(path)?;
        Self::from_ron_str(&ron_data)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(20.0..=999.0).contains(&self.bpm) {
            return Err(ConfigError::Invalid(
                "BPM must be between 20 and 999".to_string(),
            ));
        }

        if self.beats_per_loop == 0 {
            return Err(ConfigError::Invalid(
                "Loop must be at least one beat long".to_string(),
            ));
        }

        // One synth channel per slot
        if self.track_count == 0 || self.track_count > 16 {
            return Err(ConfigError::Invalid(
                "Track count must be between 1 and 16".to_string(),
            ));
        }

        if self.beats_per_bar == 0 {
            return Err(ConfigError::Invalid(
                "Beats per bar must be > 0".to_string(),
            ));
        }

        if self.default_volume > 127 {
            return Err(ConfigError::Invalid(
                "Default volume must be 0-127".to_string(),
            ));
        }

        if self.export_ticks_per_beat == 0 {
            return Err(ConfigError::Invalid(
                "Export resolution must be > 0 ticks per beat".to_string(),
            ));
        }

        if self.input_queue_capacity == 0 || self.notification_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Queue capacities must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
