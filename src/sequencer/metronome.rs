// Metronome - Click triggers on beat boundaries
// The engine reports each new integer beat; the metronome picks accent or regular
// and hands the click to a pluggable sink

/// Metronome click type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickType {
    /// Click on first beat of bar (accent/downbeat)
    Accent,
    /// Click on other beats
    Regular,
}

impl ClickType {
    /// Click for `beat_number` in a bar of `beats_per_bar` beats
    pub fn for_beat(beat_number: u64, beats_per_bar: u32) -> Self {
        if beat_number % beats_per_bar.max(1) as u64 == 0 {
            ClickType::Accent
        } else {
            ClickType::Regular
        }
    }
}

/// Something that can make a click sound
pub trait ClickSink: Send {
    fn click(&mut self, click_type: ClickType);
}

/// Metronome state for playback
pub struct Metronome {
    enabled: bool,
    beats_per_bar: u32,
    sink: Option<Box<dyn ClickSink>>,
}

impl Metronome {
    pub fn new(beats_per_bar: u32, enabled: bool) -> Self {
        Self {
            enabled,
            beats_per_bar: beats_per_bar.max(1),
            sink: None,
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn ClickSink>) {
        self.sink = Some(sink);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    /// Trigger the click for a new beat.
    /// Returns the click that fired, or None when disabled.
    pub fn on_beat(&mut self, beat_number: u64) -> Option<ClickType> {
        if !self.enabled {
            return None;
        }

        let click_type = ClickType::for_beat(beat_number, self.beats_per_bar);
        if let Some(sink) = self.sink.as_mut() {
            sink.click(click_type);
        }
        Some(click_type)
    }
}

impl Default for Metronome {
    fn default() -> Self {
        Self::new(4, false)
    }
}

impl std::fmt::Debug for Metronome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metronome")
            .field("enabled", &self.enabled)
            .field("beats_per_bar", &self.beats_per_bar)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
