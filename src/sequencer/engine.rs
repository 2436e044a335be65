// Loop Engine - Beat clock, per-slot mixer state and the play/record state machine
//
// `advance()` is the only per-tick entry point. It drains live input, polls the
// generation job, moves the playhead, raises transport events and dispatches the
// events that fall inside the beat window swept since the previous tick.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, SinkError};
use crate::generation::job::{GenerationJob, Generator, JobStatus};
use crate::generation::snapshot::{
    GenerationRequest, bar_count, capture_pattern, track_policies,
};
use crate::messaging::channels::{InputConsumer, NotificationProducer};
use crate::messaging::notification::Notification;
use crate::midi::event::{MidiEvent, TrackEvent};
use crate::sequencer::export::{ExportedSong, ExportedTrack, export_song_track, export_track};
use crate::sequencer::metronome::{ClickSink, Metronome};
use crate::sequencer::observer::{ObserverList, TransportObserver};
use crate::sequencer::recorder::Recorder;
use crate::sequencer::scheduler::{BeatWindow, EventScheduler};
use crate::sequencer::store::TrackStore;
use crate::sequencer::timeline::{QuantiseGrid, Tempo, ticks_to_beats};
use crate::sequencer::track::{Note, Track};
use crate::sequencer::transport::{Clock, SharedTransportState, SystemClock, TransportState};
use crate::synth::sink::{CC_CHANNEL_VOLUME, SynthSink};
use ringbuf::traits::{Consumer, Producer};
use std::sync::Arc;

const MAX_VOLUME: u8 = 127;

pub struct LoopEngine {
    config: EngineConfig,
    tempo: Tempo,
    clock: Box<dyn Clock>,
    synth: Box<dyn SynthSink>,

    tracks: Arc<TrackStore>,
    muted: Vec<bool>,
    soloed: Vec<bool>,
    volumes: Vec<u8>,
    quantise: Vec<QuantiseGrid>,
    active: Option<usize>,
    transpose: i8,

    state: TransportState,
    recording: bool,
    elapsed_beats: f64,
    last_time: f64,
    loop_count: u64,
    shared: Arc<SharedTransportState>,

    scheduler: EventScheduler,
    due: Vec<TrackEvent>,
    recorder: Recorder,
    metronome: Metronome,
    observers: ObserverList,

    input: Option<InputConsumer>,
    notifications: Option<NotificationProducer>,
    generation: Option<GenerationJob>,
}

impl LoopEngine {
    /// Create an engine driven by `clock`, dispatching to `synth`
    pub fn new(
        config: EngineConfig,
        clock: Box<dyn Clock>,
        synth: Box<dyn SynthSink>,
    ) -> EngineResult<Self> {
        config
            .validate()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;

        let track_count = config.track_count;
        let last_time = clock.now_seconds();

        log::info!(
            "Loop engine: {} BPM, {} beats per loop, {} tracks",
            config.bpm,
            config.beats_per_loop,
            track_count
        );

        Ok(Self {
            tempo: Tempo::new(config.bpm),
            clock,
            synth,
            tracks: Arc::new(TrackStore::new(track_count)),
            muted: vec![false; track_count],
            soloed: vec![false; track_count],
            volumes: vec![config.default_volume.min(MAX_VOLUME); track_count],
            quantise: vec![QuantiseGrid::OFF; track_count],
            active: Some(0),
            transpose: 0,
            state: TransportState::Stopped,
            recording: false,
            elapsed_beats: 0.0,
            last_time,
            loop_count: 0,
            shared: SharedTransportState::new(),
            scheduler: EventScheduler::new(track_count),
            due: Vec::with_capacity(64),
            recorder: Recorder::new(config.record_control_changes),
            metronome: Metronome::new(config.beats_per_bar, config.metronome_enabled),
            observers: ObserverList::new(),
            input: None,
            notifications: None,
            generation: None,
            config,
        })
    }

    /// Engine on the wall clock
    pub fn with_system_clock(
        config: EngineConfig,
        synth: Box<dyn SynthSink>,
    ) -> EngineResult<Self> {
        Self::new(config, Box::new(SystemClock::new()), synth)
    }

    // ========== WIRING ==========

    pub fn attach_input(&mut self, input: InputConsumer) {
        self.input = Some(input);
    }

    pub fn attach_notifications(&mut self, notifications: NotificationProducer) {
        self.notifications = Some(notifications);
    }

    pub fn subscribe(&mut self, observer: Box<dyn TransportObserver>) {
        self.observers.subscribe(observer);
    }

    pub fn set_click_sink(&mut self, sink: Box<dyn ClickSink>) {
        self.metronome.set_sink(sink);
    }

    pub fn shared_transport(&self) -> Arc<SharedTransportState> {
        self.shared.clone()
    }

    /// Slot storage, readable from any thread
    pub fn tracks(&self) -> Arc<TrackStore> {
        self.tracks.clone()
    }

    // ========== QUERIES ==========

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, slot: usize) -> Option<Arc<Track>> {
        self.tracks.load(slot)
    }

    pub fn active_slot(&self) -> Option<usize> {
        self.active
    }

    pub fn active_track(&self) -> Option<Arc<Track>> {
        self.active.and_then(|slot| self.tracks.load(slot))
    }

    pub fn playhead_position(&self) -> f64 {
        self.elapsed_beats
    }

    pub fn loop_count(&self) -> u64 {
        self.loop_count
    }

    pub fn transport_state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_muted(&self, slot: usize) -> bool {
        self.muted.get(slot).copied().unwrap_or(false)
    }

    pub fn is_soloed(&self, slot: usize) -> bool {
        self.soloed.get(slot).copied().unwrap_or(false)
    }

    pub fn volume(&self, slot: usize) -> Option<u8> {
        self.volumes.get(slot).copied()
    }

    pub fn quantise_setting(&self, slot: usize) -> Option<QuantiseGrid> {
        self.quantise.get(slot).copied()
    }

    pub fn transpose(&self) -> i8 {
        self.transpose
    }

    pub fn is_metronome_enabled(&self) -> bool {
        self.metronome.is_enabled()
    }

    pub fn generation_in_progress(&self) -> bool {
        self.generation.is_some()
    }

    /// Output volume after mute and solo
    pub fn effective_volume(&self, slot: usize) -> EngineResult<u8> {
        self.tracks.check_slot(slot)?;
        let any_solo = self.soloed.iter().any(|s| *s);

        Ok(if self.muted[slot] || (any_solo && !self.soloed[slot]) {
            0
        } else {
            self.volumes[slot]
        })
    }

    /// Notes of `slot` with starts snapped to the slot's quantise setting
    pub fn display_notes(&self, slot: usize) -> EngineResult<Vec<Note>> {
        self.tracks.check_slot(slot)?;
        Ok(self
            .tracks
            .load(slot)
            .map(|t| t.display_notes(self.quantise[slot]))
            .unwrap_or_default())
    }

    // ========== TRANSPORT ==========

    /// Stopped -> Playing re-arms the clock; Playing -> Stopped silences every slot
    pub fn toggle_play(&mut self) -> TransportState {
        self.state = self.state.toggled();
        match self.state {
            TransportState::Playing => {
                self.last_time = self.clock.now_seconds();
                log::info!("Playing from beat {:.2}", self.elapsed_beats);
            }
            TransportState::Stopped => {
                self.silence_all();
                log::info!("Stopped at beat {:.2}", self.elapsed_beats);
            }
        }
        self.shared.set_state(self.state);
        self.state
    }

    pub fn reset_playhead(&mut self) {
        self.elapsed_beats = 0.0;
        self.loop_count = 0;
        self.last_time = self.clock.now_seconds();
        self.scheduler.reset();
        self.silence_all();

        self.shared.set_playhead(0.0);
        self.shared.set_loop_count(0);
        self.observers.playhead_changed(0.0);
    }

    pub fn toggle_recording(&mut self) -> bool {
        self.recording = !self.recording;
        self.shared.set_recording(self.recording);
        log::info!(
            "Recording {}",
            if self.recording { "armed" } else { "disarmed" }
        );
        self.recording
    }

    pub fn toggle_metronome(&mut self) -> bool {
        self.metronome.toggle()
    }

    /// One tick
    pub fn advance(&mut self) {
        self.drain_input();
        self.poll_generation();

        let now = self.clock.now_seconds();
        if !self.state.is_playing() {
            self.last_time = now;
            return;
        }

        let delta_seconds = now - self.last_time;
        assert!(
            delta_seconds.is_finite() && delta_seconds >= 0.0,
            "clock went backwards: {} -> {}",
            self.last_time,
            now
        );
        self.last_time = now;

        let delta_beats = self.tempo.seconds_to_beats(delta_seconds);
        let loop_beats = self.config.beats_per_loop as f64;
        let from = self.elapsed_beats;
        let unwrapped = from + delta_beats;
        let wraps = (unwrapped / loop_beats).floor() as u64;

        self.elapsed_beats = unwrapped % loop_beats;
        assert!(
            self.elapsed_beats.is_finite() && (0.0..loop_beats).contains(&self.elapsed_beats),
            "playhead out of range: {}",
            self.elapsed_beats
        );

        self.shared.set_playhead(self.elapsed_beats);
        self.observers.playhead_changed(self.elapsed_beats);

        let beat = self.elapsed_beats.floor() as u64;
        if wraps > 0 || beat != from.floor() as u64 {
            self.observers.beat(beat);
            self.metronome.on_beat(beat);
        }

        for _ in 0..wraps {
            self.observers.looped(self.loop_count);
            self.loop_count += 1;
        }
        self.shared.set_loop_count(self.loop_count);

        // A stall longer than the loop still plays each event once
        let to = if wraps > 1 {
            self.elapsed_beats.min(from)
        } else {
            self.elapsed_beats
        };
        let (first, second) = BeatWindow::sweep(from, to, wraps > 0);
        self.dispatch_window(first);
        if let Some(second) = second {
            self.dispatch_window(second);
        }
    }

    fn dispatch_window(&mut self, window: BeatWindow) {
        let any_solo = self.soloed.iter().any(|s| *s);
        let loop_beats = self.config.beats_per_loop as f64;
        let mut due = std::mem::take(&mut self.due);

        for slot in 0..self.tracks.len() {
            if self.muted[slot] || (any_solo && !self.soloed[slot]) {
                continue;
            }
            // Recorded control changes can occupy a slot without any notes
            let Some(track) = self.tracks.load(slot) else {
                continue;
            };
            if track.event_count() == 0 {
                continue;
            }

            due.clear();
            self.scheduler.collect_due(slot, &track, window, &mut due);
            let tpb = track.ticks_per_beat();
            for e in &due {
                // Past the loop end only releases are played, at the seam
                if ticks_to_beats(e.time, tpb) >= loop_beats && !e.event.is_note_off() {
                    continue;
                }
                log::trace!("[{}] beat window {:?}: {:?}", slot, window, e.event);
                self.send_to_synth(slot, e.event);
            }
        }

        due.clear();
        self.due = due;
    }

    // ========== INPUT ==========

    fn drain_input(&mut self) {
        let Some(mut input) = self.input.take() else {
            return;
        };
        while let Some(event) = input.try_pop() {
            self.handle_midi_event(event);
        }
        self.input = Some(input);
    }

    /// Live input: transpose, monitor on the active slot, then record if armed
    pub fn handle_midi_event(&mut self, event: MidiEvent) {
        let Some(event) = event.transposed(self.transpose) else {
            log::warn!(
                "{:?} transposed by {} is out of range, dropped",
                event,
                self.transpose
            );
            return;
        };

        let Some(slot) = self.active else {
            return;
        };

        if !event.is_meta() {
            self.send_to_synth(slot, event);
        }

        if self.state.is_playing() && self.recording {
            self.record_input(slot, event);
        }
    }

    fn record_input(&mut self, slot: usize, event: MidiEvent) {
        let recorder = self.recorder;
        let at_beats = self.elapsed_beats;
        let beats_per_loop = self.config.beats_per_loop;

        match self
            .tracks
            .update(slot, |current| recorder.capture(current, event, at_beats, beats_per_loop))
        {
            Ok(Some(track)) => self.observers.track_changed(Some(track), slot),
            Ok(None) => {}
            Err(e) => {
                log::warn!("Recording into slot {} failed: {}", slot, e);
                self.notify(Notification::recording_failed(slot, &e));
            }
        }
    }

    // ========== SLOT SETTINGS ==========

    /// `None` clears the active slot
    pub fn set_active_track(&mut self, slot: Option<usize>) -> EngineResult<()> {
        if let Some(slot) = slot {
            self.tracks.check_slot(slot)?;
        }
        self.active = slot;
        log::info!("Active track: {:?}", slot);

        let track = self.active_track();
        self.observers.active_track_changed(track, slot);
        Ok(())
    }

    pub fn toggle_mute(&mut self, slot: usize) -> EngineResult<bool> {
        self.tracks.check_slot(slot)?;
        self.muted[slot] = !self.muted[slot];
        self.push_volumes();
        Ok(self.muted[slot])
    }

    pub fn toggle_solo(&mut self, slot: usize) -> EngineResult<bool> {
        self.tracks.check_slot(slot)?;
        self.soloed[slot] = !self.soloed[slot];
        self.push_volumes();
        Ok(self.soloed[slot])
    }

    pub fn set_volume(&mut self, slot: usize, volume: u8) -> EngineResult<()> {
        self.tracks.check_slot(slot)?;
        self.volumes[slot] = volume.min(MAX_VOLUME);
        self.push_volumes();
        Ok(())
    }

    /// `divisions` steps per beat; 0 turns quantisation off
    pub fn set_quantise(&mut self, slot: usize, divisions: u32) -> EngineResult<()> {
        self.set_quantise_grid(slot, QuantiseGrid::per_beat(divisions))
    }

    /// Any grid, including steps longer than a beat
    pub fn set_quantise_grid(&mut self, slot: usize, grid: QuantiseGrid) -> EngineResult<()> {
        self.tracks.check_slot(slot)?;
        log::info!("Quantise for track {} set to {}", slot, grid);
        self.quantise[slot] = grid;
        Ok(())
    }

    pub fn set_transpose(&mut self, semitones: i8) {
        self.transpose = semitones;
    }

    pub fn select_program(
        &mut self,
        slot: usize,
        sound_id: u32,
        bank: u32,
        program: u8,
    ) -> EngineResult<()> {
        self.tracks.check_slot(slot)?;
        if let Err(e) = self.synth.program_select(slot, sound_id, bank, program) {
            self.report_sink_failure(slot, e);
        }
        Ok(())
    }

    fn push_volumes(&mut self) {
        for slot in 0..self.tracks.len() {
            let volume = self.effective_volume(slot).unwrap_or(0);
            if let Err(e) = self.synth.control_change(slot, CC_CHANNEL_VOLUME, volume) {
                self.report_sink_failure(slot, e);
            }
        }
    }

    // ========== LOAD/SAVE ==========

    /// Replace `slot` from a decoded delta-time sequence. A sequence without
    /// notes empties the slot.
    pub fn load_track(
        &mut self,
        slot: usize,
        events: Vec<TrackEvent>,
        ticks_per_beat: u32,
    ) -> EngineResult<Option<Arc<Track>>> {
        self.tracks.check_slot(slot)?;
        let track = Track::from_delta_events(events, ticks_per_beat)?;
        self.install(slot, Some(track))
    }

    /// Fill slots in order from a decoded multi-track source. Source tracks
    /// with no events are skipped. Returns the number of slots written.
    pub fn load_song(&mut self, tracks: &[ExportedTrack]) -> EngineResult<usize> {
        let decoded = tracks
            .iter()
            .filter(|t| !t.events.is_empty())
            .take(self.tracks.len())
            .map(ExportedTrack::to_track)
            .collect::<EngineResult<Vec<_>>>()?;

        log::info!("Loading song: {} source track(s)", decoded.len());
        let loaded = decoded.len();
        for (slot, track) in decoded.into_iter().enumerate() {
            self.install(slot, Some(track))?;
        }
        Ok(loaded)
    }

    /// Load one source track of a multi-track source into the slot it would
    /// occupy in `load_song`. Returns that slot, or None if the source index
    /// does not map to a slot.
    pub fn load_song_track(
        &mut self,
        tracks: &[ExportedTrack],
        source_index: usize,
    ) -> EngineResult<Option<usize>> {
        let Some(source) = tracks.get(source_index) else {
            return Ok(None);
        };
        if source.events.is_empty() {
            return Ok(None);
        }

        let slot = tracks[..source_index]
            .iter()
            .filter(|t| !t.events.is_empty())
            .count();
        if slot >= self.tracks.len() {
            return Ok(None);
        }

        let track = source.to_track()?;
        self.install(slot, Some(track))?;
        Ok(Some(slot))
    }

    pub fn delete_track(&mut self, slot: usize) -> EngineResult<()> {
        self.install(slot, None).map(|_| ())
    }

    /// Export one slot at its own resolution with its quantise setting
    pub fn export_track(&self, slot: usize) -> EngineResult<Option<ExportedTrack>> {
        self.tracks.check_slot(slot)?;
        self.tracks
            .load(slot)
            .map(|track| export_track(&track, self.quantise[slot]))
            .transpose()
    }

    /// Export every slot at the configured export resolution
    pub fn export_song(&self) -> EngineResult<ExportedSong> {
        let ticks_per_beat = self.config.export_ticks_per_beat;
        let tracks = self
            .tracks
            .snapshot()
            .iter()
            .enumerate()
            .map(|(slot, track)| {
                export_song_track(
                    slot,
                    track.as_deref(),
                    self.quantise[slot],
                    self.config.beats_per_loop,
                    ticks_per_beat,
                )
            })
            .collect::<EngineResult<Vec<_>>>()?;

        log::info!("Exported {} track(s) at {} tpb", tracks.len(), ticks_per_beat);
        Ok(ExportedSong {
            ticks_per_beat,
            tracks,
        })
    }

    /// Publish a slot's new content. Tracks without notes empty the slot.
    fn install(&mut self, slot: usize, track: Option<Track>) -> EngineResult<Option<Arc<Track>>> {
        self.tracks.check_slot(slot)?;
        let track = track.filter(|t| !t.is_empty()).map(Arc::new);

        self.tracks.store(slot, track.clone())?;
        self.scheduler.reset_slot(slot);
        if let Err(e) = self.synth.all_notes_off(slot) {
            self.report_sink_failure(slot, e);
        }

        match &track {
            Some(t) => log::info!(
                "Track {} loaded: {} events, {} notes at {} tpb",
                slot,
                t.event_count(),
                t.notes().len(),
                t.ticks_per_beat()
            ),
            None => log::info!("Track {} emptied", slot),
        }

        self.observers.track_changed(track.clone(), slot);
        if self.active == Some(slot) {
            self.observers.active_track_changed(track.clone(), Some(slot));
        }
        Ok(track)
    }

    // ========== GENERATION ==========

    /// Snapshot the pattern and start `generator` for the active slot
    pub fn start_generation(&mut self, generator: Arc<dyn Generator>) -> EngineResult<()> {
        if self.generation.is_some() {
            return Err(EngineError::GenerationJobFailure(
                "a generation job is already running".to_string(),
            ));
        }
        let Some(target) = self.active else {
            return Err(EngineError::GenerationJobFailure(
                "no active track to generate into".to_string(),
            ));
        };

        let slots = self.tracks.snapshot();
        let piece = capture_pattern(
            &slots,
            &self.quantise,
            self.config.beats_per_loop,
            self.config.beats_per_bar,
            self.config.export_ticks_per_beat,
        )?;
        let bars = bar_count(self.config.beats_per_loop, self.config.beats_per_bar);
        let request = GenerationRequest {
            piece,
            status: track_policies(&slots, &self.muted, Some(target), bars),
        };

        self.generation = Some(GenerationJob::spawn(generator, request, target)?);
        Ok(())
    }

    /// Returns true if a job was in flight
    pub fn cancel_generation(&mut self) -> bool {
        match self.generation.take() {
            Some(job) => {
                job.cancel();
                log::info!("Generation for slot {} cancelled", job.target_slot());
                true
            }
            None => false,
        }
    }

    fn poll_generation(&mut self) {
        let Some(job) = &self.generation else {
            return;
        };
        let target = job.target_slot();

        match job.poll() {
            JobStatus::Pending => {}
            JobStatus::Finished(track) => {
                self.generation = None;
                log::info!("Generation finished for slot {}", target);
                match self.install(target, Some(track)) {
                    Ok(_) => self.notify(Notification::generation_loaded(target)),
                    Err(e) => self.notify(Notification::from(e).for_slot(target)),
                }
            }
            JobStatus::Failed(reason) => {
                self.generation = None;
                log::warn!("Generation failed: {}", reason);
                self.notify(Notification::from(reason).for_slot(target));
            }
            JobStatus::Cancelled => {
                self.generation = None;
            }
        }
    }

    // ========== SYNTH ==========

    fn send_to_synth(&mut self, slot: usize, event: MidiEvent) {
        let result = match event {
            MidiEvent::NoteOn { note, velocity } if velocity > 0 => {
                self.synth.note_on(slot, note, velocity)
            }
            MidiEvent::NoteOn { note, .. } | MidiEvent::NoteOff { note } => {
                self.synth.note_off(slot, note)
            }
            MidiEvent::ControlChange { controller, value } => {
                self.synth.control_change(slot, controller, value)
            }
            MidiEvent::PitchBend { value } => self.synth.pitch_bend(slot, value),
            MidiEvent::Meta(_) => Ok(()),
        };

        if let Err(e) = result {
            self.report_sink_failure(slot, e);
        }
    }

    fn silence_all(&mut self) {
        for slot in 0..self.tracks.len() {
            if let Err(e) = self.synth.all_notes_off(slot) {
                self.report_sink_failure(slot, e);
            }
        }
    }

    fn report_sink_failure(&mut self, slot: usize, error: SinkError) {
        log::warn!("Synth call for track {} failed: {}", slot, error);
        self.notify(Notification::from(error).for_slot(slot));
    }

    fn notify(&mut self, notification: Notification) {
        if let Some(notifications) = self.notifications.as_mut() {
            // Full queue: the UI is behind, drop it
            let _ = notifications.try_push(notification);
        }
    }
}

impl std::fmt::Debug for LoopEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopEngine")
            .field("tempo", &self.tempo)
            .field("state", &self.state)
            .field("recording", &self.recording)
            .field("elapsed_beats", &self.elapsed_beats)
            .field("loop_count", &self.loop_count)
            .field("active", &self.active)
            .field("tracks", &self.tracks)
            .finish()
    }
}
