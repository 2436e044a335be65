//! Config and song persistence through the filesystem

use midi_looper::{
    ConfigError, EngineConfig, ExportedSong, LoopEngine, ManualClock, MidiEvent, RecordingSynth,
    TrackEvent,
};
use std::fs;
use tempfile::TempDir;

/// A config written to disk loads back identical
#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("looper.ron");

    let mut config = EngineConfig::new(96.0, 32, 4);
    config.beats_per_bar = 3;
    config.record_control_changes = true;
    fs::write(&path, config.to_ron_string().unwrap()).unwrap();

    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

/// Missing files and invalid values surface as typed errors
#[test]
fn test_config_load_errors() {
    let dir = TempDir::new().unwrap();

    let missing = EngineConfig::load(&dir.path().join("missing.ron"));
    assert!(matches!(missing, Err(ConfigError::Io(_))));

    let path = dir.path().join("bad.ron");
    fs::write(&path, "(bpm: 5000.0)").unwrap();
    assert!(matches!(
        EngineConfig::load(&path),
        Err(ConfigError::Invalid(_))
    ));
}

/// A song exported to JSON reloads into a fresh engine with the same notes
#[test]
fn test_song_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("song.json");

    let mut source = LoopEngine::new(
        EngineConfig::new(120.0, 16, 3),
        Box::new(ManualClock::new()),
        Box::new(RecordingSynth::new()),
    )
    .unwrap();
    source
        .load_track(
            1,
            vec![
                TrackEvent::new(480, MidiEvent::NoteOn { note: 67, velocity: 90 }),
                TrackEvent::new(240, MidiEvent::NoteOff { note: 67 }),
            ],
            480,
        )
        .unwrap();

    let song = source.export_song().unwrap();
    assert_eq!(song.tracks.len(), 3);
    fs::write(&path, song.to_json_string().unwrap()).unwrap();

    let json = fs::read_to_string(&path).unwrap();
    let reloaded = ExportedSong::from_json_str(&json).unwrap();
    assert_eq!(reloaded.tracks[0].name, "Track 0");
    assert!(reloaded.tracks[0].is_empty());
    assert!(!reloaded.tracks[1].is_empty());

    let mut target = LoopEngine::new(
        EngineConfig::new(120.0, 16, 3),
        Box::new(ManualClock::new()),
        Box::new(RecordingSynth::new()),
    )
    .unwrap();
    // Empty source tracks are skipped, so the only populated one lands in slot 0
    assert_eq!(target.load_song(&reloaded.tracks).unwrap(), 1);

    let note = target.track(0).unwrap().notes()[0];
    assert_eq!(note.pitch, 67);
    assert!((note.start - 1.0).abs() < 1e-9);
    assert!((note.duration - 0.5).abs() < 1e-9);
}
