use midi_looper::midi::input::MidiInput;
use midi_looper::{
    EngineConfig, ExportedSong, LoggingSynth, LoopEngine, create_input_channel,
    create_notification_channel,
};
use ringbuf::traits::Consumer;
use std::path::Path;
use std::thread;
use std::time::Duration;

// Tick driver cadence
const TICK_INTERVAL: Duration = Duration::from_micros(16_667);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Usage: midi_looper [config.ron] [song.json]
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match args.first() {
        Some(path) => match EngineConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Cannot load config {}: {}", path, e);
                return;
            }
        },
        None => EngineConfig::default(),
    };

    let (input_tx, input_rx) = create_input_channel(config.input_queue_capacity);
    let (notification_tx, mut notification_rx) =
        create_notification_channel(config.notification_queue_capacity);

    let mut engine = match LoopEngine::with_system_clock(config, Box::new(LoggingSynth)) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };
    engine.attach_input(input_rx);
    engine.attach_notifications(notification_tx);

    if let Some(path) = args.get(1) {
        let loaded = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| ExportedSong::from_json_str(&json).map_err(|e| e.to_string()))
            .and_then(|song| engine.load_song(&song.tracks).map_err(|e| e.to_string()));
        match loaded {
            Ok(count) => log::info!("Loaded {} track(s) from {}", count, path),
            Err(e) => log::error!("Cannot load song {}: {}", path, e),
        }
    }

    let _midi_input = match MidiInput::connect_first(input_tx) {
        Ok(input) => Some(input),
        Err(e) => {
            log::warn!("{}", e);
            None
        }
    };

    engine.toggle_play();

    log::info!("Looper running");
    loop {
        engine.advance();

        while let Some(notification) = notification_rx.try_pop() {
            log::log!(notification.level.log_level(), "{}", notification);
        }

        thread::sleep(TICK_INTERVAL);
    }
}
