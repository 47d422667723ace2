//! Plays a glissando and a choir chord through the default output device.
//!
//! Usage: `glissando-demo [config.json]`. Set `RUST_LOG=debug` to watch the
//! triggers go by.

use std::thread::sleep;
use std::time::Duration;

use glissando_core::device::output::CpalDriver;
use glissando_core::{
    EngineConfig, GlissandoError, KeyId, PitchClass, Point, Separator, SystemClock,
};
use log::info;

fn main() -> Result<(), GlissandoError> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).unwrap_or_else(|e| {
                log::warn!("cannot read {path}: {e}, using defaults");
                String::from("{}")
            });
            EngineConfig::from_json(&json)?
        }
        None => EngineConfig::default(),
    };

    let clock = Box::new(SystemClock::new());
    let mut separator = Separator::new(config, CpalDriver::opener(), clock);
    // A demo with no output device has nothing to show.
    separator.unlock()?;

    #[cfg(feature = "remote-samples")]
    if let Some(loading) = separator.spawn_sample_load() {
        let _ = loading.join();
    }

    // Two-octave glissando up the white keys.
    let keys: Vec<KeyId> = (0..2)
        .flat_map(|octave| PitchClass::WHITE.map(|p| KeyId::new(p, octave)))
        .collect();
    for (i, key) in keys.iter().enumerate() {
        let at = Point::new(40.0 * i as f64, 80.0);
        if i == 0 {
            separator.press_start(*key, at);
        } else {
            separator.pointer_enter(*key, at);
        }
        sleep(Duration::from_millis(110));
    }
    separator.press_end();
    info!("{} labels still floating", separator.labels().len());
    sleep(Duration::from_millis(1500));

    let voices = separator.config().choir.voices.len();
    for voice in 0..voices {
        separator.start_voice(voice);
        sleep(Duration::from_millis(250));
    }
    sleep(Duration::from_secs(2));
    for voice in 0..voices {
        separator.stop_voice(voice);
    }
    sleep(Duration::from_millis(600));

    separator.play_pop();
    sleep(Duration::from_millis(300));
    separator.close();
    Ok(())
}
