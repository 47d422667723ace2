pub mod bindings;
pub mod choir;
pub mod clock;
pub mod config;
pub mod device;
pub mod dsp;
pub mod error;
pub mod feedback;
pub mod gesture;
pub mod layout;
pub mod notes;
pub mod samples;
pub mod separator;
pub mod tone;

use wasm_bindgen::prelude::*;

pub use crate::choir::{ChoirGenerator, VoiceHandle, VoiceId};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::EngineConfig;
pub use crate::device::{AudioContext, DeviceState, Driver, DriverOpener};
pub use crate::error::GlissandoError;
pub use crate::feedback::FloatingLabel;
pub use crate::layout::{HitTest, KeyboardLayout, Point, Rect, VoiceRowLayout};
pub use crate::notes::{KeyId, PitchClass};
pub use crate::separator::Separator;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the glissando-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse an engine config from JSON, falling back to the defaults for every
/// field the document leaves out.
pub fn parse_config(json: &str) -> Result<EngineConfig, GlissandoError> {
    Ok(EngineConfig::from_json(json)?)
}
