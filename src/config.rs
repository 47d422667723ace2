//! Engine configuration.
//!
//! Every field has a default, so `{}` is a valid config and hosts only spell
//! out what they want to change. Field names are camelCase on the wire.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;
use crate::error::ConfigError;
use crate::samples::SampleSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Frequency of `la` in the reference octave.
    pub tuning_pitch: f64,
    pub tone: ToneConfig,
    pub choir: ChoirConfig,
    pub pop: PopConfig,
    pub feedback: FeedbackConfig,
    pub device: DeviceConfig,
    /// When muted, also suppress floating labels and key highlighting.
    pub mute_hides_labels: bool,
    pub start_muted: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tuning_pitch: 440.0,
            tone: ToneConfig::default(),
            choir: ChoirConfig::default(),
            pop: PopConfig::default(),
            feedback: FeedbackConfig::default(),
            device: DeviceConfig::default(),
            mute_hides_labels: true,
            start_muted: false,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON object. Anything else, including an array that would
    /// fill the fields positionally, is rejected.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(ConfigError::invalid("expected a JSON object"));
        }
        let config: EngineConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lifetime = self.feedback.label_lifetime;
        if let Err(e) = Duration::try_from_secs_f64(lifetime) {
            return Err(ConfigError::invalid(format!(
                "labelLifetime {lifetime} is not a usable duration: {e}"
            )));
        }
        Ok(())
    }
}

/// Piano key synthesis. Times are seconds after the trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToneConfig {
    pub attack: f64,
    pub peak_gain: f64,
    /// Time the master envelope reaches `floor`.
    pub decay: f64,
    pub floor: f64,
    /// Hard stop for the whole tone.
    pub duration: f64,
    pub strings: StringsConfig,
    pub harmonics: Vec<HarmonicConfig>,
    /// A harmonic at multiple `m` decays over `harmonic_decay / m`.
    pub harmonic_decay: f64,
    pub harmonic_stop: f64,
    pub hammer: HammerConfig,
    pub filter: ToneFilterConfig,
    pub reverb_send: f64,
}

impl Default for ToneConfig {
    fn default() -> Self {
        ToneConfig {
            attack: 0.01,
            peak_gain: 0.5,
            decay: 2.2,
            floor: 0.001,
            duration: 2.5,
            strings: StringsConfig::default(),
            harmonics: vec![
                HarmonicConfig { multiple: 2.0, gain: 0.15 },
                HarmonicConfig { multiple: 3.0, gain: 0.08 },
                HarmonicConfig { multiple: 4.0, gain: 0.04 },
            ],
            harmonic_decay: 1.5,
            harmonic_stop: 2.0,
            hammer: HammerConfig::default(),
            filter: ToneFilterConfig::default(),
            reverb_send: 0.0,
        }
    }
}

/// Near-unison oscillators standing in for a piano's string triplet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StringsConfig {
    pub waveform: Waveform,
    pub detune_cents: Vec<f64>,
    pub gain: f64,
    pub decay: f64,
}

impl Default for StringsConfig {
    fn default() -> Self {
        StringsConfig {
            waveform: Waveform::Triangle,
            detune_cents: vec![-1.5, 0.0, 1.5],
            gain: 0.4,
            decay: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicConfig {
    pub multiple: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HammerConfig {
    pub multiple: f64,
    pub gain: f64,
    pub decay: f64,
    pub stop: f64,
}

impl Default for HammerConfig {
    fn default() -> Self {
        HammerConfig {
            multiple: 5.0,
            gain: 0.08,
            decay: 0.04,
            stop: 0.1,
        }
    }
}

/// Low-pass sweep, expressed as multiples of the fundamental.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToneFilterConfig {
    pub start_multiple: f64,
    pub end_multiple: f64,
    pub q: f64,
}

impl Default for ToneFilterConfig {
    fn default() -> Self {
        ToneFilterConfig {
            start_multiple: 8.0,
            end_multiple: 1.2,
            q: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoirSynthesis {
    Ensemble,
    Sample,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChoirConfig {
    pub synthesis: ChoirSynthesis,
    pub voices: Vec<VoiceConfig>,
    pub waveform: Waveform,
    pub detune_cents: Vec<f64>,
    pub peak_gain: f64,
    pub attack: f64,
    pub release: f64,
    pub cutoff: f64,
    pub q: f64,
    pub vibrato_rate: f64,
    pub vibrato_depth_cents: f64,
    pub reverb_send: f64,
    /// Vocal sample for the `sample` strategy.
    pub sample: Option<SampleSource>,
    /// Pitch the vocal sample was recorded at.
    pub sample_reference_frequency: f64,
}

impl Default for ChoirConfig {
    fn default() -> Self {
        ChoirConfig {
            synthesis: ChoirSynthesis::Ensemble,
            voices: vec![
                VoiceConfig::new("do", 0),
                VoiceConfig::new("mi", 0),
                VoiceConfig::new("sol", 0),
                VoiceConfig::new("do", 1),
            ],
            waveform: Waveform::Sawtooth,
            detune_cents: vec![-8.0, 0.0, 8.0],
            peak_gain: 0.12,
            attack: 0.3,
            release: 0.35,
            cutoff: 1400.0,
            q: 1.2,
            vibrato_rate: 5.0,
            vibrato_depth_cents: 12.0,
            reverb_send: 0.35,
            sample: None,
            sample_reference_frequency: 261.63,
        }
    }
}

/// One singer: the pitch it holds while engaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub pitch: String,
    #[serde(default)]
    pub octave: i32,
}

impl VoiceConfig {
    pub fn new(pitch: &str, octave: i32) -> Self {
        VoiceConfig {
            pitch: pitch.to_string(),
            octave,
        }
    }
}

/// The short chirp played for generic UI clicks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PopConfig {
    pub start_frequency: f64,
    pub end_frequency: f64,
    pub start_gain: f64,
    pub end_gain: f64,
    pub duration: f64,
}

impl Default for PopConfig {
    fn default() -> Self {
        PopConfig {
            start_frequency: 800.0,
            end_frequency: 100.0,
            start_gain: 0.05,
            end_gain: 0.01,
            duration: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedbackConfig {
    /// Seconds a floating label stays visible.
    pub label_lifetime: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        FeedbackConfig { label_lifetime: 1.2 }
    }
}

impl FeedbackConfig {
    /// Out-of-range lifetimes saturate: negative or NaN to zero, huge to
    /// `Duration::MAX`.
    pub fn lifetime(&self) -> Duration {
        match Duration::try_from_secs_f64(self.label_lifetime) {
            Ok(lifetime) => lifetime,
            Err(_) if self.label_lifetime > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Requested output rate; the device default when unset.
    pub sample_rate: Option<u32>,
    pub max_sounds: usize,
    pub master_gain: f32,
    /// Model browser autoplay policy: open suspended, resume on first use.
    pub start_suspended: bool,
    pub reverb: Option<ReverbConfig>,
    pub compressor: Option<CompressorConfig>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            sample_rate: None,
            max_sounds: 64,
            master_gain: 0.9,
            start_suspended: false,
            reverb: Some(ReverbConfig::default()),
            compressor: Some(CompressorConfig::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbConfig {
    pub duration: f64,
    pub decay: f64,
    pub wet: f32,
    pub seed: u64,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        ReverbConfig {
            duration: 2.5,
            decay: 2.0,
            wet: 1.0,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressorConfig {
    pub threshold: f64,
    pub knee: f64,
    pub ratio: f64,
    pub attack: f64,
    pub release: f64,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        CompressorConfig {
            threshold: -24.0,
            knee: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}
