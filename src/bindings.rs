//! JavaScript bindings.
//!
//! `WebSeparator` wraps a `Separator` whose output is pulled by the host,
//! typically from an AudioWorklet calling `render` once per block. With the
//! `web` feature, `withOutputDevice` plays through cpal's WebAudio host
//! instead. Time for label expiry comes from the host, through `set_time`.

use std::time::Duration;

use log::debug;
use wasm_bindgen::prelude::*;

use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::device::offline::OfflineOutput;
use crate::layout::{KeyboardLayout, Point, Rect, VoiceRowLayout};
use crate::notes::KeyId;
use crate::separator::Separator;

#[wasm_bindgen]
pub struct WebSeparator {
    inner: Separator,
    clock: ManualClock,
    /// `None` when a real output device does the rendering.
    output: Option<OfflineOutput>,
    keyboard: Option<KeyboardLayout>,
    voices: Option<VoiceRowLayout>,
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_web_config(config_json: &str) -> Result<EngineConfig, JsValue> {
    if config_json.trim().is_empty() {
        return Ok(EngineConfig::default());
    }
    EngineConfig::from_json(config_json).map_err(js_err)
}

#[wasm_bindgen]
impl WebSeparator {
    /// `config_json` may be empty for the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, sample_rate: f64) -> Result<WebSeparator, JsValue> {
        Ok(WebSeparator::with_config(parse_web_config(config_json)?, sample_rate))
    }

    /// Play straight through the browser's audio output. `render` stays
    /// silent on a separator built this way.
    #[cfg(feature = "web")]
    #[wasm_bindgen(js_name = withOutputDevice)]
    pub fn with_output_device(config_json: &str) -> Result<WebSeparator, JsValue> {
        let config = parse_web_config(config_json)?;
        let clock = ManualClock::new();
        let inner = Separator::new(
            config,
            crate::device::output::CpalDriver::opener(),
            Box::new(clock.clone()),
        );
        Ok(WebSeparator {
            inner,
            clock,
            output: None,
            keyboard: None,
            voices: None,
        })
    }

    /// Host clock in milliseconds, e.g. `performance.now()`. Negative,
    /// non-finite and out-of-range times are ignored.
    pub fn set_time(&mut self, now_ms: f64) {
        match Duration::try_from_secs_f64(now_ms / 1000.0) {
            Ok(now) => self.clock.set(now),
            Err(e) => debug!(target: "gesture", "host time {now_ms} ignored: {e}"),
        }
    }

    /// Pull `frames` mono samples. Silent until the first trigger opens the
    /// device.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        match &self.output {
            Some(output) => output.render(frames),
            None => vec![0.0; frames],
        }
    }

    /// Open the output now, e.g. from the first click handler.
    pub fn unlock(&mut self) -> Result<(), JsValue> {
        self.inner.unlock().map_err(js_err)
    }

    /// Hand over the fetched vocal sample (WAV or MP3 bytes) for the
    /// sampled choir.
    #[cfg(feature = "remote-samples")]
    pub fn load_sample(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        self.inner.load_sample_bytes(bytes).map_err(js_err)
    }

    pub fn set_keyboard_bounds(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.keyboard = Some(KeyboardLayout::two_octaves(Rect::new(x, y, width, height)));
    }

    pub fn set_voice_bounds(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let count = self.inner.config().choir.voices.len();
        self.voices = Some(VoiceRowLayout::new(Rect::new(x, y, width, height), count));
    }

    pub fn play_tone(&mut self, pitch: &str, octave: i32) -> Option<f64> {
        self.inner.play_tone(pitch, octave)
    }

    pub fn play_pop(&mut self) {
        self.inner.play_pop();
    }

    pub fn start_voice(&mut self, voice: usize) -> bool {
        self.inner.start_voice(voice)
    }

    pub fn stop_voice(&mut self, voice: usize) -> bool {
        self.inner.stop_voice(voice)
    }

    /// `key` is `"{pitch}-{octave}"`, e.g. `"do#-1"`.
    pub fn press_start(&mut self, key: &str, x: f64, y: f64) -> Result<(), JsValue> {
        let key: KeyId = key.parse().map_err(js_err)?;
        self.inner.press_start(key, Point::new(x, y));
        Ok(())
    }

    pub fn pointer_enter(&mut self, key: &str, x: f64, y: f64) -> Result<(), JsValue> {
        let key: KeyId = key.parse().map_err(js_err)?;
        self.inner.pointer_enter(key, Point::new(x, y));
        Ok(())
    }

    /// Needs `set_keyboard_bounds`; ignored before that.
    pub fn touch_move(&mut self, x: f64, y: f64) {
        if let Some(keyboard) = &self.keyboard {
            self.inner.touch_move(Point::new(x, y), keyboard);
        }
    }

    pub fn press_end(&mut self) {
        self.inner.press_end();
    }

    pub fn voice_enter(&mut self, voice: usize) {
        self.inner.voice_enter(voice);
    }

    pub fn voice_leave(&mut self, voice: usize) {
        self.inner.voice_leave(voice);
    }

    /// Needs `set_voice_bounds`; ignored before that.
    pub fn touch_voice_move(&mut self, x: f64, y: f64) {
        if let Some(voices) = &self.voices {
            self.inner.touch_voice_move(Point::new(x, y), voices);
        }
    }

    pub fn touch_voice_end(&mut self) {
        self.inner.touch_voice_end();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.inner.set_muted(muted);
    }

    pub fn is_muted(&self) -> bool {
        self.inner.is_muted()
    }

    /// Active labels as `[{ id, text, x, y }]`.
    pub fn labels(&mut self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.inner.labels()).map_err(js_err)
    }

    pub fn pressed_key(&self) -> Option<String> {
        self.inner.pressed_key().map(|k| k.to_string())
    }

    pub fn hint_visible(&self) -> bool {
        self.inner.hint_visible()
    }

    pub fn suspend(&mut self) {
        self.inner.suspend();
    }

    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl WebSeparator {
    pub fn with_config(config: EngineConfig, sample_rate: f64) -> Self {
        let clock = ManualClock::new();
        let output = OfflineOutput::new(sample_rate);
        let inner = Separator::new(config, output.opener(), Box::new(clock.clone()));
        WebSeparator {
            inner,
            clock,
            output: Some(output),
            keyboard: None,
            voices: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;

    fn web() -> WebSeparator {
        WebSeparator::with_config(EngineConfig::default(), 48000.0)
    }

    #[test]
    fn pulls_audio_after_a_press() {
        let mut web = web();
        assert!(web.render(256).iter().all(|&s| s == 0.0));
        web.press_start("la-0", 5.0, 5.0).unwrap();
        let audio = web.render(4800);
        assert!(audio.iter().any(|s| s.abs() > 0.01));
        assert_eq!(web.pressed_key().as_deref(), Some("la-0"));
        web.press_end();
        assert_eq!(web.pressed_key(), None);
    }

    #[test]
    fn touch_needs_keyboard_bounds() {
        let mut web = web();
        web.press_start("do-0", 0.0, 0.0).unwrap();
        web.touch_move(150.0, 80.0);
        assert_eq!(web.pressed_key().as_deref(), Some("do-0"));

        web.set_keyboard_bounds(0.0, 0.0, 1400.0, 160.0);
        web.touch_move(150.0, 80.0);
        assert_eq!(web.pressed_key().as_deref(), Some("re-0"));
    }

    #[test]
    fn touch_voices_use_row_bounds() {
        let mut web = web();
        web.set_voice_bounds(0.0, 0.0, 400.0, 100.0);
        web.touch_voice_move(320.0, 50.0);
        assert!(web.inner.is_voice_active(3));
        web.touch_voice_end();
        assert!(!web.inner.is_voice_active(3));
    }

    #[test]
    fn host_time_drives_label_expiry() {
        let mut web = web();
        web.set_time(1000.0);
        web.press_start("mi-0", 1.0, 2.0).unwrap();
        web.set_time(2100.0);
        assert_eq!(web.inner.labels().len(), 1);
        web.set_time(2300.0);
        assert!(web.inner.labels().is_empty());
    }

    #[test]
    fn unrepresentable_host_time_is_ignored() {
        let mut web = web();
        web.set_time(1500.0);
        web.set_time(f64::INFINITY);
        web.set_time(f64::NAN);
        web.set_time(1e300);
        web.set_time(-5.0);
        assert_eq!(web.clock.now(), Duration::from_millis(1500));
    }

    #[test]
    fn device_backed_separator_renders_silence() {
        let recorder = crate::device::testing::Recorder::new();
        let clock = ManualClock::new();
        let inner = Separator::new(
            EngineConfig::default(),
            recorder.opener(),
            Box::new(clock.clone()),
        );
        let mut web = WebSeparator {
            inner,
            clock,
            output: None,
            keyboard: None,
            voices: None,
        };
        web.press_start("sol-0", 0.0, 0.0).unwrap();
        assert_eq!(recorder.started().len(), 1, "The device driver gets the sound");
        let audio = web.render(512);
        assert_eq!(audio.len(), 512);
        assert!(audio.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn huge_label_lifetime_does_not_abort() {
        let mut config = EngineConfig::default();
        config.feedback.label_lifetime = 1e300;
        let mut web = WebSeparator::with_config(config, 48000.0);
        web.press_start("fa-1", 0.0, 0.0).unwrap();
        web.set_time(3.6e9);
        assert_eq!(web.inner.labels().len(), 1);
    }

    #[cfg(feature = "remote-samples")]
    #[test]
    fn loaded_sample_wakes_sampled_choir() {
        let mut config = EngineConfig::default();
        config.choir.synthesis = crate::config::ChoirSynthesis::Sample;
        let mut web = WebSeparator::with_config(config, 48000.0);
        assert!(!web.start_voice(1));

        let wav = crate::dsp::renderer::encode_wav(&[0.3; 4800], 44100);
        web.load_sample(&wav).unwrap();
        assert!(web.start_voice(1));
        assert!(web.render(4800).iter().any(|s| s.abs() > 1e-3));
    }
}
