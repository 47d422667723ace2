//! The section separator: everything the presentation layer talks to.
//!
//! `Separator` owns the audio context and wires gestures to the tone
//! generator, the choir and the feedback emitter. Every call returns
//! immediately; audio failures are logged and never surface here. The mute
//! flag is checked before anything touches the device.

use log::{debug, info};

use crate::choir::{ChoirGenerator, VoiceId};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::device::{AudioContext, DeviceState, DriverOpener};
use crate::error::GlissandoError;
use crate::feedback::{FeedbackEmitter, FloatingLabel};
use crate::gesture::{GestureTracker, SustainTracker};
use crate::layout::{HitTest, Point};
use crate::notes::{KeyId, PitchClass};
use crate::samples::SampleSlot;
use crate::tone::{self, ToneGenerator};

pub struct Separator {
    config: EngineConfig,
    context: AudioContext,
    tones: ToneGenerator,
    choir: ChoirGenerator,
    keys: GestureTracker<KeyId>,
    voices: SustainTracker<VoiceId>,
    feedback: FeedbackEmitter,
    clock: Box<dyn Clock>,
    muted: bool,
    hint_visible: bool,
}

impl Separator {
    pub fn new(config: EngineConfig, opener: DriverOpener, clock: Box<dyn Clock>) -> Self {
        Separator::with_sample(config, opener, clock, SampleSlot::new())
    }

    /// Like `new`, with the slot the sampled choir reads its vocal sample
    /// from. The slot may be filled later from another thread.
    pub fn with_sample(
        config: EngineConfig,
        opener: DriverOpener,
        clock: Box<dyn Clock>,
        sample: SampleSlot,
    ) -> Self {
        let context = AudioContext::new(config.device.clone(), opener);
        let tones = ToneGenerator::new(config.tone.clone(), config.tuning_pitch);
        let choir = ChoirGenerator::new(config.choir.clone(), config.tuning_pitch, sample);
        let feedback = FeedbackEmitter::new(config.feedback.lifetime());
        let muted = config.start_muted;
        Separator {
            config,
            context,
            tones,
            choir,
            keys: GestureTracker::new(),
            voices: SustainTracker::new(),
            feedback,
            clock,
            muted,
            hint_visible: true,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn device_state(&self) -> DeviceState {
        self.context.state()
    }

    pub fn vocal_sample(&self) -> &SampleSlot {
        self.choir.sample()
    }

    /// Open the device now instead of on the first trigger, and say why if
    /// it cannot be used. Triggers keep working silently either way.
    pub fn unlock(&mut self) -> Result<(), GlissandoError> {
        self.context.open_now()?;
        Ok(())
    }

    /// Decode a WAV or MP3 payload into the vocal sample slot. A payload
    /// that fails to decode marks the slot failed for the session.
    #[cfg(feature = "remote-samples")]
    pub fn load_sample_bytes(&self, bytes: &[u8]) -> Result<(), GlissandoError> {
        let slot = self.choir.sample();
        match crate::samples::decode::decode(bytes) {
            Ok(buffer) => {
                if !slot.fill(buffer) {
                    debug!(target: "audio", "vocal sample already settled, payload ignored");
                }
                Ok(())
            }
            Err(e) => {
                slot.mark_failed();
                Err(e.into())
            }
        }
    }

    /// Start fetching the configured vocal sample in the background.
    #[cfg(all(feature = "remote-samples", not(target_arch = "wasm32")))]
    pub fn spawn_sample_load(&self) -> Option<std::thread::JoinHandle<()>> {
        let source = self.config.choir.sample.clone()?;
        Some(crate::samples::fetch::spawn_load(
            source,
            self.choir.sample().clone(),
        ))
    }

    /// Play a piano tone. Returns its frequency, or `None` when muted or the
    /// pitch name is unknown. An unavailable device still yields the
    /// frequency; it just stays silent.
    pub fn play_tone(&mut self, pitch: &str, octave: i32) -> Option<f64> {
        if self.muted {
            return None;
        }
        let (pitch, shift) = match PitchClass::parse_spelled(pitch) {
            Ok(spelled) => spelled,
            Err(e) => {
                debug!(target: "audio", "{e}");
                return None;
            }
        };
        Some(self.sound_key(KeyId::new(pitch, octave + shift)))
    }

    fn sound_key(&mut self, key: KeyId) -> f64 {
        match self.context.device() {
            Some(mut device) => self.tones.play(&mut device, key.pitch, key.octave),
            None => self.tones.frequency(key.pitch, key.octave),
        }
    }

    /// The UI click sound.
    pub fn play_pop(&mut self) {
        if self.muted {
            return;
        }
        if let Some(mut device) = self.context.device() {
            tone::play_pop(&mut device, &self.config.pop);
        }
    }

    pub fn start_voice(&mut self, voice: VoiceId) -> bool {
        if self.muted {
            return false;
        }
        self.choir.start(voice, &mut self.context)
    }

    /// Releasing is never gated by mute.
    pub fn stop_voice(&mut self, voice: VoiceId) -> bool {
        self.choir.stop(voice, &mut self.context)
    }

    pub fn is_voice_active(&self, voice: VoiceId) -> bool {
        self.choir.is_active(voice)
    }

    pub fn active_voices(&self) -> usize {
        self.choir.active_count()
    }

    /// Press on a key: always triggers it and starts a drag.
    pub fn press_start(&mut self, key: KeyId, at: Point) {
        let key = self.keys.press_start(key);
        self.trigger_key(key, at);
    }

    /// The pointer entered `key`; triggers it if a drag is in progress and
    /// it is not the key last played.
    pub fn pointer_enter(&mut self, key: KeyId, at: Point) {
        if let Some(key) = self.keys.press_move(Some(key)) {
            self.trigger_key(key, at);
        }
    }

    /// Touch drag: the key under the finger is found with `keyboard`.
    pub fn touch_move<H: HitTest<KeyId> + ?Sized>(&mut self, at: Point, keyboard: &H) {
        if let Some(key) = self.keys.touch_move(at, keyboard) {
            self.trigger_key(key, at);
        }
    }

    /// Release anywhere, including outside the keyboard.
    pub fn press_end(&mut self) {
        self.keys.press_end();
        self.feedback.clear_pressed();
    }

    pub fn is_dragging(&self) -> bool {
        self.keys.is_dragging()
    }

    fn trigger_key(&mut self, key: KeyId, at: Point) {
        if self.muted && self.config.mute_hides_labels {
            return;
        }
        self.hint_visible = false;
        self.feedback.set_pressed(key);
        let now = self.clock.now();
        self.feedback.emit_label(key.pitch.name(), at, now);
        if !self.muted {
            self.sound_key(key);
        }
    }

    pub fn voice_enter(&mut self, voice: VoiceId) {
        if self.muted {
            return;
        }
        self.voices.engage(voice);
        self.start_voice(voice);
    }

    pub fn voice_leave(&mut self, voice: VoiceId) {
        self.voices.release(&voice);
        self.stop_voice(voice);
    }

    /// Touch slid over the choir: swap voices as the finger crosses them.
    pub fn touch_voice_move<H: HitTest<VoiceId> + ?Sized>(&mut self, at: Point, voices: &H) {
        if self.muted {
            return;
        }
        let transition = self.voices.touch_over(voices.target_at(at));
        if let Some(voice) = transition.release {
            self.stop_voice(voice);
        }
        if let Some(voice) = transition.engage {
            self.start_voice(voice);
        }
    }

    pub fn touch_voice_end(&mut self) {
        if let Some(voice) = self.voices.touch_end() {
            self.stop_voice(voice);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Muting releases every sounding voice.
    pub fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;
        info!(target: "audio", "muted: {muted}");
        if muted {
            self.voices.release_all();
            self.choir.stop_all(&mut self.context);
            if self.config.mute_hides_labels {
                self.feedback.clear_pressed();
            }
        }
    }

    /// Floating labels still alive, oldest first.
    pub fn labels(&mut self) -> &[FloatingLabel] {
        let now = self.clock.now();
        self.feedback.active(now)
    }

    pub fn pressed_key(&self) -> Option<KeyId> {
        self.feedback.pressed()
    }

    /// The "try a glissando" hint, shown until the first key is played.
    pub fn hint_visible(&self) -> bool {
        self.hint_visible
    }

    /// Pause output while the page is hidden. The next trigger resumes it.
    pub fn suspend(&mut self) {
        self.context.suspend();
    }

    pub fn close(&mut self) {
        self.voices.release_all();
        self.choir.stop_all(&mut self.context);
        self.context.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ChoirSynthesis;
    use crate::device::testing::Recorder;
    use crate::dsp::engine::Command;
    use crate::dsp::param::ParamEvent;
    use crate::dsp::sound::ParamTarget;
    use crate::layout::{KeyboardLayout, Rect, VoiceRowLayout};

    struct Harness {
        separator: Separator,
        recorder: Recorder,
        clock: ManualClock,
    }

    fn harness_with(config: EngineConfig) -> Harness {
        let recorder = Recorder::new();
        let clock = ManualClock::new();
        let separator = Separator::new(config, recorder.opener(), Box::new(clock.clone()));
        Harness {
            separator,
            recorder,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(EngineConfig::default())
    }

    fn key(s: &str) -> KeyId {
        s.parse().unwrap()
    }

    fn origin() -> Point {
        Point::new(10.0, 20.0)
    }

    fn label_texts(separator: &mut Separator) -> Vec<String> {
        separator.labels().iter().map(|l| l.text.clone()).collect()
    }

    fn started_frequencies(recorder: &Recorder) -> Vec<f64> {
        recorder
            .started()
            .iter()
            .map(|s| s.sources()[0].pitch_at(s.start_time()))
            .collect()
    }

    #[test]
    fn start_voice_twice_is_one_voice() {
        let mut h = harness();
        assert!(h.separator.start_voice(0));
        assert!(!h.separator.start_voice(0));
        assert_eq!(h.separator.active_voices(), 1);
        assert_eq!(h.recorder.started().len(), 1);
    }

    #[test]
    fn stop_unknown_voice_is_noop() {
        let mut h = harness();
        assert!(!h.separator.stop_voice(3));
        assert!(!h.separator.stop_voice(99));
        assert!(h.recorder.commands().is_empty());
    }

    #[test]
    fn dwelling_on_one_key_triggers_once() {
        let mut h = harness();
        let a = key("mi-0");
        h.separator.press_start(a, origin());
        for i in 0..10 {
            h.separator.pointer_enter(a, Point::new(10.0 + i as f64, 20.0));
        }
        assert_eq!(h.recorder.started().len(), 1);
        assert_eq!(label_texts(&mut h.separator), vec!["mi"]);
    }

    #[test]
    fn glissando_retriggers_on_change() {
        let mut h = harness();
        let (a, b) = (key("do-0"), key("re-0"));
        h.separator.press_start(a, origin());
        for k in [a, b, b, a] {
            h.separator.pointer_enter(k, origin());
        }
        assert_eq!(label_texts(&mut h.separator), vec!["do", "re", "do"]);

        let f = started_frequencies(&h.recorder);
        assert_eq!(f.len(), 3);
        assert!((f[0] - a.frequency(440.0)).abs() < 1e-9);
        assert!((f[1] - b.frequency(440.0)).abs() < 1e-9);
        assert!((f[2] - a.frequency(440.0)).abs() < 1e-9);
    }

    #[test]
    fn octave_doubles_frequency() {
        let mut h = harness();
        let f0 = h.separator.play_tone("do", 0).unwrap();
        let f1 = h.separator.play_tone("do", 1).unwrap();
        assert!((f1 - 2.0 * f0).abs() < 1e-9, "{f1} != 2 * {f0}");
        assert_eq!(h.separator.play_tone("ut", 0), None);

        // Cb one octave up is the si just below that octave's do.
        let si = h.separator.play_tone("Cb", 1).unwrap();
        assert!((si - 493.88).abs() < 0.01, "got {si}");
    }

    #[test]
    fn labels_expire_after_lifetime() {
        let mut h = harness();
        h.clock.set(Duration::from_secs(5));
        h.separator.press_start(key("sol-1"), origin());
        h.separator.press_end();

        h.clock.set(Duration::from_millis(6000));
        assert_eq!(h.separator.labels().len(), 1);
        let label = &h.separator.labels()[0];
        assert_eq!((label.x, label.y), (10.0, 20.0));

        h.clock.set(Duration::from_millis(6300));
        assert!(h.separator.labels().is_empty());
    }

    #[test]
    fn muted_triggers_have_no_effect() {
        let mut h = harness();
        h.separator.set_muted(true);

        assert_eq!(h.separator.play_tone("la", 0), None);
        assert!(!h.separator.start_voice(1));
        h.separator.press_start(key("la-0"), origin());
        h.separator.pointer_enter(key("si-0"), origin());
        h.separator.voice_enter(2);
        h.separator.play_pop();

        assert_eq!(h.recorder.opens(), 0, "Device should not even be opened");
        assert!(h.recorder.commands().is_empty());
        assert!(h.separator.labels().is_empty());
        assert_eq!(h.separator.pressed_key(), None);
        assert!(h.separator.hint_visible());
    }

    #[test]
    fn mute_can_leave_labels_on() {
        let mut h = harness_with(EngineConfig {
            mute_hides_labels: false,
            start_muted: true,
            ..EngineConfig::default()
        });
        h.separator.press_start(key("fa-0"), origin());
        assert_eq!(h.recorder.opens(), 0);
        assert_eq!(label_texts(&mut h.separator), vec!["fa"]);
        assert_eq!(h.separator.pressed_key(), Some(key("fa-0")));
    }

    #[test]
    fn stop_voice_fades_before_stopping() {
        let mut h = harness();
        h.separator.start_voice(1);
        h.recorder.clear();
        h.recorder.set_time(2.0);
        assert!(h.separator.stop_voice(1));

        let commands = h.recorder.commands();
        let ramp = commands.iter().position(|c| {
            matches!(
                c,
                Command::Automate {
                    param: ParamTarget::Gain,
                    event: ParamEvent::LinearRamp { value, .. },
                    ..
                } if *value == 0.0
            )
        });
        let stop = commands
            .iter()
            .position(|c| matches!(c, Command::Stop { .. }));
        let (Some(ramp), Some(stop)) = (ramp, stop) else {
            panic!("missing ramp or stop in {commands:?}");
        };
        assert!(ramp < stop, "Ramp must be scheduled before the stop");

        let ramp_end = match commands[ramp] {
            Command::Automate { event, .. } => event.time(),
            _ => unreachable!(),
        };
        let Command::Stop { at, .. } = commands[stop] else {
            unreachable!()
        };
        assert!(at >= ramp_end, "stop {at} truncates ramp ending {ramp_end}");
    }

    #[test]
    fn release_outside_clears_pressed_key() {
        let mut h = harness();
        h.separator.press_start(key("re-1"), origin());
        assert_eq!(h.separator.pressed_key(), Some(key("re-1")));
        assert!(h.separator.is_dragging());

        h.separator.press_end();
        assert_eq!(h.separator.pressed_key(), None);
        assert!(!h.separator.is_dragging());

        // After release, hovering does not play.
        h.separator.pointer_enter(key("mi-1"), origin());
        assert_eq!(h.recorder.started().len(), 1);
    }

    #[test]
    fn touch_drag_resolves_keys_by_position() {
        let mut h = harness();
        let keyboard = KeyboardLayout::two_octaves(Rect::new(0.0, 0.0, 1400.0, 160.0));
        let at = |k: &str| keyboard.rect_of(key(k)).unwrap().center();

        h.separator.press_start(key("do-0"), at("do-0"));
        h.separator.touch_move(at("do-0"), &keyboard);
        h.separator.touch_move(at("do#-0"), &keyboard);
        h.separator.touch_move(at("do#-0"), &keyboard);
        h.separator.touch_move(Point::new(-50.0, -50.0), &keyboard);
        h.separator.touch_move(at("re-0"), &keyboard);

        assert_eq!(label_texts(&mut h.separator), vec!["do", "do#", "re"]);
        assert_eq!(h.separator.pressed_key(), Some(key("re-0")));
    }

    #[test]
    fn first_key_hides_hint() {
        let mut h = harness();
        assert!(h.separator.hint_visible());
        h.separator.play_tone("do", 0);
        assert!(h.separator.hint_visible(), "Direct tones are not gestures");
        h.separator.press_start(key("do-0"), origin());
        assert!(!h.separator.hint_visible());
    }

    #[test]
    fn touch_slides_between_voices() {
        let mut h = harness();
        let row = VoiceRowLayout::new(Rect::new(0.0, 0.0, 400.0, 100.0), 4);
        h.separator.touch_voice_move(Point::new(50.0, 50.0), &row);
        h.separator.touch_voice_move(Point::new(60.0, 50.0), &row);
        assert!(h.separator.is_voice_active(0));
        assert_eq!(h.recorder.started().len(), 1);

        h.separator.touch_voice_move(Point::new(150.0, 50.0), &row);
        assert!(!h.separator.is_voice_active(0));
        assert!(h.separator.is_voice_active(1));

        h.separator.touch_voice_end();
        assert_eq!(h.separator.active_voices(), 0);
    }

    #[test]
    fn hover_engages_and_releases() {
        let mut h = harness();
        h.separator.voice_enter(2);
        h.separator.voice_enter(2);
        assert_eq!(h.recorder.started().len(), 1);
        h.separator.voice_leave(2);
        assert!(!h.separator.is_voice_active(2));
        h.separator.voice_leave(2);
    }

    #[test]
    fn muting_releases_voices() {
        let mut h = harness();
        h.separator.start_voice(0);
        h.separator.start_voice(1);
        h.separator.set_muted(true);
        assert_eq!(h.separator.active_voices(), 0);
        assert!(h.separator.is_muted());

        h.separator.set_muted(false);
        assert!(h.separator.start_voice(0));
    }

    #[test]
    fn unavailable_device_keeps_visuals() {
        let recorder = Recorder::failing();
        let clock = ManualClock::new();
        let mut separator =
            Separator::new(EngineConfig::default(), recorder.opener(), Box::new(clock));
        separator.press_start(key("la-0"), origin());
        assert!(!separator.start_voice(0));
        assert_eq!(separator.device_state(), DeviceState::Unavailable);
        assert_eq!(separator.labels().len(), 1);
        assert_eq!(separator.play_tone("la", 0), Some(440.0));
    }

    #[test]
    fn sampled_choir_waits_for_sample() {
        let mut config = EngineConfig::default();
        config.choir.synthesis = ChoirSynthesis::Sample;
        let mut h = harness_with(config);
        assert!(!h.separator.start_voice(0));
        assert!(h.recorder.commands().is_empty(), "Request is dropped, not queued");

        h.separator
            .vocal_sample()
            .fill(crate::dsp::sampler::SampleBuffer::new(vec![0.2; 480], 48000));
        assert!(h.separator.start_voice(0));
    }

    #[test]
    fn unlock_reports_missing_device() {
        let recorder = Recorder::failing();
        let mut separator = Separator::new(
            EngineConfig::default(),
            recorder.opener(),
            Box::new(ManualClock::new()),
        );
        assert!(matches!(
            separator.unlock(),
            Err(GlissandoError::Device(crate::error::DeviceError::NoOutputDevice))
        ));
        assert_eq!(separator.device_state(), DeviceState::Unavailable);
        // Still usable without sound.
        separator.press_start(key("re-0"), origin());
        assert_eq!(separator.pressed_key(), Some(key("re-0")));
    }

    #[test]
    fn unlock_opens_before_first_trigger() {
        let mut h = harness();
        assert!(h.separator.unlock().is_ok());
        assert_eq!(h.recorder.opens(), 1);
        assert_eq!(h.separator.device_state(), DeviceState::Running);
        assert!(h.recorder.commands().is_empty());
    }

    #[cfg(feature = "remote-samples")]
    #[test]
    fn sample_bytes_fill_the_choir() {
        let mut config = EngineConfig::default();
        config.choir.synthesis = ChoirSynthesis::Sample;
        let mut h = harness_with(config);
        assert!(!h.separator.start_voice(0));

        let wav = crate::dsp::renderer::encode_wav(&[0.25; 4800], 48000);
        h.separator.load_sample_bytes(&wav).unwrap();
        assert!(h.separator.vocal_sample().is_loaded());
        assert!(h.separator.start_voice(0));
    }

    #[cfg(feature = "remote-samples")]
    #[test]
    fn undecodable_sample_fails_the_slot() {
        let mut config = EngineConfig::default();
        config.choir.synthesis = ChoirSynthesis::Sample;
        let mut h = harness_with(config);
        let err = h.separator.load_sample_bytes(b"not audio").unwrap_err();
        assert!(matches!(
            err,
            GlissandoError::Sample(crate::error::SampleError::UnsupportedCodec)
        ));
        assert!(h.separator.vocal_sample().has_failed());
        assert!(!h.separator.start_voice(0));
    }

    #[test]
    fn close_releases_and_silences() {
        let mut h = harness();
        h.separator.start_voice(0);
        h.separator.close();
        assert_eq!(h.separator.active_voices(), 0);
        assert_eq!(h.recorder.closes(), 1);
        assert_eq!(h.separator.device_state(), DeviceState::Closed);
        h.separator.press_start(key("do-0"), origin());
        assert_eq!(h.recorder.started().len(), 1);
    }
}
