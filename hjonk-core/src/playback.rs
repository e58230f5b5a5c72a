//! # Accompaniment Dispatch
//!
//! The seam between pitch tracking and actual audio output. The engine never
//! produces sound itself; it decides *what* should sound and hands that to a
//! host-provided [`ToneSink`].
//!
//! The decision rule mirrors the toy's behavior: once a sample has been
//! calibrated, every trigger replays that sample detuned so it sounds at the
//! target pitch; without one, a plain synthesized tone is requested instead.

use crate::calibrate::CalibratedSample;
use crate::notes;

/// Output operations the host must provide. Playback is fire-and-forget:
/// implementations perform output asynchronously and return nothing to the
/// engine.
pub trait ToneSink {
    /// Play a synthesized tone at the given frequency.
    fn play_tone(&mut self, frequency: f32);

    /// Play a calibrated sample detuned by the given number of cents.
    fn play_sample(&mut self, sample: &CalibratedSample, detune_cents: f32);
}

/// Routes trigger events to sample or tone playback.
///
/// Owns the session's calibrated sample, if any; replacing or clearing it is
/// the dispatcher owner's operation alone.
#[derive(Debug, Default)]
pub struct PlaybackDispatcher {
    sample: Option<CalibratedSample>,
}

impl PlaybackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a freshly calibrated sample, replacing any previous one.
    pub fn set_sample(&mut self, sample: CalibratedSample) {
        tracing::info!(reference = sample.reference_hz(), "sample installed");
        self.sample = Some(sample);
    }

    /// Removes the current sample; triggers fall back to tones.
    pub fn clear_sample(&mut self) {
        self.sample = None;
    }

    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }

    /// Sounds one accompaniment event at the target frequency.
    pub fn trigger(&self, target_hz: f32, sink: &mut dyn ToneSink) {
        match &self.sample {
            Some(sample) => {
                let detune = notes::cents_between(sample.reference_hz(), target_hz);
                sink.play_sample(sample, detune);
            }
            None => sink.play_tone(target_hz),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        tones: Vec<f32>,
        sample_detunes: Vec<f32>,
    }

    impl ToneSink for RecordingSink {
        fn play_tone(&mut self, frequency: f32) {
            self.tones.push(frequency);
        }

        fn play_sample(&mut self, _sample: &CalibratedSample, detune_cents: f32) {
            self.sample_detunes.push(detune_cents);
        }
    }

    #[test]
    fn without_sample_triggers_a_tone() {
        let dispatcher = PlaybackDispatcher::new();
        let mut sink = RecordingSink::default();
        dispatcher.trigger(330.0, &mut sink);
        assert_eq!(sink.tones, vec![330.0]);
        assert!(sink.sample_detunes.is_empty());
    }

    #[test]
    fn with_sample_triggers_detuned_sample() {
        let mut dispatcher = PlaybackDispatcher::new();
        dispatcher.set_sample(CalibratedSample::new(220.0, vec![0.0; 64], 44_100));
        let mut sink = RecordingSink::default();
        dispatcher.trigger(440.0, &mut sink);
        assert!(sink.tones.is_empty());
        // One octave up from the sample's own pitch.
        assert_eq!(sink.sample_detunes.len(), 1);
        assert!((sink.sample_detunes[0] - 1200.0).abs() < 1e-3);
    }

    #[test]
    fn clearing_the_sample_falls_back_to_tones() {
        let mut dispatcher = PlaybackDispatcher::new();
        dispatcher.set_sample(CalibratedSample::new(220.0, vec![0.0; 64], 44_100));
        dispatcher.clear_sample();
        assert!(!dispatcher.has_sample());
        let mut sink = RecordingSink::default();
        dispatcher.trigger(440.0, &mut sink);
        assert_eq!(sink.tones, vec![440.0]);
    }
}
