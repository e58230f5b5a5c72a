//! # Sample Pitch Calibration
//!
//! One-shot pitch measurement for a short uploaded sample. Where the live
//! tracker reacts to every frame, the calibrator drains a fixed time window
//! of frames, collects every usable estimate, and reduces them to a single
//! averaged reference pitch. A single estimate is noisy; the mean over a
//! window is what makes later pitch-shift math stable.
//!
//! Calibration happens once, before any sample playback, so blocking the
//! caller for the window duration is acceptable. The window is an iterative
//! deadline loop with deterministic termination, and a failed or interrupted
//! run publishes nothing.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::audio::Frame;
use crate::pitch;

/// Why a calibration attempt produced no reference pitch.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The whole window elapsed without a single usable estimate. Surfaced
    /// to the user as "try a different file"; sample playback stays
    /// disabled until a later attempt succeeds.
    #[error("could not detect the pitch of the sample; try a different file")]
    NoPitchDetected,
    /// The analysis tap disappeared mid-window. The partial measurement is
    /// discarded rather than averaged.
    #[error("analysis tap closed before the calibration window completed")]
    TapClosed,
}

/// Collects frequency estimates over a calibration window.
///
/// `push_frame` may be called any number of times; `finish` consumes the
/// calibrator so a completed measurement cannot keep accumulating.
#[derive(Debug)]
pub struct SampleCalibrator {
    sample_rate: u32,
    estimates: Vec<f32>,
}

impl SampleCalibrator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            estimates: Vec::new(),
        }
    }

    /// Analyzes one frame, keeping the estimate if it is a real pitch.
    /// Undetected frames and the spurious minimum-lag boundary are skipped.
    pub fn push_frame(&mut self, frame: &[u8]) {
        self.observe(pitch::estimate_fundamental(frame, self.sample_rate));
    }

    fn observe(&mut self, raw: Option<f32>) {
        if let Some(f) = raw {
            if !pitch::is_spurious(f, self.sample_rate) {
                self.estimates.push(f);
            }
        }
    }

    /// Number of estimates collected so far.
    pub fn collected(&self) -> usize {
        self.estimates.len()
    }

    /// Reduces the collected estimates to their arithmetic mean.
    pub fn finish(self) -> Result<f32, CalibrationError> {
        if self.estimates.is_empty() {
            return Err(CalibrationError::NoPitchDetected);
        }
        let sum: f32 = self.estimates.iter().sum();
        Ok(sum / self.estimates.len() as f32)
    }
}

/// Runs a full calibration window against a live analysis tap.
///
/// Polls the tap for exactly `window` of wall-clock time, feeding every
/// frame to a fresh [`SampleCalibrator`], then reduces to the mean.
///
/// # Errors
/// * [`CalibrationError::NoPitchDetected`] - window elapsed with no usable
///   estimate
/// * [`CalibrationError::TapClosed`] - the sender side of `frames` was
///   dropped before the window elapsed
pub fn calibrate_tap(
    frames: &Receiver<Frame>,
    sample_rate: u32,
    window: Duration,
) -> Result<f32, CalibrationError> {
    let deadline = Instant::now() + window;
    let mut calibrator = SampleCalibrator::new(sample_rate);

    loop {
        match frames.recv_deadline(deadline) {
            Ok(frame) => calibrator.push_frame(&frame),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => break,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                return Err(CalibrationError::TapClosed);
            }
        }
    }

    let collected = calibrator.collected();
    let reference = calibrator.finish()?;
    tracing::info!(reference, collected, "sample calibrated");
    Ok(reference)
}

/// A successfully calibrated sample: its measured reference pitch plus the
/// PCM data to retrigger, truncated to at most one second.
///
/// Created only after calibration succeeds and immutable afterwards; it
/// lives until replaced by a new upload.
#[derive(Debug, Clone)]
pub struct CalibratedSample {
    reference_hz: f32,
    pcm: Vec<f32>,
    sample_rate: u32,
}

impl CalibratedSample {
    /// Binds a reference pitch to its PCM data, truncating the data to one
    /// second at the given sample rate.
    pub fn new(reference_hz: f32, mut pcm: Vec<f32>, sample_rate: u32) -> Self {
        pcm.truncate(sample_rate as usize);
        Self {
            reference_hz,
            pcm,
            sample_rate,
        }
    }

    /// The averaged pitch measured at calibration time.
    pub fn reference_hz(&self) -> f32 {
        self.reference_hz
    }

    /// The truncated PCM data.
    pub fn pcm(&self) -> &[f32] {
        &self.pcm
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::tests::{TEST_FRAME_SIZE, TEST_SAMPLE_RATE, sine_frame};

    #[test]
    fn mean_of_collected_estimates() {
        let mut c = SampleCalibrator::new(TEST_SAMPLE_RATE);
        for f in [440.0, 442.0, 438.0] {
            c.observe(Some(f));
        }
        assert_eq!(c.finish().unwrap(), 440.0);
    }

    #[test]
    fn empty_window_fails() {
        let c = SampleCalibrator::new(TEST_SAMPLE_RATE);
        assert!(matches!(
            c.finish(),
            Err(CalibrationError::NoPitchDetected)
        ));
    }

    #[test]
    fn undetected_and_spurious_estimates_are_skipped() {
        let mut c = SampleCalibrator::new(TEST_SAMPLE_RATE);
        c.observe(None);
        c.observe(Some(pitch::min_lag_frequency(TEST_SAMPLE_RATE)));
        c.observe(Some(440.0));
        assert_eq!(c.collected(), 1);
        assert_eq!(c.finish().unwrap(), 440.0);
    }

    #[test]
    fn push_frame_runs_the_estimator() {
        let mut c = SampleCalibrator::new(TEST_SAMPLE_RATE);
        c.push_frame(&sine_frame(440.0, TEST_SAMPLE_RATE, TEST_FRAME_SIZE));
        c.push_frame(&vec![128u8; TEST_FRAME_SIZE]); // silence is skipped
        assert_eq!(c.collected(), 1);
        let reference = c.finish().unwrap();
        assert!((reference - 440.0).abs() / 440.0 < 0.02);
    }

    #[test]
    fn tap_window_averages_queued_frames() {
        let (tx, rx) = crossbeam_channel::unbounded::<Frame>();
        for _ in 0..3 {
            tx.send(sine_frame(440.0, TEST_SAMPLE_RATE, TEST_FRAME_SIZE))
                .unwrap();
        }
        // Keep the sender alive so the window ends by deadline, not by
        // disconnection.
        let reference =
            calibrate_tap(&rx, TEST_SAMPLE_RATE, Duration::from_millis(20)).unwrap();
        assert!((reference - 440.0).abs() / 440.0 < 0.02);
        drop(tx);
    }

    #[test]
    fn closed_tap_discards_partial_measurement() {
        let (tx, rx) = crossbeam_channel::unbounded::<Frame>();
        tx.send(sine_frame(440.0, TEST_SAMPLE_RATE, TEST_FRAME_SIZE))
            .unwrap();
        drop(tx);
        let result = calibrate_tap(&rx, TEST_SAMPLE_RATE, Duration::from_secs(1));
        assert!(matches!(result, Err(CalibrationError::TapClosed)));
    }

    #[test]
    fn sample_pcm_is_truncated_to_one_second() {
        let pcm = vec![0.0f32; 2 * TEST_SAMPLE_RATE as usize];
        let sample = CalibratedSample::new(440.0, pcm, TEST_SAMPLE_RATE);
        assert_eq!(sample.pcm().len(), TEST_SAMPLE_RATE as usize);
        assert_eq!(sample.reference_hz(), 440.0);
    }
}
