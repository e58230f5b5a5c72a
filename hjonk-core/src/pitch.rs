//! # Fundamental Frequency Estimation
//!
//! This module implements time-domain autocorrelation pitch detection over
//! byte-valued analysis frames. It is the algorithmic heart of the engine:
//! everything else (tracking, calibration, dispatch) is built on top of the
//! single estimator function here.
//!
//! ## Algorithm
//! - Samples are normalized from the unsigned byte range to [-1, 1]
//! - The signal is correlated against itself at every lag in a fixed range
//! - The lag with the strongest correlation gives the period, and therefore
//!   the fundamental frequency
//!
//! Autocorrelation trades frequency resolution for robustness to waveform
//! shape, which suits a toy that has to follow whatever audio a user uploads.

/// Smallest lag (in samples) tested by the correlation search.
///
/// Together with [`MAX_LAG`] this bounds the detectable frequency range to
/// `[sample_rate / MAX_LAG, sample_rate / MIN_LAG]`.
pub const MIN_LAG: usize = 8;

/// Largest lag (in samples) tested by the correlation search.
pub const MAX_LAG: usize = 1000;

/// Number of sample products accumulated per lag.
pub const CORR_WINDOW: usize = 1024;

/// Correlation strength above which the lag search exits early.
///
/// This is a best-effort shortcut, not a guaranteed global maximum search:
/// a correlation this strong indicates unambiguous periodicity and searching
/// the remaining lags would not change the musical outcome.
const STRONG_CORRELATION: f32 = 0.9;

/// Minimum best correlation required to report a pitch at all.
/// Anything weaker is noise or silence.
const WEAK_CORRELATION: f32 = 0.0025;

/// Midpoint of the unsigned byte sample range (zero amplitude).
const MIDPOINT: f32 = 128.0;

/// Estimates the fundamental frequency of one analysis frame.
///
/// The frame holds unsigned 8-bit time-domain samples centered at 128,
/// exactly as delivered by the live tap in [`crate::audio`]. The search
/// needs `CORR_WINDOW + MAX_LAG` samples (2024); shorter frames cannot be
/// analyzed and yield `None`.
///
/// # Arguments
/// * `frame` - Byte-valued time-domain samples (2048 in the standard config)
/// * `sample_rate` - Sample rate of the tap in Hz
///
/// # Returns
/// * `Some(frequency)` - Estimated fundamental in Hz
/// * `None` - No reliable periodicity found (silence, noise, short frame)
pub fn estimate_fundamental(frame: &[u8], sample_rate: u32) -> Option<f32> {
    if frame.len() < CORR_WINDOW + MAX_LAG {
        return None;
    }

    let mut best_r = 0.0_f32;
    let mut best_tau = 0_usize;

    for tau in MIN_LAG..=MAX_LAG {
        let mut r = 0.0_f32;
        for i in 0..CORR_WINDOW {
            let a = (frame[i] as f32 - MIDPOINT) / MIDPOINT;
            let b = (frame[i + tau] as f32 - MIDPOINT) / MIDPOINT;
            r += a * b;
        }
        r /= (CORR_WINDOW + tau) as f32;

        if r > best_r {
            best_r = r;
            best_tau = tau;
            if r > STRONG_CORRELATION {
                break;
            }
        }
    }

    if best_r > WEAK_CORRELATION {
        Some(sample_rate as f32 / best_tau as f32)
    } else {
        // Weak correlation across every lag.
        None
    }
}

/// The frequency reported when the correlation peaks at the minimum lag.
///
/// A peak exactly at the lag bound is a boundary artifact, not a real pitch,
/// and callers must discard estimates equal to this value (see
/// [`is_spurious`]). Always derived from the actual sample rate; at 44.1 kHz
/// this is 5512.5 Hz.
pub fn min_lag_frequency(sample_rate: u32) -> f32 {
    sample_rate as f32 / MIN_LAG as f32
}

/// Returns true if an estimate sits on the minimum-lag boundary and should
/// be treated the same as "no pitch detected".
pub fn is_spurious(frequency: f32, sample_rate: u32) -> bool {
    frequency == min_lag_frequency(sample_rate)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_SAMPLE_RATE: u32 = 44_100;
    pub(crate) const TEST_FRAME_SIZE: usize = 2048;

    /// Builds a byte frame containing a pure sine at the given frequency.
    pub(crate) fn sine_frame(frequency: f32, sample_rate: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32;
                (128.0 + 127.0 * phase.sin()).round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    #[test]
    fn silent_frame_is_undetected() {
        let frame = vec![128u8; TEST_FRAME_SIZE];
        assert_eq!(estimate_fundamental(&frame, TEST_SAMPLE_RATE), None);
    }

    #[test]
    fn flat_offset_frame_never_yields_a_real_pitch() {
        // A constant DC offset correlates at every lag, so the minimum lag
        // wins; the result must land on the spurious boundary callers filter.
        let frame = vec![200u8; TEST_FRAME_SIZE];
        match estimate_fundamental(&frame, TEST_SAMPLE_RATE) {
            None => {}
            Some(f) => assert!(is_spurious(f, TEST_SAMPLE_RATE)),
        }
    }

    #[test]
    fn detects_sine_within_tolerance() {
        let frame = sine_frame(440.0, TEST_SAMPLE_RATE, TEST_FRAME_SIZE);
        let detected = estimate_fundamental(&frame, TEST_SAMPLE_RATE)
            .expect("440 Hz sine should be detected");
        let error = (detected - 440.0).abs() / 440.0;
        assert!(error < 0.02, "detected {detected} Hz, error {error}");
    }

    #[test]
    fn detects_c5_sine_within_tolerance() {
        let frame = sine_frame(523.25, TEST_SAMPLE_RATE, TEST_FRAME_SIZE);
        let detected = estimate_fundamental(&frame, TEST_SAMPLE_RATE)
            .expect("523 Hz sine should be detected");
        let error = (detected - 523.25).abs() / 523.25;
        assert!(error < 0.02, "detected {detected} Hz, error {error}");
    }

    #[test]
    fn short_frame_is_rejected() {
        let frame = sine_frame(440.0, TEST_SAMPLE_RATE, CORR_WINDOW + MAX_LAG - 1);
        assert_eq!(estimate_fundamental(&frame, TEST_SAMPLE_RATE), None);
    }

    #[test]
    fn boundary_frequency_is_flagged_spurious() {
        assert!(is_spurious(5512.5, 44_100));
        assert!(!is_spurious(440.0, 44_100));
        // The boundary tracks the sample rate instead of being hardcoded.
        assert!(is_spurious(6000.0, 48_000));
    }
}
