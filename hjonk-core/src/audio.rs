//! # Live Analysis Tap
//!
//! Real-time audio capture via CPAL, feeding the tracker and calibrator. The
//! device callback accumulates incoming float samples, converts them to the
//! byte-valued time-domain representation the estimator works on, and sends
//! complete frames over a channel.
//!
//! Frames are dropped rather than queued when the consumer lags; the tracker
//! only ever wants the newest frame anyway.

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Number of samples per analysis frame (~46 ms at 44.1 kHz).
///
/// Must stay at least `pitch::CORR_WINDOW + pitch::MAX_LAG` (2024) or the
/// estimator cannot run its full lag search.
pub const FRAME_SIZE: usize = 2048;

/// One analysis window: unsigned 8-bit time-domain samples centered at 128.
pub type Frame = Vec<u8>;

/// Converts a float sample in [-1, 1] to the byte representation.
fn to_byte_sample(sample: f32) -> u8 {
    (sample.clamp(-1.0, 1.0) * 128.0 + 128.0).clamp(0.0, 255.0) as u8
}

/// Starts capture from the default input device and streams analysis frames.
///
/// Selects a mono f32 configuration as close to 44.1 kHz as the device
/// offers, then sends every complete [`FRAME_SIZE`] window to `sender` with
/// `try_send` (full-channel sends are dropped).
///
/// # Returns
/// * `Ok((stream, sample_rate))` - the live stream handle and its actual
///   sample rate; dropping the stream stops the tap
/// * `Err(e)` - no usable device or configuration
pub fn start_capture(sender: Sender<Frame>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    tracing::info!(device = %device.name()?, "using audio input device");

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, 44_100)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = cpal::SampleRate(44_100);
    let config = supported_config.with_sample_rate(sample_rate);

    let sample_rate_val = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    tracing::info!(sample_rate = sample_rate_val, "selected sample rate");

    let err_fn = |err| tracing::error!(%err, "audio stream error");

    // Accumulates callback data until a full frame is available.
    let mut pending: Vec<u8> = Vec::with_capacity(FRAME_SIZE * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            pending.extend(data.iter().copied().map(to_byte_sample));

            while pending.len() >= FRAME_SIZE {
                let frame: Frame = pending[..FRAME_SIZE].to_vec();

                // Drop the frame if the consumer is behind.
                let _ = sender.try_send(frame);

                pending.drain(..FRAME_SIZE);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Finds the supported configuration best matching the target sample rate,
/// restricted to mono f32 input.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            min_diff.min(max_diff)
        })
}
