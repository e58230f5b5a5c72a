//! # hjonk - realtime pitch-following accompaniment host
//!
//! A headless host for the hjonk engine. It wires the live analysis tap to
//! the pitch tracker on a dedicated worker thread and consumes the engine's
//! events by logging them: detected note and frequency as display updates,
//! trigger events as playback requests.
//!
//! ## Architecture
//! - **Main Thread**: startup, optional sample calibration, shutdown on Enter
//! - **Worker Thread**: tracker tick loop driven by tap frames
//! - **Communication**: Crossbeam channels for frames and shutdown
//!
//! Actual audio output is out of scope for this host; the [`LogSink`]
//! stands in for a real playback backend behind the same seam.

use std::fs;
use std::io::BufRead;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, select};
use hjonk_core::{
    CalibratedSample, Frame, Note, NoteTable, PitchTracker, PlaybackDispatcher, SampleCalibrator,
    TickEvent, ToneSink, audio,
};

/// Length of the startup calibration window.
const CALIBRATION_WINDOW: Duration = Duration::from_secs(1);

/// Command-line options.
struct Options {
    /// Measure a reference pitch from the tap at startup and retrigger it
    /// pitch-shifted instead of plain tones.
    calibrate: bool,
    /// Optional JSON note table replacing the built-in 88-key one.
    notes_path: Option<String>,
}

impl Options {
    fn parse() -> Result<Self> {
        let mut options = Options {
            calibrate: false,
            notes_path: None,
        };
        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--calibrate" => options.calibrate = true,
                "--notes" => {
                    options.notes_path =
                        Some(args.next().context("--notes requires a file path")?);
                }
                other => bail!("unknown argument: {other} (expected --calibrate, --notes PATH)"),
            }
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let options = Options::parse()?;

    let table = match &options.notes_path {
        Some(path) => load_table(path)?,
        None => NoteTable::standard().clone(),
    };
    tracing::info!(notes = table.len(), "note table loaded");

    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(8);
    let (stream, sample_rate) =
        audio::start_capture(frame_tx).context("failed to start the analysis tap")?;

    let mut dispatcher = PlaybackDispatcher::new();
    if options.calibrate {
        tracing::info!("calibrating: play the sample to retrigger now");
        match calibrate_from_tap(&frame_rx, sample_rate) {
            Ok(sample) => dispatcher.set_sample(sample),
            // Non-fatal: the toy keeps running with tone accompaniment.
            Err(e) => tracing::warn!(%e, "calibration failed, falling back to tones"),
        }
    }

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    let worker = thread::spawn(move || {
        run_tracker(table, sample_rate, frame_rx, shutdown_rx, dispatcher);
    });

    println!("Tracking. Press Enter to stop.");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);

    let _ = shutdown_tx.send(());
    if worker.join().is_err() {
        tracing::error!("tracker thread panicked");
    }
    drop(stream);
    Ok(())
}

/// Loads a reference note table from a JSON array of
/// `{"note": ..., "frequency": ...}` entries.
fn load_table(path: &str) -> Result<NoteTable> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let notes: Vec<Note> = serde_json::from_str(&data).with_context(|| format!("parsing {path}"))?;
    Ok(NoteTable::new(notes)?)
}

/// Measures a reference pitch from the tap over [`CALIBRATION_WINDOW`],
/// recording the tap's PCM alongside so the measured sample can be
/// retriggered later.
fn calibrate_from_tap(frames: &Receiver<Frame>, sample_rate: u32) -> Result<CalibratedSample> {
    let deadline = Instant::now() + CALIBRATION_WINDOW;
    let mut calibrator = SampleCalibrator::new(sample_rate);
    let mut pcm: Vec<f32> = Vec::with_capacity(sample_rate as usize);

    loop {
        match frames.recv_deadline(deadline) {
            Ok(frame) => {
                calibrator.push_frame(&frame);
                pcm.extend(frame.iter().map(|&b| (b as f32 - 128.0) / 128.0));
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => break,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                bail!("analysis tap closed during calibration");
            }
        }
    }

    let reference = calibrator.finish()?;
    tracing::info!(reference, "calibration complete");
    Ok(CalibratedSample::new(reference, pcm, sample_rate))
}

/// The tracker tick loop: one tick per tap frame until shutdown.
fn run_tracker(
    table: NoteTable,
    sample_rate: u32,
    frames: Receiver<Frame>,
    shutdown: Receiver<()>,
    dispatcher: PlaybackDispatcher,
) {
    let mut tracker = PitchTracker::new(&table, sample_rate);
    tracker.start();
    let mut sink = LogSink;

    // Tracks what is currently "displayed" so only changes are reported.
    let mut shown: Option<String> = None;

    loop {
        select! {
            recv(frames) -> msg => match msg {
                Ok(frame) => match tracker.tick(&frame) {
                    TickEvent::Pitch { frequency, note, trigger } => {
                        if shown.as_deref() != Some(note.name.as_str()) {
                            tracing::info!(frequency, note = %note.name, "detected");
                            shown = Some(note.name.clone());
                        }
                        if trigger {
                            dispatcher.trigger(frequency, &mut sink);
                        }
                    }
                    TickEvent::NoSignal => {
                        if shown.is_some() {
                            tracing::info!("no signal");
                            shown = None;
                        }
                    }
                },
                Err(_) => {
                    tracing::warn!("analysis tap closed");
                    break;
                }
            },
            recv(shutdown) -> _ => {
                tracker.stop();
                break;
            }
        }
    }
}

/// A playback sink that logs instead of sounding. Stands in for the external
/// audio backend behind the [`ToneSink`] seam.
struct LogSink;

impl ToneSink for LogSink {
    fn play_tone(&mut self, frequency: f32) {
        tracing::info!(frequency, "play tone");
    }

    fn play_sample(&mut self, sample: &CalibratedSample, detune_cents: f32) {
        tracing::info!(
            reference = sample.reference_hz(),
            detune_cents,
            "play sample"
        );
    }
}
