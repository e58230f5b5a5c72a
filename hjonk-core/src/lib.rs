// hjonk-core/src/lib.rs

//! The core engine for the hjonk musical toy.
//! This crate is responsible for fundamental-frequency estimation, nearest
//! note mapping, live pitch tracking with retrigger hysteresis, and one-shot
//! sample calibration. It is completely headless: audio output and UI belong
//! to the host.

pub mod audio;
pub mod calibrate;
pub mod notes;
pub mod pitch;
pub mod playback;
pub mod tracker;

pub use audio::{FRAME_SIZE, Frame};
pub use calibrate::{CalibratedSample, CalibrationError, SampleCalibrator, calibrate_tap};
pub use notes::{Note, NoteTable, NoteTableError, cents_between};
pub use playback::{PlaybackDispatcher, ToneSink};
pub use tracker::{PitchTracker, TickEvent, TrackerState};
