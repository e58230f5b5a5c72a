//! # Live Pitch Tracking
//!
//! Drives the frequency estimator against a continuous stream of analysis
//! frames, maps each estimate to the nearest reference note, and decides when
//! a change is significant enough to retrigger accompaniment.
//!
//! The tracker is a small state machine: `Stopped` until the host starts
//! playback, then `Tracking` with one [`PitchTracker::tick`] per frame until
//! the host stops it. All hysteresis state lives inside the tracker instance,
//! never in globals, so stopping is deterministic: once `stop` returns, no
//! further event can be produced.

use crate::notes::{Note, NoteTable};
use crate::pitch;

/// Fractional frequency change required to count as a new note.
///
/// A sustained, slowly drifting pitch re-estimates slightly differently every
/// frame; retriggering on each of those would turn accompaniment into
/// chatter. 0.2% is well under a cent-level change and comfortably above
/// estimator jitter on a held note.
pub const TRIGGER_RATIO: f32 = 0.002;

/// Whether the tracker is currently consuming frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// Not tracking; ticks are ignored.
    Stopped,
    /// Consuming one frame per tick.
    Tracking,
}

/// The outcome of analyzing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    /// No reliable pitch in this frame (silence, noise, or the spurious
    /// minimum-lag boundary). Hosts show a "no signal" indicator and must
    /// not trigger playback.
    NoSignal,
    /// A pitch was detected.
    Pitch {
        /// Estimated fundamental in Hz.
        frequency: f32,
        /// Nearest reference note.
        note: Note,
        /// True when the frequency moved more than [`TRIGGER_RATIO`] from
        /// the previous tick's frequency and accompaniment should fire.
        trigger: bool,
    },
}

/// Tracks the fundamental pitch of a live tap across successive frames.
#[derive(Debug)]
pub struct PitchTracker<'a> {
    table: &'a NoteTable,
    sample_rate: u32,
    state: TrackerState,
    /// Frequency reported on the previous tick, for hysteresis comparisons.
    prev_hz: Option<f32>,
}

impl<'a> PitchTracker<'a> {
    /// Creates a stopped tracker bound to a note table and the tap's sample
    /// rate.
    pub fn new(table: &'a NoteTable, sample_rate: u32) -> Self {
        Self {
            table,
            sample_rate,
            state: TrackerState::Stopped,
            prev_hz: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Begins tracking, clearing any hysteresis state from a previous run.
    pub fn start(&mut self) {
        self.prev_hz = None;
        self.state = TrackerState::Tracking;
        tracing::debug!("tracker started");
    }

    /// Stops tracking. Subsequent ticks report no signal and leave all
    /// state untouched until the next `start`.
    pub fn stop(&mut self) {
        self.state = TrackerState::Stopped;
        tracing::debug!("tracker stopped");
    }

    /// Analyzes one frame from the live tap.
    ///
    /// Runs the estimator, filters undetected and spurious results, looks up
    /// the nearest note, and applies the hysteresis rule. Ticks received
    /// while stopped are ignored and report [`TickEvent::NoSignal`].
    pub fn tick(&mut self, frame: &[u8]) -> TickEvent {
        if self.state != TrackerState::Tracking {
            return TickEvent::NoSignal;
        }
        let raw = pitch::estimate_fundamental(frame, self.sample_rate);
        self.observe(raw)
    }

    /// Applies filtering and hysteresis to one raw estimate.
    fn observe(&mut self, raw: Option<f32>) -> TickEvent {
        let frequency = match raw {
            Some(f) if !pitch::is_spurious(f, self.sample_rate) => f,
            _ => {
                // Silence breaks hysteresis: the next pitch after a rest
                // should accompany again, even if it matches the last one.
                self.prev_hz = None;
                return TickEvent::NoSignal;
            }
        };

        let note = self.table.closest(frequency).clone();

        // The first pitch after start always triggers; afterwards only a
        // change above the ratio does.
        let trigger = match self.prev_hz {
            None => true,
            Some(prev) => (frequency - prev).abs() > prev * TRIGGER_RATIO,
        };
        self.prev_hz = Some(frequency);

        tracing::trace!(frequency, note = %note.name, trigger, "tick");
        TickEvent::Pitch {
            frequency,
            note,
            trigger,
        }
    }
}
