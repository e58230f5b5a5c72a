//! # Reference Note Table
//!
//! This module provides the musical reference data for the engine: a
//! frequency-sorted table of note names, closest-note lookup, and the cents
//! helper used for pitch-shift calculations.
//!
//! ## Features
//! - Built-in 88-key equal temperament table (A0 to C8, A4 = 440 Hz)
//! - Custom tables loadable from external note data (serde)
//! - Binary-search closest-note lookup, total over all finite frequencies
//! - Cent interval calculations between arbitrary frequencies

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents a single musical note with its name and frequency.
///
/// The serialized form matches the reference-data schema
/// (`{"note": "A4", "frequency": 440.0}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    #[serde(rename = "note")]
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Errors raised while building a [`NoteTable`].
///
/// Lookups themselves are infallible: a table that would make them fail
/// (empty, or containing unorderable frequencies) is rejected here, at
/// construction, so a loaded table can never be queried in a bad state.
#[derive(Debug, Error)]
pub enum NoteTableError {
    /// The supplied note list was empty.
    #[error("note table is empty")]
    Empty,
    /// A note carried a NaN or infinite frequency.
    #[error("note {0:?} has a non-finite frequency")]
    NonFiniteFrequency(String),
}

/// A frequency-sorted, non-empty collection of reference notes.
///
/// Sortedness is established at construction and never changes afterwards,
/// which is what makes the binary search in [`NoteTable::closest`] correct.
#[derive(Debug, Clone)]
pub struct NoteTable {
    notes: Vec<Note>,
}

/// Statically computed table for a standard 88-key piano (A0 to C8).
///
/// Frequencies follow equal temperament with A4 = 440 Hz: the 49th key is
/// A4, and each key is `2^(1/12)` away from its neighbors. Computed once at
/// first use.
static STANDARD: Lazy<NoteTable> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
    ];
    let mut notes = Vec::with_capacity(88);

    for i in 0..88 {
        // A4 is the 49th key, index 48. f = 440 * 2^(n/12) where n is the
        // semitone distance from A4.
        let frequency = 440.0 * 2.0_f32.powf((i as f32 - 48.0) / 12.0);

        // A piano starts at A0; the octave number increments at each C.
        let note_index = i % 12;
        let octave = (i + 9) / 12;
        let name = format!("{}{}", NOTE_NAMES[note_index], octave);

        notes.push(Note { name, frequency });
    }

    NoteTable::new(notes).expect("static note table is non-empty and finite")
});

impl NoteTable {
    /// Builds a table from arbitrary note data, sorting it by frequency.
    ///
    /// # Errors
    /// * [`NoteTableError::Empty`] if `notes` is empty
    /// * [`NoteTableError::NonFiniteFrequency`] if any frequency is NaN or
    ///   infinite
    pub fn new(mut notes: Vec<Note>) -> Result<Self, NoteTableError> {
        if notes.is_empty() {
            return Err(NoteTableError::Empty);
        }
        if let Some(bad) = notes.iter().find(|n| !n.frequency.is_finite()) {
            return Err(NoteTableError::NonFiniteFrequency(bad.name.clone()));
        }
        notes.sort_by(|a, b| {
            a.frequency
                .partial_cmp(&b.frequency)
                .expect("frequencies checked finite above")
        });
        Ok(Self { notes })
    }

    /// The built-in 88-key equal temperament table.
    pub fn standard() -> &'static NoteTable {
        &STANDARD
    }

    /// Finds the note closest to `freq` by absolute frequency distance.
    ///
    /// A binary search locates the pair of entries bracketing `freq`; the
    /// nearer of the two is returned, with ties broken toward the
    /// higher-frequency candidate. Frequencies outside the table's range
    /// clamp to the first or last entry, so the lookup is total.
    pub fn closest(&self, freq: f32) -> &Note {
        let notes = &self.notes;
        let mut lo: isize = 0;
        let mut hi: isize = notes.len() as isize - 1;

        while lo <= hi {
            let mid = (lo + hi) / 2;
            let f = notes[mid as usize].frequency;
            if f < freq {
                lo = mid + 1;
            } else if f > freq {
                hi = mid - 1;
            } else {
                return &notes[mid as usize];
            }
        }

        // After the loop hi is the lower bracket and lo the upper.
        if hi < 0 {
            return &notes[0];
        }
        if lo as usize >= notes.len() {
            return &notes[notes.len() - 1];
        }

        let lower = &notes[hi as usize];
        let upper = &notes[lo as usize];
        if (lower.frequency - freq).abs() < (upper.frequency - freq).abs() {
            lower
        } else {
            upper
        }
    }

    /// Number of notes in the table.
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Always false: empty tables are unrepresentable.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The notes in ascending frequency order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }
}

/// Calculates the interval between two frequencies in cents.
///
/// Cents are a logarithmic unit of pitch interval:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values mean `freq2` is above `freq1`
///
/// Used to detune a sample player so a calibrated sample sounds at a target
/// frequency.
pub fn cents_between(freq1: f32, freq2: f32) -> f32 {
    1200.0 * (freq2 / freq1).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(freqs: &[(&str, f32)]) -> NoteTable {
        NoteTable::new(
            freqs
                .iter()
                .map(|(name, frequency)| Note {
                    name: name.to_string(),
                    frequency: *frequency,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn exact_match_returns_that_entry() {
        assert_eq!(NoteTable::standard().closest(440.0).name, "A4");
    }

    #[test]
    fn near_miss_returns_nearest_entry() {
        let standard = NoteTable::standard();
        assert_eq!(standard.closest(441.0).name, "A4");
        assert_eq!(standard.closest(262.0).name, "C4");
    }

    #[test]
    fn tie_breaks_toward_higher_entry() {
        let t = table(&[("low", 100.0), ("high", 200.0)]);
        assert_eq!(t.closest(150.0).name, "high");
    }

    #[test]
    fn out_of_range_clamps_to_edges() {
        let standard = NoteTable::standard();
        assert_eq!(standard.closest(1.0).name, "A0");
        assert_eq!(standard.closest(100_000.0).name, "C8");
    }

    #[test]
    fn lookup_is_idempotent() {
        let standard = NoteTable::standard();
        let first = standard.closest(441.3);
        let again = standard.closest(first.frequency);
        assert_eq!(first.name, again.name);
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(
            NoteTable::new(Vec::new()),
            Err(NoteTableError::Empty)
        ));
    }

    #[test]
    fn non_finite_frequency_is_rejected() {
        let result = NoteTable::new(vec![Note {
            name: "bad".into(),
            frequency: f32::NAN,
        }]);
        assert!(matches!(
            result,
            Err(NoteTableError::NonFiniteFrequency(_))
        ));
    }

    #[test]
    fn unsorted_input_is_sorted_on_build() {
        let t = table(&[("b", 200.0), ("a", 100.0), ("c", 300.0)]);
        assert_eq!(t.closest(90.0).name, "a");
        assert_eq!(t.closest(310.0).name, "c");
    }

    #[test]
    fn standard_table_is_strictly_ascending() {
        let notes = NoteTable::standard().notes();
        assert_eq!(notes.len(), 88);
        for pair in notes.windows(2) {
            assert!(pair[0].frequency < pair[1].frequency);
        }
    }

    #[test]
    fn cents_identities() {
        assert_eq!(cents_between(440.0, 440.0), 0.0);
        assert!((cents_between(220.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!((cents_between(440.0, 220.0) + 1200.0).abs() < 1e-3);
    }
}
