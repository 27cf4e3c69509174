//! # Note Model
//!
//! Maps an 88-key keyboard index (A0 = 0, C8 = 87) to everything the rest of
//! the pipeline needs to know about the note being tuned: its display name,
//! equal-tempered target frequency, the capture sample rate and the length of
//! one analysis window.
//!
//! All values are derived on demand from the index; nothing is stored.

use once_cell::sync::Lazy;

/// Number of keys on a standard piano keyboard.
pub const KEY_COUNT: u8 = 88;

/// Highest valid note index.
pub const MAX_INDEX: u8 = KEY_COUNT - 1;

/// Frequency of A0, the anchor of the equal-tempered scale.
pub const A0_FREQUENCY: f32 = 27.5;

/// Capture rate used for the lowest octave.
const BASE_SAMPLE_RATE: u32 = 1000;

/// Upper bound for any capture rate.
const MAX_SAMPLE_RATE: u32 = 44_100;

const MIN_WINDOW_SECONDS: f32 = 0.1;
const MAX_WINDOW_SECONDS: f32 = 0.45;

/// Pitch classes in keyboard order, starting at A.
const PITCH_CLASSES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Display names for every key, computed once.
static NOTE_NAMES: Lazy<Vec<String>> =
    Lazy::new(|| (0..KEY_COUNT).map(|index| Note::new(index).name()).collect());

/// A single key on the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Note {
    index: u8,
}

impl Note {
    /// Creates a note, clamping the index to the keyboard range.
    pub fn new(index: u8) -> Self {
        Self {
            index: index.min(MAX_INDEX),
        }
    }

    /// Creates a note from an arbitrary (possibly negative) request.
    ///
    /// Out-of-range requests are clamped, never rejected.
    pub fn from_request(request: i32) -> Self {
        Self::new(request.clamp(0, i32::from(MAX_INDEX)) as u8)
    }

    /// Zero-based keyboard index.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// One-based key number as printed on tuning charts.
    pub fn key_number(&self) -> u8 {
        self.index + 1
    }

    /// Display name, e.g. `"[Octave 3] A"` for index 36 or `"A#"` for index 37.
    ///
    /// The octave label only appears on the first key of each 12-key group.
    pub fn name(&self) -> String {
        let pitch_class = PITCH_CLASSES[usize::from(self.index % 12)];
        if self.index % 12 == 0 {
            format!("[Octave {}] {}", self.index / 12, pitch_class)
        } else {
            pitch_class.to_string()
        }
    }

    /// Equal-tempered target frequency in Hz: `27.5 * 2^(index / 12)`.
    pub fn frequency(&self) -> f32 {
        A0_FREQUENCY * 2.0_f32.powf(f32::from(self.index) / 12.0)
    }

    /// Capture rate in Hz, doubling every octave from 1 kHz and capped at 44.1 kHz.
    pub fn sample_rate(&self) -> u32 {
        let octave = u32::from(self.index / 12);
        BASE_SAMPLE_RATE
            .saturating_mul(1 << octave)
            .min(MAX_SAMPLE_RATE)
    }

    /// Analysis window length in seconds: `clamp(100 / freq, 0.1, 0.45)`.
    pub fn window_seconds(&self) -> f32 {
        (100.0 / self.frequency()).clamp(MIN_WINDOW_SECONDS, MAX_WINDOW_SECONDS)
    }

    /// Frames per captured block: `round(rate * window_seconds)`.
    pub fn block_frames(&self) -> usize {
        (self.sample_rate() as f32 * self.window_seconds()).round() as usize
    }
}

impl Default for Note {
    /// Index 36, the A below middle C.
    fn default() -> Self {
        Self::new(36)
    }
}

/// Names of all 88 keys in keyboard order.
pub fn all_note_names() -> &'static [String] {
    &NOTE_NAMES
}
