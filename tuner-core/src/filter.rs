//! # Filter Designer
//!
//! Builds the band-pass FIR filter that isolates the note being tuned.
//!
//! The design is a Hamming-windowed sinc: the ideal band-pass impulse response
//! (difference of two low-pass sincs) truncated to a fixed number of taps.
//! The response is left unscaled, the downstream peak detector only cares
//! about where the peaks are, not how tall the passband is.

use std::f64::consts::PI;
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::fft;
use crate::note::Note;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("filter needs at least one tap")]
    NoTaps,
    #[error("band {lower:.2}-{upper:.2} Hz does not fit below nyquist ({nyquist:.2} Hz)")]
    BandOutOfRange { lower: f32, upper: f32, nyquist: f32 },
}

/// An immutable band-pass filter designed for one note.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Lower band edge in Hz.
    pub lower: f32,
    /// Upper band edge in Hz.
    pub upper: f32,
    /// Sample rate the coefficients were designed for.
    pub sample_rate: u32,
    coefficients: Vec<f32>,
}

impl FilterSpec {
    /// Designs a band-pass filter spanning `note_width` semitones either side
    /// of the note's target frequency.
    ///
    /// # Arguments
    /// * `note` - Note to isolate; also fixes the sample rate
    /// * `note_width` - Half-width of the pass band in semitones
    /// * `taps` - Number of coefficients
    ///
    /// # Returns
    /// * `Ok(filter)` - Coefficients for `note.sample_rate()`
    /// * `Err(e)` - Zero taps, or the band reaches nyquist
    pub fn design(note: &Note, note_width: f32, taps: usize) -> Result<Self, FilterError> {
        let scale = 2.0_f32.powf(note_width / 12.0);
        let freq = note.frequency();
        Self::band_pass(freq / scale, freq * scale, note.sample_rate(), taps)
    }

    /// Designs the filter for a note using the widths from `config`.
    pub fn for_note(note: &Note, config: &AnalysisConfig) -> Result<Self, FilterError> {
        Self::design(note, config.note_width_semitones, config.taps)
    }

    /// Designs a band-pass filter with explicit band edges in Hz.
    ///
    /// DC and everything outside `lower..upper` is rejected.
    pub fn band_pass(
        lower: f32,
        upper: f32,
        sample_rate: u32,
        taps: usize,
    ) -> Result<Self, FilterError> {
        if taps == 0 {
            return Err(FilterError::NoTaps);
        }
        let nyquist = sample_rate as f32 / 2.0;
        if !(lower > 0.0 && lower < upper && upper < nyquist) {
            return Err(FilterError::BandOutOfRange {
                lower,
                upper,
                nyquist,
            });
        }

        // Band edges as a fraction of nyquist.
        let left = f64::from(lower) / f64::from(nyquist);
        let right = f64::from(upper) / f64::from(nyquist);
        let alpha = 0.5 * (taps as f64 - 1.0);

        let coefficients = (0..taps)
            .map(|n| {
                let m = n as f64 - alpha;
                let ideal = right * sinc(right * m) - left * sinc(left * m);
                (ideal * hamming(n, taps)) as f32
            })
            .collect();

        Ok(Self {
            lower,
            upper,
            sample_rate,
            coefficients,
        })
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    pub fn taps(&self) -> usize {
        self.coefficients.len()
    }

    /// Samples lost from the front of every filtered block.
    pub fn group_delay(&self) -> usize {
        self.taps().saturating_sub(1)
    }

    /// Filters a block with valid-mode convolution.
    ///
    /// Output length is `input.len() - taps + 1`; inputs shorter than the
    /// filter produce an empty output.
    pub fn apply(&self, input: &[f32]) -> Vec<f32> {
        fft::convolve_valid(input, &self.coefficients)
    }

    /// Magnitude response at `freq` Hz.
    pub fn gain_at(&self, freq: f32) -> f32 {
        let omega = 2.0 * PI * f64::from(freq) / f64::from(self.sample_rate);
        let (re, im) = self
            .coefficients
            .iter()
            .enumerate()
            .fold((0.0_f64, 0.0_f64), |(re, im), (k, &c)| {
                let phase = omega * k as f64;
                (re + f64::from(c) * phase.cos(), im - f64::from(c) * phase.sin())
            });
        (re * re + im * im).sqrt() as f32
    }
}

/// Normalized sinc, `sin(pi x) / (pi x)`.
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Symmetric Hamming window value for tap `n` of `len`.
fn hamming(n: usize, len: usize) -> f64 {
    if len == 1 {
        return 1.0;
    }
    0.54 - 0.46 * (2.0 * PI * n as f64 / (len as f64 - 1.0)).cos()
}
