//! # Pitch Detection Module
//!
//! Peak-spacing pitch estimation. A local-maxima scan finds the crests of the
//! waveform; the mean distance between consecutive crests is the period.
//!
//! This is deliberately simple: it is run on both the raw capture and the
//! band-passed signal, and the band-pass stage is what removes the overtones
//! that would otherwise produce extra crests.

use serde::Serialize;

use crate::config::AnalysisConfig;

/// Pitch estimate for a single signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalReading {
    /// Detected frequency in Hz, `None` when there is no usable signal.
    pub detected: Option<f32>,
    /// `detected - target` in Hz.
    pub deviation: Option<f32>,
    /// Whether the deviation is within tolerance of the target.
    pub locked: bool,
}

impl SignalReading {
    pub const NO_SIGNAL: Self = Self {
        detected: None,
        deviation: None,
        locked: false,
    };
}

/// Finds local maxima of `signal` at least `min_height` tall.
///
/// A peak is a sample strictly greater than its left neighbour and strictly
/// greater than the first differing sample to its right. Flat-topped peaks
/// report their middle sample (rounded down). The first and last samples are
/// never peaks.
pub fn find_peaks(signal: &[f32], min_height: f32) -> Vec<usize> {
    let mut peaks = Vec::new();
    if signal.len() < 3 {
        return peaks;
    }
    let last = signal.len() - 1;
    let mut i = 1;
    while i < last {
        if signal[i - 1] < signal[i] {
            // Walk across a plateau.
            let mut ahead = i + 1;
            while ahead < last && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                let peak = (i + ahead - 1) / 2;
                if signal[peak] >= min_height {
                    peaks.push(peak);
                }
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Frequency implied by the mean spacing of `peaks`.
///
/// Returns `None` unless there are at least `min_peaks` peaks.
pub fn frequency_from_peaks(
    peaks: &[usize],
    sample_rate: u32,
    min_peaks: usize,
) -> Option<f32> {
    if peaks.len() < min_peaks.max(2) {
        return None;
    }
    // Mean of successive differences telescopes to span / gaps.
    let span = (peaks[peaks.len() - 1] - peaks[0]) as f32;
    let mean_period = span / (peaks.len() - 1) as f32;
    if mean_period <= 0.0 {
        return None;
    }
    let freq = sample_rate as f32 / mean_period;
    freq.is_finite().then_some(freq)
}

/// Distance in Hz from `freq` up to the next semitone.
pub fn semitone_gap(freq: f32) -> f32 {
    freq * 2.0_f32.powf(1.0 / 12.0) - freq
}

/// Whether `deviation` is within `fraction` of the gap from `target` to the
/// next semitone up.
pub fn is_locked(deviation: f32, target: f32, fraction: f32) -> bool {
    deviation.abs() < semitone_gap(target) * fraction
}

/// Estimates the pitch of `signal` and compares it to `target`.
///
/// Runs the peak finder, converts the mean crest spacing into Hz and applies
/// the lock tolerance.
///
/// # Arguments
/// * `signal` - Raw or band-passed samples, in 16-bit amplitude units
/// * `sample_rate` - Rate `signal` was captured at
/// * `target` - Frequency of the selected note in Hz
/// * `config` - Peak height, minimum peak count and lock fraction
///
/// # Returns
/// * [`SignalReading::NO_SIGNAL`] - Fewer than `config.min_peaks` crests reach the height
/// * Otherwise the detected frequency, its deviation from `target` and the lock flag
pub fn estimate(
    signal: &[f32],
    sample_rate: u32,
    target: f32,
    config: &AnalysisConfig,
) -> SignalReading {
    let peaks = find_peaks(signal, config.peak_height);
    match frequency_from_peaks(&peaks, sample_rate, config.min_peaks) {
        Some(detected) => {
            let deviation = detected - target;
            SignalReading {
                detected: Some(detected),
                deviation: Some(deviation),
                locked: is_locked(deviation, target, config.lock_fraction),
            }
        }
        None => SignalReading::NO_SIGNAL,
    }
}
