//! Tunable analysis constants.

/// Settings shared by the filter designer and the tuning engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Half-width of the band-pass filter in semitones.
    pub note_width_semitones: f32,
    /// FIR filter length.
    pub taps: usize,
    /// Minimum amplitude for a local maximum to count as a peak.
    pub peak_height: f32,
    /// Fewest peaks needed before a frequency is reported.
    pub min_peaks: usize,
    /// Fraction of the gap to the next semitone accepted as "in tune".
    pub lock_fraction: f32,
    /// Target periods shown in each waveform pane.
    pub display_periods: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            note_width_semitones: 3.0,
            taps: 250,
            peak_height: 400.0,
            min_peaks: 5,
            lock_fraction: 0.1,
            display_periods: 3.0,
        }
    }
}
