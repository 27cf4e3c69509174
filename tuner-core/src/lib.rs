// tuner-core/src/lib.rs

//! The core logic for the live instrument tuner.
//! This crate is responsible for the note model, band-pass filter design,
//! audio capture, pitch detection and session control. It is completely
//! headless: rendering and key handling sit behind the traits in [`display`].

pub mod audio;
pub mod config;
pub mod display;
pub mod engine;
pub mod fft;
pub mod filter;
pub mod note;
pub mod pitch;
pub mod session;

use serde::Serialize;

pub use config::AnalysisConfig;
pub use note::Note;
pub use pitch::SignalReading;

/// Represents the result of analysing a single captured block.
#[derive(Debug, Clone, Serialize)]
pub struct TuningResult {
    /// Capture order of the block this came from.
    pub sequence: u64,
    /// Note that was selected when the block was analysed.
    pub note_index: u8,
    /// Target frequency in Hz.
    pub target: f32,
    /// Rate the block was captured at.
    pub sample_rate: u32,
    /// Estimate from the unfiltered signal.
    pub raw: SignalReading,
    /// Estimate from the band-passed signal; the one to show first.
    pub filtered: SignalReading,
    /// Samples covering a few periods of the target, for plotting.
    pub window: usize,
    #[serde(skip)]
    pub raw_wave: Vec<f32>,
    #[serde(skip)]
    pub filtered_wave: Vec<f32>,
}
