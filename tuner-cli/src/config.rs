//! Command-line options.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tuner_core::{AnalysisConfig, Note};

/// Live instrument tuner: pick a key, play it, watch the deviation.
#[derive(Debug, Parser, Clone)]
#[command(name = "tuner", version, about = "Live instrument tuner")]
pub struct Cli {
    /// Key number to tune, 1 (A0) to 88 (C8); out-of-range values are clamped
    #[arg(default_value_t = 37, allow_negative_numbers = true)]
    pub note: i32,

    /// Preferred audio input device name
    #[arg(long)]
    pub device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-devices", default_value_t = false)]
    pub list_devices: bool,

    /// Band-pass half-width in semitones
    #[arg(long, default_value_t = 3.0)]
    pub note_width: f32,

    /// Band-pass filter length
    #[arg(long, default_value_t = 250)]
    pub taps: usize,

    /// Minimum peak amplitude counted by the pitch detector
    #[arg(long, default_value_t = 400.0)]
    pub peak_height: f32,

    /// Print one JSON object per analysed block instead of drawing the UI
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Stop after this many seconds (JSON mode only)
    #[arg(long, requires = "json")]
    pub seconds: Option<f64>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log file for interactive mode (defaults to the temp dir)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Zero-based note requested on the command line.
    pub fn initial_note(&self) -> Note {
        Note::from_request(self.note.saturating_sub(1))
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            note_width_semitones: self.note_width,
            taps: self.taps,
            peak_height: self.peak_height,
            ..AnalysisConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_analysis_defaults() {
        let cli = Cli::try_parse_from(["tuner"]).unwrap();
        assert_eq!(cli.initial_note().index(), 36);
        assert_eq!(cli.analysis_config(), AnalysisConfig::default());
        assert!(!cli.json);
    }

    #[test]
    fn note_argument_is_one_based_and_clamped() {
        let cli = Cli::try_parse_from(["tuner", "49"]).unwrap();
        assert_eq!(cli.initial_note().index(), 48);
        let cli = Cli::try_parse_from(["tuner", "500"]).unwrap();
        assert_eq!(cli.initial_note().index(), 87);
        let cli = Cli::try_parse_from(["tuner", "-4"]).unwrap();
        assert_eq!(cli.initial_note().index(), 0);
    }

    #[test]
    fn seconds_requires_json() {
        assert!(Cli::try_parse_from(["tuner", "--seconds", "2"]).is_err());
        let cli = Cli::try_parse_from(["tuner", "--json", "--seconds", "2", "-vv"]).unwrap();
        assert_eq!(cli.seconds, Some(2.0));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn overrides_reach_analysis_config() {
        let cli = Cli::try_parse_from(["tuner", "--taps", "101", "--note-width", "2"]).unwrap();
        let config = cli.analysis_config();
        assert_eq!(config.taps, 101);
        assert_eq!(config.note_width_semitones, 2.0);
    }
}
