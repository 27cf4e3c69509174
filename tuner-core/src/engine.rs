//! # Tuning Engine
//!
//! The consumer half of the pipeline. Each captured block is analysed twice,
//! once raw and once through the note's band-pass filter, and the resulting
//! [`TuningResult`] is handed to whoever renders it.
//!
//! The engine runs on its own thread and only blocks waiting on the queue.
//! It stops on the [`PipelineMessage::End`] sentinel or an explicit stop
//! request; nothing a block contains can stop it.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::TuningResult;
use crate::audio::{PipelineMessage, SampleBlock};
use crate::config::AnalysisConfig;
use crate::pitch;
use crate::session::{SessionState, SharedState};

/// Totals reported when the engine loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Blocks analysed.
    pub processed: u64,
}

/// Why the engine loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    Sentinel,
    StopRequested,
    QueueClosed,
}

pub struct TuningEngine {
    queue: Receiver<PipelineMessage>,
    state: SharedState,
    results: Sender<TuningResult>,
    config: AnalysisConfig,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

/// Handle to an engine running on its own thread.
#[derive(Debug)]
pub struct EngineHandle {
    shutdown_tx: Sender<()>,
    thread: JoinHandle<EngineStats>,
}

impl EngineHandle {
    /// Asks the engine to exit after the block it is working on.
    pub fn request_stop(&self) {
        let _ = self.shutdown_tx.try_send(());
    }

    /// Waits for the engine thread. `None` if it panicked.
    pub fn join(self) -> Option<EngineStats> {
        self.thread.join().ok()
    }
}

impl TuningEngine {
    pub fn new(
        queue: Receiver<PipelineMessage>,
        state: SharedState,
        results: Sender<TuningResult>,
        config: AnalysisConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        Self {
            queue,
            state,
            results,
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Runs the engine on a dedicated thread.
    pub fn spawn(self) -> io::Result<EngineHandle> {
        let shutdown_tx = self.shutdown_tx.clone();
        let thread = thread::Builder::new()
            .name("tuning-engine".to_string())
            .spawn(move || self.run())?;
        Ok(EngineHandle {
            shutdown_tx,
            thread,
        })
    }

    /// Pulls and analyses blocks until told to stop.
    pub fn run(self) -> EngineStats {
        let Self {
            queue,
            state,
            results,
            config,
            shutdown_tx: _keep_alive,
            shutdown_rx,
        } = self;

        info!("tuning engine running");
        let mut stats = EngineStats::default();
        let mut display_gone = false;

        let cause = loop {
            crossbeam_channel::select! {
                recv(queue) -> msg => match msg {
                    Ok(PipelineMessage::Block(block)) => {
                        // Note and filter are read together so they always match.
                        let snapshot = state.snapshot();
                        let result = Self::process(&block, &snapshot, &config);
                        stats.processed += 1;
                        if results.send(result).is_err() && !display_gone {
                            display_gone = true;
                            debug!("result receiver dropped, analysing without display");
                        }
                    }
                    Ok(PipelineMessage::End) => break StopCause::Sentinel,
                    Err(_) => break StopCause::QueueClosed,
                },
                recv(shutdown_rx) -> _ => break StopCause::StopRequested,
            }
        };

        match cause {
            StopCause::QueueClosed => warn!(processed = stats.processed, "capture queue closed"),
            _ => info!(processed = stats.processed, ?cause, "tuning engine stopped"),
        }
        stats
    }

    /// Analyses one block against the current note and filter.
    ///
    /// Blocks left over from a previous note may have a different length or
    /// rate than the filter was designed for; they are analysed anyway and
    /// simply tend to report no signal.
    pub fn process(
        block: &SampleBlock,
        state: &SessionState,
        config: &AnalysisConfig,
    ) -> TuningResult {
        let target = state.note.frequency();
        let rate = block.sample_rate;

        if rate != state.filter.sample_rate {
            debug!(
                sequence = block.sequence,
                block_rate = rate,
                filter_rate = state.filter.sample_rate,
                "stale block from previous configuration"
            );
        }

        let raw: Vec<f32> = block.samples.iter().map(|&s| f32::from(s)).collect();
        let filtered = state.filter.apply(&raw);

        let (raw_reading, filtered_reading) = if rate == 0 {
            (pitch::SignalReading::NO_SIGNAL, pitch::SignalReading::NO_SIGNAL)
        } else {
            (
                pitch::estimate(&raw, rate, target, config),
                pitch::estimate(&filtered, rate, target, config),
            )
        };

        let window = (config.display_periods * rate as f32 / target).round() as usize;

        debug!(
            sequence = block.sequence,
            len = raw.len(),
            detected = ?filtered_reading.detected,
            "block analysed"
        );

        TuningResult {
            sequence: block.sequence,
            note_index: state.note.index(),
            target,
            sample_rate: rate,
            raw: raw_reading,
            filtered: filtered_reading,
            window,
            raw_wave: raw,
            filtered_wave: filtered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Note;
    use std::f32::consts::PI;

    fn block_for(note: &Note, freq: f32, amplitude: f32) -> SampleBlock {
        let rate = note.sample_rate();
        let samples = (0..note.block_frames())
            .map(|n| (amplitude * (2.0 * PI * freq * n as f32 / rate as f32).sin()).round() as i16)
            .collect();
        SampleBlock {
            sequence: 7,
            sample_rate: rate,
            samples,
        }
    }

    #[test]
    fn in_tune_block_locks_raw_and_filtered() {
        let config = AnalysisConfig::default();
        let state = SessionState::for_note(Note::new(48), &config).unwrap();
        let block = block_for(&state.note, 440.0, 1000.0);
        let result = TuningEngine::process(&block, &state, &config);

        assert_eq!(result.sequence, 7);
        assert_eq!(result.note_index, 48);
        assert!(result.raw.locked);
        assert!(result.filtered.locked);
        let detected = result.filtered.detected.unwrap();
        assert!((detected - 440.0).abs() < 4.4);
        assert_eq!(result.filtered_wave.len(), result.raw_wave.len() - 249);
        assert_eq!(result.window, (3.0_f32 * 16_000.0 / 440.0).round() as usize);
    }

    #[test]
    fn filter_removes_octave_overtone() {
        let config = AnalysisConfig::default();
        let state = SessionState::for_note(Note::new(48), &config).unwrap();
        let rate = state.note.sample_rate();
        // Fundamental plus a strong second harmonic: the raw waveform grows a
        // second crest per period.
        let samples = (0..state.note.block_frames())
            .map(|n| {
                let t = n as f32 / rate as f32;
                (700.0 * (2.0 * PI * 440.0 * t).sin() + 700.0 * (2.0 * PI * 880.0 * t).sin())
                    .round() as i16
            })
            .collect();
        let block = SampleBlock {
            sequence: 0,
            sample_rate: rate,
            samples,
        };
        let result = TuningEngine::process(&block, &state, &config);
        let filtered = result.filtered.detected.unwrap();
        assert!((filtered - 440.0).abs() < 4.4, "filtered {filtered}");
        assert!(result.filtered.locked);
    }

    #[test]
    fn empty_block_is_no_signal() {
        let config = AnalysisConfig::default();
        let state = SessionState::for_note(Note::new(10), &config).unwrap();
        let block = SampleBlock {
            sequence: 1,
            sample_rate: state.note.sample_rate(),
            samples: Vec::new(),
        };
        let result = TuningEngine::process(&block, &state, &config);
        assert!(result.raw.detected.is_none());
        assert!(result.filtered.detected.is_none());
        assert!(result.filtered_wave.is_empty());
    }

    #[test]
    fn zero_rate_block_is_no_signal() {
        let config = AnalysisConfig::default();
        let state = SessionState::for_note(Note::new(48), &config).unwrap();
        let mut block = block_for(&state.note, 440.0, 1000.0);
        block.sample_rate = 0;
        let result = TuningEngine::process(&block, &state, &config);
        assert!(result.raw.detected.is_none());
        assert_eq!(result.window, 0);
    }

    #[test]
    fn stale_block_from_other_note_does_not_panic() {
        let config = AnalysisConfig::default();
        let old = Note::new(87);
        let state = SessionState::for_note(Note::new(0), &config).unwrap();
        let block = block_for(&old, old.frequency(), 1000.0);
        let result = TuningEngine::process(&block, &state, &config);
        assert_eq!(result.note_index, 0);
        assert!(!result.filtered.locked);
    }
}
