use std::collections::HashSet;
use std::f32::consts::PI;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tuner_core::audio::{self, AudioSource, BlockSink, CaptureConfig, CaptureError};
use tuner_core::display::InputEvent;
use tuner_core::engine::TuningEngine;
use tuner_core::session::{Session, SessionError, SessionState, SharedState};
use tuner_core::{AnalysisConfig, Note};

/// In-memory source: records every open/close and lets the test push blocks
/// through whatever sink the session handed it.
#[derive(Clone, Default)]
struct ScriptedSource {
    inner: Arc<Mutex<Scripted>>,
}

#[derive(Default)]
struct Scripted {
    current: Option<(CaptureConfig, BlockSink)>,
    failing_rates: HashSet<u32>,
    opens: Vec<CaptureConfig>,
    closes: usize,
}

impl ScriptedSource {
    fn failing_at(rate: u32) -> Self {
        let source = Self::default();
        source.inner.lock().unwrap().failing_rates.insert(rate);
        source
    }

    fn push(&self, samples: Vec<i16>) {
        let inner = self.inner.lock().unwrap();
        let (config, sink) = inner.current.as_ref().expect("stream not open");
        sink.push_samples(config.sample_rate, samples);
    }

    fn opens(&self) -> Vec<CaptureConfig> {
        self.inner.lock().unwrap().opens.clone()
    }
}

impl AudioSource for ScriptedSource {
    fn open(&mut self, config: CaptureConfig, sink: BlockSink) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_rates.contains(&config.sample_rate) {
            return Err(CaptureError::UnsupportedRate(config.sample_rate));
        }
        inner.opens.push(config);
        inner.current = Some((config, sink));
        Ok(())
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.current.take().is_some() {
            inner.closes += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.inner.lock().unwrap().current.is_some()
    }
}

fn sine_block(note: &Note, freq: f32) -> Vec<i16> {
    let rate = note.sample_rate() as f32;
    (0..note.block_frames())
        .map(|n| (1000.0 * (2.0 * PI * freq * n as f32 / rate).sin()).round() as i16)
        .collect()
}

#[test]
fn engine_processes_every_block_in_order_then_stops() {
    let config = AnalysisConfig::default();
    let note = Note::new(48);
    let state = SharedState::new(SessionState::for_note(note, &config).unwrap());
    let (sink, queue) = audio::queue();
    let (results_tx, results_rx) = crossbeam_channel::unbounded();

    let engine = TuningEngine::new(queue, state, results_tx, config).spawn().unwrap();

    let lengths = [3636, 10, 0, 500, 3636, 1];
    for len in lengths {
        sink.push_samples(note.sample_rate(), sine_block(&note, 440.0)[..len].to_vec());
    }
    sink.end();
    // Anything after the sentinel is never read.
    sink.push_samples(note.sample_rate(), vec![0; 10]);

    let stats = engine.join().expect("engine panicked");
    assert_eq!(stats.processed, lengths.len() as u64);

    let results: Vec<_> = results_rx.try_iter().collect();
    let sequences: Vec<u64> = results.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4, 5]);
    let raw_lengths: Vec<usize> = results.iter().map(|r| r.raw_wave.len()).collect();
    assert_eq!(raw_lengths, lengths.to_vec());
    assert!(results[0].filtered.locked);
    assert!(results[2].filtered.detected.is_none());
}

#[test]
fn engine_honours_stop_request() {
    let config = AnalysisConfig::default();
    let state = SharedState::new(SessionState::for_note(Note::new(30), &config).unwrap());
    let (_sink, queue) = audio::queue();
    let (results_tx, _results_rx) = crossbeam_channel::unbounded();

    let engine = TuningEngine::new(queue, state, results_tx, config).spawn().unwrap();
    engine.request_stop();
    assert_eq!(engine.join().unwrap().processed, 0);
}

#[test]
fn session_reports_in_tune_note_and_quits() {
    let source = ScriptedSource::default();
    let note = Note::new(48);
    let mut session = Session::open(source.clone(), note, AnalysisConfig::default()).unwrap();
    let results = session.start().unwrap();

    source.push(sine_block(&note, 440.0));
    let result = results
        .recv_timeout(Duration::from_secs(5))
        .expect("no result from engine");
    assert_eq!(result.note_index, 48);
    let detected = result.filtered.detected.unwrap();
    assert!((detected - 440.0).abs() < 4.4);
    assert!(result.filtered.locked);

    assert_eq!(
        session.handle(InputEvent::Quit).unwrap(),
        ControlFlow::Break(())
    );
    let stats = session.stop().unwrap();
    assert_eq!(stats.processed, 1);
    assert!(!source.is_open());
}

#[test]
fn note_requests_are_clamped() {
    let source = ScriptedSource::default();
    let mut session =
        Session::open(source.clone(), Note::new(48), AnalysisConfig::default()).unwrap();

    assert_eq!(session.set_note(-5).unwrap().index(), 0);
    assert_eq!(session.set_note(200).unwrap().index(), 87);

    let opens_before = source.opens().len();
    assert_eq!(session.step(1).unwrap().index(), 87);
    assert_eq!(source.opens().len(), opens_before, "same note must not reopen");

    assert_eq!(
        session.handle(InputEvent::NoteDown).unwrap(),
        ControlFlow::Continue(())
    );
    assert_eq!(session.current_note().index(), 86);
}

#[test]
fn note_change_reconfigures_stream_and_filter() {
    let source = ScriptedSource::default();
    let mut session =
        Session::open(source.clone(), Note::new(48), AnalysisConfig::default()).unwrap();
    let original = session.snapshot();

    session.handle(InputEvent::NoteUp).unwrap();
    let changed = session.snapshot();
    assert_eq!(changed.note.index(), 49);
    assert_ne!(changed.filter, original.filter);
    assert!(changed.stream_open);
    assert_eq!(
        source.opens().last().copied(),
        Some(CaptureConfig::for_note(&Note::new(49)))
    );

    session.set_note(48).unwrap();
    let restored = session.snapshot();
    assert_eq!(restored.note, original.note);
    assert_eq!(
        restored.filter.coefficients(),
        original.filter.coefficients()
    );
    assert_eq!(*restored.filter, *original.filter);
}

#[test]
fn failed_reconfiguration_keeps_previous_state() {
    // Note 60 captures at 32 kHz.
    let source = ScriptedSource::failing_at(32_000);
    let mut session =
        Session::open(source.clone(), Note::new(48), AnalysisConfig::default()).unwrap();
    let before = session.snapshot();

    let err = session.set_note(60).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Capture(CaptureError::UnsupportedRate(32_000))
    ));

    let after = session.snapshot();
    assert_eq!(after.note, before.note);
    assert_eq!(after.filter, before.filter);
    assert!(after.stream_open);
    assert_eq!(
        source.opens().last().copied(),
        Some(CaptureConfig::for_note(&Note::new(48)))
    );
}

#[test]
fn stale_blocks_after_note_change_are_tolerated() {
    let source = ScriptedSource::default();
    let old = Note::new(48);
    let mut session = Session::open(source.clone(), old, AnalysisConfig::default()).unwrap();

    // Queued under the old configuration, analysed under the new one.
    source.push(sine_block(&old, 440.0));
    session.set_note(0).unwrap();
    source.push(vec![0; 450]);

    let results = session.start().unwrap();
    let stats = session.stop().unwrap();
    assert_eq!(stats.processed, 2);

    let results: Vec<_> = results.try_iter().collect();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.note_index == 0));
    assert_eq!(results[0].sample_rate, 16_000);
    assert!(!results[0].filtered.locked);
    assert!(results[1].raw.detected.is_none());
}

#[test]
fn closing_twice_is_a_no_op() {
    let mut source = ScriptedSource::default();
    let (sink, _queue) = audio::queue();
    source
        .open(CaptureConfig::for_note(&Note::new(10)), sink)
        .unwrap();
    source.close();
    source.close();
    assert!(!source.is_open());
    assert_eq!(source.inner.lock().unwrap().closes, 1);
}

#[test]
fn start_twice_is_rejected() {
    let mut session =
        Session::open(ScriptedSource::default(), Note::new(40), AnalysisConfig::default()).unwrap();
    session.start().unwrap();
    assert!(matches!(session.start(), Err(SessionError::AlreadyStarted)));
    session.stop().unwrap();
}
