//! # Session Controller
//!
//! Owns the audio source and the note selection, and keeps the engine's view
//! of "current note + current filter" consistent.
//!
//! A note change does all of its slow work (filter design, closing and
//! reopening the device) without holding the lock, then swaps the whole
//! [`SessionState`] in one short critical section. The engine therefore never
//! sees a new sample rate paired with an old filter, and never waits on
//! device I/O.
//!
//! Blocks already queued under the old configuration are not drained; the
//! engine analyses them against the new state and they fade out as
//! "no signal".

use std::io;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Receiver;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::TuningResult;
use crate::audio::{self, AudioSource, BlockSink, CaptureConfig, CaptureError, PipelineMessage};
use crate::config::AnalysisConfig;
use crate::display::InputEvent;
use crate::engine::{EngineHandle, EngineStats, TuningEngine};
use crate::filter::{FilterError, FilterSpec};
use crate::note::Note;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("tuning engine already started")]
    AlreadyStarted,
    #[error("could not start tuning engine: {0}")]
    Spawn(#[from] io::Error),
    #[error("tuning engine exited abnormally")]
    EngineGone,
}

/// Everything the engine and the display read about the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub note: Note,
    pub filter: Arc<FilterSpec>,
    pub stream_open: bool,
}

impl SessionState {
    /// State for `note` with a freshly designed filter and no open stream.
    pub fn for_note(note: Note, config: &AnalysisConfig) -> Result<Self, FilterError> {
        Ok(Self {
            note,
            filter: Arc::new(FilterSpec::for_note(&note, config)?),
            stream_open: false,
        })
    }
}

/// The session lock. Held only long enough to copy or swap a [`SessionState`].
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<SessionState>>);

impl SharedState {
    pub fn new(state: SessionState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Consistent copy of the current state. The filter is shared, not cloned.
    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn note(&self) -> Note {
        self.lock().note
    }

    fn replace(&self, state: SessionState) -> SessionState {
        std::mem::replace(&mut *self.lock(), state)
    }

    fn set_stream_open(&self, open: bool) {
        self.lock().stream_open = open;
    }

    // The guarded data is plain values, so a panic elsewhere cannot leave it
    // half-written.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A tuning session over one audio source.
pub struct Session<S: AudioSource> {
    source: S,
    sink: BlockSink,
    queue: Option<Receiver<PipelineMessage>>,
    state: SharedState,
    config: AnalysisConfig,
    engine: Option<EngineHandle>,
}

impl<S: AudioSource> Session<S> {
    /// Opens `source` for `initial` and prepares the capture queue.
    ///
    /// The engine is not running until [`Session::start`].
    pub fn open(
        mut source: S,
        initial: Note,
        config: AnalysisConfig,
    ) -> Result<Self, SessionError> {
        let (sink, queue) = audio::queue();
        let mut state = SessionState::for_note(initial, &config)?;
        source.open(CaptureConfig::for_note(&initial), sink.clone())?;
        state.stream_open = true;
        info!(note = %initial.name(), rate = initial.sample_rate(), "session opened");
        Ok(Self {
            source,
            sink,
            queue: Some(queue),
            state: SharedState::new(state),
            config,
            engine: None,
        })
    }

    /// Spawns the engine thread and returns the stream of results.
    pub fn start(&mut self) -> Result<Receiver<TuningResult>, SessionError> {
        let queue = self.queue.take().ok_or(SessionError::AlreadyStarted)?;
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let engine = TuningEngine::new(queue, self.state.clone(), results_tx, self.config.clone());
        self.engine = Some(engine.spawn()?);
        Ok(results_rx)
    }

    pub fn current_note(&self) -> Note {
        self.state.note()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.snapshot()
    }

    /// Moves the selection by `delta` keys, clamped to the keyboard.
    pub fn step(&mut self, delta: i32) -> Result<Note, SessionError> {
        let current = i32::from(self.current_note().index());
        self.set_note(current.saturating_add(delta))
    }

    /// Switches to the note at `request`, clamped to the keyboard.
    ///
    /// This method:
    /// 1. Designs the new filter
    /// 2. Closes the stream and reopens it at the new note's rate and block size
    /// 3. Swaps note and filter into the shared state in one short lock
    ///
    /// Requesting the note already selected, with the stream open, does nothing.
    ///
    /// # Arguments
    /// * `request` - 0-based key index, clamped to `0..=87`
    ///
    /// # Returns
    /// * `Ok(note)` - The note now selected
    /// * `Err(e)` - The filter or stream could not be set up; the previous note
    ///   and filter stay in place and the previous stream is reopened if possible
    pub fn set_note(&mut self, request: i32) -> Result<Note, SessionError> {
        let note = Note::from_request(request);
        let previous = self.state.snapshot();
        if note == previous.note && previous.stream_open {
            return Ok(note);
        }

        let filter = Arc::new(FilterSpec::for_note(&note, &self.config)?);

        self.source.close();
        self.state.set_stream_open(false);
        if let Err(err) = self
            .source
            .open(CaptureConfig::for_note(&note), self.sink.clone())
        {
            error!(note = %note.name(), "could not reconfigure capture: {err}");
            self.reopen(&previous.note);
            return Err(err.into());
        }

        self.state.replace(SessionState {
            note,
            filter,
            stream_open: true,
        });
        info!(
            note = %note.name(),
            freq = note.frequency(),
            rate = note.sample_rate(),
            block_frames = note.block_frames(),
            "note changed"
        );
        Ok(note)
    }

    fn reopen(&mut self, note: &Note) {
        match self
            .source
            .open(CaptureConfig::for_note(note), self.sink.clone())
        {
            Ok(()) => self.state.set_stream_open(true),
            Err(err) => warn!(note = %note.name(), "could not reopen previous stream: {err}"),
        }
    }

    /// Applies a user command. `Break` means the caller should stop.
    pub fn handle(&mut self, event: InputEvent) -> Result<ControlFlow<()>, SessionError> {
        match event {
            InputEvent::NoteUp => self.step(1)?,
            InputEvent::NoteDown => self.step(-1)?,
            InputEvent::Quit => return Ok(ControlFlow::Break(())),
        };
        Ok(ControlFlow::Continue(()))
    }

    /// Closes the stream, sends the sentinel and joins the engine.
    pub fn stop(mut self) -> Result<EngineStats, SessionError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<EngineStats, SessionError> {
        self.source.close();
        self.state.set_stream_open(false);
        self.sink.end();
        match self.engine.take() {
            Some(engine) => engine.join().ok_or(SessionError::EngineGone),
            None => Ok(EngineStats::default()),
        }
    }
}

impl<S: AudioSource> Drop for Session<S> {
    fn drop(&mut self) {
        if self.engine.is_some() {
            if let Err(err) = self.shutdown() {
                warn!("session dropped uncleanly: {err}");
            }
        }
    }
}
