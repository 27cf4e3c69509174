//! # Tuner - live instrument tuning in the terminal
//!
//! ## Architecture
//! - **Main Thread**: terminal UI (or JSON writer) and key handling
//! - **Audio Thread**: CPAL callback, converts and enqueues blocks
//! - **Engine Thread**: filters and analyses each block
//! - **Communication**: crossbeam channels between all three

mod config;
mod json;
mod logging;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use crossterm::event::{self, Event};
use crossterm::terminal;
use std::io;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use config::Cli;
use json::JsonLines;
use tuner_core::TuningResult;
use tuner_core::audio::CpalSource;
use tuner_core::display::{self, Display};
use tuner_core::note::all_note_names;
use tuner_core::session::Session;
use ui::{TerminalDisplay, TerminalGuard};

// ~60 FPS redraw
const FRAME: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.json {
        logging::init_stderr(cli.verbose)?;
    } else {
        let path = cli.log_file.clone().unwrap_or_else(logging::default_log_path);
        logging::init_file(cli.verbose, &path)?;
    }

    if cli.list_devices {
        for name in CpalSource::list_devices().context("could not list input devices")? {
            println!("{name}");
        }
        return Ok(());
    }

    let source = CpalSource::new(cli.device.as_deref()).context("could not open audio input")?;
    let mut session = Session::open(source, cli.initial_note(), cli.analysis_config())
        .context("could not start capture")?;
    let results = session.start().context("could not start tuning engine")?;
    info!(note = %session.current_note().name(), "tuner started");

    let outcome = if cli.json {
        run_json(&results, cli.seconds)
    } else {
        run_terminal(&mut session, &results)
    };

    let stats = session.stop()?;
    info!(processed = stats.processed, "tuner stopped");
    outcome
}

/// Streams results as JSON lines until the deadline, if any.
fn run_json(results: &Receiver<TuningResult>, seconds: Option<f64>) -> Result<()> {
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
    let mut writer = JsonLines::new(io::stdout().lock());
    loop {
        let timeout = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::from_secs(1),
        };
        match results.recv_timeout(timeout) {
            Ok(result) => writer.write(&result)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }
    Ok(())
}

/// Interactive loop: keys change the note, results are drawn as they arrive.
fn run_terminal(session: &mut Session<CpalSource>, results: &Receiver<TuningResult>) -> Result<()> {
    let _guard = TerminalGuard::enter().context("could not set up terminal")?;
    let (width, _) = terminal::size()?;
    let mut screen = TerminalDisplay::new(io::stdout(), width);
    let mut latest: Option<TuningResult> = None;
    let mut full_redraw = true;
    let mut message: Option<String> = None;

    loop {
        if event::poll(FRAME)? {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(input) = ui::map_key(key) {
                        match session.handle(input) {
                            Ok(ControlFlow::Break(())) => break,
                            Ok(ControlFlow::Continue(())) => message = None,
                            Err(err) => {
                                warn!("note change failed: {err}");
                                message = Some(format!("note change failed: {err}"));
                            }
                        }
                        latest = None;
                        full_redraw = true;
                    }
                }
                Event::Resize(new_width, _) => {
                    screen.resize(new_width);
                    full_redraw = true;
                }
                _ => {}
            }
        }

        let mut fresh = false;
        for result in results.try_iter() {
            latest = Some(result);
            fresh = true;
        }

        if full_redraw {
            let note = session.current_note();
            screen.clear()?;
            screen.render_header(&note)?;
            screen.render_note_selector(&note, all_note_names())?;
            if let Some(message) = &message {
                screen.render_message(message)?;
            }
        }
        if full_redraw || fresh {
            if let Some(result) = &latest {
                display::render_result(&mut screen, result)?;
            }
            screen.flush()?;
        }
        full_redraw = false;
    }
    Ok(())
}
