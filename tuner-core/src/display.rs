//! Display and input collaborators.
//!
//! The core never draws anything itself. Front-ends implement [`Display`]
//! and translate their own key handling into [`InputEvent`]s.

use std::io;

use crate::TuningResult;
use crate::note::Note;

/// Row of the raw waveform pane.
pub const RAW_PANE_Y: u16 = 5;
/// Row of the filtered waveform pane.
pub const FILTERED_PANE_Y: u16 = 18;
/// Vertical plot range for both panes.
pub const AMPLITUDE_BOUNDS: (f32, f32) = (-2000.0, 2000.0);

/// Discrete user commands understood by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    NoteUp,
    NoteDown,
    Quit,
}

/// Pure rendering sink. Nothing here feeds back into the engine.
pub trait Display {
    /// Plots the first `window` samples at row `y_offset`.
    fn render_waveform(
        &mut self,
        samples: &[f32],
        window: usize,
        y_offset: u16,
        amplitude_bounds: (f32, f32),
    ) -> io::Result<()>;

    /// Shows a pitch estimate; `detected` is `None` when there is no signal.
    fn render_status(
        &mut self,
        detected: Option<f32>,
        deviation: Option<f32>,
        locked: bool,
        y_offset: u16,
    ) -> io::Result<()>;

    fn render_note_selector(&mut self, current: &Note, all_note_names: &[String]) -> io::Result<()>;
}

/// Draws both panes of a result: status line directly above each waveform,
/// raw first, filtered below.
pub fn render_result<D: Display + ?Sized>(
    display: &mut D,
    result: &TuningResult,
) -> io::Result<()> {
    let panes = [
        (&result.raw, &result.raw_wave, RAW_PANE_Y),
        (&result.filtered, &result.filtered_wave, FILTERED_PANE_Y),
    ];
    for (reading, wave, y) in panes {
        display.render_status(
            reading.detected,
            reading.deviation,
            reading.locked,
            y.saturating_sub(1),
        )?;
        display.render_waveform(wave, result.window, y, AMPLITUDE_BOUNDS)?;
    }
    Ok(())
}
