//! # UI Module
//!
//! Full-screen terminal front-end: the crossterm implementation of the core's
//! `Display` collaborator, plus key mapping and terminal setup/teardown.

pub mod note_selector;
pub mod status;
pub mod waveform;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use std::io::{self, Write};
use std::panic;
use std::sync::Once;

use tuner_core::Note;
use tuner_core::display::{Display, InputEvent};

/// Height of each waveform plot in rows.
pub const PLOT_HEIGHT: usize = 8;
/// Columns kept free to the right of the plots.
const PLOT_MARGIN: usize = 20;

const HIGHLIGHT: Color = Color::DarkYellow;

static PANIC_HOOK: Once = Once::new();

/// Maps a key press to a session command.
pub fn map_key(key: KeyEvent) -> Option<InputEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Left => Some(InputEvent::NoteDown),
        KeyCode::Right => Some(InputEvent::NoteUp),
        KeyCode::Esc | KeyCode::Char('q') => Some(InputEvent::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(InputEvent::Quit)
        }
        _ => None,
    }
}

/// Raw mode + alternate screen for as long as the guard lives.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        install_panic_hook();
        terminal::enable_raw_mode()?;
        let guard = TerminalGuard;
        execute!(io::stdout(), EnterAlternateScreen, Hide)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    let _ = terminal::disable_raw_mode();
    let _ = execute!(io::stdout(), ResetColor, Show, LeaveAlternateScreen);
}

// Leave the alternate screen before the panic message is printed.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal();
            previous(info);
        }));
    });
}

/// Crossterm renderer writing to `out`.
pub struct TerminalDisplay<W: Write> {
    out: W,
    width: u16,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, width: u16) -> Self {
        Self { out, width }
    }

    pub fn resize(&mut self, width: u16) {
        self.width = width;
    }

    pub fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    /// Highlighted, centred title on row 0.
    pub fn render_header(&mut self, note: &Note) -> io::Result<()> {
        let text = status::center(&status::header(note), usize::from(self.width));
        queue!(
            self.out,
            MoveTo(0, 0),
            SetForegroundColor(Color::Black),
            SetBackgroundColor(HIGHLIGHT),
            Print(text),
            ResetColor
        )
    }

    /// One-line message on row 3, e.g. a failed reconfiguration.
    pub fn render_message(&mut self, message: &str) -> io::Result<()> {
        queue!(
            self.out,
            MoveTo(0, 3),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Red),
            Print(message),
            ResetColor
        )
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn plot_width(&self) -> usize {
        usize::from(self.width).saturating_sub(PLOT_MARGIN).max(1)
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn render_waveform(
        &mut self,
        samples: &[f32],
        window: usize,
        y_offset: u16,
        amplitude_bounds: (f32, f32),
    ) -> io::Result<()> {
        let shown = &samples[..window.min(samples.len())];
        let rows = waveform::plot(shown, self.plot_width(), PLOT_HEIGHT, amplitude_bounds);
        for (i, row) in rows.into_iter().enumerate() {
            queue!(
                self.out,
                MoveTo(0, y_offset.saturating_add(i as u16)),
                Clear(ClearType::CurrentLine),
                Print(row)
            )?;
        }
        Ok(())
    }

    fn render_status(
        &mut self,
        detected: Option<f32>,
        deviation: Option<f32>,
        locked: bool,
        y_offset: u16,
    ) -> io::Result<()> {
        let (freq, badge) = status::status_text(detected, deviation, locked);
        queue!(
            self.out,
            MoveTo(0, y_offset),
            Clear(ClearType::CurrentLine),
            Print(freq)
        )?;
        if let Some(badge) = badge {
            let (fg, bg) = if badge.locked {
                (Color::Black, Color::Green)
            } else {
                (Color::White, Color::Red)
            };
            queue!(
                self.out,
                Print(" "),
                SetAttribute(Attribute::Bold),
                SetForegroundColor(fg),
                SetBackgroundColor(bg),
                Print(badge.text),
                SetAttribute(Attribute::Reset),
                ResetColor
            )?;
        }
        Ok(())
    }

    fn render_note_selector(
        &mut self,
        current: &Note,
        all_note_names: &[String],
    ) -> io::Result<()> {
        let line = note_selector::layout(
            all_note_names,
            usize::from(current.index()),
            usize::from(self.width),
        );
        queue!(
            self.out,
            MoveTo(0, 1),
            Clear(ClearType::CurrentLine),
            Print(line.left),
            SetAttribute(Attribute::Bold),
            SetForegroundColor(Color::Black),
            SetBackgroundColor(HIGHLIGHT),
            Print(line.current),
            SetAttribute(Attribute::Reset),
            ResetColor,
            Print(line.right)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use tuner_core::note::all_note_names;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn arrows_and_quit_keys_map() {
        assert_eq!(map_key(press(KeyCode::Left)), Some(InputEvent::NoteDown));
        assert_eq!(map_key(press(KeyCode::Right)), Some(InputEvent::NoteUp));
        assert_eq!(map_key(press(KeyCode::Esc)), Some(InputEvent::Quit));
        assert_eq!(map_key(press(KeyCode::Char('q'))), Some(InputEvent::Quit));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(InputEvent::Quit)
        );
        assert_eq!(map_key(press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn key_release_is_ignored() {
        let release = KeyEvent {
            code: KeyCode::Left,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(map_key(release), None);
    }

    #[test]
    fn display_writes_status_and_selector() {
        let mut display = TerminalDisplay::new(Vec::new(), 80);
        display
            .render_status(Some(440.5), Some(0.5), true, 4)
            .unwrap();
        display
            .render_note_selector(&Note::new(48), all_note_names())
            .unwrap();
        display
            .render_waveform(&[0.0; 500], 109, 5, (-2000.0, 2000.0))
            .unwrap();
        let text = String::from_utf8_lossy(&display.out).into_owned();
        assert!(text.contains("440.500"));
        assert!(text.contains(" 0.500 OK "));
        assert!(text.contains(" [Octave 4] A "));
    }
}
