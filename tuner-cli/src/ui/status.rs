//! Text for the header and the per-pane status lines.

use tuner_core::Note;

/// Deviation badge shown next to a detected frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub text: String,
    pub locked: bool,
}

/// Detected frequency text and, when there is one, its deviation badge.
pub fn status_text(
    detected: Option<f32>,
    deviation: Option<f32>,
    locked: bool,
) -> (String, Option<Badge>) {
    match (detected, deviation) {
        (Some(freq), Some(diff)) => {
            let text = if locked {
                format!(" {diff:.3} OK ")
            } else {
                format!(" {diff:.3} ")
            };
            (format!("{freq:.3}"), Some(Badge { text, locked }))
        }
        (Some(freq), None) => (format!("{freq:.3}"), None),
        _ => ("--".to_string(), None),
    }
}

/// Top line of the screen.
pub fn header(note: &Note) -> String {
    format!(
        "Tuning: ({}) ({:.2} Hz) sample freq: {}",
        note.key_number(),
        note.frequency(),
        note.sample_rate()
    )
}

/// Centres `text` in `width` columns.
pub fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let left = (width - len) / 2;
    let right = width - len - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}
