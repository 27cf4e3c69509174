//! The scrolling strip of note names with the current note in the middle.

const SEPARATOR: &str = "  ";

/// Text either side of the highlighted note, plus the note label itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorLine {
    pub left: String,
    pub current: String,
    pub right: String,
}

/// Lays out `names` around `current` for a terminal `width` columns wide.
///
/// Each side gets roughly half the room; when one side runs out of names the
/// other side may use the slack.
pub fn layout(names: &[String], current: usize, width: usize) -> SelectorLine {
    let current = current.min(names.len().saturating_sub(1));
    let prior = names.get(..current).unwrap_or_default().join(SEPARATOR);
    let post = names.get(current + 1..).unwrap_or_default().join(SEPARATOR);
    let label = format!(" {} ", names.get(current).map(String::as_str).unwrap_or(""));

    let room = width.saturating_sub(label.chars().count());
    let mut max_left = (room / 2).saturating_sub(1);
    let mut max_right = max_left;
    let prior_len = prior.chars().count();
    let post_len = post.chars().count();
    if prior_len < max_right {
        max_right = room - prior_len;
    }
    if post_len < max_left {
        max_left = room - post_len;
    }

    let left: String = prior
        .chars()
        .skip(prior_len - max_left.min(prior_len))
        .collect();
    let right: String = post.chars().take(max_right.min(post_len)).collect();

    SelectorLine {
        left,
        current: label,
        right,
    }
}
