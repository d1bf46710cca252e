use console::{style, Color};

use paperdb_rag::answer::ref_markers;

const MARKER_COLORS: [Color; 6] = [Color::Cyan, Color::Green, Color::Yellow, Color::Magenta, Color::Blue, Color::Red];

/// Colour every `[RefN]` marker; the same number always gets the same colour.
pub fn colour_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (range, n) in ref_markers(text) {
        out.push_str(&text[last..range.start]);
        let color = MARKER_COLORS[n.saturating_sub(1) % MARKER_COLORS.len()];
        out.push_str(&style(&text[range.clone()]).fg(color).bold().to_string());
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}

/// First `max` characters, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
