/// Split page text into paragraphs on blank lines. Whitespace inside a
/// paragraph is collapsed to single spaces; empty paragraphs are dropped.
pub fn paragraphs(page_text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in page_text.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut out);
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut out);
    out
}

fn flush(lines: &mut Vec<&str>, out: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let joined = lines.iter().flat_map(|l| l.split_whitespace()).collect::<Vec<_>>().join(" ");
    if !joined.is_empty() {
        out.push(joined);
    }
    lines.clear();
}

/// Split `pdftotext` output into pages. Pages are separated by form feeds
/// and the output usually ends with one, which does not start a new page.
pub fn split_pages(text: &str) -> Vec<&str> {
    let mut pages: Vec<&str> = text.split('\x0c').collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let text = "First line\n  continues here\n\n\n Second   para \n";
        assert_eq!(paragraphs(text), vec!["First line continues here", "Second para"]);
        assert!(paragraphs(" \n\n ").is_empty());
    }

    #[test]
    fn split_pages_drops_trailing_form_feed() {
        assert_eq!(split_pages("one\x0ctwo\x0c"), vec!["one", "two"]);
        assert_eq!(split_pages("one\x0c\x0cthree"), vec!["one", "", "three"]);
        assert_eq!(split_pages(""), vec![""]);
    }
}
