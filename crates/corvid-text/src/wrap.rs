//! Word wrapping that preserves active ANSI styling across the lines it
//! produces, so a bold span broken mid-word keeps rendering bold on the
//! continuation line.

use unicode_segmentation::UnicodeSegmentation;

use crate::ansi::{match_escape, AnsiTracker};
use crate::error::{Result, TextError};
use crate::width::visible_width;

/// A single on-screen token: either a run of escape-aware text or a
/// whitespace break. Wrapping operates on whitespace-delimited words so it
/// never splits a word across lines unless the word alone exceeds `width`.
struct Word {
    text: String,
    width: usize,
}

fn split_words(line: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = line.char_indices().peekable();
    let bytes = line.as_bytes();
    while let Some((i, c)) = chars.peek().copied() {
        if c == '\x1b' {
            if let Some(end) = match_escape(bytes, i) {
                current.push_str(&line[i..end]);
                while let Some((j, _)) = chars.peek().copied() {
                    if j >= end {
                        break;
                    }
                    chars.next();
                }
                continue;
            }
        }
        if c.is_whitespace() {
            if !current.is_empty() {
                words.push(Word {
                    width: visible_width(&current),
                    text: std::mem::take(&mut current),
                });
            }
            words.push(Word {
                text: c.to_string(),
                width: 0,
            });
            chars.next();
            continue;
        }
        current.push(c);
        chars.next();
    }
    if !current.is_empty() {
        words.push(Word {
            width: visible_width(&current),
            text: current,
        });
    }
    words
}

/// Word-wrap `text` to `width` visible columns, splitting only on
/// whitespace unless a single word exceeds `width` (in which case it is
/// hard-broken at the column boundary). ANSI styling active at the end of
/// one produced line is re-emitted at the start of the next so each line is
/// independently renderable.
pub fn wrap_text_with_ansi(text: &str, width: usize) -> Result<Vec<String>> {
    if width == 0 {
        return Err(TextError::InvalidWrapWidth(width));
    }
    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        lines.extend(wrap_single_line(raw_line, width));
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    Ok(lines)
}

fn wrap_single_line(line: &str, width: usize) -> Vec<String> {
    let words = split_words(line);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;
    let mut tracker = AnsiTracker::new();
    let mut line_start_tracker = AnsiTracker::new();

    let flush = |out: &mut Vec<String>, current: &mut String, current_width: &mut usize, tracker: &AnsiTracker| {
        let trimmed_end = current.trim_end_matches(' ').to_string();
        let mut rendered = String::new();
        rendered.push_str(&trimmed_end);
        rendered.push_str(&tracker.get_line_end_reset());
        out.push(rendered);
        current.clear();
        *current_width = 0;
    };

    for word in &words {
        if word.text == " " || word.text.chars().all(char::is_whitespace) && word.width == 0 {
            if current_width > 0 {
                current.push_str(&word.text);
            }
            continue;
        }
        if word.width > width {
            if current_width > 0 {
                flush(&mut out, &mut current, &mut current_width, &tracker);
                line_start_tracker = tracker.clone();
            }
            let mut remaining = word.text.as_str();
            loop {
                let (chunk, rest) = split_at_width(remaining, width);
                let mut t = line_start_tracker.clone();
                t.consume(chunk);
                let mut rendered = line_start_tracker.get_active_codes();
                rendered.push_str(chunk);
                rendered.push_str(&t.get_line_end_reset());
                if rest.is_empty() {
                    current.push_str(&line_start_tracker.get_active_codes());
                    current.push_str(chunk);
                    current_width = visible_width(chunk);
                    tracker = t;
                    break;
                }
                out.push(rendered);
                line_start_tracker = t.clone();
                remaining = rest;
            }
            continue;
        }
        if current_width > 0 && current_width + word.width > width {
            flush(&mut out, &mut current, &mut current_width, &tracker);
            line_start_tracker = tracker.clone();
        }
        if current_width == 0 {
            current.push_str(&line_start_tracker.get_active_codes());
        }
        tracker.consume(&word.text);
        current.push_str(&word.text);
        current_width += word.width;
    }
    if !current.is_empty() || out.is_empty() {
        flush(&mut out, &mut current, &mut current_width, &tracker);
    }
    out
}

/// Split `s` into a prefix whose visible width is <= `width` and the rest,
/// breaking at a grapheme-cluster boundary so no cluster is straddled.
fn split_at_width(s: &str, width: usize) -> (&str, &str) {
    let mut acc = 0usize;
    let mut byte_idx = 0usize;
    for g in s.graphemes(true) {
        let w = visible_width(g);
        if acc + w > width {
            break;
        }
        acc += w;
        byte_idx += g.len();
    }
    if byte_idx == 0 && !s.is_empty() {
        // A single cluster wider than `width`: still must make progress.
        let first = s.graphemes(true).next().unwrap_or("");
        byte_idx = first.len();
    }
    s.split_at(byte_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_on_whitespace() {
        let lines = wrap_text_with_ansi("hello world foo", 11).unwrap();
        assert_eq!(lines, vec!["hello world".to_string(), "foo".to_string()]);
    }

    #[test]
    fn preserves_ansi_across_break() {
        let lines = wrap_text_with_ansi("\x1b[1mhello world\x1b[0m", 5).unwrap();
        assert!(lines[0].starts_with("\x1b[1m"));
        assert!(lines[1].starts_with("\x1b[1m"));
    }

    #[test]
    fn zero_width_is_an_error() {
        assert!(wrap_text_with_ansi("hi", 0).is_err());
    }

    #[test]
    fn hard_breaks_overlong_word() {
        let lines = wrap_text_with_ansi("supercalifragilistic", 5).unwrap();
        assert!(lines.iter().all(|l| visible_width(l) <= 5));
    }
}
