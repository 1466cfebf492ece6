//! Column-range slicing of ANSI-styled lines, and overlay segment
//! extraction: splitting a line into the parts before/inside/after a
//! column range so a renderer can paint an overlay (a dialog, a popup) on
//! top of already-composited text without losing the base text's styling.

use unicode_segmentation::UnicodeSegmentation;

use crate::ansi::{match_escape, AnsiTracker};
use crate::width::visible_width;

struct Cluster<'a> {
    text: &'a str,
    width: usize,
    /// Active SGR codes immediately before this cluster, re-emitted at
    /// this cluster's position if it becomes the start of a slice.
    codes_before: String,
}

/// Walk `line` into a list of (escape-aware) grapheme clusters, tracking
/// ANSI state as we go so any cluster can be used as a slice start point
/// with its full active styling reconstructed.
fn clusters(line: &str) -> Vec<Cluster<'_>> {
    let bytes = line.as_bytes();
    let mut out = Vec::new();
    let mut tracker = AnsiTracker::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0x1b {
            if let Some(end) = match_escape(bytes, i) {
                tracker.consume(&line[i..end]);
                i = end;
                continue;
            }
        }
        let rest = &line[i..];
        let g = rest.graphemes(true).next().unwrap_or("");
        if g.is_empty() {
            break;
        }
        out.push(Cluster {
            text: g,
            width: visible_width(g),
            codes_before: tracker.get_active_codes(),
        });
        i += g.len();
    }
    out
}

/// Strict vs lenient truncation when a wide cluster straddles the slice
/// boundary at `end_col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Straddle {
    /// Drop a cluster that would straddle the boundary entirely.
    Strict,
    /// Keep the straddling cluster even though it overshoots by one column.
    Lenient,
}

/// `slice_with_width`'s text paired with the actual number of visible
/// columns it occupies (may be less than the requested `width` if the
/// line is shorter, or if `Straddle::Lenient` overshoots by one cluster).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceResult {
    pub text: String,
    pub width: usize,
}

/// Slice `line` to the visible-column range `[start_col, start_col+width)`,
/// re-emitting whatever ANSI styling was active at `start_col` so the
/// result renders correctly standalone, also returning the slice's actual
/// rendered width.
pub fn slice_with_width_info(line: &str, start_col: usize, width: usize, straddle: Straddle) -> SliceResult {
    if width == 0 {
        return SliceResult { text: String::new(), width: 0 };
    }
    let end_col = start_col + width;
    let clusters = clusters(line);
    let mut out = String::new();
    let mut out_width = 0usize;
    let mut col = 0usize;
    let mut wrote_prefix = false;
    for c in &clusters {
        if col >= end_col {
            break;
        }
        let next_col = col + c.width;
        if next_col <= start_col {
            col = next_col;
            continue;
        }
        if col < start_col {
            // Cluster straddles the left boundary: drop it, matching
            // `Straddle::Strict` for both modes since partial clusters
            // can't render partially.
            col = next_col;
            continue;
        }
        if next_col > end_col {
            match straddle {
                Straddle::Strict => {
                    col = next_col;
                    continue;
                }
                Straddle::Lenient => {
                    // fall through: keep it even though it overshoots.
                }
            }
        }
        if !wrote_prefix {
            out.push_str(&c.codes_before);
            wrote_prefix = true;
        }
        out.push_str(c.text);
        out_width += c.width;
        col = next_col;
    }
    SliceResult { text: out, width: out_width }
}

/// Slice `line` to the visible-column range `[start_col, start_col+width)`,
/// discarding the actual-width bookkeeping `slice_with_width_info` provides.
pub fn slice_with_width(line: &str, start_col: usize, width: usize, straddle: Straddle) -> String {
    slice_with_width_info(line, start_col, width, straddle).text
}

/// Split `line` into a `before` segment (columns `[0, before_end)`) and an
/// `after` segment (columns `[after_start, after_start+after_len)`),
/// skipping the gap between them. Used to composite an overlay into an
/// already-rendered line: the caller keeps `before`/`after` and paints its
/// own content into the gap. Each segment carries the ANSI codes active at
/// its own start, not the base line's start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeforeAfter {
    pub before: String,
    pub before_width: usize,
    pub after: String,
    pub after_width: usize,
}

pub fn extract_before_after(
    line: &str,
    before_end: usize,
    after_start: usize,
    after_len: usize,
    strict_after: bool,
) -> BeforeAfter {
    let after_end = after_start + after_len;
    let clusters = clusters(line);
    let mut before = String::new();
    let mut before_width = 0usize;
    let mut after = String::new();
    let mut after_width = 0usize;
    let mut after_started = false;
    let mut col = 0usize;

    for c in &clusters {
        let next_col = col + c.width;
        if col < before_end {
            before.push_str(c.text);
            before_width += c.width;
        } else if after_len > 0 && (after_start..after_end).contains(&col) {
            let fits = !strict_after || next_col <= after_end;
            if fits {
                if !after_started {
                    after.push_str(&c.codes_before);
                    after_started = true;
                }
                after.push_str(c.text);
                after_width += c.width;
            }
        }
        col = next_col;
        if after_len <= 0 {
            if col >= before_end {
                break;
            }
        } else if col >= after_end {
            break;
        }
    }

    BeforeAfter { before, before_width, after, after_width }
}

/// A fragment of `extract_segments`' output: plain text (no escapes) paired
/// with the ANSI codes active immediately before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub codes_before: String,
    pub text: String,
}

/// Split `line` into `[before, inside, after]` segments at the visible
/// column range `[start_col, start_col+width)`, each carrying the ANSI
/// state active at its start. Used to composite an overlay: the renderer
/// keeps `before`/`after` and substitutes its own content for `inside`.
pub fn extract_segments(line: &str, start_col: usize, width: usize) -> [Segment; 3] {
    let end_col = start_col + width;
    let clusters = clusters(line);
    let mut before = String::new();
    let mut inside = String::new();
    let mut after = String::new();
    let mut before_codes = String::new();
    let mut inside_codes = String::new();
    let mut after_codes = String::new();
    let mut col = 0usize;
    for c in &clusters {
        let next_col = col + c.width;
        if col < start_col {
            if before.is_empty() {
                before_codes = c.codes_before.clone();
            }
            before.push_str(c.text);
        } else if col < end_col {
            if inside.is_empty() {
                inside_codes = c.codes_before.clone();
            }
            inside.push_str(c.text);
        } else {
            if after.is_empty() {
                after_codes = c.codes_before.clone();
            }
            after.push_str(c.text);
        }
        col = next_col;
    }
    [
        Segment { codes_before: before_codes, text: before },
        Segment { codes_before: inside_codes, text: inside },
        Segment { codes_before: after_codes, text: after },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_plain_text() {
        assert_eq!(slice_with_width("hello world", 6, 5, Straddle::Strict), "world");
    }

    #[test]
    fn slice_reemits_active_ansi() {
        let s = slice_with_width("\x1b[1mhello world", 6, 5, Straddle::Strict);
        assert!(s.starts_with("\x1b[1m"));
        assert!(s.ends_with("world"));
    }

    #[test]
    fn strict_drops_straddling_wide_cluster() {
        // "中" is width 2; slicing [0,1) should drop it under strict mode.
        assert_eq!(slice_with_width("中x", 0, 1, Straddle::Strict), "");
    }

    #[test]
    fn lenient_keeps_straddling_wide_cluster() {
        assert_eq!(slice_with_width("中x", 0, 1, Straddle::Lenient), "中");
    }

    #[test]
    fn extract_segments_splits_three_ways() {
        let [before, inside, after] = extract_segments("hello world foo", 6, 5);
        assert_eq!(before.text, "hello ");
        assert_eq!(inside.text, "world");
        assert_eq!(after.text, " foo");
    }

    #[test]
    fn before_after_skips_the_gap() {
        let ba = extract_before_after("hello world foo", 6, 11, 4, true);
        assert_eq!(ba.before, "hello ");
        assert_eq!(ba.before_width, 6);
        assert_eq!(ba.after, " foo");
        assert_eq!(ba.after_width, 4);
    }

    #[test]
    fn slice_with_width_info_reports_actual_width() {
        let r = slice_with_width_info("hi", 0, 10, Straddle::Strict);
        assert_eq!(r.text, "hi");
        assert_eq!(r.width, 2);
    }
}
