//! Visible-column width calculation: grapheme-cluster aware, ANSI-stripped,
//! with a small bounded cache since the renderer recomputes widths for the
//! same short strings (cell labels, prompt glyphs) on almost every frame.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::ansi::strip_ansi;

const WIDTH_CACHE_SIZE: usize = 512;

static WIDTH_CACHE: Mutex<Option<LruCache<String, usize>>> = Mutex::new(None);

fn with_cache<R>(f: impl FnOnce(&mut LruCache<String, usize>) -> R) -> R {
    let mut guard = WIDTH_CACHE.lock().unwrap();
    let cache = guard.get_or_insert_with(|| LruCache::new(NonZeroUsize::new(WIDTH_CACHE_SIZE).unwrap()));
    f(cache)
}

/// Codepoint ranges that read as emoji-ish even as a single codepoint,
/// mirroring the reference's `_could_be_emoji` heuristic.
fn could_be_emoji(cp: u32, grapheme: &str) -> bool {
    let in_emoji_range = (0x1f000..=0x1fbff).contains(&cp)
        || (0x2300..=0x23ff).contains(&cp)
        || (0x2600..=0x27bf).contains(&cp)
        || (0x2b50..=0x2b55).contains(&cp);
    in_emoji_range || grapheme.contains('\u{fe0f}') || grapheme.chars().count() > 2
}

fn is_zero_width_char(c: char) -> bool {
    // Rough category check without a unicode-properties dependency: the
    // combining-mark, format, and control ranges that matter in practice.
    matches!(c,
        '\u{0300}'..='\u{036f}' // combining diacritical marks
        | '\u{200b}'..='\u{200f}' // zero-width space/joiners/marks
        | '\u{202a}'..='\u{202e}' // bidi controls
        | '\u{2060}'..='\u{2064}'
        | '\u{fe00}'..='\u{fe0f}' // variation selectors
        | '\u{feff}' // BOM / zero-width no-break space
    ) || c.is_control()
}

fn east_asian_wide_fallback(cp: u32) -> bool {
    matches!(cp,
        0x1100..=0x115f
        | 0x2e80..=0x303e
        | 0x3041..=0x33ff
        | 0x3400..=0x4dbf
        | 0x4e00..=0x9fff
        | 0xa000..=0xa4cf
        | 0xac00..=0xd7a3
        | 0xf900..=0xfaff
        | 0xfe30..=0xfe4f
        | 0xff00..=0xff60
        | 0xffe0..=0xffe6
        | 0x20000..=0x3fffd
    )
}

fn grapheme_width(g: &str) -> usize {
    if g.chars().all(is_zero_width_char) {
        return 0;
    }
    let mut chars = g.chars();
    let first = chars.next().unwrap_or('\0');
    let cp = first as u32;
    let multi_codepoint = g.chars().count() > 1;
    if multi_codepoint && could_be_emoji(cp, g) {
        return 2;
    }
    match UnicodeWidthStr::width(g) {
        0 => 0,
        2 => 2,
        w if could_be_emoji(cp, g) && (0x1f000..=0x1fbff).contains(&cp) => {
            let _ = w;
            2
        }
        w => {
            if east_asian_wide_fallback(cp) {
                2
            } else {
                w
            }
        }
    }
}

fn is_ascii_printable(s: &str) -> bool {
    s.bytes().all(|b| (0x20..0x7f).contains(&b))
}

/// Visible column width of `s`: ANSI escapes are stripped, tabs expand to 3
/// columns, and remaining text is measured grapheme-cluster by
/// grapheme-cluster so multi-codepoint emoji and combining marks count once.
pub fn visible_width(s: &str) -> usize {
    if is_ascii_printable(s) {
        return s.len();
    }
    if let Some(w) = with_cache(|c| c.get(s).copied()) {
        return w;
    }
    let stripped = strip_ansi(s);
    let normalized = stripped.replace('\t', "   ");
    let width: usize = normalized
        .graphemes(true)
        .map(grapheme_width)
        .sum();
    with_cache(|c| c.put(s.to_string(), width));
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_fast_path() {
        assert_eq!(visible_width("hello world"), 11);
    }

    #[test]
    fn strips_ansi_before_measuring() {
        assert_eq!(visible_width("\x1b[1mhello\x1b[0m"), 5);
    }

    #[test]
    fn tabs_expand_to_three_columns() {
        assert_eq!(visible_width("a\tb"), 5);
    }

    #[test]
    fn combining_marks_are_zero_width() {
        // "e" + combining acute accent
        assert_eq!(visible_width("e\u{0301}"), 1);
    }

    #[test]
    fn wide_cjk_char_counts_as_two() {
        assert_eq!(visible_width("中"), 2);
    }

    #[test]
    fn cache_reuses_result() {
        let s = "héllo \u{1f600}";
        let first = visible_width(s);
        let second = visible_width(s);
        assert_eq!(first, second);
    }
}
