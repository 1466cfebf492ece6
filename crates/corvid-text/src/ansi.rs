//! ANSI escape sequence detection and SGR (Select Graphic Rendition) state
//! tracking, so wrapping/slicing can carry active styling across breaks.

/// Is `bytes[i..]` the start of a CSI sequence (`ESC [ ... final-byte`)?
/// Returns the index just past the sequence if so.
fn match_csi(s: &[u8], i: usize) -> Option<usize> {
    if s.get(i) != Some(&0x1b) || s.get(i + 1) != Some(&b'[') {
        return None;
    }
    let mut j = i + 2;
    while j < s.len() {
        let b = s[j];
        if (0x40..=0x7e).contains(&b) {
            return Some(j + 1);
        }
        j += 1;
    }
    None
}

/// OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`) or APC (`ESC _ ... BEL` or
/// `ESC _ ... ESC \`).
fn match_osc_or_apc(s: &[u8], i: usize) -> Option<usize> {
    if s.get(i) != Some(&0x1b) {
        return None;
    }
    let kind = *s.get(i + 1)?;
    if kind != b']' && kind != b'_' {
        return None;
    }
    let mut j = i + 2;
    while j < s.len() {
        if s[j] == 0x07 {
            return Some(j + 1);
        }
        if s[j] == 0x1b && s.get(j + 1) == Some(&b'\\') {
            return Some(j + 2);
        }
        j += 1;
    }
    None
}

/// Match any recognized ANSI escape sequence starting at `i`. Returns the
/// end index (exclusive) if one is found.
pub fn match_escape(s: &[u8], i: usize) -> Option<usize> {
    match_csi(s, i).or_else(|| match_osc_or_apc(s, i))
}

/// Strip all CSI/OSC/APC escape sequences from `s`, returning plain text.
pub fn strip_ansi(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if let Some(end) = match_escape(bytes, i) {
            i = end;
            continue;
        }
        // Safe: we only skip over well-formed escape sequences above, so
        // remaining boundaries stay on UTF-8 char boundaries.
        let ch_len = utf8_char_len(bytes[i]);
        out.push_str(&s[i..i + ch_len]);
        i += ch_len;
    }
    out
}

fn utf8_char_len(b: u8) -> usize {
    if b & 0x80 == 0 {
        1
    } else if b & 0xe0 == 0xc0 {
        2
    } else if b & 0xf0 == 0xe0 {
        3
    } else if b & 0xf8 == 0xf0 {
        4
    } else {
        1
    }
}

/// A basic 8/16/256/truecolor ANSI color value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

/// Tracks the currently active SGR (`ESC[...m`) state across a stream of
/// text, so a line that's hard-broken mid-style can carry the style onto
/// the next line, and so overlay compositing can restore the style that was
/// active before an overlay replaced part of a line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnsiTracker {
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub inverse: bool,
    pub hidden: bool,
    pub strikethrough: bool,
    pub fg: Color,
    pub bg: Color,
}

impl AnsiTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Feed a chunk of text through the tracker, updating state for every
    /// SGR sequence found. Non-SGR escapes (cursor movement, OSC, APC) are
    /// ignored for style purposes but still recognized as escapes by the
    /// caller via [`match_escape`].
    pub fn consume(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'[') {
                if let Some(end) = match_csi(bytes, i) {
                    if bytes[end - 1] == b'm' {
                        let params = &s[i + 2..end - 1];
                        self.apply_sgr(params);
                    }
                    i = end;
                    continue;
                }
            }
            i += 1;
        }
    }

    fn apply_sgr(&mut self, params: &str) {
        if params.is_empty() {
            *self = Self::default();
            return;
        }
        let codes: Vec<&str> = params.split(';').collect();
        let mut idx = 0;
        while idx < codes.len() {
            let code: i32 = codes[idx].parse().unwrap_or(0);
            match code {
                0 => *self = Self::default(),
                1 => self.bold = true,
                2 => self.dim = true,
                3 => self.italic = true,
                4 => self.underline = true,
                5 => self.blink = true,
                7 => self.inverse = true,
                8 => self.hidden = true,
                9 => self.strikethrough = true,
                21 | 22 => {
                    self.bold = false;
                    self.dim = false;
                }
                23 => self.italic = false,
                24 => self.underline = false,
                25 => self.blink = false,
                27 => self.inverse = false,
                28 => self.hidden = false,
                29 => self.strikethrough = false,
                30..=37 => self.fg = Color::Indexed((code - 30) as u8),
                38 => {
                    idx = self.parse_extended_color(&codes, idx, true);
                    continue;
                }
                39 => self.fg = Color::Default,
                40..=47 => self.bg = Color::Indexed((code - 40) as u8),
                48 => {
                    idx = self.parse_extended_color(&codes, idx, false);
                    continue;
                }
                49 => self.bg = Color::Default,
                90..=97 => self.fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => self.bg = Color::Indexed((code - 100 + 8) as u8),
                _ => {}
            }
            idx += 1;
        }
    }

    /// Parse `38;5;N` / `38;2;R;G;B` (or `48;...` for background) starting
    /// at `idx` (the index of the `38`/`48` code itself). Returns the index
    /// just past the consumed codes.
    fn parse_extended_color(&mut self, codes: &[&str], idx: usize, foreground: bool) -> usize {
        let Some(mode) = codes.get(idx + 1).and_then(|c| c.parse::<i32>().ok()) else {
            return idx + 1;
        };
        match mode {
            5 => {
                let n = codes
                    .get(idx + 2)
                    .and_then(|c| c.parse::<u8>().ok())
                    .unwrap_or(0);
                let color = Color::Indexed(n);
                if foreground {
                    self.fg = color;
                } else {
                    self.bg = color;
                }
                idx + 3
            }
            2 => {
                let r = codes
                    .get(idx + 2)
                    .and_then(|c| c.parse::<u8>().ok())
                    .unwrap_or(0);
                let g = codes
                    .get(idx + 3)
                    .and_then(|c| c.parse::<u8>().ok())
                    .unwrap_or(0);
                let b = codes
                    .get(idx + 4)
                    .and_then(|c| c.parse::<u8>().ok())
                    .unwrap_or(0);
                let color = Color::Rgb(r, g, b);
                if foreground {
                    self.fg = color;
                } else {
                    self.bg = color;
                }
                idx + 5
            }
            _ => idx + 2,
        }
    }

    /// Render the SGR escape sequence that reproduces the current state.
    /// Empty string if nothing is active.
    pub fn get_active_codes(&self) -> String {
        let mut codes = Vec::new();
        if self.bold {
            codes.push("1".to_string());
        }
        if self.dim {
            codes.push("2".to_string());
        }
        if self.italic {
            codes.push("3".to_string());
        }
        if self.underline {
            codes.push("4".to_string());
        }
        if self.blink {
            codes.push("5".to_string());
        }
        if self.inverse {
            codes.push("7".to_string());
        }
        if self.hidden {
            codes.push("8".to_string());
        }
        if self.strikethrough {
            codes.push("9".to_string());
        }
        match self.fg {
            Color::Default => {}
            Color::Indexed(n) if n < 8 => codes.push(format!("{}", 30 + n)),
            Color::Indexed(n) => codes.push(format!("38;5;{n}")),
            Color::Rgb(r, g, b) => codes.push(format!("38;2;{r};{g};{b}")),
        }
        match self.bg {
            Color::Default => {}
            Color::Indexed(n) if n < 8 => codes.push(format!("{}", 40 + n)),
            Color::Indexed(n) => codes.push(format!("48;5;{n}")),
            Color::Rgb(r, g, b) => codes.push(format!("48;2;{r};{g};{b}")),
        }
        if codes.is_empty() {
            String::new()
        } else {
            format!("\x1b[{}m", codes.join(";"))
        }
    }

    /// A reset sequence to place at the end of a line so trailing styling
    /// (most importantly underline) never bleeds into padding some
    /// terminals render past the last written column.
    pub fn get_line_end_reset(&self) -> String {
        if self.underline {
            "\x1b[24m".to_string()
        } else {
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_csi_and_osc() {
        let s = "\x1b[1mhello\x1b[0m \x1b]0;title\x07world";
        assert_eq!(strip_ansi(s), "hello world");
    }

    #[test]
    fn tracker_tracks_bold_and_reset() {
        let mut t = AnsiTracker::new();
        t.consume("\x1b[1m");
        assert!(t.bold);
        t.consume("\x1b[0m");
        assert!(t.is_default());
    }

    #[test]
    fn tracker_get_active_codes_roundtrips_bold() {
        let mut t = AnsiTracker::new();
        t.consume("\x1b[1;31m");
        assert_eq!(t.get_active_codes(), "\x1b[1;31m");
    }

    #[test]
    fn line_end_reset_only_for_underline() {
        let mut t = AnsiTracker::new();
        assert_eq!(t.get_line_end_reset(), "");
        t.consume("\x1b[4m");
        assert_eq!(t.get_line_end_reset(), "\x1b[24m");
    }
}
