//! Buffers raw terminal input into complete escape sequences, with
//! bracketed-paste framing split out into its own event stream.
//!
//! This type is intentionally synchronous: it has no notion of time. The
//! caller (an async event loop) owns the "flush after N ms of silence"
//! timer and calls [`StdinBuffer::flush`] when it fires. `process` reports
//! whether a flush timer should be (re)armed via [`Emitted::pending`].

const BRACKETED_PASTE_START: &str = "\x1b[200~";
const BRACKETED_PASTE_END: &str = "\x1b[201~";
const ESC: char = '\x1b';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completeness {
    Complete,
    Incomplete,
    NotEscape,
}

fn is_complete_csi(data: &[char]) -> Completeness {
    if data.first() != Some(&ESC) || data.get(1) != Some(&'[') {
        return Completeness::Complete;
    }
    if data.len() < 3 {
        return Completeness::Incomplete;
    }
    let payload = &data[2..];
    let last = *payload.last().unwrap();
    let code = last as u32;
    if (0x40..=0x7e).contains(&code) {
        if payload.first() == Some(&'<') {
            let s: String = payload.iter().collect();
            if is_mouse_sgr_complete(&s) {
                return Completeness::Complete;
            }
            if last == 'M' || last == 'm' {
                let inner = &s[1..s.len() - 1];
                let parts: Vec<&str> = inner.split(';').collect();
                if parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
                    return Completeness::Complete;
                }
            }
            return Completeness::Incomplete;
        }
        return Completeness::Complete;
    }
    Completeness::Incomplete
}

/// `^<\d+;\d+;\d+[Mm]$`
fn is_mouse_sgr_complete(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('<') else { return false };
    let Some(last) = rest.chars().last() else { return false };
    if last != 'M' && last != 'm' {
        return false;
    }
    let body = &rest[..rest.len() - last.len_utf8()];
    let parts: Vec<&str> = body.split(';').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn is_complete_sequence(data: &[char]) -> Completeness {
    if data.first() != Some(&ESC) {
        return Completeness::NotEscape;
    }
    if data.len() == 1 {
        return Completeness::Incomplete;
    }
    let after = &data[1..];
    match after[0] {
        '[' => {
            if after.len() >= 2 && after[1] == 'M' {
                return if data.len() >= 6 {
                    Completeness::Complete
                } else {
                    Completeness::Incomplete
                };
            }
            is_complete_csi(data)
        }
        ']' => {
            if ends_with_st_or_bel(data) {
                Completeness::Complete
            } else {
                Completeness::Incomplete
            }
        }
        'P' | '_' => {
            if ends_with_st(data) {
                Completeness::Complete
            } else {
                Completeness::Incomplete
            }
        }
        'O' => {
            if after.len() >= 2 {
                Completeness::Complete
            } else {
                Completeness::Incomplete
            }
        }
        _ => Completeness::Complete,
    }
}

fn ends_with_st(data: &[char]) -> bool {
    data.len() >= 2 && data[data.len() - 2] == ESC && data[data.len() - 1] == '\\'
}

fn ends_with_st_or_bel(data: &[char]) -> bool {
    ends_with_st(data) || data.last() == Some(&'\x07')
}

/// Split `buffer` into complete terminal sequences, returning
/// `(sequences, remainder)` where `remainder` is a possibly-incomplete
/// trailing escape sequence still awaiting more bytes.
fn extract_complete_sequences(buffer: &[char]) -> (Vec<String>, String) {
    let mut sequences = Vec::new();
    let mut pos = 0;
    while pos < buffer.len() {
        let remaining = &buffer[pos..];
        if remaining[0] == ESC {
            let mut seq_end = 1;
            loop {
                if seq_end > remaining.len() {
                    return (sequences, remaining.iter().collect());
                }
                let candidate = &remaining[..seq_end];
                match is_complete_sequence(candidate) {
                    Completeness::Complete => {
                        sequences.push(candidate.iter().collect());
                        pos += seq_end;
                        break;
                    }
                    Completeness::Incomplete => {
                        seq_end += 1;
                    }
                    Completeness::NotEscape => {
                        sequences.push(candidate.iter().collect());
                        pos += seq_end;
                        break;
                    }
                }
            }
        } else {
            sequences.push(remaining[0].to_string());
            pos += 1;
        }
    }
    (sequences, String::new())
}

/// Output of a single [`StdinBuffer::process`] or [`StdinBuffer::flush`]
/// call: complete data sequences, complete pasted blocks, and whether an
/// incomplete escape sequence is now buffered (the caller should arm its
/// flush timer if so, and disarm it otherwise).
#[derive(Debug, Default)]
pub struct Emitted {
    pub data: Vec<String>,
    pub paste: Vec<String>,
    pub pending: bool,
}

/// Buffers stdin input and extracts complete sequences, handling bracketed
/// paste mode and escape sequences split across multiple reads.
#[derive(Debug, Default)]
pub struct StdinBuffer {
    buffer: String,
    paste_mode: bool,
    paste_buffer: String,
}

impl StdinBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of input (already UTF-8 decoded) into the buffer.
    pub fn process(&mut self, data: &str) -> Emitted {
        let mut out = Emitted::default();
        if data.is_empty() && self.buffer.is_empty() {
            return out;
        }
        self.buffer.push_str(data);
        self.process_buffered(&mut out);
        out
    }

    fn process_buffered(&mut self, out: &mut Emitted) {
        if self.paste_mode {
            self.paste_buffer.push_str(&std::mem::take(&mut self.buffer));
            if let Some(end_idx) = self.paste_buffer.find(BRACKETED_PASTE_END) {
                let pasted = self.paste_buffer[..end_idx].to_string();
                let remaining = self.paste_buffer[end_idx + BRACKETED_PASTE_END.len()..].to_string();
                self.paste_mode = false;
                self.paste_buffer.clear();
                out.paste.push(pasted);
                if !remaining.is_empty() {
                    self.buffer = remaining;
                    self.process_buffered(out);
                }
            }
            return;
        }

        if let Some(start_idx) = self.buffer.find(BRACKETED_PASTE_START) {
            if start_idx > 0 {
                let before: Vec<char> = self.buffer[..start_idx].chars().collect();
                let (seqs, _) = extract_complete_sequences(&before);
                out.data.extend(seqs);
            }
            let rest = self.buffer[start_idx + BRACKETED_PASTE_START.len()..].to_string();
            self.buffer.clear();
            self.paste_mode = true;
            self.paste_buffer = rest;

            if let Some(end_idx) = self.paste_buffer.find(BRACKETED_PASTE_END) {
                let pasted = self.paste_buffer[..end_idx].to_string();
                let remaining = self.paste_buffer[end_idx + BRACKETED_PASTE_END.len()..].to_string();
                self.paste_mode = false;
                self.paste_buffer.clear();
                out.paste.push(pasted);
                if !remaining.is_empty() {
                    self.buffer = remaining;
                    self.process_buffered(out);
                }
            }
            return;
        }

        let chars: Vec<char> = self.buffer.chars().collect();
        let (seqs, remainder) = extract_complete_sequences(&chars);
        self.buffer = remainder;
        out.data.extend(seqs);
        out.pending = !self.buffer.is_empty();
    }

    /// Force-flush any buffered partial sequence (called when the caller's
    /// incomplete-sequence timer fires).
    pub fn flush(&mut self) -> Vec<String> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        vec![std::mem::take(&mut self.buffer)]
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.paste_mode = false;
        self.paste_buffer.clear();
    }

    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_passes_through_immediately() {
        let mut buf = StdinBuffer::new();
        let out = buf.process("ab");
        assert_eq!(out.data, vec!["a".to_string(), "b".to_string()]);
        assert!(!out.pending);
    }

    #[test]
    fn complete_csi_sequence_emitted_whole() {
        let mut buf = StdinBuffer::new();
        let out = buf.process("\x1b[A");
        assert_eq!(out.data, vec!["\x1b[A".to_string()]);
    }

    #[test]
    fn incomplete_csi_sequence_is_pending() {
        let mut buf = StdinBuffer::new();
        let out = buf.process("\x1b[");
        assert!(out.data.is_empty());
        assert!(out.pending);
        let flushed = buf.flush();
        assert_eq!(flushed, vec!["\x1b[".to_string()]);
    }

    #[test]
    fn split_escape_sequence_completes_on_next_chunk() {
        let mut buf = StdinBuffer::new();
        let out1 = buf.process("\x1b[3");
        assert!(out1.pending);
        let out2 = buf.process("~");
        assert_eq!(out2.data, vec!["\x1b[3~".to_string()]);
    }

    #[test]
    fn bracketed_paste_is_captured_as_one_block() {
        let mut buf = StdinBuffer::new();
        let out = buf.process("\x1b[200~hello world\x1b[201~");
        assert_eq!(out.paste, vec!["hello world".to_string()]);
        assert!(out.data.is_empty());
    }

    #[test]
    fn paste_split_across_chunks() {
        let mut buf = StdinBuffer::new();
        let out1 = buf.process("\x1b[200~hel");
        assert!(out1.paste.is_empty());
        let out2 = buf.process("lo\x1b[201~");
        assert_eq!(out2.paste, vec!["hello".to_string()]);
    }

    #[test]
    fn data_before_paste_start_is_flushed_first() {
        let mut buf = StdinBuffer::new();
        let out = buf.process("x\x1b[200~y\x1b[201~");
        assert_eq!(out.data, vec!["x".to_string()]);
        assert_eq!(out.paste, vec!["y".to_string()]);
    }
}
