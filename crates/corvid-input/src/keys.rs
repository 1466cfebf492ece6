//! Keyboard input decoding: legacy terminal escape sequences and the Kitty
//! keyboard protocol (<https://sw.kovidgoyal.net/kitty/keyboard-protocol/>).
//!
//! Two entry points mirror the two ways a caller wants to use this: test
//! raw input against a specific key identifier (`ctrl+c`, `shift+tab`, ...)
//! via [`matches_key`], or decode raw input into a key identifier via
//! [`parse_key`] for dispatch tables and logging.

use std::sync::atomic::{AtomicBool, Ordering};

static KITTY_PROTOCOL_ACTIVE: AtomicBool = AtomicBool::new(false);

pub fn set_kitty_protocol_active(active: bool) {
    KITTY_PROTOCOL_ACTIVE.store(active, Ordering::Relaxed);
}

pub fn is_kitty_protocol_active() -> bool {
    KITTY_PROTOCOL_ACTIVE.load(Ordering::Relaxed)
}

const SYMBOL_KEYS: &[char] = &[
    '`', '-', '=', '[', ']', '\\', ';', '\'', ',', '.', '/', '!', '@', '#', '$', '%', '^', '&',
    '*', '(', ')', '_', '+', '|', '~', '{', '}', ':', '<', '>', '?',
];

fn is_symbol_key(c: char) -> bool {
    SYMBOL_KEYS.contains(&c)
}

const MOD_SHIFT: u32 = 1;
const MOD_ALT: u32 = 2;
const MOD_CTRL: u32 = 4;
const LOCK_MASK: u32 = 64 + 128;

const CP_ESCAPE: i64 = 27;
const CP_TAB: i64 = 9;
const CP_ENTER: i64 = 13;
const CP_SPACE: i64 = 32;
const CP_BACKSPACE: i64 = 127;
const CP_KP_ENTER: i64 = 57414;

const CP_UP: i64 = -1;
const CP_DOWN: i64 = -2;
const CP_RIGHT: i64 = -3;
const CP_LEFT: i64 = -4;

const CP_DELETE: i64 = -10;
const CP_INSERT: i64 = -11;
const CP_PAGE_UP: i64 = -12;
const CP_PAGE_DOWN: i64 = -13;
const CP_HOME: i64 = -14;
const CP_END: i64 = -15;

fn legacy_key_seqs(key: &str) -> &'static [&'static str] {
    match key {
        "up" => &["\x1b[A", "\x1bOA"],
        "down" => &["\x1b[B", "\x1bOB"],
        "right" => &["\x1b[C", "\x1bOC"],
        "left" => &["\x1b[D", "\x1bOD"],
        "home" => &["\x1b[H", "\x1bOH", "\x1b[1~", "\x1b[7~"],
        "end" => &["\x1b[F", "\x1bOF", "\x1b[4~", "\x1b[8~"],
        "insert" => &["\x1b[2~"],
        "delete" => &["\x1b[3~"],
        "pageUp" => &["\x1b[5~", "\x1b[[5~"],
        "pageDown" => &["\x1b[6~", "\x1b[[6~"],
        "clear" => &["\x1b[E", "\x1bOE"],
        "f1" => &["\x1bOP", "\x1b[11~", "\x1b[[A"],
        "f2" => &["\x1bOQ", "\x1b[12~", "\x1b[[B"],
        "f3" => &["\x1bOR", "\x1b[13~", "\x1b[[C"],
        "f4" => &["\x1bOS", "\x1b[14~", "\x1b[[D"],
        "f5" => &["\x1b[15~", "\x1b[[E"],
        "f6" => &["\x1b[17~"],
        "f7" => &["\x1b[18~"],
        "f8" => &["\x1b[19~"],
        "f9" => &["\x1b[20~"],
        "f10" => &["\x1b[21~"],
        "f11" => &["\x1b[23~"],
        "f12" => &["\x1b[24~"],
        _ => &[],
    }
}

fn legacy_shift_seqs(key: &str) -> &'static [&'static str] {
    match key {
        "up" => &["\x1b[a"],
        "down" => &["\x1b[b"],
        "right" => &["\x1b[c"],
        "left" => &["\x1b[d"],
        "clear" => &["\x1b[e"],
        "insert" => &["\x1b[2$"],
        "delete" => &["\x1b[3$"],
        "pageUp" => &["\x1b[5$"],
        "pageDown" => &["\x1b[6$"],
        "home" => &["\x1b[7$"],
        "end" => &["\x1b[8$"],
        _ => &[],
    }
}

fn legacy_ctrl_seqs(key: &str) -> &'static [&'static str] {
    match key {
        "up" => &["\x1bOa"],
        "down" => &["\x1bOb"],
        "right" => &["\x1bOc"],
        "left" => &["\x1bOd"],
        "clear" => &["\x1bOe"],
        "insert" => &["\x1b[2^"],
        "delete" => &["\x1b[3^"],
        "pageUp" => &["\x1b[5^"],
        "pageDown" => &["\x1b[6^"],
        "home" => &["\x1b[7^"],
        "end" => &["\x1b[8^"],
        _ => &[],
    }
}

fn legacy_seq_key_id(data: &str) -> Option<&'static str> {
    Some(match data {
        "\x1bOA" => "up",
        "\x1bOB" => "down",
        "\x1bOC" => "right",
        "\x1bOD" => "left",
        "\x1bOH" => "home",
        "\x1bOF" => "end",
        "\x1b[E" => "clear",
        "\x1bOE" => "clear",
        "\x1bOe" => "ctrl+clear",
        "\x1b[e" => "shift+clear",
        "\x1b[2~" => "insert",
        "\x1b[2$" => "shift+insert",
        "\x1b[2^" => "ctrl+insert",
        "\x1b[3$" => "shift+delete",
        "\x1b[3^" => "ctrl+delete",
        "\x1b[[5~" => "pageUp",
        "\x1b[[6~" => "pageDown",
        "\x1b[a" => "shift+up",
        "\x1b[b" => "shift+down",
        "\x1b[c" => "shift+right",
        "\x1b[d" => "shift+left",
        "\x1bOa" => "ctrl+up",
        "\x1bOb" => "ctrl+down",
        "\x1bOc" => "ctrl+right",
        "\x1bOd" => "ctrl+left",
        "\x1b[5$" => "shift+pageUp",
        "\x1b[6$" => "shift+pageDown",
        "\x1b[7$" => "shift+home",
        "\x1b[8$" => "shift+end",
        "\x1b[5^" => "ctrl+pageUp",
        "\x1b[6^" => "ctrl+pageDown",
        "\x1b[7^" => "ctrl+home",
        "\x1b[8^" => "ctrl+end",
        "\x1bOP" => "f1",
        "\x1bOQ" => "f2",
        "\x1bOR" => "f3",
        "\x1bOS" => "f4",
        "\x1b[11~" => "f1",
        "\x1b[12~" => "f2",
        "\x1b[13~" => "f3",
        "\x1b[14~" => "f4",
        "\x1b[[A" => "f1",
        "\x1b[[B" => "f2",
        "\x1b[[C" => "f3",
        "\x1b[[D" => "f4",
        "\x1b[[E" => "f5",
        "\x1b[15~" => "f5",
        "\x1b[17~" => "f6",
        "\x1b[18~" => "f7",
        "\x1b[19~" => "f8",
        "\x1b[20~" => "f9",
        "\x1b[21~" => "f10",
        "\x1b[23~" => "f11",
        "\x1b[24~" => "f12",
        "\x1bb" => "alt+left",
        "\x1bf" => "alt+right",
        "\x1bp" => "alt+up",
        "\x1bn" => "alt+down",
        _ => return None,
    })
}

const RELEASE_SUFFIXES: &[&str] = &[":3u", ":3~", ":3A", ":3B", ":3C", ":3D", ":3H", ":3F"];
const REPEAT_SUFFIXES: &[&str] = &[":2u", ":2~", ":2A", ":2B", ":2C", ":2D", ":2H", ":2F"];

pub fn is_key_release(data: &str) -> bool {
    if data.contains("\x1b[200~") {
        return false;
    }
    RELEASE_SUFFIXES.iter().any(|s| data.ends_with(s) || data.contains(s))
}

pub fn is_key_repeat(data: &str) -> bool {
    if data.contains("\x1b[200~") {
        return false;
    }
    REPEAT_SUFFIXES.iter().any(|s| data.ends_with(s) || data.contains(s))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventType {
    Press,
    Repeat,
    Release,
}

fn parse_event_type(s: Option<&str>) -> EventType {
    match s.and_then(|s| s.parse::<i64>().ok()) {
        Some(2) => EventType::Repeat,
        Some(3) => EventType::Release,
        _ => EventType::Press,
    }
}

struct ParsedKitty {
    codepoint: i64,
    #[allow(dead_code)]
    shifted_key: Option<i64>,
    base_layout_key: Option<i64>,
    modifier: u32,
    #[allow(dead_code)]
    event_type: EventType,
}

/// Hand-written parser for the handful of Kitty CSI-u shapes this crate
/// cares about, replacing the reference's regex matching.
fn parse_kitty(data: &str) -> Option<ParsedKitty> {
    if let Some(p) = parse_csi_u(data) {
        return Some(p);
    }
    if let Some(p) = parse_arrow_mod(data) {
        return Some(p);
    }
    if let Some(p) = parse_func_mod(data) {
        return Some(p);
    }
    parse_home_end_mod(data)
}

/// `^\x1b\[(\d+)(?::(\d*))?(?::(\d+))?(?:;(\d+))?(?::(\d+))?u$`
fn parse_csi_u(data: &str) -> Option<ParsedKitty> {
    let rest = data.strip_prefix("\x1b[")?;
    let rest = rest.strip_suffix('u')?;
    // Split off an optional `;<modifier>[:<event>]` suffix first.
    let (main, mod_event) = match rest.split_once(';') {
        Some((m, me)) => (m, Some(me)),
        None => (rest, None),
    };
    let mut main_parts = main.split(':');
    let cp: i64 = main_parts.next()?.parse().ok()?;
    let shifted = main_parts.next().filter(|s| !s.is_empty()).and_then(|s| s.parse().ok());
    let base = main_parts.next().and_then(|s| s.parse().ok());

    let (mod_val, event_str) = match mod_event {
        Some(me) => {
            let mut it = me.split(':');
            let m: i64 = it.next()?.parse().ok()?;
            (m, it.next())
        }
        None => (1, None),
    };
    Some(ParsedKitty {
        codepoint: cp,
        shifted_key: shifted,
        base_layout_key: base,
        modifier: (mod_val - 1).max(0) as u32,
        event_type: parse_event_type(event_str),
    })
}

/// `^\x1b\[1;(\d+)(?::(\d+))?([ABCD])$`
fn parse_arrow_mod(data: &str) -> Option<ParsedKitty> {
    let rest = data.strip_prefix("\x1b[1;")?;
    let last = rest.chars().last()?;
    if !matches!(last, 'A' | 'B' | 'C' | 'D') {
        return None;
    }
    let body = &rest[..rest.len() - 1];
    let mut it = body.split(':');
    let mod_val: i64 = it.next()?.parse().ok()?;
    let event_str = it.next();
    let cp = match last {
        'A' => CP_UP,
        'B' => CP_DOWN,
        'C' => CP_RIGHT,
        'D' => CP_LEFT,
        _ => unreachable!(),
    };
    Some(ParsedKitty {
        codepoint: cp,
        shifted_key: None,
        base_layout_key: None,
        modifier: (mod_val - 1).max(0) as u32,
        event_type: parse_event_type(event_str),
    })
}

/// `^\x1b\[(\d+)(?:;(\d+))?(?::(\d+))?~$`
fn parse_func_mod(data: &str) -> Option<ParsedKitty> {
    let rest = data.strip_prefix("\x1b[")?;
    let rest = rest.strip_suffix('~')?;
    let (main, mod_event) = match rest.split_once(';') {
        Some((m, me)) => (m, Some(me)),
        None => (rest, None),
    };
    if main.chars().any(|c| !c.is_ascii_digit()) || main.is_empty() {
        return None;
    }
    let key_num: i64 = main.parse().ok()?;
    let (mod_val, event_str) = match mod_event {
        Some(me) => {
            let mut it = me.split(':');
            let m: i64 = it.next()?.parse().ok()?;
            (m, it.next())
        }
        None => (1, None),
    };
    let cp = match key_num {
        2 => CP_INSERT,
        3 => CP_DELETE,
        5 => CP_PAGE_UP,
        6 => CP_PAGE_DOWN,
        7 => CP_HOME,
        8 => CP_END,
        _ => return None,
    };
    Some(ParsedKitty {
        codepoint: cp,
        shifted_key: None,
        base_layout_key: None,
        modifier: (mod_val - 1).max(0) as u32,
        event_type: parse_event_type(event_str),
    })
}

/// `^\x1b\[1;(\d+)(?::(\d+))?([HF])$`
fn parse_home_end_mod(data: &str) -> Option<ParsedKitty> {
    let rest = data.strip_prefix("\x1b[1;")?;
    let last = rest.chars().last()?;
    if last != 'H' && last != 'F' {
        return None;
    }
    let body = &rest[..rest.len() - 1];
    let mut it = body.split(':');
    let mod_val: i64 = it.next()?.parse().ok()?;
    let event_str = it.next();
    Some(ParsedKitty {
        codepoint: if last == 'H' { CP_HOME } else { CP_END },
        shifted_key: None,
        base_layout_key: None,
        modifier: (mod_val - 1).max(0) as u32,
        event_type: parse_event_type(event_str),
    })
}

fn codepoint_to_char(cp: i64) -> Option<char> {
    if cp < 0 {
        return None;
    }
    char::from_u32(cp as u32)
}

fn matches_kitty(data: &str, expected_cp: i64, expected_mod: u32) -> bool {
    let Some(parsed) = parse_kitty(data) else { return false };
    let actual_mod = parsed.modifier & !LOCK_MASK;
    if actual_mod != (expected_mod & !LOCK_MASK) {
        return false;
    }
    if parsed.codepoint == expected_cp {
        return true;
    }
    if parsed.base_layout_key == Some(expected_cp) {
        let cp = parsed.codepoint;
        let is_latin = (97..=122).contains(&cp);
        let is_known_sym = codepoint_to_char(cp).map(is_symbol_key).unwrap_or(false);
        if !is_latin && !is_known_sym {
            return true;
        }
    }
    false
}

/// `^\x1b\[27;(\d+);(\d+)~$`
fn matches_modify_other_keys(data: &str, expected_keycode: i64, expected_mod: u32) -> bool {
    let Some(rest) = data.strip_prefix("\x1b[27;") else { return false };
    let Some(rest) = rest.strip_suffix('~') else { return false };
    let Some((mod_str, key_str)) = rest.split_once(';') else { return false };
    let (Ok(mod_val), Ok(keycode)) = (mod_str.parse::<i64>(), key_str.parse::<i64>()) else {
        return false;
    };
    keycode == expected_keycode && (mod_val - 1) == expected_mod as i64
}

struct ParsedKeyId {
    key: String,
    ctrl: bool,
    shift: bool,
    alt: bool,
}

fn parse_key_id(key_id: &str) -> Option<ParsedKeyId> {
    let lower = key_id.to_lowercase();
    let parts: Vec<&str> = lower.split('+').collect();
    let key = (*parts.last()?).to_string();
    if key.is_empty() {
        return None;
    }
    Some(ParsedKeyId {
        ctrl: parts.iter().any(|p| *p == "ctrl"),
        shift: parts.iter().any(|p| *p == "shift"),
        alt: parts.iter().any(|p| *p == "alt"),
        key,
    })
}

fn raw_ctrl_char(key: &str) -> Option<char> {
    let ch = key.chars().next()?.to_ascii_lowercase();
    let code = ch as u32;
    if (97..=122).contains(&code) || matches!(ch, '[' | '\\' | ']' | '_') {
        return char::from_u32(code & 0x1f);
    }
    if ch == '-' {
        return Some('\x1f');
    }
    None
}

fn matches_legacy_modifier(data: &str, key_name: &str, modifier: u32) -> bool {
    if modifier == MOD_SHIFT {
        return legacy_shift_seqs(key_name).contains(&data);
    }
    if modifier == MOD_CTRL {
        return legacy_ctrl_seqs(key_name).contains(&data);
    }
    false
}

/// Check whether `data` (raw terminal input) matches the key identifier
/// `key_id` (e.g. `"ctrl+c"`, `"shift+tab"`, `"pageUp"`).
pub fn matches_key(data: &str, key_id: &str) -> bool {
    let Some(ParsedKeyId { key, ctrl, shift, alt }) = parse_key_id(key_id) else {
        return false;
    };

    let mut modifier = 0u32;
    if shift {
        modifier |= MOD_SHIFT;
    }
    if alt {
        modifier |= MOD_ALT;
    }
    if ctrl {
        modifier |= MOD_CTRL;
    }

    match key.as_str() {
        "escape" | "esc" => {
            if modifier != 0 {
                return false;
            }
            data == "\x1b" || matches_kitty(data, CP_ESCAPE, 0)
        }
        "space" => {
            if !is_kitty_protocol_active() {
                if ctrl && !alt && !shift && data == "\x00" {
                    return true;
                }
                if alt && !ctrl && !shift && data == "\x1b " {
                    return true;
                }
            }
            if modifier == 0 {
                return data == " " || matches_kitty(data, CP_SPACE, 0);
            }
            matches_kitty(data, CP_SPACE, modifier)
        }
        "tab" => {
            if shift && !ctrl && !alt {
                return data == "\x1b[Z" || matches_kitty(data, CP_TAB, MOD_SHIFT);
            }
            if modifier == 0 {
                return data == "\t" || matches_kitty(data, CP_TAB, 0);
            }
            matches_kitty(data, CP_TAB, modifier)
        }
        "enter" | "return" => {
            if shift && !ctrl && !alt {
                if matches_kitty(data, CP_ENTER, MOD_SHIFT) || matches_kitty(data, CP_KP_ENTER, MOD_SHIFT) {
                    return true;
                }
                if matches_modify_other_keys(data, CP_ENTER, MOD_SHIFT) {
                    return true;
                }
                return is_kitty_protocol_active() && (data == "\x1b\r" || data == "\n");
            }
            if alt && !ctrl && !shift {
                if matches_kitty(data, CP_ENTER, MOD_ALT) || matches_kitty(data, CP_KP_ENTER, MOD_ALT) {
                    return true;
                }
                if matches_modify_other_keys(data, CP_ENTER, MOD_ALT) {
                    return true;
                }
                return !is_kitty_protocol_active() && data == "\x1b\r";
            }
            if modifier == 0 {
                return data == "\r"
                    || (!is_kitty_protocol_active() && data == "\n")
                    || data == "\x1bOM"
                    || matches_kitty(data, CP_ENTER, 0)
                    || matches_kitty(data, CP_KP_ENTER, 0);
            }
            matches_kitty(data, CP_ENTER, modifier) || matches_kitty(data, CP_KP_ENTER, modifier)
        }
        "backspace" => {
            if alt && !ctrl && !shift {
                if data == "\x1b\x7f" || data == "\x1b\x08" {
                    return true;
                }
                return matches_kitty(data, CP_BACKSPACE, MOD_ALT);
            }
            if modifier == 0 {
                return data == "\x7f" || data == "\x08" || matches_kitty(data, CP_BACKSPACE, 0);
            }
            matches_kitty(data, CP_BACKSPACE, modifier)
        }
        "insert" => {
            if modifier == 0 {
                return legacy_key_seqs("insert").contains(&data) || matches_kitty(data, CP_INSERT, 0);
            }
            if matches_legacy_modifier(data, "insert", modifier) {
                return true;
            }
            matches_kitty(data, CP_INSERT, modifier)
        }
        "delete" => {
            if modifier == 0 {
                return legacy_key_seqs("delete").contains(&data) || matches_kitty(data, CP_DELETE, 0);
            }
            if matches_legacy_modifier(data, "delete", modifier) {
                return true;
            }
            matches_kitty(data, CP_DELETE, modifier)
        }
        "clear" => {
            if modifier == 0 {
                return legacy_key_seqs("clear").contains(&data);
            }
            matches_legacy_modifier(data, "clear", modifier)
        }
        "home" => {
            if modifier == 0 {
                return legacy_key_seqs("home").contains(&data) || matches_kitty(data, CP_HOME, 0);
            }
            if matches_legacy_modifier(data, "home", modifier) {
                return true;
            }
            matches_kitty(data, CP_HOME, modifier)
        }
        "end" => {
            if modifier == 0 {
                return legacy_key_seqs("end").contains(&data) || matches_kitty(data, CP_END, 0);
            }
            if matches_legacy_modifier(data, "end", modifier) {
                return true;
            }
            matches_kitty(data, CP_END, modifier)
        }
        "pageup" => {
            if modifier == 0 {
                return legacy_key_seqs("pageUp").contains(&data) || matches_kitty(data, CP_PAGE_UP, 0);
            }
            if matches_legacy_modifier(data, "pageUp", modifier) {
                return true;
            }
            matches_kitty(data, CP_PAGE_UP, modifier)
        }
        "pagedown" => {
            if modifier == 0 {
                return legacy_key_seqs("pageDown").contains(&data) || matches_kitty(data, CP_PAGE_DOWN, 0);
            }
            if matches_legacy_modifier(data, "pageDown", modifier) {
                return true;
            }
            matches_kitty(data, CP_PAGE_DOWN, modifier)
        }
        "up" => {
            if alt && !ctrl && !shift {
                return data == "\x1bp" || matches_kitty(data, CP_UP, MOD_ALT);
            }
            if modifier == 0 {
                return legacy_key_seqs("up").contains(&data) || matches_kitty(data, CP_UP, 0);
            }
            if matches_legacy_modifier(data, "up", modifier) {
                return true;
            }
            matches_kitty(data, CP_UP, modifier)
        }
        "down" => {
            if alt && !ctrl && !shift {
                return data == "\x1bn" || matches_kitty(data, CP_DOWN, MOD_ALT);
            }
            if modifier == 0 {
                return legacy_key_seqs("down").contains(&data) || matches_kitty(data, CP_DOWN, 0);
            }
            if matches_legacy_modifier(data, "down", modifier) {
                return true;
            }
            matches_kitty(data, CP_DOWN, modifier)
        }
        "left" => {
            if alt && !ctrl && !shift {
                return data == "\x1b[1;3D"
                    || (!is_kitty_protocol_active() && data == "\x1bB")
                    || data == "\x1bb"
                    || matches_kitty(data, CP_LEFT, MOD_ALT);
            }
            if ctrl && !alt && !shift {
                return data == "\x1b[1;5D"
                    || matches_legacy_modifier(data, "left", MOD_CTRL)
                    || matches_kitty(data, CP_LEFT, MOD_CTRL);
            }
            if modifier == 0 {
                return legacy_key_seqs("left").contains(&data) || matches_kitty(data, CP_LEFT, 0);
            }
            if matches_legacy_modifier(data, "left", modifier) {
                return true;
            }
            matches_kitty(data, CP_LEFT, modifier)
        }
        "right" => {
            if alt && !ctrl && !shift {
                return data == "\x1b[1;3C"
                    || (!is_kitty_protocol_active() && data == "\x1bF")
                    || data == "\x1bf"
                    || matches_kitty(data, CP_RIGHT, MOD_ALT);
            }
            if ctrl && !alt && !shift {
                return data == "\x1b[1;5C"
                    || matches_legacy_modifier(data, "right", MOD_CTRL)
                    || matches_kitty(data, CP_RIGHT, MOD_CTRL);
            }
            if modifier == 0 {
                return legacy_key_seqs("right").contains(&data) || matches_kitty(data, CP_RIGHT, 0);
            }
            if matches_legacy_modifier(data, "right", modifier) {
                return true;
            }
            matches_kitty(data, CP_RIGHT, modifier)
        }
        "f1" | "f2" | "f3" | "f4" | "f5" | "f6" | "f7" | "f8" | "f9" | "f10" | "f11" | "f12" => {
            if modifier != 0 {
                return false;
            }
            legacy_key_seqs(&key).contains(&data)
        }
        k if k.chars().count() == 1 => {
            let c = k.chars().next().unwrap();
            if !(('a'..='z').contains(&c) || is_symbol_key(c)) {
                return false;
            }
            let codepoint = c as i64;
            let raw_ctrl = raw_ctrl_char(k);

            if ctrl && alt && !shift && !is_kitty_protocol_active() {
                if let Some(rc) = raw_ctrl {
                    return data == format!("\x1b{rc}");
                }
            }
            if alt && !ctrl && !shift && !is_kitty_protocol_active() && ('a'..='z').contains(&c) {
                if data == format!("\x1b{c}") {
                    return true;
                }
            }
            if ctrl && !shift && !alt {
                if let Some(rc) = raw_ctrl {
                    if data == rc.to_string() {
                        return true;
                    }
                }
                return matches_kitty(data, codepoint, MOD_CTRL);
            }
            if ctrl && shift && !alt {
                return matches_kitty(data, codepoint, MOD_SHIFT + MOD_CTRL);
            }
            if shift && !ctrl && !alt {
                if data == c.to_ascii_uppercase().to_string() {
                    return true;
                }
                return matches_kitty(data, codepoint, MOD_SHIFT);
            }
            if modifier != 0 {
                return matches_kitty(data, codepoint, modifier);
            }
            data == k || matches_kitty(data, codepoint, 0)
        }
        _ => false,
    }
}

/// Decode raw terminal input into a key identifier string (e.g.
/// `"ctrl+c"`), or `None` if it isn't recognized.
pub fn parse_key(data: &str) -> Option<String> {
    if let Some(kitty) = parse_kitty(data) {
        let cp = kitty.codepoint;
        let mod_ = kitty.modifier & !LOCK_MASK;
        let mut mods = Vec::new();
        if mod_ & MOD_SHIFT != 0 {
            mods.push("shift");
        }
        if mod_ & MOD_CTRL != 0 {
            mods.push("ctrl");
        }
        if mod_ & MOD_ALT != 0 {
            mods.push("alt");
        }

        let is_latin = (97..=122).contains(&cp);
        let is_known_sym = codepoint_to_char(cp).map(is_symbol_key).unwrap_or(false);
        let effective_cp = if is_latin || is_known_sym {
            cp
        } else {
            kitty.base_layout_key.unwrap_or(cp)
        };

        let key_name: Option<String> = if effective_cp == CP_ESCAPE {
            Some("escape".to_string())
        } else if effective_cp == CP_TAB {
            Some("tab".to_string())
        } else if effective_cp == CP_ENTER || effective_cp == CP_KP_ENTER {
            Some("enter".to_string())
        } else if effective_cp == CP_SPACE {
            Some("space".to_string())
        } else if effective_cp == CP_BACKSPACE {
            Some("backspace".to_string())
        } else if effective_cp == CP_DELETE {
            Some("delete".to_string())
        } else if effective_cp == CP_INSERT {
            Some("insert".to_string())
        } else if effective_cp == CP_HOME {
            Some("home".to_string())
        } else if effective_cp == CP_END {
            Some("end".to_string())
        } else if effective_cp == CP_PAGE_UP {
            Some("pageUp".to_string())
        } else if effective_cp == CP_PAGE_DOWN {
            Some("pageDown".to_string())
        } else if effective_cp == CP_UP {
            Some("up".to_string())
        } else if effective_cp == CP_DOWN {
            Some("down".to_string())
        } else if effective_cp == CP_LEFT {
            Some("left".to_string())
        } else if effective_cp == CP_RIGHT {
            Some("right".to_string())
        } else if (97..=122).contains(&effective_cp) {
            codepoint_to_char(effective_cp).map(|c| c.to_string())
        } else if let Some(c) = codepoint_to_char(effective_cp) {
            if is_symbol_key(c) {
                Some(c.to_string())
            } else {
                None
            }
        } else {
            None
        };

        if let Some(name) = key_name {
            return Some(if mods.is_empty() {
                name
            } else {
                format!("{}+{}", mods.join("+"), name)
            });
        }
    }

    if is_kitty_protocol_active() && (data == "\x1b\r" || data == "\n") {
        return Some("shift+enter".to_string());
    }

    if let Some(id) = legacy_seq_key_id(data) {
        return Some(id.to_string());
    }

    match data {
        "\x1b" => return Some("escape".to_string()),
        "\x1c" => return Some("ctrl+\\".to_string()),
        "\x1d" => return Some("ctrl+]".to_string()),
        "\x1f" => return Some("ctrl+-".to_string()),
        "\x1b\x1b" => return Some("ctrl+alt+[".to_string()),
        "\x1b\x1c" => return Some("ctrl+alt+\\".to_string()),
        "\x1b\x1d" => return Some("ctrl+alt+]".to_string()),
        "\x1b\x1f" => return Some("ctrl+alt+-".to_string()),
        "\t" => return Some("tab".to_string()),
        "\x00" => return Some("ctrl+space".to_string()),
        " " => return Some("space".to_string()),
        "\x7f" | "\x08" => return Some("backspace".to_string()),
        "\x1b[Z" => return Some("shift+tab".to_string()),
        "\x1b\x7f" | "\x1b\x08" => return Some("alt+backspace".to_string()),
        _ => {}
    }

    if data == "\r" || (!is_kitty_protocol_active() && data == "\n") || data == "\x1bOM" {
        return Some("enter".to_string());
    }
    if !is_kitty_protocol_active() && data == "\x1b\r" {
        return Some("alt+enter".to_string());
    }
    if !is_kitty_protocol_active() && data == "\x1b " {
        return Some("alt+space".to_string());
    }
    if !is_kitty_protocol_active() && data == "\x1bB" {
        return Some("alt+left".to_string());
    }
    if !is_kitty_protocol_active() && data == "\x1bF" {
        return Some("alt+right".to_string());
    }

    let chars: Vec<char> = data.chars().collect();
    if !is_kitty_protocol_active() && chars.len() == 2 && chars[0] == '\x1b' {
        let code = chars[1] as u32;
        if (1..=26).contains(&code) {
            return Some(format!("ctrl+alt+{}", char::from_u32(code + 96).unwrap()));
        }
        if (97..=122).contains(&code) {
            return Some(format!("alt+{}", chars[1]));
        }
    }

    match data {
        "\x1b[A" => return Some("up".to_string()),
        "\x1b[B" => return Some("down".to_string()),
        "\x1b[C" => return Some("right".to_string()),
        "\x1b[D" => return Some("left".to_string()),
        "\x1b[H" | "\x1bOH" => return Some("home".to_string()),
        "\x1b[F" | "\x1bOF" => return Some("end".to_string()),
        "\x1b[3~" => return Some("delete".to_string()),
        "\x1b[5~" => return Some("pageUp".to_string()),
        "\x1b[6~" => return Some("pageDown".to_string()),
        _ => {}
    }

    if chars.len() == 1 {
        let code = chars[0] as u32;
        if (1..=26).contains(&code) {
            return Some(format!("ctrl+{}", char::from_u32(code + 96).unwrap()));
        }
        if (32..=126).contains(&code) {
            return Some(data.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_plain_letter() {
        assert!(matches_key("a", "a"));
        assert!(!matches_key("b", "a"));
    }

    #[test]
    fn matches_ctrl_c() {
        assert!(matches_key("\x03", "ctrl+c"));
    }

    #[test]
    fn matches_legacy_arrow() {
        assert!(matches_key("\x1b[A", "up"));
        assert_eq!(parse_key("\x1b[A"), Some("up".to_string()));
    }

    #[test]
    fn matches_kitty_ctrl_enter() {
        set_kitty_protocol_active(true);
        assert!(matches_key("\x1b[13;5u", "ctrl+enter"));
        set_kitty_protocol_active(false);
    }

    #[test]
    fn parse_key_ctrl_letter() {
        assert_eq!(parse_key("\x01"), Some("ctrl+a".to_string()));
    }

    #[test]
    fn parse_key_plain_printable() {
        assert_eq!(parse_key("q"), Some("q".to_string()));
    }

    #[test]
    fn release_and_repeat_detection() {
        assert!(is_key_release("\x1b[97;1:3u"));
        assert!(is_key_repeat("\x1b[97;1:2u"));
        assert!(!is_key_release("\x1b[97u"));
    }
}
