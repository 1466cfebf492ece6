//! Raw-mode terminal control, grounded in
//! `original_source/packages/tui/src/pi_tui/terminal.py`'s `Terminal`
//! interface and `ProcessTerminal` implementation, but built on
//! `crossterm` (the teacher's existing terminal dependency) rather than
//! hand-rolled termios/signal handling.

use std::io::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, terminal};
use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::error::Result;

/// A decoded terminal event. `Input` carries a key identifier in the same
/// vocabulary `corvid_input::keys` uses (`"ctrl+c"`, `"up"`, `"a"`, ...) so
/// callers don't need to care whether it came from crossterm's keyboard
/// enhancement protocol or a legacy sequence.
#[derive(Debug, Clone)]
pub enum TerminalEvent {
    Input(String),
    Paste(String),
    Resize { columns: u16, rows: u16 },
}

/// Minimal terminal interface the renderer and input loop depend on.
/// Mirrors the reference `Terminal` ABC.
#[async_trait::async_trait]
pub trait Terminal: Send {
    fn start(&mut self) -> Result<UnboundedReceiver<TerminalEvent>>;
    fn stop(&mut self);
    /// Drain stdin before exiting to prevent Kitty key-release events from
    /// leaking to the parent shell.
    async fn drain_input(&mut self, max_ms: u64, idle_ms: u64);
    fn write(&self, data: &str);
    fn columns(&self) -> u16;
    fn rows(&self) -> u16;
    fn kitty_protocol_active(&self) -> bool;
    fn move_by(&self, lines: i32);
    fn hide_cursor(&self);
    fn show_cursor(&self);
    fn clear_line(&self);
    fn clear_from_cursor(&self);
    fn clear_screen(&self);
    fn set_title(&self, title: &str);
}

/// A real terminal driven through `crossterm`.
pub struct ProcessTerminal {
    kitty_active: Arc<AtomicBool>,
    columns: Arc<AtomicU16>,
    rows: Arc<AtomicU16>,
    event_task: Option<JoinHandle<()>>,
    raw_mode_enabled: bool,
    alternate_screen: bool,
}

impl ProcessTerminal {
    pub fn new() -> Self {
        let (cols, rws) = terminal::size().unwrap_or((80, 24));
        Self {
            kitty_active: Arc::new(AtomicBool::new(false)),
            columns: Arc::new(AtomicU16::new(cols)),
            rows: Arc::new(AtomicU16::new(rws)),
            event_task: None,
            raw_mode_enabled: false,
            alternate_screen: false,
        }
    }

    fn enable_raw_mode(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        execute!(std::io::stdout(), EnterAlternateScreen)?;
        self.raw_mode_enabled = true;
        self.alternate_screen = true;
        Ok(())
    }

    fn disable_raw_mode(&mut self) {
        if self.alternate_screen {
            let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
            self.alternate_screen = false;
        }
        if self.raw_mode_enabled {
            let _ = terminal::disable_raw_mode();
            self.raw_mode_enabled = false;
        }
    }
}

impl Default for ProcessTerminal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Terminal for ProcessTerminal {
    fn start(&mut self) -> Result<UnboundedReceiver<TerminalEvent>> {
        self.enable_raw_mode()?;

        let supports_kitty = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if supports_kitty {
            let flags = KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                | KeyboardEnhancementFlags::REPORT_ALTERNATE_KEYS;
            if execute!(std::io::stdout(), PushKeyboardEnhancementFlags(flags)).is_ok() {
                self.kitty_active.store(true, Ordering::Relaxed);
                corvid_input::set_kitty_protocol_active(true);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let columns = self.columns.clone();
        let rows = self.rows.clone();
        let task = tokio::spawn(async move {
            let mut events = crossterm::event::EventStream::new();
            while let Some(Ok(event)) = events.next().await {
                match event {
                    Event::Key(key) => {
                        if let Some(id) = key_event_to_id(key) {
                            if tx.send(TerminalEvent::Input(id)).is_err() {
                                break;
                            }
                        }
                    }
                    Event::Paste(text) => {
                        if tx.send(TerminalEvent::Paste(text)).is_err() {
                            break;
                        }
                    }
                    Event::Resize(c, r) => {
                        columns.store(c, Ordering::Relaxed);
                        rows.store(r, Ordering::Relaxed);
                        if tx.send(TerminalEvent::Resize { columns: c, rows: r }).is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        });
        self.event_task = Some(task);
        Ok(rx)
    }

    fn stop(&mut self) {
        if self.kitty_active.swap(false, Ordering::Relaxed) {
            let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
            corvid_input::set_kitty_protocol_active(false);
        }
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
        self.disable_raw_mode();
    }

    async fn drain_input(&mut self, max_ms: u64, idle_ms: u64) {
        let deadline = Instant::now() + Duration::from_millis(max_ms);
        let idle = Duration::from_millis(idle_ms);
        let mut last_event = Instant::now();
        loop {
            let now = Instant::now();
            if now >= deadline || now.duration_since(last_event) >= idle {
                break;
            }
            let wait = idle.min(deadline - now);
            let had_event = tokio::task::spawn_blocking(move || {
                crossterm::event::poll(wait).unwrap_or(false) && crossterm::event::read().is_ok()
            })
            .await
            .unwrap_or(false);
            if had_event {
                last_event = Instant::now();
            }
        }
    }

    fn write(&self, data: &str) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(data.as_bytes());
        let _ = stdout.flush();
    }

    fn columns(&self) -> u16 {
        self.columns.load(Ordering::Relaxed)
    }

    fn rows(&self) -> u16 {
        self.rows.load(Ordering::Relaxed)
    }

    fn kitty_protocol_active(&self) -> bool {
        self.kitty_active.load(Ordering::Relaxed)
    }

    fn move_by(&self, lines: i32) {
        use std::cmp::Ordering as CmpOrdering;
        match lines.cmp(&0) {
            CmpOrdering::Greater => self.write(&format!("\x1b[{lines}B")),
            CmpOrdering::Less => self.write(&format!("\x1b[{}A", -lines)),
            CmpOrdering::Equal => {}
        }
    }

    fn hide_cursor(&self) {
        self.write("\x1b[?25l");
    }

    fn show_cursor(&self) {
        self.write("\x1b[?25h");
    }

    fn clear_line(&self) {
        self.write("\x1b[K");
    }

    fn clear_from_cursor(&self) {
        self.write("\x1b[J");
    }

    fn clear_screen(&self) {
        self.write("\x1b[2J\x1b[H");
    }

    fn set_title(&self, title: &str) {
        self.write(&format!("\x1b]0;{title}\x07"));
    }
}

impl Drop for ProcessTerminal {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Translate a crossterm `KeyEvent` into a key identifier using the same
/// vocabulary as `corvid_input::keys` (`"ctrl+c"`, `"up"`, `"shift+tab"`,
/// plain printable chars). Key-release events are dropped here: release
/// tracking only matters for the raw Kitty byte stream that
/// `corvid_input::keys` decodes, not crossterm's already-structured events.
fn key_event_to_id(key: KeyEvent) -> Option<String> {
    if key.kind == crossterm::event::KeyEventKind::Release {
        return None;
    }
    let mut mods = Vec::new();
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        mods.push("ctrl");
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        mods.push("alt");
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        mods.push("shift");
    }
    let base = match key.code {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "enter".to_string(),
        KeyCode::Tab => "tab".to_string(),
        KeyCode::BackTab => return Some("shift+tab".to_string()),
        KeyCode::Backspace => "backspace".to_string(),
        KeyCode::Delete => "delete".to_string(),
        KeyCode::Insert => "insert".to_string(),
        KeyCode::Esc => "escape".to_string(),
        KeyCode::Home => "home".to_string(),
        KeyCode::End => "end".to_string(),
        KeyCode::PageUp => "pageUp".to_string(),
        KeyCode::PageDown => "pageDown".to_string(),
        KeyCode::Up => "up".to_string(),
        KeyCode::Down => "down".to_string(),
        KeyCode::Left => "left".to_string(),
        KeyCode::Right => "right".to_string(),
        KeyCode::F(n) => format!("f{n}"),
        _ => return None,
    };
    if mods.is_empty() {
        Some(base)
    } else {
        Some(format!("{}+{}", mods.join("+"), base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    #[test]
    fn plain_char_has_no_modifier_prefix() {
        let key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(key_event_to_id(key), Some("a".to_string()));
    }

    #[test]
    fn ctrl_c_id() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_event_to_id(key), Some("ctrl+c".to_string()));
    }

    #[test]
    fn release_events_are_dropped() {
        let mut key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(key_event_to_id(key), None);
    }

    #[test]
    fn arrow_key_id() {
        let key = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(key_event_to_id(key), Some("up".to_string()));
    }
}
