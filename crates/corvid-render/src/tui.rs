//! The differential render engine, grounded in `tui.py`'s `TUI` class:
//! same first/last-changed-line diffing, the same synchronized-update
//! (`ESC[?2026h/l`) wrapping, the same hardware-cursor marker extraction,
//! and the same overlay compositing.
//!
//! Concurrency differs from the reference on purpose. `terminal.py`
//! schedules renders from a background stdin-reading thread back onto the
//! asyncio loop via `call_soon_threadsafe`, because its `Terminal.start()`
//! spawns that thread itself. `corvid_terminal::Terminal::start()` instead
//! hands its caller a channel of already-decoded events — there is no
//! second thread to hop off of. So `Tui` is driven synchronously by
//! whichever task owns it: feed it input with [`Tui::handle_input`],
//! then call [`Tui::render_if_requested`] once per event-loop tick.

use std::rc::Rc;

use corvid_image::{get_capabilities, set_cell_dimensions, CellDimensions};
use corvid_input::{is_key_release, matches_key};
use corvid_terminal::Terminal;
use corvid_text::{extract_before_after, slice_with_width, slice_with_width_info, visible_width, Straddle};

use crate::component::{Component, Container, SharedComponent};
use crate::overlay::{resolve_overlay_layout, OverlayOptions};

/// Cursor position marker: a zero-width APC sequence terminals ignore.
/// A focused component emits this at its cursor position; the renderer
/// finds it, strips it, and positions the hardware cursor there.
pub const CURSOR_MARKER: &str = "\x1b_cvd:c\x07";

const SEGMENT_RESET: &str = "\x1b[0m\x1b]8;;\x07";

/// Environment-sourced knobs the reference reads directly inside
/// `tui.py`. Kept out of this crate (see module docs) so callers read
/// their own env/config layer and pass the result in.
#[derive(Debug, Clone, Copy, Default)]
pub struct RendererConfig {
    pub debug_redraw: bool,
    pub clear_on_shrink: bool,
}

pub struct InputListenerResult {
    pub consume: bool,
    pub data: Option<String>,
}

type InputListener = Box<dyn FnMut(&str) -> Option<InputListenerResult>>;

struct OverlayEntry {
    id: u64,
    component: SharedComponent,
    options: OverlayOptions,
    pre_focus: Option<SharedComponent>,
    hidden: bool,
}

/// Handle returned by [`Tui::show_overlay`]. The reference returns a
/// closure-bearing object; closures that capture `&mut Tui` don't work in
/// Rust, so this just carries the overlay's id and the matching
/// `Tui::*_overlay` methods take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayId(u64);

pub struct Tui {
    terminal: Box<dyn Terminal>,
    root: Container,
    config: RendererConfig,

    show_hardware_cursor: bool,
    focused: Option<SharedComponent>,
    overlay_stack: Vec<OverlayEntry>,
    next_overlay_id: u64,
    input_listeners: Vec<(u64, InputListener)>,
    next_listener_id: u64,
    on_debug: Option<Box<dyn FnMut()>>,

    previous_lines: Vec<String>,
    previous_width: i32,
    render_requested: bool,
    cursor_row: u16,
    hardware_cursor_row: u16,
    input_buffer: String,
    cell_size_query_pending: bool,
    max_lines_rendered: u16,
    previous_viewport_top: u16,
    full_redraw_count: u64,
    stopped: bool,
}

impl Tui {
    pub fn new(terminal: Box<dyn Terminal>, config: RendererConfig, show_hardware_cursor: bool) -> Self {
        Self {
            terminal,
            root: Container::new(),
            config,
            show_hardware_cursor,
            focused: None,
            overlay_stack: Vec::new(),
            next_overlay_id: 1,
            input_listeners: Vec::new(),
            next_listener_id: 1,
            on_debug: None,
            previous_lines: Vec::new(),
            previous_width: 0,
            render_requested: false,
            cursor_row: 0,
            hardware_cursor_row: 0,
            input_buffer: String::new(),
            cell_size_query_pending: false,
            max_lines_rendered: 0,
            previous_viewport_top: 0,
            full_redraw_count: 0,
            stopped: false,
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn full_redraws(&self) -> u64 {
        self.full_redraw_count
    }

    pub fn set_on_debug(&mut self, cb: Box<dyn FnMut()>) {
        self.on_debug = Some(cb);
    }

    pub fn add_child(&mut self, component: SharedComponent) {
        self.root.add_child(component);
    }

    pub fn remove_child(&mut self, component: &SharedComponent) {
        self.root.remove_child(component);
    }

    pub fn show_hardware_cursor(&self) -> bool {
        self.show_hardware_cursor
    }

    pub fn set_show_hardware_cursor(&mut self, enabled: bool) {
        if self.show_hardware_cursor == enabled {
            return;
        }
        self.show_hardware_cursor = enabled;
        if !enabled {
            self.terminal.hide_cursor();
        }
        self.request_render(false);
    }

    pub fn set_focus(&mut self, component: Option<SharedComponent>) {
        if let Some(prev) = &self.focused {
            if let Some(f) = prev.borrow_mut().as_focusable_mut() {
                f.set_focused(false);
            }
        }
        if let Some(c) = &component {
            if let Some(f) = c.borrow_mut().as_focusable_mut() {
                f.set_focused(true);
            }
        }
        self.focused = component;
    }

    /// Begin the terminal's input/resize event stream and prime the first
    /// render. The caller owns forwarding events from the returned
    /// receiver into [`Tui::handle_input`]/[`Tui::request_render`].
    pub fn start(&mut self) -> corvid_terminal::Result<tokio::sync::mpsc::UnboundedReceiver<corvid_terminal::TerminalEvent>> {
        self.stopped = false;
        let rx = self.terminal.start()?;
        self.terminal.hide_cursor();
        self.query_cell_size();
        self.request_render(false);
        Ok(rx)
    }

    fn query_cell_size(&mut self) {
        if get_capabilities().images.is_none() {
            return;
        }
        self.cell_size_query_pending = true;
        self.terminal.write("\x1b[16t");
    }

    pub fn stop(&mut self) {
        self.stopped = true;
        if !self.previous_lines.is_empty() {
            let target_row = self.previous_lines.len() as i32;
            let line_diff = target_row - self.hardware_cursor_row as i32;
            self.terminal.move_by(line_diff);
            self.terminal.write("\r\n");
        }
        self.terminal.show_cursor();
        self.terminal.stop();
    }

    pub fn request_render(&mut self, force: bool) {
        if force {
            self.previous_lines.clear();
            self.previous_width = -1;
            self.cursor_row = 0;
            self.hardware_cursor_row = 0;
            self.max_lines_rendered = 0;
            self.previous_viewport_top = 0;
        }
        self.render_requested = true;
    }

    /// Run a render pass if one was requested since the last call. The
    /// owning event loop should call this once per tick after dispatching
    /// any pending input/resize events.
    pub fn render_if_requested(&mut self) {
        if !self.render_requested {
            return;
        }
        self.render_requested = false;
        self.do_render();
    }

    pub fn add_input_listener(&mut self, listener: InputListener) -> u64 {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.input_listeners.push((id, listener));
        id
    }

    pub fn remove_input_listener(&mut self, id: u64) {
        self.input_listeners.retain(|(lid, _)| *lid != id);
    }

    // ── Overlays ────────────────────────────────────────────────────────

    pub fn show_overlay(&mut self, component: SharedComponent, options: OverlayOptions) -> OverlayId {
        let id = self.next_overlay_id;
        self.next_overlay_id += 1;
        let entry = OverlayEntry {
            id,
            component: component.clone(),
            options,
            pre_focus: self.focused.clone(),
            hidden: false,
        };
        let visible = Self::entry_visible(&entry, self.terminal.columns(), self.terminal.rows());
        self.overlay_stack.push(entry);
        if visible {
            self.set_focus(Some(component));
        }
        self.terminal.hide_cursor();
        self.request_render(false);
        OverlayId(id)
    }

    /// Remove the overlay by id, wherever it sits in the stack (the
    /// reference removes overlays by identity, not necessarily LIFO).
    pub fn hide_overlay_by_id(&mut self, id: OverlayId) {
        let Some(idx) = self.overlay_stack.iter().position(|o| o.id == id.0) else { return };
        let entry = self.overlay_stack.remove(idx);
        if self.focused.as_ref().is_some_and(|f| Rc::ptr_eq(f, &entry.component)) {
            let top = self.topmost_visible_overlay();
            self.set_focus(top.or(entry.pre_focus));
        }
        if self.overlay_stack.is_empty() {
            self.terminal.hide_cursor();
        }
        self.request_render(false);
    }

    /// Pop the topmost overlay, restoring its pre-focus component.
    pub fn hide_overlay(&mut self) {
        let Some(entry) = self.overlay_stack.pop() else { return };
        let top = self.topmost_visible_overlay();
        self.set_focus(top.or(entry.pre_focus));
        if self.overlay_stack.is_empty() {
            self.terminal.hide_cursor();
        }
        self.request_render(false);
    }

    pub fn set_overlay_hidden(&mut self, id: OverlayId, hidden: bool) {
        let Some(idx) = self.overlay_stack.iter().position(|o| o.id == id.0) else { return };
        if self.overlay_stack[idx].hidden == hidden {
            return;
        }
        self.overlay_stack[idx].hidden = hidden;
        let component = self.overlay_stack[idx].component.clone();
        if hidden {
            if self.focused.as_ref().is_some_and(|f| Rc::ptr_eq(f, &component)) {
                let pre_focus = self.overlay_stack[idx].pre_focus.clone();
                let top = self.topmost_visible_overlay();
                self.set_focus(top.or(pre_focus));
            }
        } else {
            let visible = Self::entry_visible(&self.overlay_stack[idx], self.terminal.columns(), self.terminal.rows());
            if visible {
                self.set_focus(Some(component));
            }
        }
        self.request_render(false);
    }

    pub fn has_overlay(&self) -> bool {
        let (w, h) = (self.terminal.columns(), self.terminal.rows());
        self.overlay_stack.iter().any(|o| Self::entry_visible(o, w, h))
    }

    fn entry_visible(entry: &OverlayEntry, term_width: u16, term_height: u16) -> bool {
        if entry.hidden {
            return false;
        }
        match &entry.options.visible {
            Some(f) => f(term_width, term_height),
            None => true,
        }
    }

    fn topmost_visible_overlay(&self) -> Option<SharedComponent> {
        let (w, h) = (self.terminal.columns(), self.terminal.rows());
        self.overlay_stack
            .iter()
            .rev()
            .find(|o| Self::entry_visible(o, w, h))
            .map(|o| o.component.clone())
    }

    pub fn invalidate_all(&mut self) {
        self.root.invalidate();
        for overlay in &self.overlay_stack {
            overlay.component.borrow_mut().invalidate();
        }
    }

    // ── Input ─────────────────────────────────────────────────────────

    pub fn handle_input(&mut self, data: &str) {
        let mut data = data.to_string();

        let mut current = data.clone();
        for (_, listener) in &mut self.input_listeners {
            if let Some(result) = listener(&current) {
                if result.consume {
                    return;
                }
                if let Some(d) = result.data {
                    current = d;
                }
            }
        }
        if current.is_empty() {
            return;
        }
        data = current;

        if self.cell_size_query_pending {
            self.input_buffer.push_str(&data);
            match self.parse_cell_size_response() {
                None => return,
                Some(filtered) => {
                    if filtered.is_empty() {
                        return;
                    }
                    data = filtered;
                }
            }
        }

        if matches_key(&data, "shift+ctrl+d") {
            if let Some(cb) = &mut self.on_debug {
                cb();
                return;
            }
        }

        if let Some(focused) = self.focused.clone() {
            if let Some(idx) = self.overlay_stack.iter().position(|o| Rc::ptr_eq(&o.component, &focused)) {
                let (w, h) = (self.terminal.columns(), self.terminal.rows());
                if !Self::entry_visible(&self.overlay_stack[idx], w, h) {
                    let top = self.topmost_visible_overlay();
                    let pre_focus = self.overlay_stack[idx].pre_focus.clone();
                    self.set_focus(top.or(pre_focus));
                }
            }
        }

        if let Some(focused) = self.focused.clone() {
            let mut comp = focused.borrow_mut();
            let wants_release = comp.wants_key_release();
            if is_key_release(&data) && !wants_release {
                return;
            }
            comp.handle_input(&data);
            drop(comp);
            self.request_render(false);
        }
    }

    fn parse_cell_size_response(&mut self) -> Option<String> {
        if let Some((start, end, h_px, w_px)) = find_cell_size_response(&self.input_buffer) {
            if h_px > 0 && w_px > 0 {
                set_cell_dimensions(CellDimensions { width_px: w_px, height_px: h_px });
                self.invalidate_all();
                self.request_render(false);
            }
            self.input_buffer.replace_range(start..end, "");
            self.cell_size_query_pending = false;
        }

        if looks_like_partial_cell_size(&self.input_buffer) {
            let last = self.input_buffer.chars().last();
            let terminated = matches!(last, Some(c) if c.is_ascii_alphabetic() || c == '~');
            if !terminated {
                return None;
            }
        }

        self.cell_size_query_pending = false;
        Some(std::mem::take(&mut self.input_buffer))
    }

    // ── Overlay layout / compositing ─────────────────────────────────

    fn composite_overlays(&mut self, lines: Vec<String>, term_width: u16, term_height: u16) -> Vec<String> {
        if self.overlay_stack.is_empty() {
            return lines;
        }
        let mut result = lines;

        struct Rendered {
            lines: Vec<String>,
            row: u16,
            col: u16,
            width: u16,
        }
        let mut rendered = Vec::new();
        let mut min_lines_needed = result.len();

        for entry in &self.overlay_stack {
            if !Self::entry_visible(entry, term_width, term_height) {
                continue;
            }
            let layout0 = resolve_overlay_layout(&entry.options, 0, term_width, term_height);
            let mut overlay_lines = entry.component.borrow_mut().render(layout0.width);
            if let Some(max_h) = layout0.max_height {
                overlay_lines.truncate(max_h as usize);
            }
            let layout = resolve_overlay_layout(&entry.options, overlay_lines.len() as u16, term_width, term_height);
            min_lines_needed = min_lines_needed.max(layout.row as usize + overlay_lines.len());
            rendered.push(Rendered { lines: overlay_lines, row: layout.row, col: layout.col, width: layout.width });
        }

        let working_h = (self.max_lines_rendered as usize).max(min_lines_needed);
        while result.len() < working_h {
            result.push(String::new());
        }

        let viewport_start = working_h.saturating_sub(term_height as usize);
        let mut modified = std::collections::HashSet::new();

        for r in &rendered {
            for (i, ol) in r.lines.iter().enumerate() {
                let idx = viewport_start + r.row as usize + i;
                if idx < result.len() {
                    let trunc = if visible_width(ol) > r.width as usize {
                        slice_with_width(ol, 0, r.width as usize, Straddle::Lenient)
                    } else {
                        ol.clone()
                    };
                    result[idx] = composite_line_at(&result[idx], &trunc, r.col, r.width, term_width);
                    modified.insert(idx);
                }
            }
        }

        for idx in modified {
            if visible_width(&result[idx]) > term_width as usize {
                result[idx] = slice_with_width(&result[idx], 0, term_width as usize, Straddle::Lenient);
            }
        }

        result
    }

    fn apply_line_resets(lines: &mut [String]) {
        for line in lines.iter_mut() {
            if !corvid_image::is_image_line(line) {
                line.push_str(SEGMENT_RESET);
            }
        }
    }

    fn extract_cursor_position(lines: &mut [String], height: u16) -> Option<(usize, usize)> {
        let viewport_top = lines.len().saturating_sub(height as usize);
        for row in (viewport_top..lines.len()).rev() {
            if let Some(idx) = lines[row].find(CURSOR_MARKER) {
                let before = lines[row][..idx].to_string();
                let col = visible_width(&before);
                let mut new_line = before;
                new_line.push_str(&lines[row][idx + CURSOR_MARKER.len()..]);
                lines[row] = new_line;
                return Some((row, col));
            }
        }
        None
    }

    // ── Main render loop, mirrors doRender() ─────────────────────────

    fn do_render(&mut self) {
        if self.stopped {
            return;
        }

        let width = self.terminal.columns();
        let height = self.terminal.rows();

        let viewport_top = self.max_lines_rendered.saturating_sub(height);
        let prev_viewport_top = self.previous_viewport_top;
        let hardware_cursor_row = self.hardware_cursor_row;

        let mut new_lines = self.root.render(width);
        if !self.overlay_stack.is_empty() {
            new_lines = self.composite_overlays(new_lines, width, height);
        }

        let cursor_pos = Self::extract_cursor_position(&mut new_lines, height);
        Self::apply_line_resets(&mut new_lines);

        let width_changed = self.previous_width != 0 && self.previous_width != width as i32;

        if self.previous_lines.is_empty() && !width_changed {
            self.full_render(&new_lines, false, viewport_top, prev_viewport_top, hardware_cursor_row);
            self.finish_full_render(cursor_pos, &new_lines, width);
            return;
        }

        if width_changed {
            self.full_render(&new_lines, true, viewport_top, prev_viewport_top, hardware_cursor_row);
            self.finish_full_render(cursor_pos, &new_lines, width);
            return;
        }

        if self.config.clear_on_shrink
            && (new_lines.len() as u16) < self.max_lines_rendered
            && self.overlay_stack.is_empty()
        {
            self.full_render(&new_lines, true, viewport_top, prev_viewport_top, hardware_cursor_row);
            self.finish_full_render(cursor_pos, &new_lines, width);
            return;
        }

        let max_l = new_lines.len().max(self.previous_lines.len());
        let mut first_changed: i64 = -1;
        let mut last_changed: i64 = -1;
        for i in 0..max_l {
            let old = self.previous_lines.get(i).map(String::as_str).unwrap_or("");
            let new = new_lines.get(i).map(String::as_str).unwrap_or("");
            if old != new {
                if first_changed == -1 {
                    first_changed = i as i64;
                }
                last_changed = i as i64;
            }
        }

        let appended = new_lines.len() > self.previous_lines.len();
        if appended {
            if first_changed == -1 {
                first_changed = self.previous_lines.len() as i64;
            }
            last_changed = new_lines.len() as i64 - 1;
        }

        let append_start = appended && first_changed == self.previous_lines.len() as i64 && first_changed > 0;

        if first_changed == -1 {
            self.position_hardware_cursor(cursor_pos, new_lines.len());
            self.previous_viewport_top = self.max_lines_rendered.saturating_sub(height);
            return;
        }

        let compute_line_diff = |target_row: i64| -> i64 {
            let cur_screen = hardware_cursor_row as i64 - prev_viewport_top as i64;
            let tgt_screen = target_row - viewport_top as i64;
            tgt_screen - cur_screen
        };

        if first_changed >= new_lines.len() as i64 {
            if self.previous_lines.len() > new_lines.len() {
                let mut buf = String::from("\x1b[?2026h");
                let target_row = (new_lines.len() as i64 - 1).max(0);
                let ld = compute_line_diff(target_row);
                push_vertical_move(&mut buf, ld);
                buf.push('\r');
                let extra = self.previous_lines.len() - new_lines.len();
                if extra > height as usize {
                    self.full_render(&new_lines, true, viewport_top, prev_viewport_top, hardware_cursor_row);
                    self.finish_full_render(cursor_pos, &new_lines, width);
                    return;
                }
                if extra > 0 {
                    buf.push_str("\x1b[1B");
                }
                for i in 0..extra {
                    buf.push_str("\r\x1b[2K");
                    if i < extra - 1 {
                        buf.push_str("\x1b[1B");
                    }
                }
                if extra > 0 {
                    buf.push_str(&format!("\x1b[{extra}A"));
                }
                buf.push_str("\x1b[?2026l");
                self.terminal.write(&buf);
                self.cursor_row = target_row as u16;
                self.hardware_cursor_row = target_row as u16;
            }
            self.position_hardware_cursor(cursor_pos, new_lines.len());
            self.previous_lines = new_lines;
            self.previous_width = width as i32;
            self.previous_viewport_top = self.max_lines_rendered.saturating_sub(height);
            return;
        }

        let prev_content_viewport_top = self.previous_lines.len().saturating_sub(height as usize);
        if (first_changed as usize) < prev_content_viewport_top {
            self.full_render(&new_lines, true, viewport_top, prev_viewport_top, hardware_cursor_row);
            self.finish_full_render(cursor_pos, &new_lines, width);
            return;
        }

        let mut buf = String::from("\x1b[?2026h");
        let mut prev_viewport_top = prev_viewport_top as i64;
        let mut viewport_top = viewport_top as i64;
        let mut hardware_cursor_row = hardware_cursor_row as i64;
        let prev_viewport_bottom = prev_viewport_top + height as i64 - 1;
        let move_target_row = if append_start { first_changed - 1 } else { first_changed };

        if move_target_row > prev_viewport_bottom {
            let cur_screen = (hardware_cursor_row - prev_viewport_top).clamp(0, height as i64 - 1);
            let move_to_bottom = height as i64 - 1 - cur_screen;
            if move_to_bottom > 0 {
                buf.push_str(&format!("\x1b[{move_to_bottom}B"));
            }
            let scroll = move_target_row - prev_viewport_bottom;
            for _ in 0..scroll {
                buf.push_str("\r\n");
            }
            prev_viewport_top += scroll;
            viewport_top += scroll;
            hardware_cursor_row = move_target_row;
        }

        let cur_screen = hardware_cursor_row - prev_viewport_top;
        let tgt_screen = move_target_row - viewport_top;
        let ld = tgt_screen - cur_screen;
        push_vertical_move(&mut buf, ld);

        buf.push_str(if append_start { "\r\n" } else { "\r" });

        let render_end = last_changed.min(new_lines.len() as i64 - 1);
        for i in first_changed..=render_end {
            if i > first_changed {
                buf.push_str("\r\n");
            }
            buf.push_str("\x1b[2K");
            let line = &new_lines[i as usize];
            let out_line = if !corvid_image::is_image_line(line) && visible_width(line) > width as usize {
                tracing::warn!(line = i, actual = visible_width(line), limit = width, "line exceeds terminal width");
                slice_with_width(line, 0, width as usize, Straddle::Lenient)
            } else {
                line.clone()
            };
            buf.push_str(&out_line);
        }

        let mut final_cursor_row = render_end;

        if self.previous_lines.len() > new_lines.len() {
            if render_end < new_lines.len() as i64 - 1 {
                let move_down = new_lines.len() as i64 - 1 - render_end;
                buf.push_str(&format!("\x1b[{move_down}B"));
                final_cursor_row = new_lines.len() as i64 - 1;
            }
            let extra = self.previous_lines.len() - new_lines.len();
            for _ in 0..extra {
                buf.push_str("\r\n\x1b[2K");
            }
            buf.push_str(&format!("\x1b[{extra}A"));
        }

        buf.push_str("\x1b[?2026l");
        self.terminal.write(&buf);

        self.cursor_row = (new_lines.len() as i64 - 1).max(0) as u16;
        self.hardware_cursor_row = final_cursor_row.max(0) as u16;
        self.max_lines_rendered = self.max_lines_rendered.max(new_lines.len() as u16);
        self.previous_viewport_top = self.max_lines_rendered.saturating_sub(height);

        self.position_hardware_cursor(cursor_pos, new_lines.len());
        self.previous_lines = new_lines;
        self.previous_width = width as i32;
    }

    fn full_render(
        &mut self,
        new_lines: &[String],
        clear: bool,
        _viewport_top: u16,
        _prev_viewport_top: u16,
        _hardware_cursor_row: u16,
    ) {
        self.full_redraw_count += 1;
        let mut buf = String::from("\x1b[?2026h");
        if clear {
            buf.push_str("\x1b[3J\x1b[2J\x1b[H");
        }
        for (i, line) in new_lines.iter().enumerate() {
            if i > 0 {
                buf.push_str("\r\n");
            }
            buf.push_str(line);
        }
        buf.push_str("\x1b[?2026l");
        self.terminal.write(&buf);
        self.cursor_row = new_lines.len().saturating_sub(1) as u16;
        self.hardware_cursor_row = self.cursor_row;
        if clear {
            self.max_lines_rendered = new_lines.len() as u16;
        } else {
            self.max_lines_rendered = self.max_lines_rendered.max(new_lines.len() as u16);
        }
        self.previous_viewport_top = self.max_lines_rendered.saturating_sub(self.terminal.rows());
    }

    fn finish_full_render(&mut self, cursor_pos: Option<(usize, usize)>, new_lines: &[String], width: u16) {
        self.position_hardware_cursor(cursor_pos, new_lines.len());
        self.previous_lines = new_lines.to_vec();
        self.previous_width = width as i32;
    }

    fn position_hardware_cursor(&mut self, cursor_pos: Option<(usize, usize)>, total_lines: usize) {
        if cursor_pos.is_none() || total_lines == 0 {
            self.terminal.hide_cursor();
            return;
        }
        let (row, col) = cursor_pos.unwrap();
        let target_row = row.min(total_lines.saturating_sub(1)) as i64;
        let target_col = col as i64;

        let row_delta = target_row - self.hardware_cursor_row as i64;
        let mut buf = String::new();
        push_vertical_move(&mut buf, row_delta);
        buf.push_str(&format!("\x1b[{}G", target_col + 1));
        if !buf.is_empty() {
            self.terminal.write(&buf);
        }
        self.hardware_cursor_row = target_row.max(0) as u16;

        if self.show_hardware_cursor {
            self.terminal.show_cursor();
        } else {
            self.terminal.hide_cursor();
        }
    }
}

fn push_vertical_move(buf: &mut String, delta: i64) {
    match delta.cmp(&0) {
        std::cmp::Ordering::Greater => buf.push_str(&format!("\x1b[{delta}B")),
        std::cmp::Ordering::Less => buf.push_str(&format!("\x1b[{}A", -delta)),
        std::cmp::Ordering::Equal => {}
    }
}

/// Paint `overlay_line` into `base_line` at column `start_col`, preserving
/// `base_line`'s styling before/after the overlay. Mirrors
/// `_composite_line_at` in `tui.py`.
fn composite_line_at(base_line: &str, overlay_line: &str, start_col: u16, overlay_width: u16, total_width: u16) -> String {
    if corvid_image::is_image_line(base_line) {
        return base_line.to_string();
    }

    let start_col = start_col as usize;
    let overlay_width = overlay_width as usize;
    let total_width = total_width as usize;
    let after_start = start_col + overlay_width;

    let base = extract_before_after(base_line, start_col, after_start, total_width.saturating_sub(after_start), true);
    let overlay = slice_with_width_info(overlay_line, 0, overlay_width, Straddle::Lenient);

    let before_pad = start_col.saturating_sub(base.before_width);
    let overlay_pad = overlay_width.saturating_sub(overlay.width);
    let actual_before_w = start_col.max(base.before_width);
    let actual_overlay_w = overlay_width.max(overlay.width);
    let after_target = total_width.saturating_sub(actual_before_w).saturating_sub(actual_overlay_w);
    let after_pad = after_target.saturating_sub(base.after_width);

    let mut result = String::new();
    result.push_str(&base.before);
    result.push_str(&" ".repeat(before_pad));
    result.push_str(SEGMENT_RESET);
    result.push_str(&overlay.text);
    result.push_str(&" ".repeat(overlay_pad));
    result.push_str(SEGMENT_RESET);
    result.push_str(&base.after);
    result.push_str(&" ".repeat(after_pad));

    if visible_width(&result) <= total_width {
        result
    } else {
        slice_with_width(&result, 0, total_width, Straddle::Lenient)
    }
}

fn find_cell_size_response(buf: &str) -> Option<(usize, usize, u32, u32)> {
    const PREFIX: &str = "\x1b[6;";
    let start = buf.find(PREFIX)?;
    let rest = &buf[start + PREFIX.len()..];
    let semi = rest.find(';')?;
    let h_str = &rest[..semi];
    if h_str.is_empty() || !h_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let after_h = &rest[semi + 1..];
    let t_idx = after_h.find('t')?;
    let w_str = &after_h[..t_idx];
    if w_str.is_empty() || !w_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let h: u32 = h_str.parse().ok()?;
    let w: u32 = w_str.parse().ok()?;
    let end = start + PREFIX.len() + semi + 1 + t_idx + 1;
    Some((start, end, h, w))
}

/// Does the buffer end with an incomplete prefix of `ESC[6;<h>;<w>t`?
fn looks_like_partial_cell_size(buf: &str) -> bool {
    let Some(pos) = buf.rfind('\x1b') else { return false };
    let rest = &buf[pos + 1..];
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some('[') => {
            let mut s: &str = chars.as_str();
            s = s.strip_prefix('6').unwrap_or(s);
            s = s.strip_prefix(';').unwrap_or(s);
            s.bytes().all(|b| b.is_ascii_digit() || b == b';')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_cell_size_response() {
        let (start, end, h, w) = find_cell_size_response("junk\x1b[6;18;9tmore").unwrap();
        assert_eq!(&"junk\x1b[6;18;9tmore"[start..end], "\x1b[6;18;9t");
        assert_eq!((h, w), (18, 9));
    }

    #[test]
    fn partial_prefix_is_detected_pending() {
        assert!(looks_like_partial_cell_size("\x1b[6;18"));
        assert!(looks_like_partial_cell_size("\x1b"));
        assert!(!looks_like_partial_cell_size("\x1b[6;18;9t"));
    }

    #[test]
    fn composite_line_preserves_before_and_after() {
        let out = composite_line_at("0123456789", "XY", 3, 2, 10);
        assert!(out.contains("XY"));
        assert!(out.starts_with("012"));
        assert!(out.ends_with("6789") || out.contains("6789"));
    }
}
