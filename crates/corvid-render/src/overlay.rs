//! Overlay layout resolution, grounded in `tui.py`'s
//! `_resolve_overlay_layout`/`_anchor_row`/`_anchor_col` and the
//! `OverlayOptions`/`OverlayMargin` dataclasses.

/// A size given either as an absolute cell count or a percentage of the
/// reference dimension. Mirrors the `int | "NN%"` union in `tui.py`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeValue {
    Cells(u16),
    Percent(f64),
}

pub(crate) fn resolve_size(value: Option<SizeValue>, reference: u16) -> Option<u16> {
    match value? {
        SizeValue::Cells(n) => Some(n),
        SizeValue::Percent(pct) => Some((reference as f64 * pct / 100.0) as u16),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlayMargin {
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
    pub left: u16,
}

impl OverlayMargin {
    pub fn all(n: u16) -> Self {
        Self { top: n, right: n, bottom: n, left: n }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAnchor {
    TopLeft,
    TopCenter,
    TopRight,
    LeftCenter,
    Center,
    RightCenter,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Default for OverlayAnchor {
    fn default() -> Self {
        Self::Center
    }
}

/// A row or column position, either computed from the anchor or pinned
/// explicitly (in cells or as a percentage of the available space).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    Cells(u16),
    Percent(f64),
}

#[derive(Clone, Default)]
pub struct OverlayOptions {
    pub width: Option<SizeValue>,
    pub min_width: Option<u16>,
    pub max_height: Option<SizeValue>,
    pub anchor: OverlayAnchor,
    pub offset_x: i32,
    pub offset_y: i32,
    pub row: Option<Position>,
    pub col: Option<Position>,
    pub margin: OverlayMargin,
    /// Conditional visibility, e.g. hide a side panel below a minimum
    /// terminal width. Takes `(term_width, term_height)`.
    pub visible: Option<std::rc::Rc<dyn Fn(u16, u16) -> bool>>,
}

impl std::fmt::Debug for OverlayOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayOptions")
            .field("width", &self.width)
            .field("min_width", &self.min_width)
            .field("max_height", &self.max_height)
            .field("anchor", &self.anchor)
            .field("offset_x", &self.offset_x)
            .field("offset_y", &self.offset_y)
            .field("row", &self.row)
            .field("col", &self.col)
            .field("margin", &self.margin)
            .field("visible", &self.visible.is_some())
            .finish()
    }
}

/// Resolved placement for an overlay: width, top-left row/col in the
/// (possibly scrolled) content coordinate space, and an optional height
/// clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLayout {
    pub width: u16,
    pub row: u16,
    pub col: u16,
    pub max_height: Option<u16>,
}

fn anchor_row(anchor: OverlayAnchor, height: u16, avail_h: u16, m_top: u16) -> i32 {
    use OverlayAnchor::*;
    match anchor {
        TopLeft | TopCenter | TopRight => m_top as i32,
        BottomLeft | BottomCenter | BottomRight => m_top as i32 + avail_h as i32 - height as i32,
        _ => m_top as i32 + (avail_h as i32 - height as i32) / 2,
    }
}

fn anchor_col(anchor: OverlayAnchor, width: u16, avail_w: u16, m_left: u16) -> i32 {
    use OverlayAnchor::*;
    match anchor {
        TopLeft | LeftCenter | BottomLeft => m_left as i32,
        TopRight | RightCenter | BottomRight => m_left as i32 + avail_w as i32 - width as i32,
        _ => m_left as i32 + (avail_w as i32 - width as i32) / 2,
    }
}

/// Resolve an overlay's width/row/col/max-height against the terminal's
/// dimensions. `overlay_height` is the overlay's already-rendered line
/// count (0 when only the width is needed up front, matching the
/// reference's two-pass call in `_composite_overlays`).
pub fn resolve_overlay_layout(
    options: &OverlayOptions,
    overlay_height: u16,
    term_width: u16,
    term_height: u16,
) -> ResolvedLayout {
    let m = options.margin;
    let avail_w = (term_width.saturating_sub(m.left).saturating_sub(m.right)).max(1);
    let avail_h = (term_height.saturating_sub(m.top).saturating_sub(m.bottom)).max(1);

    let mut width = resolve_size(options.width, term_width).unwrap_or_else(|| 80.min(avail_w));
    if let Some(min_w) = options.min_width {
        width = width.max(min_w);
    }
    width = width.clamp(1, avail_w);

    let max_height = resolve_size(options.max_height, term_height).map(|h| h.clamp(1, avail_h));
    let eff_h = max_height.map(|h| overlay_height.min(h)).unwrap_or(overlay_height);

    let row = match options.row {
        Some(Position::Percent(pct)) => {
            let max_row = avail_h.saturating_sub(eff_h);
            m.top as i32 + (max_row as f64 * pct / 100.0) as i32
        }
        Some(Position::Cells(n)) => n as i32,
        None => anchor_row(options.anchor, eff_h, avail_h, m.top),
    };

    let col = match options.col {
        Some(Position::Percent(pct)) => {
            let max_col = avail_w.saturating_sub(width);
            m.left as i32 + (max_col as f64 * pct / 100.0) as i32
        }
        Some(Position::Cells(n)) => n as i32,
        None => anchor_col(options.anchor, width, avail_w, m.left),
    };

    let row = row + options.offset_y;
    let col = col + options.offset_x;

    let row = row
        .max(m.top as i32)
        .min(term_height as i32 - m.bottom as i32 - eff_h as i32)
        .max(0) as u16;
    let col = col
        .max(m.left as i32)
        .min(term_width as i32 - m.right as i32 - width as i32)
        .max(0) as u16;

    ResolvedLayout { width, row, col, max_height }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centers_by_default() {
        let opts = OverlayOptions { width: Some(SizeValue::Cells(10)), ..Default::default() };
        let layout = resolve_overlay_layout(&opts, 4, 80, 24);
        assert_eq!(layout.width, 10);
        assert_eq!(layout.col, 35);
        assert_eq!(layout.row, 10);
    }

    #[test]
    fn top_left_anchor_ignores_centering() {
        let opts = OverlayOptions {
            width: Some(SizeValue::Cells(10)),
            anchor: OverlayAnchor::TopLeft,
            ..Default::default()
        };
        let layout = resolve_overlay_layout(&opts, 4, 80, 24);
        assert_eq!(layout.row, 0);
        assert_eq!(layout.col, 0);
    }

    #[test]
    fn percent_width_is_relative_to_terminal_width() {
        let opts = OverlayOptions { width: Some(SizeValue::Percent(50.0)), ..Default::default() };
        let layout = resolve_overlay_layout(&opts, 0, 80, 24);
        assert_eq!(layout.width, 40);
    }

    #[test]
    fn margin_shrinks_available_space() {
        let opts = OverlayOptions {
            width: Some(SizeValue::Cells(100)),
            margin: OverlayMargin::all(5),
            ..Default::default()
        };
        let layout = resolve_overlay_layout(&opts, 0, 80, 24);
        assert_eq!(layout.width, 70);
    }
}
