//! Terminal capability detection from environment variables, grounded in
//! `original_source/packages/tui/src/pi_tui/terminal_image.py`'s
//! `detect_capabilities`.

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProtocol {
    Kitty,
    Iterm2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalCapabilities {
    pub images: Option<ImageProtocol>,
    pub true_color: bool,
    pub hyperlinks: bool,
}

fn env_lower(key: &str) -> String {
    std::env::var(key).unwrap_or_default().to_lowercase()
}

fn env_set(key: &str) -> bool {
    std::env::var(key).map(|v| !v.is_empty()).unwrap_or(false)
}

pub fn detect_capabilities() -> TerminalCapabilities {
    let term_program = env_lower("TERM_PROGRAM");
    let term = env_lower("TERM");
    let color_term = env_lower("COLORTERM");

    if env_set("KITTY_WINDOW_ID") || term_program == "kitty" {
        return TerminalCapabilities {
            images: Some(ImageProtocol::Kitty),
            true_color: true,
            hyperlinks: true,
        };
    }
    if term_program == "ghostty" || term.contains("ghostty") || env_set("GHOSTTY_RESOURCES_DIR") {
        return TerminalCapabilities {
            images: Some(ImageProtocol::Kitty),
            true_color: true,
            hyperlinks: true,
        };
    }
    if env_set("WEZTERM_PANE") || term_program == "wezterm" {
        return TerminalCapabilities {
            images: Some(ImageProtocol::Kitty),
            true_color: true,
            hyperlinks: true,
        };
    }
    if env_set("ITERM_SESSION_ID") || term_program == "iterm.app" {
        return TerminalCapabilities {
            images: Some(ImageProtocol::Iterm2),
            true_color: true,
            hyperlinks: true,
        };
    }
    if term_program == "vscode" || term_program == "alacritty" {
        return TerminalCapabilities {
            images: None,
            true_color: true,
            hyperlinks: true,
        };
    }

    let true_color = color_term == "truecolor" || color_term == "24bit";
    TerminalCapabilities {
        images: None,
        true_color,
        hyperlinks: true,
    }
}

static CACHED_CAPABILITIES: OnceLock<std::sync::Mutex<Option<TerminalCapabilities>>> = OnceLock::new();

fn cache() -> &'static std::sync::Mutex<Option<TerminalCapabilities>> {
    CACHED_CAPABILITIES.get_or_init(|| std::sync::Mutex::new(None))
}

pub fn get_capabilities() -> TerminalCapabilities {
    let mut guard = cache().lock().unwrap();
    *guard.get_or_insert_with(detect_capabilities)
}

pub fn reset_capabilities_cache() {
    *cache().lock().unwrap() = None;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellDimensions {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for CellDimensions {
    fn default() -> Self {
        Self { width_px: 9, height_px: 18 }
    }
}

static CELL_DIMENSIONS: OnceLock<std::sync::Mutex<CellDimensions>> = OnceLock::new();

fn cell_dims_cell() -> &'static std::sync::Mutex<CellDimensions> {
    CELL_DIMENSIONS.get_or_init(|| std::sync::Mutex::new(CellDimensions::default()))
}

pub fn get_cell_dimensions() -> CellDimensions {
    *cell_dims_cell().lock().unwrap()
}

pub fn set_cell_dimensions(dims: CellDimensions) {
    *cell_dims_cell().lock().unwrap() = dims;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cell_dimensions_match_reference() {
        assert_eq!(CellDimensions::default(), CellDimensions { width_px: 9, height_px: 18 });
    }
}
