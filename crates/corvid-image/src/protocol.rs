//! Kitty graphics protocol and iTerm2 inline-image encoders, plus the
//! rendering dispatch that picks between them based on detected terminal
//! capabilities. Grounded in `terminal_image.py`'s `encode_kitty`,
//! `encode_iterm2`, and `render_image`.

use base64::Engine as _;
use rand::Rng;

use crate::capabilities::{get_capabilities, get_cell_dimensions, CellDimensions, ImageProtocol};
use crate::dimensions::ImageDimensions;

const KITTY_PREFIX: &str = "\x1b_G";
const ITERM2_PREFIX: &str = "\x1b]1337;File=";
const CHUNK_SIZE: usize = 4096;

/// Generate a random Kitty graphics image id in `[1, 0xffff_ffff]`.
pub fn allocate_image_id() -> u32 {
    rand::thread_rng().gen_range(1..=u32::MAX)
}

/// Encode base64 image data as one or more Kitty Graphics Protocol escape
/// sequences, chunked at `CHUNK_SIZE` base64 characters per packet.
pub fn encode_kitty(base64_data: &str, columns: Option<u32>, rows: Option<u32>, image_id: Option<u32>) -> String {
    let mut params = vec!["a=T".to_string(), "f=100".to_string(), "q=2".to_string()];
    if let Some(c) = columns {
        params.push(format!("c={c}"));
    }
    if let Some(r) = rows {
        params.push(format!("r={r}"));
    }
    if let Some(i) = image_id {
        params.push(format!("i={i}"));
    }

    if base64_data.len() <= CHUNK_SIZE {
        return format!("{KITTY_PREFIX}{};{base64_data}\x1b\\", params.join(","));
    }

    let p = params.join(",");
    let mut out = String::new();
    let mut offset = 0usize;
    let bytes = base64_data.as_bytes();
    let mut is_first = true;
    while offset < bytes.len() {
        let end = (offset + CHUNK_SIZE).min(bytes.len());
        let chunk = &base64_data[offset..end];
        let is_last = end >= bytes.len();
        if is_first {
            out.push_str(&format!("{KITTY_PREFIX}{p},m=1;{chunk}\x1b\\"));
            is_first = false;
        } else if is_last {
            out.push_str(&format!("{KITTY_PREFIX}m=0;{chunk}\x1b\\"));
        } else {
            out.push_str(&format!("{KITTY_PREFIX}m=1;{chunk}\x1b\\"));
        }
        offset = end;
    }
    out
}

pub fn delete_kitty_image(image_id: u32) -> String {
    format!("{KITTY_PREFIX}a=d,d=I,i={image_id}\x1b\\")
}

pub fn delete_all_kitty_images() -> String {
    format!("{KITTY_PREFIX}a=d,d=A\x1b\\")
}

/// A width or height in an iTerm2 inline image escape: either a cell count
/// or the literal `"auto"`.
#[derive(Debug, Clone)]
pub enum ItermDimension {
    Cells(u32),
    Auto,
}

impl std::fmt::Display for ItermDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItermDimension::Cells(n) => write!(f, "{n}"),
            ItermDimension::Auto => write!(f, "auto"),
        }
    }
}

pub fn encode_iterm2(
    base64_data: &str,
    width: Option<ItermDimension>,
    height: Option<ItermDimension>,
    name: Option<&str>,
    preserve_aspect_ratio: bool,
    inline: bool,
) -> String {
    let mut params = vec![format!("inline={}", if inline { 1 } else { 0 })];
    if let Some(w) = width {
        params.push(format!("width={w}"));
    }
    if let Some(h) = height {
        params.push(format!("height={h}"));
    }
    if let Some(name) = name {
        let name_b64 = base64::engine::general_purpose::STANDARD.encode(name.as_bytes());
        params.push(format!("name={name_b64}"));
    }
    if !preserve_aspect_ratio {
        params.push("preserveAspectRatio=0".to_string());
    }
    format!("{ITERM2_PREFIX}{}:{base64_data}\x07", params.join(";"))
}

/// Does `line` carry an inline image escape sequence (Kitty or iTerm2)?
pub fn is_image_line(line: &str) -> bool {
    line.starts_with(KITTY_PREFIX)
        || line.starts_with(ITERM2_PREFIX)
        || line.contains(KITTY_PREFIX)
        || line.contains(ITERM2_PREFIX)
}

pub fn calculate_image_rows(image_dims: ImageDimensions, target_width_cells: u32, cell_dims: CellDimensions) -> u32 {
    let target_width_px = target_width_cells as f64 * cell_dims.width_px as f64;
    let scale = target_width_px / image_dims.width_px as f64;
    let scaled_height_px = image_dims.height_px as f64 * scale;
    let rows = ((scaled_height_px + cell_dims.height_px as f64 - 1.0) / cell_dims.height_px as f64).floor() as u32;
    rows.max(1)
}

#[derive(Debug, Clone)]
pub struct ImageRenderOptions {
    pub max_width_cells: Option<u32>,
    pub max_height_cells: Option<u32>,
    pub preserve_aspect_ratio: bool,
    pub image_id: Option<u32>,
}

impl Default for ImageRenderOptions {
    fn default() -> Self {
        Self {
            max_width_cells: None,
            max_height_cells: None,
            preserve_aspect_ratio: true,
            image_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderResult {
    pub sequence: String,
    pub rows: u32,
    pub image_id: Option<u32>,
}

/// Render `base64_data` using whichever protocol the current terminal
/// supports, or `None` if inline images aren't supported at all.
pub fn render_image(base64_data: &str, image_dims: ImageDimensions, options: ImageRenderOptions) -> Option<RenderResult> {
    let caps = get_capabilities();
    let protocol = caps.images?;

    let max_width = options.max_width_cells.unwrap_or(80);
    let rows = calculate_image_rows(image_dims, max_width, get_cell_dimensions());

    match protocol {
        ImageProtocol::Kitty => {
            let seq = encode_kitty(base64_data, Some(max_width), Some(rows), options.image_id);
            Some(RenderResult { sequence: seq, rows, image_id: options.image_id })
        }
        ImageProtocol::Iterm2 => {
            let seq = encode_iterm2(
                base64_data,
                Some(ItermDimension::Cells(max_width)),
                Some(ItermDimension::Auto),
                None,
                options.preserve_aspect_ratio,
                true,
            );
            Some(RenderResult { sequence: seq, rows, image_id: None })
        }
    }
}

/// A plain-text fallback line for terminals with no inline image support.
pub fn image_fallback(mime_type: &str, dimensions: Option<ImageDimensions>, filename: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(name) = filename {
        parts.push(name.to_string());
    }
    parts.push(format!("[{mime_type}]"));
    if let Some(dims) = dimensions {
        parts.push(format!("{}x{}", dims.width_px, dims.height_px));
    }
    format!("[Image: {}]", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kitty_encoding_single_packet() {
        let seq = encode_kitty("AAAA", Some(10), Some(2), Some(7));
        assert!(seq.starts_with("\x1b_Ga=T,f=100,q=2,c=10,r=2,i=7;AAAA\x1b\\"));
    }

    #[test]
    fn kitty_chunks_large_payload() {
        let data = "A".repeat(10000);
        let seq = encode_kitty(&data, None, None, None);
        assert!(seq.contains(",m=1;"));
        assert!(seq.contains("\x1b_Gm=0;"));
    }

    #[test]
    fn iterm2_encoding_includes_inline_flag() {
        let seq = encode_iterm2("AAAA", Some(ItermDimension::Cells(10)), Some(ItermDimension::Auto), None, true, true);
        assert!(seq.starts_with("\x1b]1337;File=inline=1;width=10;height=auto:AAAA\x07"));
    }

    #[test]
    fn detects_image_lines() {
        assert!(is_image_line("\x1b_Ga=T;xyz\x1b\\"));
        assert!(is_image_line("\x1b]1337;File=inline=1:xyz\x07"));
        assert!(!is_image_line("plain text"));
    }

    #[test]
    fn calculates_rows_from_aspect_ratio() {
        let dims = ImageDimensions { width_px: 900, height_px: 900 };
        let rows = calculate_image_rows(dims, 10, CellDimensions { width_px: 9, height_px: 18 });
        assert_eq!(rows, 50);
    }

    #[test]
    fn fallback_line_includes_mime_and_dims() {
        let s = image_fallback("image/png", Some(ImageDimensions { width_px: 10, height_px: 20 }), Some("cat.png"));
        assert_eq!(s, "[Image: cat.png [image/png] 10x20]");
    }
}
