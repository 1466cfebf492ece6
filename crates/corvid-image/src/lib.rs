//! Terminal inline-image support: capability detection, raw dimension
//! sniffing, and the Kitty/iTerm2 wire encoders.

pub mod capabilities;
pub mod dimensions;
pub mod protocol;

pub use capabilities::{
    detect_capabilities, get_capabilities, get_cell_dimensions, reset_capabilities_cache,
    set_cell_dimensions, CellDimensions, ImageProtocol, TerminalCapabilities,
};
pub use dimensions::{get_image_dimensions, ImageDimensions};
pub use protocol::{
    allocate_image_id, calculate_image_rows, delete_all_kitty_images, delete_kitty_image,
    encode_iterm2, encode_kitty, image_fallback, is_image_line, render_image, ImageRenderOptions,
    ItermDimension, RenderResult,
};
