//! Grapheme- and ANSI-aware terminal text layout.
//!
//! This crate is the bottom of the stack: visible-column width, word
//! wrapping that preserves active styling across line breaks, and
//! column-range slicing used both for scrolled viewports and for
//! compositing overlays on top of already-rendered lines.

pub mod ansi;
pub mod error;
pub mod slice;
pub mod width;
pub mod wrap;

pub use ansi::{AnsiTracker, Color};
pub use error::{Result, TextError};
pub use slice::{
    extract_before_after, extract_segments, slice_with_width, slice_with_width_info, BeforeAfter,
    Segment, SliceResult, Straddle,
};
pub use width::visible_width;
pub use wrap::wrap_text_with_ansi;
