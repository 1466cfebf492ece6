//! Component tree, overlay layout/compositing, and the differential
//! terminal renderer.

pub mod component;
pub mod overlay;
pub mod tui;

pub use component::{is_focusable, shared, Component, Container, Focusable, SharedComponent};
pub use overlay::{OverlayAnchor, OverlayMargin, OverlayOptions, Position, ResolvedLayout, SizeValue};
pub use tui::{InputListenerResult, OverlayId, RendererConfig, Tui, CURSOR_MARKER};
