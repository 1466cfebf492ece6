//! Stdin escape-sequence buffering and keyboard-event decoding.

pub mod keys;
pub mod stdin;

pub use keys::{
    is_key_release, is_key_repeat, is_kitty_protocol_active, matches_key, parse_key,
    set_kitty_protocol_active,
};
pub use stdin::{Emitted, StdinBuffer};
