//! Raw-mode terminal control: lifecycle, resize events, Kitty keyboard
//! protocol handshake, and cursor/viewport write primitives.

pub mod error;
pub mod terminal;

pub use error::{Result, TerminalError};
pub use terminal::{ProcessTerminal, Terminal, TerminalEvent};
