//! Presentation layer
//!
//! Provides:
//! - Text and JSON rendering of a snapshot
//! - Export of the current screen to a file
//! - The interactive terminal driver around a `RefreshLoop`

mod export;
mod render;
mod terminal;

pub use export::*;
pub use render::*;
pub use terminal::*;
