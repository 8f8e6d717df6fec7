//! Terminal user interface.
//!
//! The "page" is an interactive prompt: progress is drawn with indicatif,
//! agent output is printed as markdown and charts are written as HTML.

pub mod progress;
pub mod session;
pub mod text;

pub use session::Session;
