//! Report generation.
//!
//! Markdown/JSON run reports, newsletter files and chart pages.

pub mod chart;
pub mod generator;

pub use generator::{file_stamp, save_newsletter, save_report};
