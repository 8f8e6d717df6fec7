//! LLM agent modules for stock analysis.
//!
//! A supervisor routes the question through three tool-calling members:
//! researcher, stock analyzer and chart generator.

pub mod graph;
pub mod prompts;
pub mod react;
pub mod supervisor;
pub mod tools;

pub use graph::{Workflow, WorkflowConfig};
