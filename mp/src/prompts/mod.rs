//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for each LLM step.
//!
//! Template loading chain:
//! 1. `{prompts-dir}/{name}.pmt` (user override, when configured)
//! 2. Embedded fallback compiled from `prompts/`
//!
//! Templates use Handlebars syntax; rendering is strict, so a template that
//! references a variable the caller did not supply fails instead of silently
//! rendering an empty string.

pub mod embedded;
mod loader;

pub use loader::{PromptError, PromptLoader};
