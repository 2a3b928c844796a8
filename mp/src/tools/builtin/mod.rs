//! Built-in research tools

mod fetch;
mod search;

pub use fetch::FetchTool;
pub use search::{SearchHit, SearchProvider, SearchSettings, SearchTool};
