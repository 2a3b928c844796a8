//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to the
//! embedded defaults, then renders them with handlebars in strict mode.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::embedded;

/// Prompt loading or rendering failure
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template not found: {0}")]
    NotFound(String),

    #[error("Failed to read prompt {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render template {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },
}

/// Context wrapper adding the loader-wide variables to every render
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(flatten)]
    inner: &'a T,
    language: Option<&'a str>,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// User override directory holding `{name}.pmt` files
    override_dir: Option<PathBuf>,
    /// Output language requested of the model, if any
    language: Option<String>,
}

impl PromptLoader {
    /// Create a loader; a missing override directory is ignored
    pub fn new(override_dir: Option<&Path>) -> Self {
        debug!(?override_dir, "PromptLoader::new: called");
        let override_dir = override_dir.filter(|dir| dir.is_dir()).map(Path::to_path_buf);
        if override_dir.is_none() {
            debug!("PromptLoader::new: no override directory, using embedded prompts");
        }

        Self {
            hbs: Self::engine(),
            override_dir,
            language: None,
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        Self {
            hbs: Self::engine(),
            override_dir: None,
            language: None,
        }
    }

    /// Ask for output in `language` in every template that supports it
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(true);
        // Prompts are plain text; HTML escaping would mangle quotes and ampersands
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name: override directory first, then embedded
    pub fn load_template(&self, name: &str) -> Result<String, PromptError> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found override");
                return std::fs::read_to_string(&path).map_err(|source| PromptError::Read { path, source });
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| PromptError::NotFound(name.to_string()))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String, PromptError> {
        debug!(%name, "PromptLoader::render: called");
        let template = self.load_template(name)?;
        let envelope = Envelope {
            inner: context,
            language: self.language.as_deref(),
        };

        self.hbs
            .render_template(&template, &envelope)
            .map_err(|source| PromptError::Render {
                name: name.to_string(),
                source: Box::new(source),
            })
    }
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::embedded_only()
    }
}
