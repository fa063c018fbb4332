//! Template document loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Template body read once per run and passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub source: PathBuf,
    pub body: String,
}

impl Template {
    /// Build a template from an in-memory body (used when the caller already holds the text).
    pub fn from_body(source: impl Into<PathBuf>, body: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let body = body.into();
        if body.trim().is_empty() {
            return Err(anyhow!("template {} is empty", source.display()));
        }
        Ok(Self { source, body })
    }
}

/// Read the template at `path`. Empty documents are rejected before any remote call.
pub fn load_template(path: &Path) -> Result<Template> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("read template {}", path.display()))?;
    debug!(path = %path.display(), bytes = body.len(), "template loaded");
    Template::from_body(path, body)
}
