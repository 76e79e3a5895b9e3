use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Terminal failures of a file load
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("load cancelled")]
    Cancelled,
}

/// Failures of template and keyword persistence
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("builtin template '{id}' cannot be modified")]
    Builtin { id: String },
    #[error("template not found: {id}")]
    UnknownTemplate { id: String },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid template JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = LoadError> = std::result::Result<T, E>;
