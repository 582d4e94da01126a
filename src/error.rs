use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Invalid input {}: {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Rasterization failed{}: {message}", page_label(*page))]
    Rasterize {
        page: Option<usize>,
        message: String,
    },

    #[error("Encoding failed on page {page}: {source}")]
    Encode {
        page: usize,
        #[source]
        source: image::ImageError,
    },

    #[error("Document assembly failed: {0}")]
    Assemble(String),

    #[error("Compression cancelled after {iterations} iteration(s)")]
    Cancelled { iterations: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompressError {
    pub fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CompressError::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Pipeline stage that produced the error, for status reporting.
    pub fn stage(&self) -> &'static str {
        match self {
            CompressError::InvalidInput { .. } => "input",
            CompressError::InvalidConfig(_) => "config",
            CompressError::Rasterize { .. } => "rasterize",
            CompressError::Encode { .. } => "encode",
            CompressError::Assemble(_) => "assemble",
            CompressError::Cancelled { .. } => "search",
            CompressError::Io(_) => "output",
        }
    }
}

fn page_label(page: Option<usize>) -> String {
    match page {
        Some(p) => format!(" on page {}", p),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;
