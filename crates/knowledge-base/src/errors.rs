use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge source {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid knowledge data: {0}")]
    Parse(String),
    #[error("unsupported knowledge file format: {0}")]
    UnsupportedFormat(String),
    #[error("knowledge source produced no entries")]
    Empty,
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;
