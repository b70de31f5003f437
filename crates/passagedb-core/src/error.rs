use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The syntax tree for a document reported an error production.
    /// Fatal to that document's chunking; no partial fragments are produced.
    #[error("parse failed: {0}")]
    Parse(String),

    /// An embedding's length disagrees with the collection's configured
    /// dimension. Rejected before any write.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A write failed mid-operation and was rolled back. Nothing from the
    /// failed call remains queryable.
    #[error("write rolled back: {0}")]
    WriteFailed(String),

    /// A fragment is discoverable via an index but absent from the
    /// document/metadata store. Signals index corruption; never swallowed.
    #[error("index divergence: {0}")]
    IndexDivergence(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
