// ============================================================
// Error Taxonomy
// ============================================================
// Every failure the core can report. None of these are
// recoverable inside the core: a bad shape, a bad padding
// config or a missing cache aborts the current call and the
// caller decides what to do.
//
// The application and CLI layers wrap these in anyhow with
// extra context; the library itself returns OutfitError.

use std::path::PathBuf;

use crate::domain::task::TaskKind;

/// Result type alias using [`OutfitError`].
pub type Result<T> = std::result::Result<T, OutfitError>;

#[derive(Debug, thiserror::Error)]
pub enum OutfitError {
    /// A task tag with no forward path behind it.
    #[error("unsupported task '{tag}' (known: {known})")]
    UnsupportedTask { tag: String, known: String },

    /// Embedding width, sequence length or batch size disagrees
    /// with the configuration or with another input.
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what:     &'static str,
        expected: String,
        actual:   String,
    },

    /// No shard files with the expected prefix were found.
    #[error("no embedding cache shards matching '{prefix}*.json' in '{}'", dir.display())]
    MissingEmbeddingCache { dir: PathBuf, prefix: String },

    /// Fixed-length padding with truncation disabled met a sequence
    /// longer than max_length.
    #[error("sequence {index} has {length} items but fixed padding allows {max_length} and truncation is disabled")]
    InvalidPaddingConfig {
        index:      usize,
        length:     usize,
        max_length: usize,
    },

    /// Multi-replica execution requested for an evaluation-only run.
    #[error("evaluation runs must use a single worker, got world_size={world_size}")]
    UnsupportedConcurrencyMode { world_size: usize },

    /// Hyperparameters that cannot build a valid model.
    #[error("config: {0}")]
    InvalidConfig(String),

    /// Raw item inputs the item encoder refuses to encode.
    #[error("malformed item input: {0}")]
    MalformedInput(String),

    /// Recorder failure while saving or loading weights.
    #[error("checkpoint '{}': {message}", path.display())]
    Checkpoint { path: PathBuf, message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl OutfitError {
    pub(crate) fn shape(
        what:     &'static str,
        expected: impl ToString,
        actual:   impl ToString,
    ) -> Self {
        OutfitError::ShapeMismatch {
            what,
            expected: expected.to_string(),
            actual:   actual.to_string(),
        }
    }

    pub(crate) fn unsupported_task(tag: impl Into<String>) -> Self {
        let known = TaskKind::ALL
            .iter()
            .map(|k| k.tag())
            .collect::<Vec<_>>()
            .join(", ");
        OutfitError::UnsupportedTask { tag: tag.into(), known }
    }
}
