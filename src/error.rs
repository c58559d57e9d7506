use thiserror::Error;

/// Library-level failures. Per-entity defects never surface here; a broken
/// entity is skipped and rendering continues.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid drawing model: {0}")]
    InvalidDrawing(&'static str),

    #[error("failed to load drawing model")]
    Load(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
