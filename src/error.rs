//! Error types.

use std::path::PathBuf;

/// Errors raised while loading or validating an [`EngineConfig`](crate::EngineConfig).
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised while reading or writing reference templates.
#[derive(thiserror::Error, Debug)]
pub enum TemplateError {
    #[error("cannot decode image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {0} has no pixels")]
    Empty(PathBuf),
}

/// Boxed error coming from an external collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the session runner and its collaborators.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("frame acquisition failed")]
    Acquisition(#[source] BoxError),
    #[error("object detection failed")]
    Detection(#[source] BoxError),
    #[error("sticker detection failed")]
    StickerDetection(#[source] BoxError),
    #[error("failed to record session summary")]
    Sink(#[source] BoxError),
}
