use serde::{Serialize, Serializer};
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the classifier can surface.
///
/// The first five variants are the ones a session records in its outcome and
/// shows to the user. The rest come out of engine loading and setup and are
/// returned to the caller as a `Result`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("No image selected")]
    NoImageSelected,

    #[error("Model is not available")]
    EngineUnavailable,

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Inference failed: {0}")]
    Execution(String),

    #[error("Could not obtain results")]
    EmptyResult,

    #[error("Model artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    #[error("Failed to parse model artifact {}: {reason}", path.display())]
    ArtifactParse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

// Frontends only ever need the message.
impl Serialize for ClassifierError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<std::io::Error> for ClassifierError {
    fn from(err: std::io::Error) -> Self {
        ClassifierError::Io(err.to_string())
    }
}

impl From<image::ImageError> for ClassifierError {
    fn from(err: image::ImageError) -> Self {
        ClassifierError::ImageDecode(err.to_string())
    }
}

impl From<ort::Error> for ClassifierError {
    fn from(err: ort::Error) -> Self {
        ClassifierError::Execution(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ClassifierError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClassifierError::Runtime(format!("Worker task failed: {}", err))
    }
}
