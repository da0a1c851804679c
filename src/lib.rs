mod commands;
mod config;
mod error;
mod models;
mod services;

pub use commands::session::{open_session, SessionCommand, SessionDriver, SessionHandle};
pub use config::{ClassifierConfig, ModelConfig, SessionConfig};
pub use error::ClassifierError;
pub use models::classify_types::{Candidate, Outcome, SessionSnapshot};
pub use models::image_types::{ImageInfo, SelectedImage};
pub use services::classifier::fake::FakeEngine;
pub use services::classifier::inference::{
    decode_image, preprocess_image, top_k_candidates, OnnxEngine,
};
pub use services::classifier::interface::{EngineStatus, InferenceEngine};
pub use services::classifier::model_manager::{load_labels, ModelManager, ModelType};
pub use services::session::{ClassificationSession, Completion, RequestId, SessionState};
