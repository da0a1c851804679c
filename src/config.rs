use crate::error::ClassifierError;
use crate::services::classifier::model_manager::ModelType;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model: ModelConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding the model and label files named by `model_type`.
    pub model_dir: PathBuf,
    pub model_type: ModelType,
    pub top_k: usize,
    pub use_gpu: bool,
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            model_type: ModelType::MobileNetV3Large,
            top_k: 5,
            use_gpu: false,
            intra_threads: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// When set, `clear_image` also cancels the in-flight request and drops
    /// the busy flag. When unset, busy survives the clear and the pending
    /// completion is still applied.
    pub clear_cancels_inflight: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clear_cancels_inflight: true,
        }
    }
}

impl ClassifierConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ClassifierError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ClassifierError::Config(format!("Failed to parse config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.model.top_k == 0 {
            return Err(ClassifierError::Config("top_k must be at least 1".to_string()));
        }
        if self.model.intra_threads == 0 {
            return Err(ClassifierError::Config(
                "intra_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
