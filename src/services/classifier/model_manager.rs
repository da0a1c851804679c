use crate::config::ModelConfig;
use crate::error::ClassifierError;
use crate::services::classifier::inference::OnnxEngine;
use ort::session::Session;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelType {
    MobileNetV3Large,
    ConvNextV2Base,
    ConvNextV2Large,
}

impl ModelType {
    /// (model file, labels file) inside the model directory.
    fn files(&self) -> (&'static str, &'static str) {
        match self {
            ModelType::MobileNetV3Large => ("mobilenetv3_large.onnx", "mobilenetv3_config.json"),
            ModelType::ConvNextV2Base => (
                "convnextv2-base-22k-384.onnx",
                "convnextv2-base-22k-384-config.json",
            ),
            ModelType::ConvNextV2Large => (
                "convnextv2-large-22k-384.onnx",
                "convnextv2-large-22k-384-config.json",
            ),
        }
    }

    pub fn crop_size(&self) -> u32 {
        match self {
            ModelType::ConvNextV2Base | ModelType::ConvNextV2Large => 384,
            ModelType::MobileNetV3Large => 224,
        }
    }
}

#[derive(Deserialize)]
struct LabelConfig {
    id2label: HashMap<String, String>,
}

/// Finds the classifier artifacts on disk and turns them into an engine.
#[derive(Clone, Debug)]
pub struct ModelManager {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub crop_size: u32,
    pub top_k: usize,
    pub use_gpu: bool,
    pub intra_threads: usize,
}

impl ModelManager {
    pub fn from_config(config: &ModelConfig) -> Self {
        let (model_file, labels_file) = config.model_type.files();
        Self {
            model_path: config.model_dir.join(model_file),
            labels_path: config.model_dir.join(labels_file),
            crop_size: config.model_type.crop_size(),
            top_k: config.top_k,
            use_gpu: config.use_gpu,
            intra_threads: config.intra_threads,
        }
    }

    /// Explicit artifact paths, for models that don't follow the bundled naming.
    pub fn with_paths(model_path: PathBuf, labels_path: PathBuf, crop_size: u32) -> Self {
        let defaults = ModelConfig::default();
        Self {
            model_path,
            labels_path,
            crop_size,
            top_k: defaults.top_k,
            use_gpu: defaults.use_gpu,
            intra_threads: defaults.intra_threads,
        }
    }

    pub fn is_available(&self) -> bool {
        self.model_path.exists() && self.labels_path.exists()
    }

    pub fn load(&self) -> Result<OnnxEngine, ClassifierError> {
        for path in [&self.labels_path, &self.model_path] {
            if !path.exists() {
                return Err(ClassifierError::ArtifactNotFound { path: path.clone() });
            }
        }

        let labels = load_labels(&self.labels_path)?;
        let session = self.build_session()?;

        tracing::info!(
            model = %self.model_path.display(),
            labels = labels.len(),
            crop_size = self.crop_size,
            "Classifier model loaded"
        );

        Ok(OnnxEngine::new(session, labels, self.crop_size, self.top_k))
    }

    /// `load` on the blocking pool; parsing a large graph takes a while.
    pub async fn load_async(&self) -> Result<OnnxEngine, ClassifierError> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.load()).await?
    }

    fn build_session(&self) -> Result<Session, ClassifierError> {
        let _ = ort::init().with_name("photo-classify").commit();

        let mut builder = Session::builder()
            .map_err(setup_error)?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(setup_error)?
            .with_intra_threads(self.intra_threads)
            .map_err(setup_error)?;

        if self.use_gpu {
            builder = builder
                .with_execution_providers([
                    ort::execution_providers::CoreMLExecutionProvider::default().build(),
                    ort::execution_providers::CUDAExecutionProvider::default().build(),
                    ort::execution_providers::CPUExecutionProvider::default().build(),
                ])
                .map_err(setup_error)?;
        } else {
            builder = builder
                .with_execution_providers([
                    ort::execution_providers::CPUExecutionProvider::default().build(),
                ])
                .map_err(setup_error)?;
        }

        builder
            .commit_from_file(&self.model_path)
            .map_err(|e| ClassifierError::ArtifactParse {
                path: self.model_path.clone(),
                reason: e.to_string(),
            })
    }
}

fn setup_error(e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::Runtime(format!("Failed to configure session: {}", e))
}

/// Labels from a `config.json` with an `id2label` map, or a text file with
/// one label per line.
pub fn load_labels(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ClassifierError::ArtifactNotFound {
            path: path.to_path_buf(),
        },
        _ => ClassifierError::Io(format!("Failed to read {}: {}", path.display(), e)),
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let parse_error = |reason: String| ClassifierError::ArtifactParse {
        path: path.to_path_buf(),
        reason,
    };

    let labels = if is_json {
        parse_id2label(&content).map_err(parse_error)?
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    };

    if labels.is_empty() {
        return Err(parse_error("no labels found".to_string()));
    }
    Ok(labels)
}

fn parse_id2label(content: &str) -> Result<Vec<String>, String> {
    let config: LabelConfig = serde_json::from_str(content).map_err(|e| e.to_string())?;

    // Map keys are unique, so bounding them by the entry count forces 0..n.
    let count = config.id2label.len();
    let mut labels: Vec<Option<String>> = vec![None; count];
    for (key, label) in config.id2label {
        let idx = key
            .parse::<usize>()
            .map_err(|_| format!("id2label key {:?} is not an index", key))?;
        if idx >= count {
            return Err(format!(
                "id2label index {} is out of range for {} labels",
                idx, count
            ));
        }
        labels[idx] = Some(label);
    }

    labels
        .into_iter()
        .enumerate()
        .map(|(idx, label)| label.ok_or_else(|| format!("id2label is missing index {}", idx)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("photo_classify_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn model_type_picks_files_and_crop() {
        let config = ModelConfig {
            model_dir: PathBuf::from("/m"),
            model_type: ModelType::ConvNextV2Large,
            ..ModelConfig::default()
        };
        let manager = ModelManager::from_config(&config);
        assert_eq!(manager.model_path, PathBuf::from("/m/convnextv2-large-22k-384.onnx"));
        assert_eq!(manager.labels_path, PathBuf::from("/m/convnextv2-large-22k-384-config.json"));
        assert_eq!(manager.crop_size, 384);
        assert_eq!(ModelType::MobileNetV3Large.crop_size(), 224);
    }

    #[test]
    fn missing_artifacts_are_not_found() {
        let dir = scratch_dir("missing_artifacts");
        let manager = ModelManager::from_config(&ModelConfig {
            model_dir: dir.clone(),
            ..ModelConfig::default()
        });
        assert!(!manager.is_available());
        match manager.load() {
            Err(ClassifierError::ArtifactNotFound { path }) => {
                assert_eq!(path, dir.join("mobilenetv3_config.json"))
            }
            other => panic!("unexpected load result: {:?}", other.err()),
        }
    }

    #[test]
    fn missing_model_after_labels_is_not_found() {
        let dir = scratch_dir("missing_model");
        std::fs::write(dir.join("labels.txt"), "cat\ndog\n").unwrap();
        let manager = ModelManager::with_paths(dir.join("model.onnx"), dir.join("labels.txt"), 224);
        match manager.load() {
            Err(ClassifierError::ArtifactNotFound { path }) => {
                assert_eq!(path, dir.join("model.onnx"))
            }
            other => panic!("unexpected load result: {:?}", other.err()),
        }
    }

    #[test]
    fn corrupt_model_fails_to_parse() {
        let dir = scratch_dir("corrupt_model");
        std::fs::write(dir.join("labels.txt"), "cat\ndog\n").unwrap();
        std::fs::write(dir.join("model.onnx"), b"this is not protobuf").unwrap();
        let manager = ModelManager::with_paths(dir.join("model.onnx"), dir.join("labels.txt"), 224);
        assert!(manager.is_available());
        let err = manager.load().err().expect("corrupt model must not load");
        assert!(matches!(err, ClassifierError::ArtifactParse { .. } | ClassifierError::Runtime(_)));
    }

    #[test]
    fn id2label_is_ordered_by_index() {
        let dir = scratch_dir("id2label");
        let path = dir.join("config.json");
        let json = r#"{ "id2label": { "2": "bird", "0": "cat", "1": "dog" } }"#;
        std::fs::write(&path, json).unwrap();
        assert_eq!(load_labels(&path).unwrap(), vec!["cat", "dog", "bird"]);
    }

    #[test]
    fn id2label_rejects_gaps() {
        let err = parse_id2label(r#"{ "id2label": { "0": "cat", "3": "fox" } }"#).unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn id2label_rejects_huge_indices() {
        let dir = scratch_dir("huge_keys");
        let path = dir.join("config.json");
        for key in ["18446744073709551615", "4000000000"] {
            std::fs::write(&path, format!(r#"{{ "id2label": {{ "0": "cat", "{}": "x" }} }}"#, key))
                .unwrap();
            match load_labels(&path) {
                Err(ClassifierError::ArtifactParse { reason, .. }) => {
                    assert!(reason.contains(key), "reason {:?}", reason)
                }
                other => panic!("unexpected result for key {}: {:?}", key, other),
            }
        }
    }

    #[test]
    fn id2label_rejects_non_numeric_keys() {
        let dir = scratch_dir("bad_keys");
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{ "id2label": { "zero": "cat" } }"#).unwrap();
        assert!(matches!(load_labels(&path), Err(ClassifierError::ArtifactParse { .. })));
    }

    #[test]
    fn text_labels_skip_blank_lines() {
        let dir = scratch_dir("text_labels");
        let path = dir.join("labels.txt");
        std::fs::write(&path, "tabby cat\n\n  golden retriever \n").unwrap();
        assert_eq!(load_labels(&path).unwrap(), vec!["tabby cat", "golden retriever"]);
    }

    #[test]
    fn empty_labels_fail_to_parse() {
        let dir = scratch_dir("empty_labels");
        let path = dir.join("labels.txt");
        std::fs::write(&path, "\n\n").unwrap();
        assert!(matches!(load_labels(&path), Err(ClassifierError::ArtifactParse { .. })));
    }

    #[tokio::test]
    async fn load_async_reports_missing_artifacts() {
        let dir = scratch_dir("load_async");
        let manager = ModelManager::with_paths(dir.join("m.onnx"), dir.join("l.txt"), 224);
        assert!(matches!(
            manager.load_async().await,
            Err(ClassifierError::ArtifactNotFound { .. })
        ));
    }
}
