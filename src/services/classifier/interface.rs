use crate::error::ClassifierError;
use crate::models::classify_types::Candidate;
use crate::models::image_types::SelectedImage;
use std::fmt;
use std::sync::Arc;

/// Turns an encoded image into candidates ordered by descending confidence.
///
/// Implementations are called from a blocking worker thread, one call per
/// classification request.
pub trait InferenceEngine: Send + Sync {
    fn classify(&self, image: &SelectedImage) -> Result<Vec<Candidate>, ClassifierError>;
}

/// Whether the engine made it through loading.
#[derive(Clone)]
pub enum EngineStatus {
    Ready(Arc<dyn InferenceEngine>),
    Unavailable(ClassifierError),
}

impl EngineStatus {
    pub fn ready(engine: impl InferenceEngine + 'static) -> Self {
        EngineStatus::Ready(Arc::new(engine))
    }

    pub fn from_load<E: InferenceEngine + 'static>(result: Result<E, ClassifierError>) -> Self {
        match result {
            Ok(engine) => Self::ready(engine),
            Err(e) => {
                tracing::warn!(error = %e, "Classifier failed to load; classification is disabled");
                EngineStatus::Unavailable(e)
            }
        }
    }

    pub fn engine(&self) -> Option<&Arc<dyn InferenceEngine>> {
        match self {
            EngineStatus::Ready(engine) => Some(engine),
            EngineStatus::Unavailable(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineStatus::Ready(_))
    }

    pub fn load_error(&self) -> Option<&ClassifierError> {
        match self {
            EngineStatus::Ready(_) => None,
            EngineStatus::Unavailable(e) => Some(e),
        }
    }
}

impl fmt::Debug for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Ready(_) => f.write_str("Ready"),
            EngineStatus::Unavailable(e) => f.debug_tuple("Unavailable").field(e).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::fake::FakeEngine;

    #[test]
    fn ready_status_exposes_engine() {
        let status = EngineStatus::ready(FakeEngine::with_candidates(vec![]));
        assert!(status.is_ready());
        assert!(status.engine().is_some());
        assert_eq!(status.load_error(), None);
    }

    #[test]
    fn failed_load_keeps_reason() {
        let status = EngineStatus::from_load::<FakeEngine>(Err(ClassifierError::ArtifactParse {
            path: "labels.json".into(),
            reason: "no labels found".to_string(),
        }));
        assert!(!status.is_ready());
        assert!(status.engine().is_none());
        assert!(matches!(status.load_error(), Some(ClassifierError::ArtifactParse { .. })));
        assert!(format!("{:?}", status).starts_with("Unavailable(ArtifactParse"));
    }
}
