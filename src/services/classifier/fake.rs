use crate::error::ClassifierError;
use crate::models::classify_types::Candidate;
use crate::models::image_types::SelectedImage;
use crate::services::classifier::interface::InferenceEngine;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Engine that answers every request with the same scripted outcome.
pub struct FakeEngine {
    outcome: Result<Vec<Candidate>, ClassifierError>,
    calls: AtomicUsize,
}

impl FakeEngine {
    pub fn with_candidates(mut candidates: Vec<Candidate>) -> Self {
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self {
            outcome: Ok(candidates),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ClassifierError) -> Self {
        Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceEngine for FakeEngine {
    fn classify(&self, image: &SelectedImage) -> Result<Vec<Candidate>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(image = ?image, "Classifying image with fake engine");
        self.outcome.clone()
    }
}
