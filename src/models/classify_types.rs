use crate::error::ClassifierError;
use crate::models::image_types::ImageInfo;
use serde::Serialize;

/// One ranked guess from the classifier.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Candidate {
    pub label: String,
    pub confidence: f32,
}

impl Candidate {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Whole percent, truncated toward zero and clamped to 0..=100.
    pub fn percent(&self) -> u32 {
        if !self.confidence.is_finite() {
            return 0;
        }
        (self.confidence * 100.0).clamp(0.0, 100.0).trunc() as u32
    }

    /// `"<label>\n(<pct>% confidence)"`
    pub fn display_text(&self) -> String {
        format!("{}\n({}% confidence)", self.label, self.percent())
    }
}

/// What the last completed operation produced. A result and an error can
/// never coexist.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Outcome {
    #[default]
    NoResult,
    Classified(Candidate),
    Failed(ClassifierError),
}

impl Outcome {
    pub fn result(&self) -> Option<&Candidate> {
        match self {
            Outcome::Classified(candidate) => Some(candidate),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ClassifierError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn result_text(&self) -> String {
        self.result().map(Candidate::display_text).unwrap_or_default()
    }

    pub fn error_text(&self) -> Option<String> {
        self.error().map(|e| e.to_string())
    }
}

/// The four fields a presentation layer renders.
#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub image: Option<ImageInfo>,
    pub result_text: String,
    pub busy: bool,
    pub error_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_text_truncates_percent() {
        let candidate = Candidate::new("cat", 0.8734);
        assert_eq!(candidate.display_text(), "cat\n(87% confidence)");
        assert_eq!(Candidate::new("dog", 0.999).percent(), 99);
        assert_eq!(Candidate::new("dog", 0.005).percent(), 0);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(Candidate::new("x", 1.0).percent(), 100);
        assert_eq!(Candidate::new("x", 1.7).percent(), 100);
        assert_eq!(Candidate::new("x", -0.2).percent(), 0);
        assert_eq!(Candidate::new("x", f32::NAN).percent(), 0);
    }

    #[test]
    fn outcome_fields_are_exclusive() {
        let classified = Outcome::Classified(Candidate::new("cat", 0.5));
        assert_eq!(classified.result_text(), "cat\n(50% confidence)");
        assert_eq!(classified.error_text(), None);

        let failed = Outcome::Failed(ClassifierError::EmptyResult);
        assert_eq!(failed.result_text(), "");
        assert_eq!(failed.error_text().as_deref(), Some("Could not obtain results"));

        assert_eq!(Outcome::NoResult.result_text(), "");
        assert_eq!(Outcome::NoResult.error_text(), None);
    }

    #[test]
    fn empty_label_is_still_a_result() {
        let outcome = Outcome::Classified(Candidate::new("", 0.25));
        assert!(outcome.result().is_some());
        assert_eq!(outcome.result_text(), "\n(25% confidence)");
    }

    #[test]
    fn snapshot_serializes_for_frontend() {
        let snapshot = SessionSnapshot {
            image: None,
            result_text: String::new(),
            busy: true,
            error_text: None,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["busy"], true);
        assert_eq!(value["result_text"], "");
        assert!(value["image"].is_null());
    }
}
