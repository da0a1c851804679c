use crate::config::SessionConfig;
use crate::error::ClassifierError;
use crate::models::classify_types::{Candidate, Outcome, SessionSnapshot};
use crate::models::image_types::SelectedImage;
use crate::services::classifier::interface::{EngineStatus, InferenceEngine};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;

/// Identifies one classification request. Ids only ever increase within a
/// session, so a completion can be matched against the latest request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a worker sends back once the engine returns.
#[derive(Debug)]
pub struct Completion {
    pub request: RequestId,
    pub outcome: Result<Vec<Candidate>, ClassifierError>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub image: Option<SelectedImage>,
    pub outcome: Outcome,
    pub busy: bool,
}

impl SessionState {
    pub fn result_text(&self) -> String {
        self.outcome.result_text()
    }

    pub fn error_text(&self) -> Option<String> {
        self.outcome.error_text()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            image: self.image.as_ref().map(SelectedImage::info),
            result_text: self.result_text(),
            busy: self.busy,
            error_text: self.error_text(),
        }
    }
}

struct InFlight {
    request: RequestId,
    task: AbortHandle,
}

/// The single mutable holder of the selected image and its classification.
///
/// All mutation happens through `&mut self` on the owning context. Inference
/// runs on tokio's blocking pool and reports back through a channel that the
/// owner drains with [`next_completion`](Self::next_completion),
/// [`settle`](Self::settle) or [`drain_completions`](Self::drain_completions).
/// Only the completion of the latest request is ever applied.
pub struct ClassificationSession {
    engine: EngineStatus,
    config: SessionConfig,
    state: SessionState,
    last_request: u64,
    inflight: Option<InFlight>,
    runtime: Handle,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl ClassificationSession {
    /// Creates a session on the current tokio runtime.
    pub fn new(engine: EngineStatus, config: SessionConfig) -> Result<Self, ClassifierError> {
        let runtime = Handle::try_current().map_err(|e| {
            ClassifierError::Runtime(format!("Session needs a tokio runtime: {}", e))
        })?;
        Ok(Self::with_runtime(engine, config, runtime))
    }

    pub fn with_runtime(engine: EngineStatus, config: SessionConfig, runtime: Handle) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let state = SessionState::default();
        let (state_tx, _) = watch::channel(state.snapshot());
        Self {
            engine,
            config,
            state,
            last_request: 0,
            inflight: None,
            runtime,
            completion_tx,
            completion_rx,
            state_tx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn engine_status(&self) -> &EngineStatus {
        &self.engine
    }

    pub fn inflight_request(&self) -> Option<RequestId> {
        self.inflight.as_ref().map(|f| f.request)
    }

    /// Replaces the selected image. `Some` starts a classification right away;
    /// `None` cancels whatever is running and returns the session to idle.
    pub fn set_image(&mut self, image: Option<SelectedImage>) -> Option<RequestId> {
        match image {
            Some(image) => {
                tracing::debug!(image = ?image, "Image selected");
                self.state.image = Some(image);
                self.classify()
            }
            None => {
                self.cancel_inflight();
                self.state = SessionState::default();
                self.publish();
                None
            }
        }
    }

    /// Classifies the current image, superseding any request still running.
    /// Returns the id of the dispatched request, or `None` when a
    /// precondition failed and the outcome now holds the error.
    pub fn classify(&mut self) -> Option<RequestId> {
        let Some(image) = self.state.image.clone() else {
            self.fail(ClassifierError::NoImageSelected);
            return None;
        };
        let Some(engine) = self.engine.engine().cloned() else {
            self.fail(ClassifierError::EngineUnavailable);
            return None;
        };

        let request = self.dispatch(engine, image);
        self.state.busy = true;
        self.state.outcome = Outcome::NoResult;
        self.publish();
        Some(request)
    }

    /// Drops the image and any result or error.
    pub fn clear_image(&mut self) {
        if self.config.clear_cancels_inflight {
            self.cancel_inflight();
            self.state.busy = false;
        }
        self.state.image = None;
        self.state.outcome = Outcome::NoResult;
        self.publish();
    }

    /// Applies a worker completion. Returns `false` when the completion
    /// belongs to a request that was superseded or cancelled.
    pub fn apply_completion(&mut self, completion: Completion) -> bool {
        let is_current = matches!(&self.inflight, Some(f) if f.request == completion.request);
        if !is_current {
            tracing::debug!(
                request = %completion.request,
                "Discarding stale classification result"
            );
            return false;
        }

        self.inflight = None;
        self.state.busy = false;
        self.state.outcome = match completion.outcome {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(top) => {
                    tracing::info!(
                        request = %completion.request,
                        label = %top.label,
                        confidence = top.confidence,
                        "Classification finished"
                    );
                    Outcome::Classified(top)
                }
                None => {
                    tracing::warn!(
                        request = %completion.request,
                        "Classifier returned no candidates"
                    );
                    Outcome::Failed(ClassifierError::EmptyResult)
                }
            },
            Err(e) => {
                tracing::warn!(request = %completion.request, error = %e, "Classification failed");
                Outcome::Failed(e)
            }
        };
        self.publish();
        true
    }

    /// Waits for the next worker completion without applying it.
    pub async fn recv_completion(&mut self) -> Option<Completion> {
        self.completion_rx.recv().await
    }

    /// Waits for the next worker completion and applies it. Returns whether
    /// it changed the state.
    pub async fn next_completion(&mut self) -> bool {
        match self.completion_rx.recv().await {
            Some(completion) => self.apply_completion(completion),
            None => false,
        }
    }

    /// Waits until no request is in flight.
    pub async fn settle(&mut self) {
        while self.inflight.is_some() {
            match self.completion_rx.recv().await {
                Some(completion) => {
                    self.apply_completion(completion);
                }
                None => break,
            }
        }
    }

    /// Applies every completion that has already arrived. Returns how many
    /// changed the state.
    pub fn drain_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            if self.apply_completion(completion) {
                applied += 1;
            }
        }
        applied
    }

    fn dispatch(&mut self, engine: Arc<dyn InferenceEngine>, image: SelectedImage) -> RequestId {
        self.cancel_inflight();
        self.last_request += 1;
        let request = RequestId(self.last_request);

        let completion_tx = self.completion_tx.clone();
        let task = self.runtime.spawn(async move {
            let outcome = match tokio::task::spawn_blocking(move || engine.classify(&image)).await {
                Ok(result) => result,
                Err(e) => Err(ClassifierError::Execution(format!("worker stopped: {}", e))),
            };
            // Receiver is gone only when the session was dropped.
            let _ = completion_tx.send(Completion { request, outcome });
        });

        tracing::debug!(request = %request, "Classification dispatched");
        self.inflight = Some(InFlight {
            request,
            task: task.abort_handle(),
        });
        request
    }

    fn cancel_inflight(&mut self) {
        if let Some(inflight) = self.inflight.take() {
            inflight.task.abort();
            tracing::debug!(request = %inflight.request, "Classification cancelled");
        }
    }

    fn fail(&mut self, error: ClassifierError) {
        tracing::warn!(error = %error, "Classification not started");
        self.state.outcome = Outcome::Failed(error);
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.snapshot());
    }
}

impl Drop for ClassificationSession {
    fn drop(&mut self) {
        self.cancel_inflight();
    }
}

impl fmt::Debug for ClassificationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationSession")
            .field("engine", &self.engine)
            .field("state", &self.state)
            .field("inflight", &self.inflight_request())
            .finish()
    }
}
