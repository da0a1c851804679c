use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::models::classify_types::SessionSnapshot;
use crate::models::image_types::SelectedImage;
use crate::services::classifier::interface::EngineStatus;
use crate::services::classifier::model_manager::ModelManager;
use crate::services::session::{ClassificationSession, Completion};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Entry points a presentation layer calls.
#[derive(Debug)]
pub enum SessionCommand {
    SubmitImage(Option<SelectedImage>),
    Classify,
    Reset,
}

/// Cloneable, `Send` front door to a session running on its driver task.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn submit_image(&self, image: Option<SelectedImage>) -> Result<(), ClassifierError> {
        self.send(SessionCommand::SubmitImage(image))
    }

    /// Re-runs classification on the current image.
    pub fn classify(&self) -> Result<(), ClassifierError> {
        self.send(SessionCommand::Classify)
    }

    pub fn reset(&self) -> Result<(), ClassifierError> {
        self.send(SessionCommand::Reset)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    fn send(&self, command: SessionCommand) -> Result<(), ClassifierError> {
        self.commands
            .send(command)
            .map_err(|_| ClassifierError::Runtime("Session driver has stopped".to_string()))
    }
}

enum DriverEvent {
    Command(Option<SessionCommand>),
    Completion(Completion),
}

/// Owns a session and serializes presentation commands with worker
/// completions, so the session is only ever touched from one task.
pub struct SessionDriver {
    session: ClassificationSession,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
}

impl SessionDriver {
    /// Spawns the driver task. It stops once every handle has been dropped.
    pub fn spawn(session: ClassificationSession) -> (SessionHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            commands: commands_tx,
            state: session.subscribe(),
        };
        let driver = SessionDriver {
            session,
            commands: commands_rx,
        };
        (handle, tokio::spawn(driver.run()))
    }

    async fn run(mut self) {
        tracing::debug!("Session driver started");
        loop {
            let event = tokio::select! {
                command = self.commands.recv() => DriverEvent::Command(command),
                Some(completion) = self.session.recv_completion() => {
                    DriverEvent::Completion(completion)
                }
            };
            match event {
                DriverEvent::Command(Some(command)) => self.handle(command),
                DriverEvent::Command(None) => break,
                DriverEvent::Completion(completion) => {
                    self.session.apply_completion(completion);
                }
            }
        }
        tracing::debug!("Session driver stopped");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SubmitImage(image) => {
                self.session.set_image(image);
            }
            SessionCommand::Classify => {
                self.session.classify();
            }
            SessionCommand::Reset => self.session.clear_image(),
        }
    }
}

/// Loads the classifier described by `config` on the blocking pool and starts
/// a session around it. A model that fails to load leaves the session usable
/// but every classification reports the model as unavailable.
pub async fn open_session(
    config: &ClassifierConfig,
) -> Result<(SessionHandle, JoinHandle<()>), ClassifierError> {
    config.validate()?;
    let manager = ModelManager::from_config(&config.model);
    let engine = EngineStatus::from_load(manager.load_async().await);
    let session = ClassificationSession::new(engine, config.session.clone())?;
    Ok(SessionDriver::spawn(session))
}
