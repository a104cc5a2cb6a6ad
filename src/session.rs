//! Async driver for [`LifecycleController`].
//!
//! Executes the controller's commands on a tokio runtime: documents are
//! published on a watch channel for the sandbox surface, the grace period is a
//! spawned `sleep` whose handle is aborted when a newer run supersedes it, and
//! every transition is published as a [`LifecycleSnapshot`].

use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::lifecycle::{
    Command, LifecycleController, LifecycleSnapshot, PipelineBuilder, PreviewBuilder,
};
use crate::model::{RenderDocument, SourceDocument};
use crate::options::PreviewOptions;

struct SessionState<B> {
    controller: LifecycleController<B>,
    grace: Option<(u64, JoinHandle<()>)>,
}

struct Shared<B> {
    state: Mutex<SessionState<B>>,
    snapshots: watch::Sender<LifecycleSnapshot>,
    documents: watch::Sender<Option<RenderDocument>>,
}

pub struct PreviewSession<B = PipelineBuilder> {
    shared: Arc<Shared<B>>,
}

impl<B> Clone for PreviewSession<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl PreviewSession<PipelineBuilder> {
    pub fn new(options: PreviewOptions) -> Self {
        Self::with_controller(LifecycleController::new(options))
    }
}

impl<B: PreviewBuilder + Send + 'static> PreviewSession<B> {
    pub fn with_controller(controller: LifecycleController<B>) -> Self {
        let (snapshots, _) = watch::channel(controller.snapshot());
        let (documents, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState {
                    controller,
                    grace: None,
                }),
                snapshots,
                documents,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Documents to load into the sandbox, newest only.
    pub fn documents(&self) -> watch::Receiver<Option<RenderDocument>> {
        self.shared.documents.subscribe()
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    pub async fn set_code(&self, doc: SourceDocument) {
        let mut state = self.shared.state.lock().await;
        let commands = state.controller.on_code(doc);
        self.apply(&mut state, commands);
    }

    pub async fn retry(&self) {
        let mut state = self.shared.state.lock().await;
        let commands = state.controller.retry();
        self.apply(&mut state, commands);
    }

    /// Relays a raw message received from the sandbox window.
    pub async fn handle_message(&self, payload: &str) {
        let mut state = self.shared.state.lock().await;
        let commands = state.controller.handle_message(payload);
        self.apply(&mut state, commands);
    }

    fn apply(&self, state: &mut SessionState<B>, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Mount(document) => {
                    self.shared.documents.send_replace(Some(document));
                }
                Command::CancelGrace { token } => {
                    if let Some((pending, handle)) = state.grace.take() {
                        if pending == token {
                            handle.abort();
                        } else {
                            state.grace = Some((pending, handle));
                        }
                    }
                }
                Command::ScheduleGrace { token, after } => {
                    if let Some((_, handle)) = state.grace.take() {
                        handle.abort();
                    }
                    let shared = Arc::clone(&self.shared);
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let mut state = shared.state.lock().await;
                        if state.controller.on_grace_elapsed(token) {
                            state.grace = None;
                            shared.snapshots.send_replace(state.controller.snapshot());
                        }
                    });
                    state.grace = Some((token, handle));
                }
            }
        }
        self.shared.snapshots.send_replace(state.controller.snapshot());
    }
}
