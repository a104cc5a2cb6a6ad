//! Preview Lifecycle Controller
//!
//! A synchronous state machine: `Idle → Loading → Success | Error`, re-entered
//! on new input or retry. It never sleeps or spawns; instead every transition
//! returns the [`Command`]s a driver must carry out (mount a document, arm or
//! cancel the grace timer). See [`crate::session::PreviewSession`] for the
//! tokio driver.
//!
//! Every run gets a fresh `retry_token`. Timer completions and sandbox events
//! carrying an older token or run id are discarded, so the last input wins.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::diagnostics::Pass;
use crate::document::{error_document, run_id, MESSAGE_SOURCE};
use crate::error::PreviewError;
use crate::model::{RenderDocument, SourceDocument};
use crate::options::PreviewOptions;
use crate::pipeline::try_build;

pub const STATUS_IDLE: &str = "Waiting for code";
pub const STATUS_LOADING: &str = "Loading preview…";
pub const STATUS_READY: &str = "Preview ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleSnapshot {
    pub state: LifecycleState,
    pub error_message: Option<String>,
    pub retry_token: u64,
    pub status_text: String,
}

impl Default for LifecycleSnapshot {
    fn default() -> Self {
        Self {
            state: LifecycleState::Idle,
            error_message: None,
            retry_token: 0,
            status_text: STATUS_IDLE.to_string(),
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Hand a fresh document to the sandbox.
    Mount(RenderDocument),
    ScheduleGrace { token: u64, after: Duration },
    CancelGrace { token: u64 },
}

/// Message posted by the harness to its parent window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxEvent {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
}

/// Produces the document for one run.
pub trait PreviewBuilder {
    fn build(&self, doc: &SourceDocument, retry_token: u64) -> Result<RenderDocument, PreviewError>;
}

/// Runs the full transformation pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    pub options: PreviewOptions,
}

impl PreviewBuilder for PipelineBuilder {
    fn build(&self, doc: &SourceDocument, retry_token: u64) -> Result<RenderDocument, PreviewError> {
        try_build(doc, &self.options, retry_token)
    }
}

pub struct LifecycleController<B = PipelineBuilder> {
    builder: B,
    options: PreviewOptions,
    state: LifecycleState,
    error_message: Option<String>,
    retry_token: u64,
    current: Option<SourceDocument>,
    run_id: Option<String>,
    pending_grace: Option<u64>,
}

impl LifecycleController<PipelineBuilder> {
    pub fn new(options: PreviewOptions) -> Self {
        let builder = PipelineBuilder {
            options: options.clone(),
        };
        Self::with_builder(builder, options)
    }
}

impl<B: PreviewBuilder> LifecycleController<B> {
    pub fn with_builder(builder: B, options: PreviewOptions) -> Self {
        Self {
            builder,
            options,
            state: LifecycleState::Idle,
            error_message: None,
            retry_token: 0,
            current: None,
            run_id: None,
            pending_grace: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn retry_token(&self) -> u64 {
        self.retry_token
    }

    /// Run id of the document currently in the sandbox.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        let status_text = match self.state {
            LifecycleState::Idle => STATUS_IDLE.to_string(),
            LifecycleState::Loading => STATUS_LOADING.to_string(),
            LifecycleState::Success => STATUS_READY.to_string(),
            LifecycleState::Error => self.error_message.clone().unwrap_or_default(),
        };
        LifecycleSnapshot {
            state: self.state,
            error_message: self.error_message.clone(),
            retry_token: self.retry_token,
            status_text,
        }
    }

    /// New input from the host. Always supersedes the previous run.
    pub fn on_code(&mut self, doc: SourceDocument) -> Vec<Command> {
        self.current = Some(doc);
        self.start()
    }

    /// Re-runs the pipeline on the unchanged input.
    pub fn retry(&mut self) -> Vec<Command> {
        if self.current.is_none() {
            return Vec::new();
        }
        self.start()
    }

    /// Grace timer fired. Returns false when the token is stale.
    pub fn on_grace_elapsed(&mut self, token: u64) -> bool {
        if self.pending_grace != Some(token) || self.state != LifecycleState::Loading {
            tracing::debug!(
                target: "preview",
                pass = Pass::Lifecycle.as_str(),
                "discarding stale grace timer {}",
                token
            );
            return false;
        }
        self.pending_grace = None;
        self.transition(LifecycleState::Success, None);
        true
    }

    /// Runtime error reported by the sandbox for `run_id`.
    pub fn on_sandbox_error(
        &mut self,
        run_id: &str,
        message: &str,
        stack: Option<&str>,
    ) -> Vec<Command> {
        if self.run_id.as_deref() != Some(run_id) {
            tracing::debug!(
                target: "preview",
                pass = Pass::Lifecycle.as_str(),
                "discarding error from superseded run {}",
                run_id
            );
            return Vec::new();
        }
        if self.state == LifecycleState::Error {
            return Vec::new();
        }

        let err = PreviewError::SandboxRuntime {
            message: message.to_string(),
            stack: stack.map(str::to_string),
        };
        let mut commands = Vec::new();
        self.cancel_grace(&mut commands);
        self.transition(LifecycleState::Error, Some(err.to_string()));
        commands
    }

    /// Parses a raw `postMessage` payload. Foreign or malformed messages are ignored.
    pub fn handle_message(&mut self, payload: &str) -> Vec<Command> {
        let event: SandboxEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(
                    target: "preview",
                    pass = Pass::Lifecycle.as_str(),
                    "ignoring malformed sandbox message: {}",
                    err
                );
                return Vec::new();
            }
        };
        if event.source != MESSAGE_SOURCE || event.kind != "error" {
            return Vec::new();
        }
        let Some(run_id) = event.run_id.as_deref() else {
            return Vec::new();
        };
        let message = event.message.as_deref().unwrap_or("Unknown runtime error");
        self.on_sandbox_error(run_id, message, event.stack.as_deref())
    }

    fn start(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        self.cancel_grace(&mut commands);
        self.retry_token += 1;
        let token = self.retry_token;

        let Some(doc) = self.current.clone() else {
            return commands;
        };
        if doc.is_blank() {
            self.run_id = None;
            self.transition(LifecycleState::Error, Some(PreviewError::EmptyInput.to_string()));
            return commands;
        }

        self.transition(LifecycleState::Loading, None);
        match self.builder.build(&doc, token) {
            Ok(document) => {
                self.run_id = Some(document.run_id.clone());
                commands.push(Command::Mount(document));
                commands.push(Command::ScheduleGrace {
                    token,
                    after: self.options.grace_period(),
                });
                self.pending_grace = Some(token);
            }
            Err(err) => {
                let id = run_id(token, &doc.code);
                let document = error_document(err.title(), &err.to_string(), &id, &self.options);
                self.run_id = Some(id);
                commands.push(Command::Mount(document));
                self.transition(LifecycleState::Error, Some(err.to_string()));
            }
        }
        commands
    }

    fn cancel_grace(&mut self, commands: &mut Vec<Command>) {
        if let Some(token) = self.pending_grace.take() {
            commands.push(Command::CancelGrace { token });
        }
    }

    fn transition(&mut self, state: LifecycleState, error_message: Option<String>) {
        tracing::debug!(
            target: "preview",
            pass = Pass::Lifecycle.as_str(),
            "{:?} -> {:?} (token {})",
            self.state,
            state,
            self.retry_token
        );
        self.state = state;
        self.error_message = error_message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Counts invocations; fails when the code contains `FAIL`.
    #[derive(Default)]
    struct CountingBuilder {
        calls: Cell<usize>,
    }

    impl PreviewBuilder for CountingBuilder {
        fn build(&self, doc: &SourceDocument, retry_token: u64) -> Result<RenderDocument, PreviewError> {
            self.calls.set(self.calls.get() + 1);
            if doc.code.contains("FAIL") {
                return Err(PreviewError::Transformation("boom".to_string()));
            }
            Ok(RenderDocument {
                html: "<html></html>".to_string(),
                run_id: run_id(retry_token, &doc.code),
                component_name: "App".to_string(),
                libraries: Vec::new(),
                is_error: false,
            })
        }
    }

    fn controller() -> LifecycleController<CountingBuilder> {
        LifecycleController::with_builder(CountingBuilder::default(), PreviewOptions::default())
    }

    fn error_event(run_id: &str, message: &str) -> String {
        serde_json::json!({
            "source": MESSAGE_SOURCE,
            "type": "error",
            "runId": run_id,
            "message": message,
            "stack": "at App"
        })
        .to_string()
    }

    #[test]
    fn test_starts_idle() {
        let ctl = controller();
        let snap = ctl.snapshot();
        assert_eq!(snap.state, LifecycleState::Idle);
        assert_eq!(snap.status_text, STATUS_IDLE);
        assert_eq!(snap.retry_token, 0);
    }

    #[test]
    fn test_empty_input_skips_builder() {
        let mut ctl = controller();
        let commands = ctl.on_code(SourceDocument::new("   \n"));
        assert!(commands.is_empty());
        assert_eq!(ctl.state(), LifecycleState::Error);
        assert_eq!(ctl.builder.calls.get(), 0);
        assert!(ctl.error_message().unwrap_or("").contains("empty"));
    }

    #[test]
    fn test_code_mounts_and_schedules_grace() {
        let mut ctl = controller();
        let commands = ctl.on_code(SourceDocument::new("const App = () => null;"));
        assert_eq!(ctl.state(), LifecycleState::Loading);
        assert_eq!(ctl.snapshot().status_text, STATUS_LOADING);
        assert!(matches!(commands[0], Command::Mount(_)));
        assert_eq!(
            commands[1],
            Command::ScheduleGrace {
                token: 1,
                after: Duration::from_millis(1500)
            }
        );

        assert!(ctl.on_grace_elapsed(1));
        assert_eq!(ctl.state(), LifecycleState::Success);
        assert_eq!(ctl.snapshot().status_text, STATUS_READY);
    }

    #[test]
    fn test_new_input_cancels_previous_timer() {
        let mut ctl = controller();
        ctl.on_code(SourceDocument::new("const A = 1;"));
        let commands = ctl.on_code(SourceDocument::new("const B = 2;"));
        assert_eq!(commands[0], Command::CancelGrace { token: 1 });

        assert!(!ctl.on_grace_elapsed(1));
        assert_eq!(ctl.state(), LifecycleState::Loading);
        assert!(ctl.on_grace_elapsed(2));
        assert_eq!(ctl.state(), LifecycleState::Success);
    }

    #[test]
    fn test_build_failure_mounts_error_document() {
        let mut ctl = controller();
        let commands = ctl.on_code(SourceDocument::new("FAIL"));
        assert_eq!(ctl.state(), LifecycleState::Error);
        assert_eq!(ctl.error_message(), Some("Failed to build preview: boom"));
        match &commands[..] {
            [Command::Mount(doc)] => assert!(doc.is_error),
            other => panic!("unexpected commands: {:?}", other),
        }
    }

    #[test]
    fn test_sandbox_error_for_current_run() {
        let mut ctl = controller();
        ctl.on_code(SourceDocument::new("const App = 1;"));
        let id = ctl.run_id().unwrap_or_default().to_string();

        let commands = ctl.handle_message(&error_event(&id, "x is not defined"));
        assert_eq!(commands, vec![Command::CancelGrace { token: 1 }]);
        assert_eq!(ctl.state(), LifecycleState::Error);
        assert_eq!(ctl.snapshot().status_text, "x is not defined");

        // a second report for the same run keeps the first message
        ctl.handle_message(&error_event(&id, "other"));
        assert_eq!(ctl.error_message(), Some("x is not defined"));
    }

    #[test]
    fn test_late_sandbox_error_after_success() {
        let mut ctl = controller();
        ctl.on_code(SourceDocument::new("const App = 1;"));
        let id = ctl.run_id().unwrap_or_default().to_string();
        assert!(ctl.on_grace_elapsed(1));
        assert_eq!(ctl.state(), LifecycleState::Success);

        // no timer is pending any more, so nothing to cancel
        let commands = ctl.handle_message(&error_event(&id, "click handler failed"));
        assert!(commands.is_empty());
        assert_eq!(ctl.state(), LifecycleState::Error);
        assert_eq!(ctl.error_message(), Some("click handler failed"));
        assert_eq!(ctl.retry_token(), 1);
    }

    #[test]
    fn test_stale_sandbox_error_is_discarded() {
        let mut ctl = controller();
        ctl.on_code(SourceDocument::new("const A = 1;"));
        let old = ctl.run_id().unwrap_or_default().to_string();
        ctl.on_code(SourceDocument::new("const B = 1;"));

        assert!(ctl.handle_message(&error_event(&old, "late")).is_empty());
        assert_eq!(ctl.state(), LifecycleState::Loading);
    }

    #[test]
    fn test_foreign_and_malformed_messages_are_ignored() {
        let mut ctl = controller();
        ctl.on_code(SourceDocument::new("const A = 1;"));
        let id = ctl.run_id().unwrap_or_default().to_string();

        let foreign = serde_json::json!({"source": "devtools", "type": "error", "runId": id}).to_string();
        assert!(ctl.handle_message(&foreign).is_empty());
        assert!(ctl.handle_message("not json").is_empty());
        assert_eq!(ctl.state(), LifecycleState::Loading);
    }

    #[test]
    fn test_retry_reruns_unchanged_input() {
        let mut ctl = controller();
        assert!(ctl.retry().is_empty());

        ctl.on_code(SourceDocument::new("const A = 1;"));
        let id = ctl.run_id().unwrap_or_default().to_string();
        ctl.handle_message(&error_event(&id, "boom"));
        assert_eq!(ctl.state(), LifecycleState::Error);

        let commands = ctl.retry();
        assert_eq!(ctl.state(), LifecycleState::Loading);
        assert_eq!(ctl.retry_token(), 2);
        assert_eq!(ctl.builder.calls.get(), 2);
        assert!(ctl.error_message().is_none());
        assert!(commands.iter().any(|c| matches!(c, Command::ScheduleGrace { token: 2, .. })));
        assert_ne!(ctl.run_id(), Some(id.as_str()));
    }

    #[test]
    fn test_pipeline_builder_runs_real_pipeline() {
        let mut ctl = LifecycleController::new(PreviewOptions::default());
        let commands = ctl.on_code(SourceDocument::new("export default function Card() { return <div/>; }"));
        match &commands[0] {
            Command::Mount(doc) => {
                assert!(!doc.is_error);
                assert_eq!(doc.component_name, "Card");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
