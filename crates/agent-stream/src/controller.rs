//! Async session driver: run builder, session handle and the consumer-side stream.

use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{Instrument as _, debug, info};

use crate::client::ClientInner;
use crate::config::RunOptions;
use crate::errors::{ClientError, StreamFailure};
use crate::message::DisplayMessage;
use crate::pipeline::SessionPipeline;
use crate::source::{AgentRequest, EventSource, RunTarget};
use crate::stats::RunStats;
use crate::stream::StreamEvent;

/// Lifecycle of one streamed session. `Completed`, `Errored` and `Cancelled` are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }
}

/// Handle used to cancel a running session.
#[derive(Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Requests cancellation.
    ///
    /// The session stops before processing its next chunk and delivers nothing further;
    /// no error event is produced.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Callback surface for consumers that prefer push-style delivery.
///
/// Exactly one of a `done` message (followed by `on_complete`) or `on_error` is delivered
/// per session, unless it is cancelled.
pub trait SessionObserver {
    fn on_message(&mut self, message: DisplayMessage);

    fn on_error(&mut self, _error: StreamFailure) {}

    fn on_complete(&mut self, _stats: RunStats) {}
}

/// Builder for configuring and starting a single streamed run.
pub struct RunBuilder {
    client: Arc<ClientInner>,
    target: RunTarget,
    message: String,
    monitor: bool,
    session_id: Option<String>,
    user_id: Option<String>,
    user_name: Option<String>,
    phone_number: Option<String>,
    cpf: Option<String>,
    options: RunOptions,
}

impl RunBuilder {
    pub(crate) fn new(client: Arc<ClientInner>, target: RunTarget) -> Self {
        Self {
            client,
            target,
            message: String::new(),
            monitor: true,
            session_id: None,
            user_id: None,
            user_name: None,
            phone_number: None,
            cpf: None,
            options: RunOptions::default(),
        }
    }

    /// Sets the user message for the run.
    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.message = text.into();
        self
    }

    /// Continues an existing session. Also used to stamp messages until the backend
    /// reports its own id.
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn cpf(mut self, cpf: impl Into<String>) -> Self {
        self.cpf = Some(cpf.into());
        self
    }

    /// Toggles backend-side run monitoring (enabled by default).
    pub fn monitor(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }

    /// Sets the bounded event buffer size between the session task and the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    /// Caps the bytes buffered for one unterminated event before it is discarded.
    pub fn max_partial_bytes(mut self, limit: usize) -> Self {
        self.options.max_partial_bytes = limit;
        self
    }

    /// Validates the builder and starts the session task.
    pub async fn start_stream(self) -> Result<SessionStream, ClientError> {
        let (client, request, options) = self.validate()?;
        let run_id = request.run_id;
        let caller_session_id = request.session_id.clone();

        let (tx, rx) = mpsc::channel(options.stream_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let handle = SessionHandle {
            pipeline: SessionPipeline::new(&client.classifier, caller_session_id.clone())
                .with_max_partial_bytes(options.max_partial_bytes),
            tx,
            cancel_rx,
            state_tx,
            terminal_delivered: false,
        };
        let span = tracing::info_span!("session", run_id = %run_id, target = %request.target);
        tokio::spawn(
            run_session(client.source.clone(), request, handle, final_tx).instrument(span),
        );

        Ok(SessionStream {
            run_id,
            session_id: caller_session_id,
            rx,
            final_rx,
            cancel_handle: CancelHandle { tx: cancel_tx },
            state_rx,
            saw_terminal: false,
        })
    }

    /// Runs to completion and returns the concatenated message contents.
    pub async fn collect_text(self) -> Result<String, ClientError> {
        let mut stream = self.start_stream().await?;
        let mut text = String::new();
        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Message(message) => text.push_str(&message.content),
                StreamEvent::Completed { .. } | StreamEvent::Failed { .. } => break,
            }
        }
        stream.finish().await?;
        Ok(text)
    }

    fn validate(self) -> Result<(Arc<ClientInner>, AgentRequest, RunOptions), ClientError> {
        if self.target.id().trim().is_empty() {
            return Err(ClientError::Validation("target id must not be empty".into()));
        }
        if self.message.trim().is_empty() {
            return Err(ClientError::Validation("message must not be empty".into()));
        }
        if self.options.stream_buffer_capacity == 0 {
            return Err(ClientError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        if self.options.max_partial_bytes == 0 {
            return Err(ClientError::Validation(
                "max_partial_bytes must be greater than 0".into(),
            ));
        }
        let request = AgentRequest {
            run_id: uuid::Uuid::new_v4(),
            target: self.target,
            message: self.message,
            monitor: self.monitor,
            session_id: self.session_id.filter(|s| !s.trim().is_empty()),
            user_id: self.user_id,
            user_name: self.user_name,
            phone_number: self.phone_number,
            cpf: self.cpf,
        };
        Ok((self.client, request, self.options))
    }
}

/// Consumer side of a started session.
///
/// Use [`next_event`](Self::next_event) to pull events, or [`drive`](Self::drive) to push
/// them into a [`SessionObserver`]; [`finish`](Self::finish) returns the final result.
pub struct SessionStream {
    run_id: uuid::Uuid,
    session_id: Option<String>,
    rx: mpsc::Receiver<StreamEvent>,
    final_rx: oneshot::Receiver<Result<RunStats, ClientError>>,
    cancel_handle: CancelHandle,
    state_rx: watch::Receiver<SessionState>,
    saw_terminal: bool,
}

impl SessionStream {
    /// Local id used to correlate log lines for this run.
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Session id supplied by the caller, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns a handle that can cancel the session.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Waits for the next event. Returns `None` once the session has nothing more to send.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let event = self.rx.recv().await;
        if event.as_ref().is_some_and(StreamEvent::is_terminal) {
            self.saw_terminal = true;
        }
        event
    }

    /// Delivers every remaining event to `observer`, then returns the final result.
    pub async fn drive(
        mut self,
        observer: &mut impl SessionObserver,
    ) -> Result<RunStats, ClientError> {
        while let Some(event) = self.next_event().await {
            match event {
                StreamEvent::Message(message) => observer.on_message(message),
                StreamEvent::Completed { stats } => observer.on_complete(stats),
                StreamEvent::Failed { error } => observer.on_error(error),
            }
        }
        self.finish().await
    }

    /// Drains the stream if needed and returns the final statistics.
    pub async fn finish(mut self) -> Result<RunStats, ClientError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(event) if event.is_terminal() => self.saw_terminal = true,
                Some(_) => {}
                None => break,
            }
        }

        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::protocol_msg(format!(
                "session task ended without a final result (run_id={})",
                self.run_id
            ))),
        }
    }
}

/// Per-session state owned by the driver task.
struct SessionHandle {
    pipeline: SessionPipeline,
    tx: mpsc::Sender<StreamEvent>,
    cancel_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<SessionState>,
    terminal_delivered: bool,
}

enum Step {
    Continue,
    Finished(Result<RunStats, ClientError>),
}

impl SessionHandle {
    fn set_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    fn cancel_requested(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    fn cancel_session(&mut self) -> Result<RunStats, ClientError> {
        self.pipeline.cancel();
        self.set_state(SessionState::Cancelled);
        Err(ClientError::Cancelled)
    }

    async fn deliver(&mut self, events: Vec<StreamEvent>) -> Step {
        for event in events {
            if !self.terminal_delivered && self.cancel_requested() {
                return Step::Finished(self.cancel_session());
            }
            let outcome = match &event {
                StreamEvent::Message(message) => {
                    if message.done {
                        self.terminal_delivered = true;
                    }
                    None
                }
                StreamEvent::Completed { stats } => Some(Ok(stats.clone())),
                StreamEvent::Failed { error } => Some(Err(ClientError::Failed(error.clone()))),
            };
            if self.tx.send(event).await.is_err() && !self.terminal_delivered {
                debug!("session receiver dropped");
                return Step::Finished(self.cancel_session());
            }
            if let Some(result) = outcome {
                self.set_state(if result.is_ok() {
                    SessionState::Completed
                } else {
                    SessionState::Errored
                });
                return Step::Finished(result);
            }
        }
        Step::Continue
    }
}

async fn cancellation(rx: &mut watch::Receiver<bool>) {
    let sender_gone = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

async fn run_session(
    source: Arc<dyn EventSource>,
    request: AgentRequest,
    mut handle: SessionHandle,
    final_tx: oneshot::Sender<Result<RunStats, ClientError>>,
) {
    handle.set_state(SessionState::Requesting);
    info!(session_id = ?request.session_id, "starting session");

    let opened = tokio::select! {
        biased;
        _ = cancellation(&mut handle.cancel_rx) => None,
        opened = source.open(&request) => Some(opened),
    };
    let mut body = match opened {
        None => {
            info!("session cancelled before the request resolved");
            let _ = final_tx.send(handle.cancel_session());
            return;
        }
        Some(Ok(body)) => body,
        Some(Err(err)) => {
            let events = handle.pipeline.transport_failed(&err);
            let result = match handle.deliver(events).await {
                Step::Finished(result) => result,
                Step::Continue => Err(ClientError::protocol_msg(
                    "request failure produced no terminal event",
                )),
            };
            info!(state = ?handle.state(), "session ended before streaming");
            let _ = final_tx.send(result);
            return;
        }
    };

    handle.set_state(SessionState::Streaming);
    loop {
        let next = tokio::select! {
            biased;
            _ = cancellation(&mut handle.cancel_rx) => None,
            next = body.next() => Some(next),
        };
        if next.is_none() || handle.cancel_requested() {
            info!("session cancelled");
            let _ = final_tx.send(handle.cancel_session());
            return;
        }

        let events = match next.flatten() {
            Some(Ok(chunk)) => handle.pipeline.push_chunk(&chunk),
            Some(Err(err)) => handle.pipeline.transport_failed(&err),
            None => handle.pipeline.end_of_stream(),
        };
        if let Step::Finished(result) = handle.deliver(events).await {
            info!(
                state = ?handle.state(),
                session_id = ?handle.pipeline.session_id(),
                "session finished"
            );
            let _ = final_tx.send(result);
            return;
        }
    }
}
