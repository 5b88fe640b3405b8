//! Per-connection state machine
//!
//! A [`Connection`] moves through `Connecting -> Initializing -> Ready ->
//! Closed` (or `Connecting -> Ready` without the automatic handshake) and never
//! back. Every transition happens under the connection's own lock, together
//! with the side effects that must not interleave with it: forwarding the
//! handshake response, draining the queue, emitting `initialization_error`.

use crate::event::{InitializationError, StreamEvent};
use crate::queue::{Completion, PendingRequest, QueueError, RequestQueue};
use beacon_mcp_logging::generate_correlation_id;
use beacon_mcp_protocol::{Request, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Initializing,
    Ready,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Initializing => "initializing",
            ConnectionState::Ready => "ready",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a submission was admitted
#[derive(Debug)]
pub enum Admission {
    /// Held until the handshake completes; resolves with the eventual response
    Queued(oneshot::Receiver<Completion>),
    /// Dispatch right away
    Immediate(Request),
}

/// One SSE stream and everything it owns
pub struct Connection {
    id: String,
    correlation_id: String,
    created_at: DateTime<Utc>,
    initialization_started: AtomicBool,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ConnectionState,
    last_activity: Instant,
    sink: Option<mpsc::UnboundedSender<StreamEvent>>,
    queue: RequestQueue,
    heartbeat: Option<JoinHandle<()>>,
    initialization_timer: Option<JoinHandle<()>>,
}

impl Inner {
    fn send(&self, event: StreamEvent) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| sink.send(event).is_ok())
    }

    fn close(&mut self) -> usize {
        self.state = ConnectionState::Closed;
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        if let Some(handle) = self.initialization_timer.take() {
            handle.abort();
        }
        // Dropping the sender ends the stream once buffered events are read
        self.sink = None;
        self.queue.reject_all()
    }
}

impl Connection {
    /// Create a connection in the `Connecting` state, with the receiving end
    /// of its event stream
    pub fn new(id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (sink, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id: id.into(),
            correlation_id: generate_correlation_id(),
            created_at: Utc::now(),
            initialization_started: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                state: ConnectionState::Connecting,
                last_activity: Instant::now(),
                sink: Some(sink),
                queue: RequestQueue::new(),
                heartbeat: None,
                initialization_timer: None,
            }),
        };
        (connection, receiver)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    pub fn last_activity(&self) -> Instant {
        self.lock().last_activity
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed()
    }

    /// Number of requests waiting for the handshake
    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    /// Push an event to the stream. Returns `false`, without error, once the
    /// stream is gone.
    pub fn send(&self, event: StreamEvent) -> bool {
        self.lock().send(event)
    }

    pub fn touch(&self) {
        self.lock().last_activity = Instant::now();
    }

    /// Claim the single handshake attempt and enter `Initializing`.
    ///
    /// Returns `true` for exactly one caller over the connection's lifetime,
    /// and only while the connection is still `Connecting`.
    pub fn begin_initialization(&self) -> bool {
        if self.initialization_started.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut inner = self.lock();
        if inner.state != ConnectionState::Connecting {
            return false;
        }
        inner.state = ConnectionState::Initializing;
        true
    }

    /// Go straight from `Connecting` to `Ready`, skipping the handshake
    pub fn mark_ready(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Connecting {
            return false;
        }
        inner.state = ConnectionState::Ready;
        inner.queue.drain();
        true
    }

    /// Forward the handshake response, enter `Ready` and take the queue.
    ///
    /// Returns `None` when the connection is no longer initializing (closed
    /// or timed out meanwhile), in which case the response is discarded.
    pub fn complete_initialization(&self, response: Response) -> Option<Vec<PendingRequest>> {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Initializing {
            return None;
        }
        inner.send(StreamEvent::McpResponse(response));
        inner.state = ConnectionState::Ready;
        if let Some(handle) = inner.initialization_timer.take() {
            handle.abort();
        }
        Some(inner.queue.drain())
    }

    /// Report a fatal handshake failure and close.
    ///
    /// `response` is forwarded ahead of the error when the handler answered
    /// with a protocol error. Returns `false` when the connection already left
    /// the initializing state.
    pub fn abort_initialization(
        &self,
        error: InitializationError,
        response: Option<Response>,
    ) -> bool {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Initializing {
            return false;
        }
        if let Some(response) = response {
            inner.send(StreamEvent::McpResponse(response));
        }
        inner.send(StreamEvent::InitializationError(error));
        let rejected = inner.close();
        debug!(connection_id = %self.id, rejected, "Initialization aborted");
        true
    }

    /// Admit a client submission: queued before `Ready`, immediate after.
    ///
    /// # Errors
    ///
    /// `QueueError::ConnectionClosed` once the connection is closed.
    pub fn submit(&self, request: Request) -> Result<Admission, QueueError> {
        let mut inner = self.lock();
        match inner.state {
            ConnectionState::Closed => Err(QueueError::ConnectionClosed),
            ConnectionState::Ready => {
                inner.last_activity = Instant::now();
                Ok(Admission::Immediate(request))
            }
            ConnectionState::Connecting | ConnectionState::Initializing => {
                inner.last_activity = Instant::now();
                inner.queue.push(request).map(Admission::Queued)
            }
        }
    }

    /// Attach the heartbeat task; aborted right away if already closed
    pub fn set_heartbeat(&self, handle: JoinHandle<()>) {
        let mut inner = self.lock();
        if inner.state == ConnectionState::Closed {
            handle.abort();
        } else if let Some(previous) = inner.heartbeat.replace(handle) {
            previous.abort();
        }
    }

    /// Attach the initialization timeout task; aborted right away unless the
    /// connection is still initializing
    pub fn set_initialization_timer(&self, handle: JoinHandle<()>) {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Initializing {
            handle.abort();
        } else if let Some(previous) = inner.initialization_timer.replace(handle) {
            previous.abort();
        }
    }

    /// Close the connection: cancel timers, end the stream and reject every
    /// queued request. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == ConnectionState::Closed {
            return false;
        }
        let rejected = inner.close();
        if rejected > 0 {
            debug!(connection_id = %self.id, rejected, "Rejected queued requests on close");
        }
        true
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("correlation_id", &self.correlation_id)
            .field("created_at", &self.created_at)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
