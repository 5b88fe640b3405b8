//! Per-connection queue of requests submitted before the handshake completes

use beacon_mcp_protocol::{Request, Response};
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::oneshot;

/// Outcome delivered through a pending request's completion handle
pub type Completion = Result<Option<Response>, QueueError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Connection closed before the request was dispatched")]
    ConnectionClosed,

    #[error("Queue already flushed")]
    Sealed,
}

/// A queued request together with the handle that resolves it
#[derive(Debug)]
pub struct PendingRequest {
    request: Request,
    completion: oneshot::Sender<Completion>,
}

impl PendingRequest {
    pub fn new(request: Request) -> (Self, oneshot::Receiver<Completion>) {
        let (completion, receiver) = oneshot::channel();
        (
            Self {
                request,
                completion,
            },
            receiver,
        )
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Resolve with the dispatch outcome. A dropped receiver is ignored.
    pub fn complete(self, response: Option<Response>) {
        let _ = self.completion.send(Ok(response));
    }

    pub fn reject(self, error: QueueError) {
        let _ = self.completion.send(Err(error));
    }
}

/// FIFO of pending requests, flushed exactly once
///
/// After [`RequestQueue::drain`] or [`RequestQueue::reject_all`] the queue is
/// sealed and refuses new entries.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<PendingRequest>,
    sealed: bool,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request, returning the receiver for its eventual outcome
    pub fn push(&mut self, request: Request) -> Result<oneshot::Receiver<Completion>, QueueError> {
        if self.sealed {
            return Err(QueueError::Sealed);
        }
        let (pending, receiver) = PendingRequest::new(request);
        self.entries.push_back(pending);
        Ok(receiver)
    }

    /// Seal the queue and hand out its entries in submission order
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.sealed = true;
        self.entries.drain(..).collect()
    }

    /// Seal the queue and reject every entry as closed. Returns the count.
    pub fn reject_all(&mut self) -> usize {
        self.sealed = true;
        let count = self.entries.len();
        for pending in self.entries.drain(..) {
            pending.reject(QueueError::ConnectionClosed);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}
