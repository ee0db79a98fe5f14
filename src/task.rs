//! Poll and Write Tasks
//!
//! A task binds a request blueprint to an endpoint and an optional result
//! callback. Poll tasks have an identity used for recurring-registration
//! deduplication: two tasks are the same when endpoint and blueprint are
//! structurally equal and the callback is the very same `Arc` (pointer
//! identity, since closures have no structural equality).

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::error::TransportError;
use crate::pdu::{ReadOutcome, WriteResponse};
use crate::request::{ReadRequest, WriteRequest};

/// Terminal outcome of one read execution, after all retries.
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub endpoint: Endpoint,
    pub request: ReadRequest,
    pub outcome: Result<ReadOutcome, TransportError>,
}

/// Terminal outcome of one write execution, after all retries.
#[derive(Debug, Clone)]
pub struct WriteResult {
    pub endpoint: Endpoint,
    pub request: WriteRequest,
    pub outcome: Result<WriteResponse, TransportError>,
}

/// Receives exactly one [`ReadResult`] per resolved execution.
pub type ReadCallback = Arc<dyn Fn(ReadResult) + Send + Sync>;

/// Receives exactly one [`WriteResult`] per resolved execution.
pub type WriteCallback = Arc<dyn Fn(WriteResult) + Send + Sync>;

/// A read bound to an endpoint, usable one-shot or as a recurring poll.
#[derive(Clone)]
pub struct PollTask {
    endpoint: Endpoint,
    request: ReadRequest,
    callback: Option<ReadCallback>,
}

impl PollTask {
    pub fn new(endpoint: Endpoint, request: ReadRequest, callback: Option<ReadCallback>) -> Self {
        Self {
            endpoint,
            request,
            callback,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn request(&self) -> &ReadRequest {
        &self.request
    }

    pub(crate) fn callback(&self) -> Option<&ReadCallback> {
        self.callback.as_ref()
    }

    fn callback_identity(&self) -> usize {
        self.callback
            .as_ref()
            .map(|callback| Arc::as_ptr(callback) as *const () as usize)
            .unwrap_or(0)
    }
}

impl PartialEq for PollTask {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint == other.endpoint
            && self.request == other.request
            && self.callback_identity() == other.callback_identity()
    }
}

impl Eq for PollTask {}

impl Hash for PollTask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.endpoint.hash(state);
        self.request.hash(state);
        self.callback_identity().hash(state);
    }
}

impl std::fmt::Debug for PollTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollTask")
            .field("endpoint", &self.endpoint)
            .field("request", &self.request)
            .field("callback", &self.callback_identity())
            .finish()
    }
}

/// A write bound to an endpoint. One-shot; writes have no identity because
/// they are never registered for recurrence.
#[derive(Clone)]
pub struct WriteTask {
    endpoint: Endpoint,
    request: WriteRequest,
    callback: Option<WriteCallback>,
}

impl WriteTask {
    pub fn new(endpoint: Endpoint, request: WriteRequest, callback: Option<WriteCallback>) -> Self {
        Self {
            endpoint,
            request,
            callback,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn request(&self) -> &WriteRequest {
        &self.request
    }

    pub(crate) fn callback(&self) -> Option<&WriteCallback> {
        self.callback.as_ref()
    }
}

impl std::fmt::Debug for WriteTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTask")
            .field("endpoint", &self.endpoint)
            .field("request", &self.request)
            .finish()
    }
}
