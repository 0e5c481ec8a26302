//! Decimated preview parsing, run off the interaction thread.
//!
//! Requests carry an id and responses echo it, so the main side can tell
//! a stale response from the newest one regardless of arrival order.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gpx_types::PreviewPoint;
use crate::parser::parse_preview_points;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub id: u64,
    pub bytes: Vec<u8>,
}

/// `{ id, success: true, points }` or `{ id, success: false, error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<PreviewPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PreviewResponse {
    pub fn ok(id: u64, points: Vec<PreviewPoint>) -> Self {
        Self {
            id,
            success: true,
            points,
            error: None,
        }
    }

    pub fn failed(id: u64, error: impl ToString) -> Self {
        Self {
            id,
            success: false,
            points: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Largest id a JS number carries exactly.
const MAX_MESSAGE_ID: f64 = 9_007_199_254_740_991.0;

/// A message id received as a JS number. `None` unless it is a whole,
/// non-negative number that converts to `u64` without loss.
pub fn message_id(raw: f64) -> Option<u64> {
    (raw.is_finite() && raw >= 0.0 && raw.fract() == 0.0 && raw <= MAX_MESSAGE_ID)
        .then_some(raw as u64)
}

/// Worker body: one request in, one response out.
pub fn handle_preview_request(request: &PreviewRequest, stride: usize) -> PreviewResponse {
    match parse_preview_points(&request.bytes, stride) {
        Ok(points) => PreviewResponse::ok(request.id, points),
        Err(e) => PreviewResponse::failed(request.id, e),
    }
}

/// What happened to a response handed to [`PreviewChannel::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Points(usize),
    Failed(String),
    Stale,
    Malformed,
}

/// Main-thread end of the preview worker.
#[derive(Debug, Default)]
pub struct PreviewChannel {
    next_id: u64,
    newest_applied: Option<u64>,
    points: Vec<PreviewPoint>,
    last_error: Option<String>,
}

impl PreviewChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn next_request(&mut self, bytes: Vec<u8>) -> PreviewRequest {
        PreviewRequest {
            id: self.next_id(),
            bytes,
        }
    }

    pub fn points(&self) -> &[PreviewPoint] {
        &self.points
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Apply a response unless one for a newer request was applied already.
    pub fn apply(&mut self, response: PreviewResponse) -> Applied {
        if self.newest_applied.is_some_and(|newest| response.id < newest) {
            debug!(id = response.id, "discarding stale preview response");
            return Applied::Stale;
        }
        self.newest_applied = Some(response.id);

        if response.success {
            self.last_error = None;
            self.points = response.points;
            Applied::Points(self.points.len())
        } else {
            let error = response
                .error
                .unwrap_or_else(|| "preview failed".to_string());
            warn!(id = response.id, %error, "preview parse failed");
            self.last_error = Some(error.clone());
            Applied::Failed(error)
        }
    }

    /// Apply a JSON-encoded response as posted back by a worker.
    pub fn apply_message(&mut self, message: &str) -> Applied {
        match serde_json::from_str::<PreviewResponse>(message) {
            Ok(response) => self.apply(response),
            Err(e) => {
                warn!(error = %e, "malformed preview message");
                Applied::Malformed
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::PreviewWorker;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::thread::JoinHandle;

    use futures::StreamExt;
    use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
    use futures::executor::block_on;
    use tracing::debug;

    use super::{PreviewRequest, PreviewResponse, handle_preview_request};

    /// Preview parsing on a dedicated thread. Responses come back on
    /// [`PreviewWorker::responses`] in completion order.
    pub struct PreviewWorker {
        requests: Option<UnboundedSender<PreviewRequest>>,
        responses: UnboundedReceiver<PreviewResponse>,
        thread: Option<JoinHandle<()>>,
    }

    impl PreviewWorker {
        pub fn spawn(stride: usize) -> std::io::Result<Self> {
            let (request_tx, mut request_rx) = mpsc::unbounded::<PreviewRequest>();
            let (response_tx, response_rx) = mpsc::unbounded();

            let thread = std::thread::Builder::new()
                .name("gpx-preview".into())
                .spawn(move || {
                    block_on(async move {
                        while let Some(request) = request_rx.next().await {
                            debug!(id = request.id, bytes = request.bytes.len(), "preview request");
                            let response = handle_preview_request(&request, stride);
                            if response_tx.unbounded_send(response).is_err() {
                                break;
                            }
                        }
                    })
                })?;

            Ok(Self {
                requests: Some(request_tx),
                responses: response_rx,
                thread: Some(thread),
            })
        }

        /// Queue a request. Never blocks; in-flight requests are not cancelled.
        pub fn submit(&self, request: PreviewRequest) -> bool {
            self.requests
                .as_ref()
                .is_some_and(|tx| tx.unbounded_send(request).is_ok())
        }

        pub fn responses(&mut self) -> &mut UnboundedReceiver<PreviewResponse> {
            &mut self.responses
        }
    }

    impl Drop for PreviewWorker {
        fn drop(&mut self) {
            self.requests.take();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
