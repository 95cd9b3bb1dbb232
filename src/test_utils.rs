//! Shared test utilities.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::AiError;
use crate::service::{HttpRequest, HttpResponse, HttpTransport};

/// Transport with a pre-programmed queue of responses.
///
/// Responses are returned in FIFO order; once the queue is exhausted every
/// call fails with a network error. Clones share the queue and the request
/// log, so a clone kept by the test can inspect what the service sent after
/// the original has been moved into it.
#[derive(Clone)]
pub(crate) struct MockTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse, AiError>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    /// Creates a transport that answers with `responses` in order.
    pub(crate) fn new(responses: Vec<Result<HttpResponse, AiError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A response carrying `body` as JSON.
    pub(crate) fn json(status: u16, body: &Value) -> HttpResponse {
        let status_text = match status {
            200 => "OK",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            _ => "",
        };
        HttpResponse {
            status,
            status_text: status_text.to_string(),
            body: body.to_string(),
        }
    }

    /// Every request sent so far.
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent so far.
    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpTransport for MockTransport {
    fn send<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, AiError>> + Send + 'a>> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        Box::pin(async move {
            next.unwrap_or_else(|| Err(AiError::Network("no more mock responses".to_string())))
        })
    }
}
