use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;

use crate::runner::CapturedRequest;
use crate::runner::CapturedResponse;

pub const REPORT: &str = "report";

/// Hook that observes every exchange sent through a request specification.
pub trait Filter: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn on_request(&self, _request: &CapturedRequest) {}

    fn on_response(&self, _request: &CapturedRequest, _response: &CapturedResponse) {}

    fn on_error(&self, _request: &CapturedRequest, _error: &str) {}
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: CapturedRequest,
    pub response: Option<CapturedResponse>,
    pub error: Option<String>,
}

/// Keeps a copy of every exchange so it can be written to the report.
#[derive(Debug, Clone, Default)]
pub struct ReportCapture {
    exchanges: Arc<Mutex<Vec<Exchange>>>,
}

impl ReportCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.lock().clone()
    }

    fn push(&self, exchange: Exchange) {
        self.lock().push(exchange);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Exchange>> {
        // A poisoned capture still holds every exchange pushed before the panic
        self.exchanges
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Filter for ReportCapture {
    fn name(&self) -> &str {
        REPORT
    }

    fn on_response(&self, request: &CapturedRequest, response: &CapturedResponse) {
        self.push(Exchange {
            request: request.clone(),
            response: Some(response.clone()),
            error: None,
        });
    }

    fn on_error(&self, request: &CapturedRequest, error: &str) {
        self.push(Exchange {
            request: request.clone(),
            response: None,
            error: Some(error.to_string()),
        });
    }
}
