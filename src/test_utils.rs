//! # Test Utilities
//!
//! An in-memory [`Transport`] for unit and integration tests. It records every
//! request it receives, tracks how many are in flight at once and answers
//! from a scripted responder.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::constants::pagination;
use crate::transport::{ApiRequest, Outcome, Transport};

type OutcomeFn = dyn Fn(&ApiRequest) -> Outcome + Send + Sync;

/// Scripted transport that never touches the network
pub struct MockTransport {
    responder: Arc<OutcomeFn>,
    requests: Mutex<Vec<ApiRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    yields: usize,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("requests", &self.requests.lock().len())
            .field("max_in_flight", &self.max_observed_in_flight())
            .field("yields", &self.yields)
            .finish()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Answers every request successfully with its method and endpoint
    pub fn new() -> Self {
        Self::with_responder(|request| {
            Ok(json!({"method": request.method.as_str(), "endpoint": request.endpoint}))
        })
    }

    /// `Ok(body)` becomes a success; `Err(status)` a failed request with that status
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<Value, u16> + Send + Sync + 'static,
    {
        Self::with_outcome_fn(move |request| match responder(request) {
            Ok(body) => Outcome::success(request.correlation_id.clone(), body),
            Err(status) => {
                Outcome::failed_request(request, Some(status), format!("HTTP {status}"), None)
            }
        })
    }

    /// Full control over the outcome, including its correlation id
    pub fn with_outcome_fn<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest) -> Outcome + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            yields: 0,
        }
    }

    /// Answers creates with sequential ids starting at `first_id`
    pub fn assigning_ids(first_id: u64) -> Self {
        let next = AtomicU64::new(first_id);
        Self::with_responder(move |_| {
            let id = next.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"id": id, "success": true}))
        })
    }

    /// Serves `records` as a paginated listing honoring `page` and `page_size`
    pub fn listing(records: Vec<Value>) -> Self {
        Self::with_responder(move |request| Ok(listing_page(&records, request)))
    }

    /// Fail every request with `status`
    #[must_use]
    pub fn fail_all(self, status: u16) -> Self {
        Self {
            responder: Arc::new(move |request: &ApiRequest| {
                Outcome::failed_request(request, Some(status), format!("HTTP {status}"), None)
            }),
            ..self
        }
    }

    /// Yield to the scheduler `n` times inside each dispatch so requests overlap
    #[must_use]
    pub fn with_yields(mut self, n: usize) -> Self {
        self.yields = n;
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests other than page-count probes
    pub fn page_requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| !is_probe(r))
            .cloned()
            .collect()
    }

    pub fn max_observed_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn dispatch(&self, request: ApiRequest) -> Outcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        for _ in 0..self.yields {
            tokio::task::yield_now().await;
        }

        let outcome = (self.responder)(&request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Whether the request is a one-record page-count probe
pub fn is_probe(request: &ApiRequest) -> bool {
    request.param(pagination::PAGE_SIZE) == Some("1")
        && request.param(pagination::PAGE) == Some("0")
}

/// One page of `records` in the listing response shape
pub fn listing_page(records: &[Value], request: &ApiRequest) -> Value {
    let page: usize = request
        .param(pagination::PAGE)
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    let page_size: usize = request
        .param(pagination::PAGE_SIZE)
        .and_then(|p| p.parse().ok())
        .unwrap_or(records.len().max(1));

    let data: Vec<Value> = records
        .iter()
        .skip(page * page_size)
        .take(page_size)
        .cloned()
        .collect();
    json!({
        "count": records.len(),
        "num_pages": records.len().div_ceil(page_size.max(1)),
        "data": data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_page_slices_records() {
        let records: Vec<Value> = (0..5).map(|i| json!({"id": i})).collect();
        let request = ApiRequest::get(
            "/container",
            vec![
                ("page".to_string(), "1".to_string()),
                ("page_size".to_string(), "2".to_string()),
            ],
        );
        let page = listing_page(&records, &request);
        assert_eq!(page["count"], 5);
        assert_eq!(page["num_pages"], 3);
        assert_eq!(page["data"], json!([{"id": 2}, {"id": 3}]));
    }

    #[tokio::test]
    async fn test_mock_records_and_echoes() {
        let transport = MockTransport::new();
        let request = ApiRequest::delete("/artifact/3").with_correlation_id("abc");
        let outcome = transport.dispatch(request).await;

        assert_eq!(outcome.correlation_id(), "abc");
        assert!(outcome.is_success());
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.requests()[0].endpoint, "/artifact/3");
    }
}
