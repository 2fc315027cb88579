//! Admission control for dispatched requests.
//!
//! Each operation builds its own gate from an explicit limit, so a slow
//! operation (deletes) never changes the bound seen by another one.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{ApiRequest, Outcome, Transport};
use crate::error::{ClientError, ClientResult};

/// Bounded concurrency gate: a permit is held for the duration of each dispatch
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
}

impl AdmissionGate {
    pub fn new(max_in_flight: usize) -> ClientResult<Self> {
        if max_in_flight == 0 {
            return Err(ClientError::InvalidInput(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Dispatch one request once a permit is available
    pub async fn dispatch(&self, transport: &dyn Transport, request: ApiRequest) -> Outcome {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(
                    request_id = %request.correlation_id,
                    endpoint = %request.endpoint,
                    error = %e,
                    "Admission gate closed before dispatch"
                );
                return Outcome::failed_request(
                    &request,
                    None,
                    ClientError::AdmissionClosed(e.to_string()).to_string(),
                    None,
                );
            }
        };

        debug!(
            transport = transport.name(),
            method = %request.method,
            endpoint = %request.endpoint,
            request_id = %request.correlation_id,
            "Dispatching request"
        );
        transport.dispatch(request).await
    }

    /// Dispatch every request concurrently and wait for all of them.
    ///
    /// Outcomes come back in the order the requests were given.
    pub async fn dispatch_all(
        &self,
        transport: &dyn Transport,
        requests: Vec<ApiRequest>,
    ) -> Vec<Outcome> {
        join_all(
            requests
                .into_iter()
                .map(|request| self.dispatch(transport, request)),
        )
        .await
    }
}
