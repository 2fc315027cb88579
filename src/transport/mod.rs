//! # Transport Layer Abstraction
//!
//! One HTTP call per [`ApiRequest`], answered by exactly one [`Outcome`] that
//! echoes the request's correlation id. Implementations never return errors:
//! a network or HTTP failure is reported as [`Outcome::Failure`] so the
//! operation that issued the request can keep collecting its siblings.

pub mod admission;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{self, Debug};
use uuid::Uuid;

use crate::constants::{LIST_PAYLOAD_KEY, REQUEST_ID_KEY};

pub use admission::AdmissionGate;
pub use http::HttpTransport;

/// A single API record as returned by (or sent to) the server
pub type Record = serde_json::Map<String, Value>;

/// Generate a fresh correlation id (32 hex characters)
pub fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// HTTP methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub correlation_id: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            correlation_id: new_correlation_id(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            params,
            ..Self::new(Method::Get, endpoint)
        }
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::Post, endpoint)
        }
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    /// Replace the generated correlation id with a caller-owned one
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Look up a query parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Result of one dispatched request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        correlation_id: String,
        payload: Record,
    },
    Failure {
        correlation_id: String,
        payload: Record,
    },
}

impl Outcome {
    /// Successful outcome; non-object payloads are wrapped under the list key
    pub fn success(correlation_id: impl Into<String>, payload: Value) -> Self {
        Outcome::Success {
            correlation_id: correlation_id.into(),
            payload: into_record(payload),
        }
    }

    pub fn failure(correlation_id: impl Into<String>, payload: Value) -> Self {
        Outcome::Failure {
            correlation_id: correlation_id.into(),
            payload: into_record(payload),
        }
    }

    /// Standard failure shape for a request that did not produce a usable response
    pub fn failed_request(
        request: &ApiRequest,
        status: Option<u16>,
        reason: impl Into<String>,
        response: Option<Value>,
    ) -> Self {
        let mut payload = json!({
            REQUEST_ID_KEY: request.correlation_id,
            "method": request.method.as_str(),
            "endpoint": request.endpoint,
            "status": status,
            "reason": reason.into(),
        });
        if let (Some(response), Some(map)) = (response, payload.as_object_mut()) {
            map.insert("response".to_string(), response);
        }
        Self::failure(request.correlation_id.clone(), payload)
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Outcome::Success { correlation_id, .. } | Outcome::Failure { correlation_id, .. } => {
                correlation_id
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn payload(&self) -> &Record {
        match self {
            Outcome::Success { payload, .. } | Outcome::Failure { payload, .. } => payload,
        }
    }
}

fn into_record(payload: Value) -> Record {
    match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Record::new();
            map.insert(LIST_PAYLOAD_KEY.to_string(), other);
            map
        }
    }
}

/// Performs one HTTP call and reports the outcome.
///
/// Timeouts and retries, if any, belong to the implementation.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Transport name for logging
    fn name(&self) -> &'static str;

    /// Dispatch one request. The returned outcome must carry
    /// `request.correlation_id` unchanged.
    async fn dispatch(&self, request: ApiRequest) -> Outcome;
}
