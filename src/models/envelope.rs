//! # Request Envelopes
//!
//! A [`RequestEnvelope`] is a pending create request tagged with a caller-side
//! correlation id, so its response can be matched back to it regardless of
//! completion order. A [`ParentChildBatch`] groups container envelopes with the
//! artifact envelopes that depend on them.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use super::artifact::ArtifactRequest;
use super::container::ContainerRequest;
use super::query::RecordKind;
use crate::constants::RUN_AUTOMATION_KEY;
use crate::error::{ClientError, ClientResult};
use crate::transport::{new_correlation_id, ApiRequest, Record};

/// Field on a child payload referencing its parent
pub const PARENT_ID_KEY: &str = "container_id";

/// One pending create request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub correlation_id: String,
    pub endpoint: String,
    pub payload: Record,
    /// Server-assigned id, set once the matching response arrives
    pub assigned_id: Option<u64>,
}

impl RequestEnvelope {
    pub fn new(endpoint: impl Into<String>, payload: Record) -> Self {
        Self {
            correlation_id: new_correlation_id(),
            endpoint: endpoint.into(),
            payload,
            assigned_id: None,
        }
    }

    /// Envelope for a typed request body
    pub fn from_request<T: Serialize>(kind: RecordKind, request: &T) -> ClientResult<Self> {
        match serde_json::to_value(request)? {
            Value::Object(payload) => Ok(Self::new(kind.endpoint(), payload)),
            other => Err(ClientError::InvalidInput(format!(
                "request body for {} must be a JSON object, got {other}",
                kind.endpoint()
            ))),
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn set_run_automation(&mut self, enabled: bool) {
        self.payload
            .insert(RUN_AUTOMATION_KEY.to_string(), Value::Bool(enabled));
    }

    pub fn run_automation(&self) -> Option<bool> {
        self.payload.get(RUN_AUTOMATION_KEY).and_then(Value::as_bool)
    }

    /// Parent id carried by a child payload, if any
    pub fn parent_id(&self) -> Option<u64> {
        self.payload.get(PARENT_ID_KEY).and_then(Value::as_u64)
    }

    /// POST request carrying this envelope's correlation id
    pub fn to_api_request(&self) -> ApiRequest {
        ApiRequest::post(self.endpoint.clone(), Value::Object(self.payload.clone()))
            .with_correlation_id(self.correlation_id.clone())
    }
}

/// A parent envelope and the children created after it
#[derive(Debug, Clone, PartialEq)]
pub struct ParentEnvelope {
    pub envelope: RequestEnvelope,
    pub children: Vec<RequestEnvelope>,
}

/// Ordered parents with their dependent children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentChildBatch {
    pub parents: Vec<ParentEnvelope>,
}

impl ParentChildBatch {
    pub fn new(parents: Vec<ParentEnvelope>) -> Self {
        Self { parents }
    }

    /// Build container envelopes, each owning envelopes for its artifacts
    pub fn from_containers(containers: &[ContainerRequest]) -> ClientResult<Self> {
        let parents = containers
            .iter()
            .map(|container| {
                let children = container
                    .artifacts
                    .iter()
                    .map(|artifact| RequestEnvelope::from_request(RecordKind::Artifact, artifact))
                    .collect::<ClientResult<Vec<_>>>()?;
                Ok(ParentEnvelope {
                    envelope: RequestEnvelope::from_request(RecordKind::Container, container)?,
                    children,
                })
            })
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Self { parents })
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    pub fn child_count(&self) -> usize {
        self.parents.iter().map(|p| p.children.len()).sum()
    }

    pub fn children(&self) -> impl Iterator<Item = &RequestEnvelope> {
        self.parents.iter().flat_map(|p| p.children.iter())
    }

    /// Let only the last child of the last parent trigger automation.
    ///
    /// Every other child is set to `false`. When the last parent has no
    /// children nothing is flagged.
    pub fn flag_automation_trigger(&mut self) {
        for parent in &mut self.parents {
            for child in &mut parent.children {
                child.set_run_automation(false);
            }
        }
        if let Some(last) = self
            .parents
            .last_mut()
            .and_then(|parent| parent.children.last_mut())
        {
            last.set_run_automation(true);
        }
    }

    /// Reject a batch in which two envelopes share a correlation id
    pub fn ensure_unique_correlation_ids(&self) -> ClientResult<()> {
        let mut seen = HashSet::new();
        let all = self
            .parents
            .iter()
            .flat_map(|p| std::iter::once(&p.envelope).chain(p.children.iter()));
        for envelope in all {
            if !seen.insert(envelope.correlation_id.as_str()) {
                return Err(ClientError::DuplicateCorrelationId(
                    envelope.correlation_id.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Copy each created parent's id onto its children's payloads
    pub fn propagate_parent_ids(&mut self) {
        for parent in &mut self.parents {
            if let Some(id) = parent.envelope.assigned_id {
                for child in &mut parent.children {
                    child
                        .payload
                        .insert(PARENT_ID_KEY.to_string(), Value::from(id));
                }
            }
        }
    }
}

/// Envelopes for standalone artifacts
pub fn artifact_envelopes(artifacts: &[ArtifactRequest]) -> ClientResult<Vec<RequestEnvelope>> {
    artifacts
        .iter()
        .map(|artifact| RequestEnvelope::from_request(RecordKind::Artifact, artifact))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(children_per_parent: &[usize]) -> ParentChildBatch {
        let containers: Vec<ContainerRequest> = children_per_parent
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                ContainerRequest::new(format!("c{i}"), "events").with_artifacts(
                    (0..n).map(|j| ArtifactRequest::new(format!("a{i}-{j}"))),
                )
            })
            .collect();
        ParentChildBatch::from_containers(&containers).unwrap()
    }

    #[test]
    fn test_only_last_child_of_last_parent_triggers() {
        let mut batch = batch(&[2, 2]);
        batch.flag_automation_trigger();

        let flags: Vec<Option<bool>> = batch
            .children()
            .map(RequestEnvelope::run_automation)
            .collect();
        assert_eq!(flags, vec![Some(false), Some(false), Some(false), Some(true)]);
    }

    #[test]
    fn test_last_parent_without_children_flags_nothing() {
        let mut batch = batch(&[2, 0]);
        batch.flag_automation_trigger();
        assert!(batch.children().all(|c| c.run_automation() == Some(false)));

        let mut empty = ParentChildBatch::default();
        empty.flag_automation_trigger();
        assert_eq!(empty.child_count(), 0);
    }

    #[test]
    fn test_duplicate_correlation_ids_rejected() {
        let mut batch = batch(&[1, 1]);
        assert!(batch.ensure_unique_correlation_ids().is_ok());

        let dup = batch.parents[0].envelope.correlation_id.clone();
        batch.parents[1].children[0].correlation_id = dup.clone();
        match batch.ensure_unique_correlation_ids() {
            Err(ClientError::DuplicateCorrelationId(id)) => assert_eq!(id, dup),
            other => panic!("expected duplicate id error, got {other:?}"),
        }
    }

    #[test]
    fn test_propagate_parent_ids_skips_unassigned() {
        let mut batch = batch(&[1, 2]);
        batch.parents[1].envelope.assigned_id = Some(42);
        batch.propagate_parent_ids();

        assert_eq!(batch.parents[0].children[0].parent_id(), None);
        assert!(batch.parents[1].children.iter().all(|c| c.parent_id() == Some(42)));
    }

    #[test]
    fn test_api_request_carries_correlation_id() {
        let envelope =
            RequestEnvelope::new("/container", Record::new()).with_correlation_id("corr-1");
        let request = envelope.to_api_request();
        assert_eq!(request.correlation_id, "corr-1");
        assert_eq!(request.endpoint, "/container");
        assert_eq!(request.method, crate::transport::Method::Post);
    }
}
