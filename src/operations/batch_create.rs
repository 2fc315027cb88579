//! # Batch Create Coordinator
//!
//! Creates containers, then their artifacts, matching every response back to
//! its envelope by correlation id rather than by position.
//!
//! Protocol:
//! 1. Reject batches with duplicate correlation ids.
//! 2. Flag only the last artifact of the last container to run automation.
//! 3. Create all containers concurrently and back-fill each envelope's
//!    `assigned_id` from the response carrying its correlation id.
//! 4. Copy each assigned container id onto that container's artifacts.
//! 5. Create the artifacts of created containers concurrently. Artifacts of a
//!    container that was not created are not sent; each gets a synthesized
//!    failure entry instead.
//! 6. Rename `id` to `container_id` / `artifact_id` and merge both result sets.

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::constants::REQUEST_ID_KEY;
use crate::error::{ClientError, ClientResult};
use crate::logging::log_batch_operation;
use crate::models::envelope::PARENT_ID_KEY;
use crate::models::{ParentChildBatch, RequestEnvelope};
use crate::results::{ResultAggregator, ResultSet};
use crate::transport::{AdmissionGate, Method, Outcome, Record, Transport};

/// Reason recorded for artifacts whose container was not created
pub const PARENT_NOT_CREATED: &str = "parent not created";
/// Reason recorded for standalone artifacts without a container id
pub const MISSING_PARENT_ID: &str = "container_id missing";

/// Combined results plus the batch with server ids filled in
#[derive(Debug, Clone)]
pub struct BatchCreateOutcome {
    pub results: ResultSet,
    pub batch: ParentChildBatch,
}

/// Results of a standalone child create plus the id-populated envelopes
#[derive(Debug, Clone)]
pub struct ChildCreateOutcome {
    pub results: ResultSet,
    pub envelopes: Vec<RequestEnvelope>,
}

/// Runs the two-phase container/artifact create
#[derive(Debug, Clone)]
pub struct BatchCreateCoordinator {
    transport: Arc<dyn Transport>,
}

impl BatchCreateCoordinator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    #[instrument(skip_all, fields(parents = batch.parent_count(), children = batch.child_count()))]
    pub async fn create(
        &self,
        mut batch: ParentChildBatch,
        gate: &AdmissionGate,
    ) -> ClientResult<BatchCreateOutcome> {
        batch.ensure_unique_correlation_ids()?;
        batch.flag_automation_trigger();

        // Parents
        let parent_index = correlation_index(batch.parents.iter().map(|p| &p.envelope));
        let requests = batch
            .parents
            .iter()
            .map(|p| p.envelope.to_api_request())
            .collect();
        let outcomes = gate.dispatch_all(self.transport.as_ref(), requests).await;
        for (position, id) in back_fill(&parent_index, &outcomes) {
            batch.parents[position].envelope.assigned_id = Some(id);
        }
        let mut results = ResultAggregator::aggregate(outcomes);
        results.rename_success_key("id", "container_id");

        batch.propagate_parent_ids();

        // Children of created parents
        let mut dispatched: Vec<(usize, usize)> = Vec::new();
        let mut skipped: Vec<Record> = Vec::new();
        for (p, parent) in batch.parents.iter().enumerate() {
            if parent.envelope.assigned_id.is_some() {
                dispatched.extend((0..parent.children.len()).map(|c| (p, c)));
            } else {
                skipped.extend(parent.children.iter().map(|child| {
                    synthesized_failure(
                        child,
                        PARENT_NOT_CREATED,
                        Some(parent.envelope.correlation_id.as_str()),
                    )
                }));
            }
        }
        if !skipped.is_empty() {
            warn!(
                skipped = skipped.len(),
                "Skipping children of parents that were not created"
            );
        }

        let child_index = correlation_index(
            dispatched
                .iter()
                .map(|&(p, c)| &batch.parents[p].children[c]),
        );
        let requests = dispatched
            .iter()
            .map(|&(p, c)| batch.parents[p].children[c].to_api_request())
            .collect();
        let outcomes = gate.dispatch_all(self.transport.as_ref(), requests).await;
        for (position, id) in back_fill(&child_index, &outcomes) {
            let (p, c) = dispatched[position];
            batch.parents[p].children[c].assigned_id = Some(id);
        }

        let mut aggregator = ResultAggregator::new();
        for outcome in outcomes {
            aggregator.push(outcome);
        }
        for failure in skipped {
            aggregator.push_synthesized_failure(failure);
        }
        let mut child_results = aggregator.finish();
        child_results.rename_success_key("id", "artifact_id");

        results.merge(child_results);

        log_batch_operation(
            "create_containers",
            batch.parent_count(),
            batch.child_count(),
            results.success.len(),
            results.failure.len(),
        );
        Ok(BatchCreateOutcome { results, batch })
    }

    /// Create children that already name their parent.
    ///
    /// Envelopes without a parent id are not sent and get a synthesized failure.
    #[instrument(skip_all, fields(children = envelopes.len()))]
    pub async fn create_children(
        &self,
        mut envelopes: Vec<RequestEnvelope>,
        gate: &AdmissionGate,
    ) -> ClientResult<ChildCreateOutcome> {
        ensure_unique(&envelopes)?;

        let (ready, missing): (Vec<usize>, Vec<usize>) =
            (0..envelopes.len()).partition(|&i| envelopes[i].parent_id().is_some());

        let index = correlation_index(ready.iter().map(|&i| &envelopes[i]));
        let requests = ready.iter().map(|&i| envelopes[i].to_api_request()).collect();
        let outcomes = gate.dispatch_all(self.transport.as_ref(), requests).await;
        for (position, id) in back_fill(&index, &outcomes) {
            envelopes[ready[position]].assigned_id = Some(id);
        }

        let mut aggregator = ResultAggregator::new();
        for outcome in outcomes {
            aggregator.push(outcome);
        }
        for &i in &missing {
            aggregator.push_synthesized_failure(synthesized_failure(
                &envelopes[i],
                MISSING_PARENT_ID,
                None,
            ));
        }
        let mut results = aggregator.finish();
        results.rename_success_key("id", "artifact_id");

        log_batch_operation(
            "create_artifacts",
            0,
            envelopes.len(),
            results.success.len(),
            results.failure.len(),
        );
        Ok(ChildCreateOutcome { results, envelopes })
    }
}

fn ensure_unique(envelopes: &[RequestEnvelope]) -> ClientResult<()> {
    let mut seen = HashSet::new();
    for envelope in envelopes {
        if !seen.insert(envelope.correlation_id.as_str()) {
            return Err(ClientError::DuplicateCorrelationId(
                envelope.correlation_id.clone(),
            ));
        }
    }
    Ok(())
}

/// Map each correlation id to its envelope's position, built before dispatch
fn correlation_index<'a, I>(envelopes: I) -> HashMap<String, usize>
where
    I: IntoIterator<Item = &'a RequestEnvelope>,
{
    envelopes
        .into_iter()
        .enumerate()
        .map(|(i, envelope)| (envelope.correlation_id.clone(), i))
        .collect()
}

/// Server ids from successful outcomes, keyed by envelope position.
///
/// Outcomes whose correlation id matches no envelope are logged and ignored.
fn back_fill(index: &HashMap<String, usize>, outcomes: &[Outcome]) -> Vec<(usize, u64)> {
    let mut assigned = Vec::new();
    for outcome in outcomes {
        let Some(&position) = index.get(outcome.correlation_id()) else {
            warn!(
                request_id = %outcome.correlation_id(),
                "AggregationMismatch: response matches no pending request"
            );
            continue;
        };
        let Outcome::Success { payload, .. } = outcome else {
            continue;
        };
        match payload.get("id").and_then(Value::as_u64) {
            Some(id) => assigned.push((position, id)),
            None => debug!(
                request_id = %outcome.correlation_id(),
                "Create response carries no id"
            ),
        }
    }
    if !assigned.is_empty() {
        info!(assigned = assigned.len(), "Back-filled server ids");
    }
    assigned
}

fn synthesized_failure(
    envelope: &RequestEnvelope,
    reason: &str,
    parent_request_id: Option<&str>,
) -> Record {
    let mut failure = json!({
        REQUEST_ID_KEY: envelope.correlation_id,
        "method": Method::Post.as_str(),
        "endpoint": envelope.endpoint,
        "status": Value::Null,
        "reason": reason,
    });
    if let (Some(parent), Some(map)) = (parent_request_id, failure.as_object_mut()) {
        map.insert("parent_request_id".to_string(), Value::from(parent));
    }
    if let (Some(parent_id), Some(map)) = (envelope.parent_id(), failure.as_object_mut()) {
        map.insert(PARENT_ID_KEY.to_string(), Value::from(parent_id));
    }
    match failure {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactRequest, ContainerRequest};
    use crate::test_utils::MockTransport;

    fn containers(n: usize, artifacts: usize) -> Vec<ContainerRequest> {
        (0..n)
            .map(|i| {
                ContainerRequest::new(format!("c{i}"), "events").with_artifacts(
                    (0..artifacts).map(|j| ArtifactRequest::new(format!("a{i}{j}"))),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_ids_back_filled_and_renamed() {
        let transport = Arc::new(MockTransport::assigning_ids(100));
        let coordinator = BatchCreateCoordinator::new(transport.clone());
        let gate = AdmissionGate::new(3).unwrap();

        let batch = ParentChildBatch::from_containers(&containers(2, 1)).unwrap();
        let outcome = coordinator.create(batch, &gate).await.unwrap();

        assert!(outcome.batch.parents.iter().all(|p| p.envelope.assigned_id.is_some()));
        for parent in &outcome.batch.parents {
            let child = &parent.children[0];
            assert_eq!(child.parent_id(), parent.envelope.assigned_id);
            assert!(child.assigned_id.is_some());
        }
        assert_eq!(outcome.results.success.len(), 4);
        let (parents, children) = outcome.results.success.split_at(2);
        assert!(parents.iter().all(|r| r.contains_key("container_id")));
        assert!(children.iter().all(|r| r.contains_key("artifact_id")));
        assert!(outcome.results.success.iter().all(|r| !r.contains_key("id")));
    }

    #[test]
    fn test_back_fill_ignores_completion_order() {
        let batch = ParentChildBatch::from_containers(&containers(3, 0)).unwrap();
        let envelopes: Vec<&RequestEnvelope> =
            batch.parents.iter().map(|p| &p.envelope).collect();
        let index = correlation_index(envelopes.iter().copied());

        // Answers arrive last-request-first, each carrying its own id
        let outcomes: Vec<Outcome> = envelopes
            .iter()
            .enumerate()
            .rev()
            .map(|(i, e)| Outcome::success(e.correlation_id.clone(), json!({"id": 10 + i})))
            .collect();

        let mut assigned = back_fill(&index, &outcomes);
        assert_eq!(assigned, vec![(2, 12), (1, 11), (0, 10)]);
        assigned.sort_unstable();
        assert_eq!(assigned, vec![(0, 10), (1, 11), (2, 12)]);
    }

    #[test]
    fn test_back_fill_skips_failures_and_strangers() {
        let batch = ParentChildBatch::from_containers(&containers(2, 0)).unwrap();
        let index = correlation_index(batch.parents.iter().map(|p| &p.envelope));
        let second = batch.parents[1].envelope.correlation_id.clone();
        let first = batch.parents[0].envelope.correlation_id.clone();

        let outcomes = vec![
            Outcome::success("stranger", json!({"id": 1})),
            Outcome::success(second, json!({"id": 7})),
            Outcome::failure(first, json!({"status": 500})),
        ];
        assert_eq!(back_fill(&index, &outcomes), vec![(1, 7)]);
    }

    #[tokio::test]
    async fn test_unmatched_response_is_ignored() {
        let transport = Arc::new(MockTransport::with_outcome_fn(|request| {
            Outcome::success("someone-else", json!({"id": 1, "endpoint": request.endpoint}))
        }));
        let coordinator = BatchCreateCoordinator::new(transport);
        let gate = AdmissionGate::new(1).unwrap();

        let batch = ParentChildBatch::from_containers(&containers(1, 1)).unwrap();
        let outcome = coordinator.create(batch, &gate).await.unwrap();

        assert_eq!(outcome.batch.parents[0].envelope.assigned_id, None);
        // Parent outcome still counted; its child was skipped
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results.failure[0]["reason"], PARENT_NOT_CREATED);
    }

    #[tokio::test]
    async fn test_standalone_children_need_parent_id() {
        let transport = Arc::new(MockTransport::assigning_ids(500));
        let coordinator = BatchCreateCoordinator::new(transport.clone());
        let gate = AdmissionGate::new(2).unwrap();

        let envelopes = crate::models::envelope::artifact_envelopes(&[
            ArtifactRequest::new("with parent").with_container(9),
            ArtifactRequest::new("orphan"),
        ])
        .unwrap();
        let outcome = coordinator.create_children(envelopes, &gate).await.unwrap();

        assert_eq!(transport.request_count(), 1);
        assert_eq!(outcome.results.success.len(), 1);
        assert_eq!(outcome.results.failure.len(), 1);
        assert_eq!(outcome.results.failure[0]["reason"], MISSING_PARENT_ID);
        assert!(outcome.envelopes[0].assigned_id.is_some());
        assert!(outcome.envelopes[1].assigned_id.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ids_abort_before_dispatch() {
        let transport = Arc::new(MockTransport::assigning_ids(1));
        let coordinator = BatchCreateCoordinator::new(transport.clone());
        let gate = AdmissionGate::new(2).unwrap();

        let mut batch = ParentChildBatch::from_containers(&containers(2, 0)).unwrap();
        let first_id = batch.parents[0].envelope.correlation_id.clone();
        batch.parents[1].envelope.correlation_id = first_id;

        assert!(coordinator.create(batch, &gate).await.is_err());
        assert_eq!(transport.request_count(), 0);
    }
}
