//! # Result Aggregation
//!
//! Every client operation answers with a [`ResultSet`]: the records that came
//! back successfully and the failures, side by side. Callers inspect
//! `failure` to detect partial or total failure instead of catching an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::constants::REQUEST_ID_KEY;
use crate::transport::{Outcome, Record};

/// Partitioned results of one operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub success: Vec<Record>,
    pub failure: Vec<Record>,
    /// Data key already unwrapped from `success`, if any
    #[serde(skip)]
    unwrapped_key: Option<String>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.success.len() + self.failure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.failure.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failure.is_empty()
    }

    /// Append another result set's entries after this one's
    pub fn merge(&mut self, other: ResultSet) {
        self.success.extend(other.success);
        self.failure.extend(other.failure);
    }

    /// Replace each success entry holding a list under `key` with that list's
    /// records. Entries without such a list are kept as they are (single
    /// record lookups). Applying the same key twice is a no-op.
    pub fn unwrap_data_key(&mut self, key: &str) {
        if self.unwrapped_key.as_deref() == Some(key) {
            debug!(data_key = key, "Data key already unwrapped; skipping");
            return;
        }

        let entries = std::mem::take(&mut self.success);
        for mut entry in entries {
            match entry.remove(key) {
                Some(Value::Array(items)) => {
                    self.success.extend(items.into_iter().map(value_to_record));
                }
                Some(other) => {
                    entry.insert(key.to_string(), other);
                    self.success.push(entry);
                }
                None => self.success.push(entry),
            }
        }
        self.unwrapped_key = Some(key.to_string());
    }

    /// Rename a field in every success entry that carries it
    pub fn rename_success_key(&mut self, from: &str, to: &str) {
        for entry in &mut self.success {
            if let Some(value) = entry.remove(from) {
                entry.insert(to.to_string(), value);
            }
        }
    }

    /// Keep only the success entries matching the predicate
    pub fn retain_success<F>(&mut self, predicate: F)
    where
        F: FnMut(&Record) -> bool,
    {
        self.success.retain(predicate);
    }

    /// Drop success entries whose `key` value was already seen.
    ///
    /// Pages fetched while the remote data set changes can repeat records;
    /// fetches do not call this on their own.
    pub fn dedup_success_by(&mut self, key: &str) -> usize {
        let before = self.success.len();
        let mut seen = HashSet::new();
        self.success.retain(|entry| match entry.get(key) {
            Some(value) => seen.insert(value.to_string()),
            None => true,
        });
        before - self.success.len()
    }
}

fn value_to_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Record::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Collects request outcomes into one [`ResultSet`].
///
/// Each outcome lands in exactly one partition and is tagged with its
/// correlation id under `request_id`, so
/// `success.len() + failure.len()` always equals the number of outcomes pushed.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: ResultSet,
    collected: usize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate a complete batch of outcomes
    pub fn aggregate<I>(outcomes: I) -> ResultSet
    where
        I: IntoIterator<Item = Outcome>,
    {
        let mut aggregator = Self::new();
        for outcome in outcomes {
            aggregator.push(outcome);
        }
        aggregator.finish()
    }

    pub fn push(&mut self, outcome: Outcome) {
        self.collected += 1;
        match outcome {
            Outcome::Success {
                correlation_id,
                mut payload,
            } => {
                payload.insert(REQUEST_ID_KEY.to_string(), Value::String(correlation_id));
                self.results.success.push(payload);
            }
            Outcome::Failure {
                correlation_id,
                mut payload,
            } => {
                payload.insert(REQUEST_ID_KEY.to_string(), Value::String(correlation_id));
                self.results.failure.push(payload);
            }
        }
    }

    /// Add a failure for a request that was never dispatched
    pub fn push_synthesized_failure(&mut self, payload: Record) {
        self.collected += 1;
        self.results.failure.push(payload);
    }

    pub fn collected(&self) -> usize {
        self.collected
    }

    pub fn finish(self) -> ResultSet {
        debug_assert_eq!(self.results.len(), self.collected);
        debug!(
            collected = self.collected,
            success = self.results.success.len(),
            failure = self.results.failure.len(),
            "Aggregated outcomes"
        );
        self.results
    }
}
