//! Artifact create/update payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::options::{KillChain, Severity};
use crate::error::ClientResult;
use crate::transport::Record;

fn default_run_automation() -> bool {
    true
}

/// An artifact to create or update
///
/// Enumerated fields are typed, so an out-of-range value is rejected when the
/// request is built (see [`ArtifactRequest::with_severity`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRequest {
    /// Owning container; filled in from the parent when created through a container
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_chain: Option<KillChain>,
    /// Common Event Format fields
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub cef: Record,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cef_types: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_data_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest_app_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Trigger playbooks once this artifact is stored
    #[serde(default = "default_run_automation")]
    pub run_automation: bool,
}

impl Default for ArtifactRequest {
    fn default() -> Self {
        Self {
            container_id: None,
            name: None,
            label: None,
            description: None,
            severity: Severity::default(),
            kill_chain: None,
            cef: Record::new(),
            cef_types: BTreeMap::new(),
            data: None,
            tags: Vec::new(),
            artifact_type: None,
            source_data_identifier: None,
            owner_id: None,
            ingest_app_id: None,
            start_time: None,
            end_time: None,
            run_automation: true,
        }
    }
}

impl ArtifactRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_container(mut self, container_id: u64) -> Self {
        self.container_id = Some(container_id);
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_severity(mut self, severity: &str) -> ClientResult<Self> {
        self.severity = severity.parse()?;
        Ok(self)
    }

    pub fn with_kill_chain(mut self, phase: &str) -> ClientResult<Self> {
        self.kill_chain = Some(phase.parse()?);
        Ok(self)
    }

    /// Set one CEF field
    #[must_use]
    pub fn with_cef(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cef.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_source_data_identifier(mut self, sdi: impl Into<String>) -> Self {
        self.source_data_identifier = Some(sdi.into());
        self
    }
}
