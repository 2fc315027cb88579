//! Container create/update payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::artifact::ArtifactRequest;
use super::options::{ContainerStatus, ContainerType, KillChain, Sensitivity, Severity};
use crate::error::ClientResult;
use crate::transport::Record;

fn default_run_automation() -> bool {
    true
}

/// A container to create or update, optionally with the artifacts to attach to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Classification label; accepted labels are deployment-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub severity: Severity,
    pub sensitivity: Sensitivity,
    pub status: ContainerStatus,
    pub container_type: ContainerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_chain: Option<KillChain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest_app_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_data_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Record::is_empty")]
    pub custom_fields: Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_time: Option<String>,
    #[serde(default = "default_run_automation")]
    pub run_automation: bool,
    /// Artifacts created after this container, never sent with it
    #[serde(skip)]
    pub artifacts: Vec<ArtifactRequest>,
}

impl Default for ContainerRequest {
    fn default() -> Self {
        Self {
            name: None,
            label: None,
            description: None,
            severity: Severity::default(),
            sensitivity: Sensitivity::default(),
            status: ContainerStatus::default(),
            container_type: ContainerType::default(),
            kill_chain: None,
            owner_id: None,
            tenant_id: None,
            asset_id: None,
            ingest_app_id: None,
            tags: Vec::new(),
            source_data_identifier: None,
            data: None,
            custom_fields: Record::new(),
            start_time: None,
            end_time: None,
            due_time: None,
            run_automation: true,
            artifacts: Vec::new(),
        }
    }
}

impl ContainerRequest {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn with_severity(mut self, severity: &str) -> ClientResult<Self> {
        self.severity = severity.parse()?;
        Ok(self)
    }

    pub fn with_sensitivity(mut self, sensitivity: &str) -> ClientResult<Self> {
        self.sensitivity = sensitivity.parse()?;
        Ok(self)
    }

    pub fn with_status(mut self, status: &str) -> ClientResult<Self> {
        self.status = status.parse()?;
        Ok(self)
    }

    pub fn with_container_type(mut self, container_type: &str) -> ClientResult<Self> {
        self.container_type = container_type.parse()?;
        Ok(self)
    }

    pub fn with_kill_chain(mut self, phase: &str) -> ClientResult<Self> {
        self.kill_chain = Some(phase.parse()?);
        Ok(self)
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
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
    pub fn with_custom_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_artifact(mut self, artifact: ArtifactRequest) -> Self {
        self.artifacts.push(artifact);
        self
    }

    #[must_use]
    pub fn with_artifacts(mut self, artifacts: impl IntoIterator<Item = ArtifactRequest>) -> Self {
        self.artifacts.extend(artifacts);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[test]
    fn test_defaults() {
        let container = ContainerRequest::new("phish report", "events");
        assert_eq!(container.severity, Severity::Low);
        assert_eq!(container.sensitivity, Sensitivity::Green);
        assert_eq!(container.status, ContainerStatus::New);
        assert_eq!(container.container_type, ContainerType::Default);
        assert!(container.run_automation);
    }

    #[test]
    fn test_artifacts_are_not_serialized() {
        let container = ContainerRequest::new("c", "events")
            .with_artifact(ArtifactRequest::new("a1"))
            .with_artifact(ArtifactRequest::new("a2"));
        let json = serde_json::to_value(&container).unwrap();

        assert!(json.get("artifacts").is_none());
        assert!(json.get("custom_fields").is_none());
        assert!(json.get("kill_chain").is_none());
        assert_eq!(json["label"], "events");
        assert_eq!(json["status"], "new");
        assert_eq!(container.artifacts.len(), 2);
    }

    #[test]
    fn test_invalid_options_fail_fast() {
        let err = ContainerRequest::new("c", "events")
            .with_status("closed")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid option for status; should be one of: new, open, resolved"
        );

        assert!(matches!(
            ContainerRequest::new("c", "events").with_sensitivity("black"),
            Err(ClientError::InvalidOption { .. })
        ));

        let ok = ContainerRequest::new("c", "events")
            .with_severity("high")
            .and_then(|c| c.with_kill_chain("Delivery"))
            .unwrap();
        assert_eq!(ok.severity, Severity::High);
        assert_eq!(ok.kill_chain, Some(KillChain::Delivery));
    }
}
