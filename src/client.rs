//! # Phantom API Client
//!
//! High-level client for the Phantom REST API. Reads go through the
//! [`PaginatedFetcher`], container creation through the
//! [`BatchCreateCoordinator`]; updates and deletes are single-request fan-outs.
//! Every method returns a [`ResultSet`] whose `failure` list carries the
//! requests that did not succeed.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::logging::log_batch_operation;
use crate::models::envelope::artifact_envelopes;
use crate::models::{
    ArtifactRequest, ContainerRequest, ParentChildBatch, Query, RecordKind,
};
use crate::operations::{
    BatchCreateCoordinator, BatchCreateOutcome, ChildCreateOutcome, PageCount, PaginatedFetcher,
};
use crate::results::{ResultAggregator, ResultSet};
use crate::transport::{AdmissionGate, ApiRequest, HttpTransport, Record, Transport};

/// Filter applied to user reads when the caller gives none
pub const DEFAULT_USER_FILTER: (&str, &str) = ("_filter_type__in", r#"["normal", "automation"]"#);

/// One record update, POSTed to the record's endpoint
#[derive(Debug, Clone)]
pub enum RecordUpdate {
    Container { id: u64, request: ContainerRequest },
    Artifact { id: u64, request: ArtifactRequest },
    /// Arbitrary fields for any record family
    Raw {
        kind: RecordKind,
        id: u64,
        fields: Record,
    },
}

impl RecordUpdate {
    fn to_api_request(&self) -> ClientResult<ApiRequest> {
        let (endpoint, body) = match self {
            RecordUpdate::Container { id, request } => (
                RecordKind::Container.record_endpoint(*id),
                serde_json::to_value(request)?,
            ),
            RecordUpdate::Artifact { id, request } => (
                RecordKind::Artifact.record_endpoint(*id),
                serde_json::to_value(request)?,
            ),
            RecordUpdate::Raw { kind, id, fields } => {
                (kind.record_endpoint(*id), Value::Object(fields.clone()))
            }
        };
        Ok(ApiRequest::post(endpoint, body))
    }
}

/// Client for the Phantom REST API
///
/// # Examples
///
/// ```rust,no_run
/// use phantom_client::{ClientConfig, PhantomClient, Query};
///
/// # async fn example() -> phantom_client::ClientResult<()> {
/// let client = PhantomClient::new(ClientConfig::load()?)?;
///
/// let results = client.get_containers(&Query::containers()).await?;
/// println!("{} containers, {} failed pages", results.success.len(), results.failure.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PhantomClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    fetcher: PaginatedFetcher,
    coordinator: BatchCreateCoordinator,
}

impl PhantomClient {
    /// Create a client talking HTTP to `config.base_url`
    ///
    /// Fails if the configuration does not validate or the HTTP client cannot
    /// be built.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Create a client over any transport
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> ClientResult<Self> {
        config.validate()?;
        info!(
            transport = transport.name(),
            base_url = %config.base_url,
            max_concurrency = config.max_concurrency,
            delete_concurrency = config.delete_concurrency,
            "Created Phantom API client"
        );
        Ok(Self {
            fetcher: PaginatedFetcher::new(transport.clone()),
            coordinator: BatchCreateCoordinator::new(transport.clone()),
            transport,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn gate(limit: usize) -> ClientResult<AdmissionGate> {
        AdmissionGate::new(limit)
    }

    fn prepare(&self, query: &Query, expected: RecordKind, operation: &str) -> ClientResult<Query> {
        let resource = query.resource();
        let matches = match expected {
            RecordKind::Artifact => resource.reads_artifacts(),
            RecordKind::Container => {
                resource.kind() == RecordKind::Container && !resource.reads_artifacts()
            }
            other => resource.kind() == other,
        };
        if !matches {
            return Err(ClientError::InvalidInput(format!(
                "{operation} cannot read {}",
                query.endpoint()
            )));
        }
        Ok(query.clone().with_default_page_size(self.config.page_size))
    }

    async fn count_with(&self, query: Query, limit: usize) -> ClientResult<PageCount> {
        if !query.resource().needs_page_count() {
            return Err(ClientError::InvalidInput(format!(
                "{} is not a paginated listing",
                query.endpoint()
            )));
        }
        self.fetcher.count(&query, &Self::gate(limit)?).await
    }

    // Containers

    /// Number of containers (and pages) matching the query
    pub async fn get_container_count(&self, query: &Query) -> ClientResult<PageCount> {
        let query = self.prepare(query, RecordKind::Container, "get_container_count")?;
        self.count_with(query, self.config.max_concurrency).await
    }

    /// All containers matching the query, one container, or a container's
    /// permitted users or phases, depending on the query's resource
    pub async fn get_containers(&self, query: &Query) -> ClientResult<ResultSet> {
        self.get_containers_with_limit(query, self.config.max_concurrency)
            .await
    }

    pub async fn get_containers_with_limit(
        &self,
        query: &Query,
        max_in_flight: usize,
    ) -> ClientResult<ResultSet> {
        let query = self.prepare(query, RecordKind::Container, "get_containers")?;
        self.fetcher.fetch(&query, &Self::gate(max_in_flight)?).await
    }

    // Artifacts

    pub async fn get_artifact_count(&self, query: &Query) -> ClientResult<PageCount> {
        let query = self.prepare(query, RecordKind::Artifact, "get_artifact_count")?;
        self.count_with(query, self.config.max_concurrency).await
    }

    /// All artifacts, one container's artifacts, or one artifact
    pub async fn get_artifacts(&self, query: &Query) -> ClientResult<ResultSet> {
        self.get_artifacts_with_limit(query, self.config.max_concurrency)
            .await
    }

    pub async fn get_artifacts_with_limit(
        &self,
        query: &Query,
        max_in_flight: usize,
    ) -> ClientResult<ResultSet> {
        let query = self.prepare(query, RecordKind::Artifact, "get_artifacts")?;
        self.fetcher.fetch(&query, &Self::gate(max_in_flight)?).await
    }

    // Users

    fn user_query(&self, query: &Query, operation: &str) -> ClientResult<Query> {
        let query = self.prepare(query, RecordKind::User, operation)?;
        if query.has_filters() {
            Ok(query)
        } else {
            let (key, value) = DEFAULT_USER_FILTER;
            Ok(query.with_default_filter(key, value))
        }
    }

    /// Number of users; only normal and automation users unless filtered otherwise
    pub async fn get_user_count(&self, query: &Query) -> ClientResult<PageCount> {
        let query = self.user_query(query, "get_user_count")?;
        self.count_with(query, self.config.max_concurrency).await
    }

    pub async fn get_users(&self, query: &Query) -> ClientResult<ResultSet> {
        self.get_users_with_limit(query, self.config.max_concurrency)
            .await
    }

    pub async fn get_users_with_limit(
        &self,
        query: &Query,
        max_in_flight: usize,
    ) -> ClientResult<ResultSet> {
        let query = self.user_query(query, "get_users")?;
        self.fetcher.fetch(&query, &Self::gate(max_in_flight)?).await
    }

    // Audit

    /// Audit records, optionally restricted to users, containers and a time window
    pub async fn get_audit_data(&self, query: &Query) -> ClientResult<ResultSet> {
        let query = self.prepare(query, RecordKind::Audit, "get_audit_data")?;
        self.fetcher
            .fetch(&query, &Self::gate(self.config.max_concurrency)?)
            .await
    }

    // Writes

    /// Create containers, then the artifacts attached to each of them.
    ///
    /// The returned batch carries the server-assigned ids. Only the last
    /// artifact of the last container triggers automation.
    pub async fn create_containers(
        &self,
        containers: &[ContainerRequest],
    ) -> ClientResult<BatchCreateOutcome> {
        self.create_containers_with_limit(containers, self.config.max_concurrency)
            .await
    }

    pub async fn create_containers_with_limit(
        &self,
        containers: &[ContainerRequest],
        max_in_flight: usize,
    ) -> ClientResult<BatchCreateOutcome> {
        let batch = ParentChildBatch::from_containers(containers)?;
        self.coordinator
            .create(batch, &Self::gate(max_in_flight)?)
            .await
    }

    /// Create artifacts in existing containers; each must carry `container_id`
    pub async fn create_artifacts(
        &self,
        artifacts: &[ArtifactRequest],
    ) -> ClientResult<ChildCreateOutcome> {
        self.create_artifacts_with_limit(artifacts, self.config.max_concurrency)
            .await
    }

    pub async fn create_artifacts_with_limit(
        &self,
        artifacts: &[ArtifactRequest],
        max_in_flight: usize,
    ) -> ClientResult<ChildCreateOutcome> {
        let envelopes = artifact_envelopes(artifacts)?;
        self.coordinator
            .create_children(envelopes, &Self::gate(max_in_flight)?)
            .await
    }

    pub async fn update_records(&self, updates: &[RecordUpdate]) -> ClientResult<ResultSet> {
        self.update_records_with_limit(updates, self.config.max_concurrency)
            .await
    }

    #[instrument(skip(self, updates), fields(updates = updates.len()))]
    pub async fn update_records_with_limit(
        &self,
        updates: &[RecordUpdate],
        max_in_flight: usize,
    ) -> ClientResult<ResultSet> {
        let gate = Self::gate(max_in_flight)?;
        let requests = updates
            .iter()
            .map(RecordUpdate::to_api_request)
            .collect::<ClientResult<Vec<_>>>()?;
        let results =
            ResultAggregator::aggregate(gate.dispatch_all(self.transport.as_ref(), requests).await);
        log_batch_operation(
            "update_records",
            0,
            updates.len(),
            results.success.len(),
            results.failure.len(),
        );
        Ok(results)
    }

    /// Delete records by id, with at most `delete_concurrency` requests in flight
    pub async fn delete_records(&self, kind: RecordKind, ids: &[u64]) -> ClientResult<ResultSet> {
        self.delete_records_with_limit(kind, ids, self.config.delete_concurrency)
            .await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_records_with_limit(
        &self,
        kind: RecordKind,
        ids: &[u64],
        max_in_flight: usize,
    ) -> ClientResult<ResultSet> {
        if kind == RecordKind::Audit {
            return Err(ClientError::InvalidInput(
                "audit records cannot be deleted".to_string(),
            ));
        }
        let gate = Self::gate(max_in_flight)?;
        let requests = ids
            .iter()
            .map(|id| ApiRequest::delete(kind.record_endpoint(*id)))
            .collect();
        debug!(endpoint = kind.endpoint(), max_in_flight, "Deleting records");

        let results =
            ResultAggregator::aggregate(gate.dispatch_all(self.transport.as_ref(), requests).await);
        log_batch_operation(
            "delete_records",
            0,
            ids.len(),
            results.success.len(),
            results.failure.len(),
        );
        Ok(results)
    }
}
