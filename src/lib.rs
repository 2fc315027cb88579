#![allow(clippy::doc_markdown)] // Allow technical terms like SOAR, CEF in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Phantom Client
//!
//! Async client for the Phantom SOAR REST API.
//!
//! ## Overview
//!
//! Every read is a paginated, concurrent fetch merged into one [`ResultSet`];
//! container creation is a two-phase batch in which artifacts are created
//! after their containers and matched back to them by correlation id.
//! Individual request failures never abort an operation: they are collected
//! into `ResultSet::failure` next to the records that did come back.
//!
//! ## Module Organization
//!
//! - [`transport`] - The [`Transport`] seam, the reqwest-backed [`HttpTransport`]
//!   and the [`AdmissionGate`] bounding requests in flight
//! - [`results`] - Result aggregation into success/failure partitions
//! - [`operations`] - Paginated fetcher and batch create coordinator
//! - [`models`] - Queries, request payloads and create envelopes
//! - [`client`] - The [`PhantomClient`] facade
//! - [`config`] - Configuration from files and `PHANTOM_*` environment variables
//! - [`error`] - Structured error handling
//! - [`logging`] - `tracing` subscriber setup and operation summaries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phantom_client::{ClientConfig, PhantomClient, Query, ContainerRequest, ArtifactRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! phantom_client::logging::init_structured_logging();
//! let client = PhantomClient::new(ClientConfig::load()?)?;
//!
//! let open = Query::builder(phantom_client::Resource::Containers)
//!     .filter("status", "\"open\"")
//!     .build()?;
//! let containers = client.get_containers(&open).await?;
//! println!("{} open containers", containers.success.len());
//!
//! let container = ContainerRequest::new("Suspicious login", "events")
//!     .with_severity("high")?
//!     .with_artifact(ArtifactRequest::new("source ip").with_cef("sourceAddress", "10.0.0.8"));
//! let created = client.create_containers(&[container]).await?;
//! for failure in &created.results.failure {
//!     eprintln!("create failed: {failure:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod operations;
pub mod results;
pub mod test_utils;
pub mod transport;

pub use client::{PhantomClient, RecordUpdate};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use models::{
    ArtifactRequest, ContainerRequest, ContainerView, DateRange, ParentChildBatch, Query,
    QueryBuilder, RecordKind, RequestEnvelope, Resource,
};
pub use operations::{
    BatchCreateCoordinator, BatchCreateOutcome, ChildCreateOutcome, PageCount, PaginatedFetcher,
};
pub use results::{ResultAggregator, ResultSet};
pub use transport::{AdmissionGate, ApiRequest, HttpTransport, Method, Outcome, Record, Transport};
