pub mod artifact;
pub mod container;
pub mod envelope;
pub mod options;
pub mod query;

// Re-export request models for easy access
pub use artifact::ArtifactRequest;
pub use container::ContainerRequest;
pub use envelope::{ParentChildBatch, ParentEnvelope, RequestEnvelope};
pub use options::{ContainerStatus, ContainerType, KillChain, Sensitivity, Severity, SortOrder};
pub use query::{ContainerView, DateRange, Query, QueryBuilder, RecordKind, Resource};
