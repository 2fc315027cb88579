//! # Client Operations
//!
//! The multi-request operations behind every client call: paginated reads and
//! correlated batch creates. Each takes the [`AdmissionGate`](crate::transport::AdmissionGate)
//! bounding its own fan-out.

pub mod batch_create;
pub mod paginated_fetcher;

pub use batch_create::{BatchCreateCoordinator, BatchCreateOutcome, ChildCreateOutcome};
pub use paginated_fetcher::{PageCount, PaginatedFetcher};
