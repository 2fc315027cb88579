//! # System Constants
//!
//! Wire-level names shared by the query model, transport and operations.

/// REST path prefix every endpoint is joined onto
pub const REST_PREFIX: &str = "/rest";

/// Header carrying the API token
pub const AUTH_HEADER: &str = "ph-auth-token";

/// Key under which bare-list payloads are wrapped so every outcome is a mapping
pub const LIST_PAYLOAD_KEY: &str = "data";

/// Key added to every aggregated entry carrying its correlation id
pub const REQUEST_ID_KEY: &str = "request_id";

/// Field flagging a created record to start automation
pub const RUN_AUTOMATION_KEY: &str = "run_automation";

/// Endpoint paths
pub mod endpoints {
    pub const CONTAINER: &str = "/container";
    pub const ARTIFACT: &str = "/artifact";
    pub const USER: &str = "/ph_user";
    pub const AUDIT: &str = "/audit";

    pub const ARTIFACTS_SUFFIX: &str = "artifacts";
    pub const PERMITTED_USERS_SUFFIX: &str = "permitted_users";
    pub const PHASES_SUFFIX: &str = "phases";
}

/// Pagination parameter names and defaults
pub mod pagination {
    pub const PAGE: &str = "page";
    pub const PAGE_SIZE: &str = "page_size";
    pub const SORT: &str = "sort";
    pub const ORDER: &str = "order";
    pub const PRETTY: &str = "pretty";
    pub const INCLUDE_EXPENSIVE: &str = "include_expensive";
    pub const FILTER_PREFIX: &str = "_filter_";

    /// Listing response fields
    pub const COUNT: &str = "count";
    pub const NUM_PAGES: &str = "num_pages";

    pub const DEFAULT_PAGE_SIZE: u32 = 1000;
    /// Page size used when the caller asks for expensive or pretty output
    pub const EXPENSIVE_PAGE_SIZE: u32 = 500;
    pub const PROBE_PAGE_SIZE: u32 = 1;
}

/// Concurrency defaults
pub mod concurrency {
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 15;
    /// Deletes are throttled harder than reads and creates
    pub const DEFAULT_DELETE_IN_FLIGHT: usize = 3;
}
