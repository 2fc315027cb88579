//! # Record Queries
//!
//! A [`Query`] describes what to read: which [`Resource`], how to page it,
//! which filters to send and whether to post-filter by date. Endpoint and
//! data-key selection are pure functions of the resource; nothing here talks
//! to the network.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::BTreeMap;

use super::options::SortOrder;
use crate::constants::{endpoints, pagination, LIST_PAYLOAD_KEY};
use crate::error::{ClientError, ClientResult};

/// Which slice of a single container to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerView {
    /// The container record itself
    #[default]
    Record,
    /// Users allowed to access the container
    PermittedUsers,
    /// Workbook phases
    Phases,
    /// The container's artifacts (a paginated listing)
    Artifacts,
}

/// Record families the API can create, update or delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Container,
    Artifact,
    User,
    Audit,
}

impl RecordKind {
    /// Collection endpoint for the record family
    pub fn endpoint(&self) -> &'static str {
        match self {
            RecordKind::Container => endpoints::CONTAINER,
            RecordKind::Artifact => endpoints::ARTIFACT,
            RecordKind::User => endpoints::USER,
            RecordKind::Audit => endpoints::AUDIT,
        }
    }

    /// Endpoint of one record
    pub fn record_endpoint(&self, id: u64) -> String {
        format!("{}/{id}", self.endpoint())
    }
}

/// What a query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Containers,
    Container { id: u64, view: ContainerView },
    Artifacts,
    Artifact { id: u64 },
    Users,
    User { id: u64 },
    Audit,
}

impl Resource {
    pub fn endpoint(&self) -> String {
        match self {
            Resource::Containers => endpoints::CONTAINER.to_string(),
            Resource::Container { id, view } => match view {
                ContainerView::Record => format!("{}/{id}", endpoints::CONTAINER),
                ContainerView::PermittedUsers => format!(
                    "{}/{id}/{}",
                    endpoints::CONTAINER,
                    endpoints::PERMITTED_USERS_SUFFIX
                ),
                ContainerView::Phases => {
                    format!("{}/{id}/{}", endpoints::CONTAINER, endpoints::PHASES_SUFFIX)
                }
                ContainerView::Artifacts => {
                    format!("{}/{id}/{}", endpoints::CONTAINER, endpoints::ARTIFACTS_SUFFIX)
                }
            },
            Resource::Artifacts => endpoints::ARTIFACT.to_string(),
            Resource::Artifact { id } => format!("{}/{id}", endpoints::ARTIFACT),
            Resource::Users => endpoints::USER.to_string(),
            Resource::User { id } => format!("{}/{id}", endpoints::USER),
            Resource::Audit => endpoints::AUDIT.to_string(),
        }
    }

    /// Key the records are nested under in each response, if any.
    ///
    /// Single records come back bare; listings nest under `data`, permitted
    /// users under `users`. Audit responses are bare lists, which transports
    /// wrap under the list key.
    pub fn data_key(&self) -> Option<&'static str> {
        match self {
            Resource::Container { view, .. } => match view {
                ContainerView::Record => None,
                ContainerView::PermittedUsers => Some("users"),
                ContainerView::Phases | ContainerView::Artifacts => Some("data"),
            },
            Resource::Artifact { .. } | Resource::User { .. } => None,
            Resource::Containers | Resource::Artifacts | Resource::Users => Some("data"),
            Resource::Audit => Some(LIST_PAYLOAD_KEY),
        }
    }

    /// Whether the page count must be probed before fetching.
    ///
    /// Anything addressed by id, and the audit log, is one request.
    pub fn needs_page_count(&self) -> bool {
        match self {
            Resource::Containers | Resource::Artifacts | Resource::Users => true,
            Resource::Container { view, .. } => *view == ContainerView::Artifacts,
            Resource::Artifact { .. } | Resource::User { .. } | Resource::Audit => false,
        }
    }

    /// Whether requests carry `page`/`page_size`
    pub fn is_paged(&self) -> bool {
        !matches!(self, Resource::Audit)
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Resource::Containers | Resource::Container { .. } => RecordKind::Container,
            Resource::Artifacts | Resource::Artifact { .. } => RecordKind::Artifact,
            Resource::Users | Resource::User { .. } => RecordKind::User,
            Resource::Audit => RecordKind::Audit,
        }
    }

    /// Artifact reads include the container's artifact listing
    pub fn reads_artifacts(&self) -> bool {
        matches!(
            self,
            Resource::Artifacts
                | Resource::Artifact { .. }
                | Resource::Container {
                    view: ContainerView::Artifacts,
                    ..
                }
        )
    }
}

/// Timestamp field compared when none is named
pub const DEFAULT_DATE_FIELD: &str = "start_time";

/// Inclusive time window applied to fetched records after the fact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Record field holding the timestamp to compare
    pub field: String,
}

impl DateRange {
    /// Missing start means the Unix epoch; missing end means now.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        field: impl Into<String>,
    ) -> ClientResult<Self> {
        let start = start.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let end = end.unwrap_or_else(Utc::now);
        if start > end {
            return Err(ClientError::InvalidInput(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self {
            start,
            end,
            field: field.into(),
        })
    }

    /// Window over [`DEFAULT_DATE_FIELD`]
    pub fn on_start_time(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> ClientResult<Self> {
        Self::new(start, end, DEFAULT_DATE_FIELD)
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.start <= *timestamp && *timestamp <= self.end
    }

    /// Whether the record's timestamp field parses and falls inside the range
    pub fn admits(&self, record: &serde_json::Map<String, serde_json::Value>) -> bool {
        record
            .get(&self.field)
            .and_then(serde_json::Value::as_str)
            .and_then(parse_timestamp)
            .is_some_and(|ts| self.contains(&ts))
    }
}

/// Parse the timestamp formats the API emits.
///
/// Accepts RFC 3339, naive date-times (`T` or space separated, optional
/// fractional seconds) taken as UTC, and bare dates at midnight UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parameters for one read operation
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    resource: Resource,
    page_size: u32,
    page_size_explicit: bool,
    sort: Option<String>,
    order: Option<SortOrder>,
    pretty: bool,
    include_expensive: bool,
    filters: BTreeMap<String, String>,
    params: BTreeMap<String, String>,
    date_range: Option<DateRange>,
}

impl Query {
    /// Query with default paging and no filters
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            page_size: pagination::DEFAULT_PAGE_SIZE,
            page_size_explicit: false,
            sort: None,
            order: None,
            pretty: false,
            include_expensive: false,
            filters: BTreeMap::new(),
            params: BTreeMap::new(),
            date_range: None,
        }
    }

    pub fn builder(resource: Resource) -> QueryBuilder {
        QueryBuilder::new(resource)
    }

    pub fn containers() -> Self {
        Self::new(Resource::Containers)
    }

    pub fn container(id: u64) -> Self {
        Self::new(Resource::Container {
            id,
            view: ContainerView::Record,
        })
    }

    pub fn permitted_users(container_id: u64) -> Self {
        Self::new(Resource::Container {
            id: container_id,
            view: ContainerView::PermittedUsers,
        })
    }

    pub fn phases(container_id: u64) -> Self {
        Self::new(Resource::Container {
            id: container_id,
            view: ContainerView::Phases,
        })
    }

    pub fn artifacts() -> Self {
        Self::new(Resource::Artifacts)
    }

    pub fn container_artifacts(container_id: u64) -> Self {
        Self::new(Resource::Container {
            id: container_id,
            view: ContainerView::Artifacts,
        })
    }

    pub fn artifact(id: u64) -> Self {
        Self::new(Resource::Artifact { id })
    }

    pub fn users() -> Self {
        Self::new(Resource::Users)
    }

    pub fn user(id: u64) -> Self {
        Self::new(Resource::User { id })
    }

    pub fn audit() -> Self {
        Self::new(Resource::Audit)
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn endpoint(&self) -> String {
        self.resource.endpoint()
    }

    pub fn data_key(&self) -> Option<&'static str> {
        self.resource.data_key()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        self.date_range.as_ref()
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Use `page_size` unless the caller chose one or asked for expensive output
    #[must_use]
    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        if !self.page_size_explicit && !self.pretty && !self.include_expensive && page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    /// Add a filter by its full parameter name when it is not already set
    #[must_use]
    pub fn with_default_filter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.filters
            .entry(key.to_string())
            .or_insert_with(|| value.into());
        self
    }

    /// Query parameters for one page (`None` for unpaged requests)
    pub fn params_for_page(&self, page: Option<u32>) -> Vec<(String, String)> {
        self.params_with(page, self.page_size)
    }

    /// Parameters of the single-record probe used to learn the record count
    pub fn probe_params(&self) -> Vec<(String, String)> {
        self.params_with(Some(0), pagination::PROBE_PAGE_SIZE)
    }

    fn params_with(&self, page: Option<u32>, page_size: u32) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if self.resource.is_paged() {
            if let Some(page) = page {
                params.push((pagination::PAGE.to_string(), page.to_string()));
            }
            params.push((pagination::PAGE_SIZE.to_string(), page_size.to_string()));
        }
        if let Some(ref sort) = self.sort {
            params.push((pagination::SORT.to_string(), sort.clone()));
        }
        if let Some(order) = self.order {
            params.push((pagination::ORDER.to_string(), order.as_str().to_string()));
        }
        if self.pretty {
            params.push((pagination::PRETTY.to_string(), "1".to_string()));
        }
        if self.include_expensive {
            params.push((pagination::INCLUDE_EXPENSIVE.to_string(), "1".to_string()));
        }
        params.extend(self.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        params.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

/// Builder for [`Query`]; validation happens in [`QueryBuilder::build`]
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    resource: Resource,
    page_size: Option<u32>,
    sort: Option<String>,
    order: Option<String>,
    pretty: bool,
    include_expensive: bool,
    filters: BTreeMap<String, String>,
    params: BTreeMap<String, String>,
    date_range: Option<DateRange>,
}

impl QueryBuilder {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            page_size: None,
            sort: None,
            order: None,
            pretty: false,
            include_expensive: false,
            filters: BTreeMap::new(),
            params: BTreeMap::new(),
            date_range: None,
        }
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(field.into());
        self
    }

    /// Sort direction, `asc` or `desc`
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn include_expensive(mut self) -> Self {
        self.include_expensive = true;
        self
    }

    /// Equality filter, sent as `_filter_<field>`.
    ///
    /// Values go on the wire as given; string values must carry their own
    /// JSON quotes (`"\"test\""`).
    pub fn filter(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters.insert(
            format!("{}{field}", pagination::FILTER_PREFIX),
            value.into(),
        );
        self
    }

    /// Operator filter, sent as `_filter_<field>__<op>` (e.g. `icontains`, `in`, `gt`)
    pub fn filter_op(mut self, field: &str, op: &str, value: impl Into<String>) -> Self {
        self.filters.insert(
            format!("{}{field}__{op}", pagination::FILTER_PREFIX),
            value.into(),
        );
        self
    }

    /// Filter given by its full parameter name; the prefix is added when missing
    pub fn raw_filter(mut self, key: &str, value: impl Into<String>) -> Self {
        let key = if key.starts_with(pagination::FILTER_PREFIX) {
            key.to_string()
        } else {
            format!("{}{key}", pagination::FILTER_PREFIX)
        };
        self.filters.insert(key, value.into());
        self
    }

    /// Extra, unprefixed query parameter (audit `user`, `container`, `start`, `end`)
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Restrict audit output to the given users
    pub fn audit_users(self, ids: &[u64]) -> Self {
        self.param("user", join_ids(ids))
    }

    /// Restrict audit output to the given containers
    pub fn audit_containers(self, ids: &[u64]) -> Self {
        self.param("container", join_ids(ids))
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn build(self) -> ClientResult<Query> {
        let page_size = match self.page_size {
            Some(0) => {
                return Err(ClientError::invalid_option(
                    "page_size",
                    ["a positive integer"],
                ))
            }
            Some(size) => size,
            None if self.pretty || self.include_expensive => pagination::EXPENSIVE_PAGE_SIZE,
            None => pagination::DEFAULT_PAGE_SIZE,
        };

        let order = self
            .order
            .as_deref()
            .map(str::parse::<SortOrder>)
            .transpose()?;

        Ok(Query {
            resource: self.resource,
            page_size,
            page_size_explicit: self.page_size.is_some(),
            sort: self.sort,
            order,
            pretty: self.pretty,
            include_expensive: self.include_expensive,
            filters: self.filters,
            params: self.params,
            date_range: self.date_range,
        })
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_endpoints_are_wire_exact() {
        assert_eq!(Query::containers().endpoint(), "/container");
        assert_eq!(Query::container(5).endpoint(), "/container/5");
        assert_eq!(Query::container_artifacts(5).endpoint(), "/container/5/artifacts");
        assert_eq!(Query::permitted_users(5).endpoint(), "/container/5/permitted_users");
        assert_eq!(Query::phases(5).endpoint(), "/container/5/phases");
        assert_eq!(Query::artifacts().endpoint(), "/artifact");
        assert_eq!(Query::artifact(9).endpoint(), "/artifact/9");
        assert_eq!(Query::users().endpoint(), "/ph_user");
        assert_eq!(Query::user(2).endpoint(), "/ph_user/2");
        assert_eq!(Query::audit().endpoint(), "/audit");
    }

    #[test]
    fn test_data_key_selection() {
        assert_eq!(Query::containers().data_key(), Some("data"));
        assert_eq!(Query::container(1).data_key(), None);
        assert_eq!(Query::permitted_users(1).data_key(), Some("users"));
        assert_eq!(Query::phases(1).data_key(), Some("data"));
        assert_eq!(Query::artifact(1).data_key(), None);
        assert_eq!(Query::users().data_key(), Some("data"));
        assert_eq!(Query::user(1).data_key(), None);
    }

    #[test]
    fn test_single_records_skip_page_count() {
        assert!(Query::containers().resource().needs_page_count());
        assert!(Query::container_artifacts(3).resource().needs_page_count());
        assert!(!Query::container(3).resource().needs_page_count());
        assert!(!Query::phases(3).resource().needs_page_count());
        assert!(!Query::artifact(3).resource().needs_page_count());
        assert!(!Query::audit().resource().needs_page_count());
    }

    #[test]
    fn test_params_for_page() {
        let query = Query::builder(Resource::Containers)
            .page_size(50)
            .sort("id")
            .order("desc")
            .filter_op("name", "icontains", "\"test\"")
            .filter("tenant", "0")
            .build()
            .unwrap();

        let params = query.params_for_page(Some(2));
        let lookup = |k: &str| params.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(lookup("page"), Some("2"));
        assert_eq!(lookup("page_size"), Some("50"));
        assert_eq!(lookup("sort"), Some("id"));
        assert_eq!(lookup("order"), Some("desc"));
        assert_eq!(lookup("_filter_name__icontains"), Some("\"test\""));
        assert_eq!(lookup("_filter_tenant"), Some("0"));
    }

    #[test]
    fn test_probe_forces_single_record_page() {
        let query = Query::builder(Resource::Artifacts).page_size(10).build().unwrap();
        let params = query.probe_params();
        assert!(params.contains(&("page".to_string(), "0".to_string())));
        assert!(params.contains(&("page_size".to_string(), "1".to_string())));
        assert_eq!(query.page_size(), 10);
    }

    #[test]
    fn test_expensive_queries_use_smaller_pages() {
        let query = Query::builder(Resource::Containers)
            .include_expensive()
            .build()
            .unwrap();
        assert_eq!(query.page_size(), 500);
        let params = query.params_for_page(Some(0));
        assert!(params.contains(&("include_expensive".to_string(), "1".to_string())));

        let explicit = Query::builder(Resource::Containers)
            .pretty()
            .page_size(20)
            .build()
            .unwrap();
        assert_eq!(explicit.page_size(), 20);
    }

    #[test]
    fn test_default_page_size_respects_explicit_choice() {
        assert_eq!(Query::containers().with_default_page_size(200).page_size(), 200);

        let explicit = Query::builder(Resource::Containers).page_size(25).build().unwrap();
        assert_eq!(explicit.with_default_page_size(200).page_size(), 25);

        let expensive = Query::builder(Resource::Containers).pretty().build().unwrap();
        assert_eq!(expensive.with_default_page_size(200).page_size(), 500);
    }

    #[test]
    fn test_invalid_options_fail_at_build() {
        let err = Query::builder(Resource::Users).page_size(0).build().unwrap_err();
        assert!(matches!(err, ClientError::InvalidOption { ref name, .. } if name == "page_size"));

        let err = Query::builder(Resource::Users).order("sideways").build().unwrap_err();
        assert!(matches!(err, ClientError::InvalidOption { ref name, .. } if name == "order"));
    }

    #[test]
    fn test_raw_filter_prefixing() {
        let query = Query::builder(Resource::Users)
            .raw_filter("_filter_type__in", "[\"normal\"]")
            .raw_filter("name", "\"bob\"")
            .build()
            .unwrap();
        let params = query.params_for_page(Some(0));
        assert!(params.contains(&("_filter_type__in".to_string(), "[\"normal\"]".to_string())));
        assert!(params.contains(&("_filter_name".to_string(), "\"bob\"".to_string())));
    }

    #[test]
    fn test_audit_params_are_unpaged() {
        let query = Query::builder(Resource::Audit)
            .audit_containers(&[119109, 119108])
            .audit_users(&[5])
            .build()
            .unwrap();
        let params = query.params_for_page(None);
        assert!(!params.iter().any(|(k, _)| k == "page" || k == "page_size"));
        assert!(params.contains(&("container".to_string(), "119109,119108".to_string())));
        assert!(params.contains(&("user".to_string(), "5".to_string())));
    }

    #[test]
    fn test_date_range_defaults() {
        let end = Utc.with_ymd_and_hms(2019, 12, 31, 0, 0, 0).unwrap();
        let range = DateRange::new(None, Some(end), "start_time").unwrap();
        assert_eq!(range.start, DateTime::<Utc>::UNIX_EPOCH);

        let start = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let range = DateRange::on_start_time(Some(start), None).unwrap();
        assert_eq!(range.field, "start_time");
        assert!(range.end > start);
        assert!(range.contains(&start));

        assert!(DateRange::new(Some(end), Some(start), "start_time").is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2019, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2019-06-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2019-06-01T12:30:00.000000Z"), Some(expected));
        assert_eq!(parse_timestamp("2019-06-01T12:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2019-06-01 12:30:00.5").map(|t| t.timestamp()),
            Some(expected.timestamp())
        );
        assert_eq!(
            parse_timestamp("2019-06-01"),
            Some(Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_date_range_admits_records() {
        let range = DateRange::new(
            Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()),
            Some(Utc.with_ymd_and_hms(2019, 12, 31, 0, 0, 0).unwrap()),
            "start_time",
        )
        .unwrap();

        let record = |v: serde_json::Value| v.as_object().cloned().unwrap();
        assert!(range.admits(&record(serde_json::json!({"start_time": "2019-06-01T00:00:00Z"}))));
        assert!(!range.admits(&record(serde_json::json!({"start_time": "2020-01-01T00:00:00Z"}))));
        assert!(!range.admits(&record(serde_json::json!({"start_time": "garbage"}))));
        assert!(!range.admits(&record(serde_json::json!({"id": 1}))));
    }

    #[test]
    fn test_record_kind_endpoints() {
        assert_eq!(RecordKind::Container.record_endpoint(4), "/container/4");
        assert_eq!(RecordKind::Artifact.record_endpoint(8), "/artifact/8");
        let artifacts_view = Resource::Container {
            id: 1,
            view: ContainerView::Artifacts,
        };
        assert_eq!(artifacts_view.kind(), RecordKind::Container);
        assert!(Query::container_artifacts(1).resource().reads_artifacts());
    }
}
