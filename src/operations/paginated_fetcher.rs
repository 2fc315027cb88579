//! # Paginated Fetcher
//!
//! Reads every page of a listing as one [`ResultSet`]:
//!
//! 1. Single records skip counting and are fetched with one request.
//! 2. Listings are probed with `page_size=1` to learn the record count.
//! 3. One request per page `0..num_pages` is dispatched through the caller's
//!    [`AdmissionGate`] and the outcomes are aggregated in page order.
//! 4. Records nested under the resource's data key are unwrapped.
//! 5. An optional [`DateRange`](crate::models::DateRange) drops records whose
//!    timestamp is outside the window or does not parse.
//!
//! A failed probe aborts the fetch; a failed page only adds a failure entry.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::constants::pagination;
use crate::error::{ClientError, ClientResult};
use crate::logging::log_fetch_operation;
use crate::models::Query;
use crate::results::{ResultAggregator, ResultSet};
use crate::transport::{AdmissionGate, ApiRequest, Outcome, Record, Transport};

/// Record and page totals learned from the probe request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCount {
    pub count: u64,
    pub num_pages: u64,
}

impl PageCount {
    /// Pages needed to hold `count` records at `page_size` per page
    pub fn for_count(count: u64, page_size: u32) -> Self {
        let page_size = u64::from(page_size.max(1));
        Self {
            count,
            num_pages: count.div_ceil(page_size),
        }
    }
}

/// Fans out one request per page and merges the results
#[derive(Debug, Clone)]
pub struct PaginatedFetcher {
    transport: Arc<dyn Transport>,
}

impl PaginatedFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Learn how many records and pages the query covers
    #[instrument(skip(self, query, gate), fields(endpoint = %query.endpoint()))]
    pub async fn count(&self, query: &Query, gate: &AdmissionGate) -> ClientResult<PageCount> {
        let endpoint = query.endpoint();
        let probe = ApiRequest::get(endpoint.clone(), query.probe_params());

        let payload = match gate.dispatch(self.transport.as_ref(), probe).await {
            Outcome::Success { payload, .. } => payload,
            Outcome::Failure { payload, .. } => {
                let reason = payload
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("probe request failed")
                    .to_string();
                warn!(endpoint = %endpoint, reason = %reason, "Page count probe failed");
                return Err(ClientError::count_probe_failure(endpoint, reason));
            }
        };

        // With a one-record probe page, num_pages is also the record count
        let count = read_u64(&payload, pagination::COUNT)
            .or_else(|| read_u64(&payload, pagination::NUM_PAGES))
            .ok_or_else(|| {
                ClientError::count_probe_failure(
                    endpoint.clone(),
                    "response carries neither count nor num_pages",
                )
            })?;

        let page_count = PageCount::for_count(count, query.page_size());
        debug!(
            endpoint = %endpoint,
            count = page_count.count,
            num_pages = page_count.num_pages,
            page_size = query.page_size(),
            "Counted records"
        );
        Ok(page_count)
    }

    /// Fetch every page of the query
    #[instrument(skip(self, query, gate), fields(endpoint = %query.endpoint()))]
    pub async fn fetch(&self, query: &Query, gate: &AdmissionGate) -> ClientResult<ResultSet> {
        let endpoint = query.endpoint();
        let requests = if query.resource().needs_page_count() {
            let pages = self.count(query, gate).await?.num_pages;
            (0..pages)
                .map(|page| {
                    let page = u32::try_from(page).map_err(|_| {
                        ClientError::invalid_response(
                            pagination::NUM_PAGES,
                            format!("page index {page} out of range"),
                        )
                    })?;
                    Ok(ApiRequest::get(
                        endpoint.clone(),
                        query.params_for_page(Some(page)),
                    ))
                })
                .collect::<ClientResult<Vec<_>>>()?
        } else if query.resource().is_paged() {
            vec![ApiRequest::get(endpoint.clone(), query.params_for_page(Some(0)))]
        } else {
            vec![ApiRequest::get(endpoint.clone(), query.params_for_page(None))]
        };

        let pages = requests.len();
        if pages == 0 {
            debug!(endpoint = %endpoint, "No records to fetch");
            log_fetch_operation(&endpoint, 0, 0, 0, query.date_range().is_some());
            return Ok(ResultSet::new());
        }

        let outcomes = gate.dispatch_all(self.transport.as_ref(), requests).await;
        let mut results = ResultAggregator::aggregate(outcomes);

        if let Some(key) = query.data_key() {
            results.unwrap_data_key(key);
        }

        if let Some(range) = query.date_range() {
            let before = results.success.len();
            results.retain_success(|record| {
                let admitted = range.admits(record);
                if !admitted && !has_parsable_timestamp(record, &range.field) {
                    let record_id = record.get("id").cloned().unwrap_or_default();
                    warn!(
                        field = %range.field,
                        record_id = %record_id,
                        "Dropping record without a parsable timestamp"
                    );
                }
                admitted
            });
            debug!(
                endpoint = %endpoint,
                kept = results.success.len(),
                dropped = before - results.success.len(),
                "Applied date filter"
            );
        }

        log_fetch_operation(
            &endpoint,
            pages,
            results.success.len(),
            results.failure.len(),
            query.date_range().is_some(),
        );
        Ok(results)
    }
}

fn read_u64(payload: &Record, key: &str) -> Option<u64> {
    match payload.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn has_parsable_timestamp(record: &Record, field: &str) -> bool {
    record
        .get(field)
        .and_then(Value::as_str)
        .and_then(crate::models::query::parse_timestamp)
        .is_some()
}
