//! Paginated fetch behavior against the in-memory transport.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use phantom_client::test_utils::{is_probe, listing_page, MockTransport};
use phantom_client::{
    AdmissionGate, ClientConfig, ClientError, DateRange, PaginatedFetcher, PhantomClient, Query,
    Resource,
};

fn records(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({"id": i, "name": format!("container {i}")})).collect()
}

fn query(page_size: u32) -> Query {
    Query::builder(Resource::Containers)
        .page_size(page_size)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_47_records_in_pages_of_10() {
    let transport = Arc::new(MockTransport::listing(records(47)));
    let fetcher = PaginatedFetcher::new(transport.clone());
    let gate = AdmissionGate::new(15).unwrap();

    let count = fetcher.count(&query(10), &gate).await.unwrap();
    assert_eq!(count.count, 47);
    assert_eq!(count.num_pages, 5);

    let results = fetcher.fetch(&query(10), &gate).await.unwrap();
    assert_eq!(results.success.len(), 47);
    assert!(results.failure.is_empty());

    let pages: Vec<String> = transport
        .page_requests()
        .iter()
        .map(|r| r.param("page").unwrap().to_string())
        .collect();
    assert_eq!(pages, vec!["0", "1", "2", "3", "4"]);

    // Records come back in page order
    let ids: Vec<u64> = results
        .success
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, (0..47).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_zero_records_dispatches_no_pages() {
    let transport = Arc::new(MockTransport::listing(Vec::new()));
    let fetcher = PaginatedFetcher::new(transport.clone());
    let gate = AdmissionGate::new(15).unwrap();

    let results = fetcher.fetch(&query(10), &gate).await.unwrap();
    assert!(results.success.is_empty());
    assert!(results.failure.is_empty());
    assert_eq!(transport.request_count(), 1);
    assert!(transport.page_requests().is_empty());
}

#[tokio::test]
async fn test_failed_page_is_isolated() {
    let data = records(47);
    let transport = Arc::new(MockTransport::with_responder(move |request| {
        if !is_probe(request) && request.param("page") == Some("2") {
            Err(500)
        } else {
            Ok(listing_page(&data, request))
        }
    }));
    let fetcher = PaginatedFetcher::new(transport);
    let gate = AdmissionGate::new(4).unwrap();

    let results = fetcher.fetch(&query(10), &gate).await.unwrap();
    assert_eq!(results.success.len(), 37);
    assert_eq!(results.failure.len(), 1);
    assert_eq!(results.failure[0]["status"], 500);
    assert_eq!(results.failure[0]["endpoint"], "/container");
}

#[tokio::test]
async fn test_fan_out_respects_admission_bound() {
    let transport = Arc::new(MockTransport::listing(records(100)).with_yields(4));
    let fetcher = PaginatedFetcher::new(transport.clone());
    let gate = AdmissionGate::new(3).unwrap();

    let results = fetcher.fetch(&query(5), &gate).await.unwrap();
    assert_eq!(results.success.len(), 100);
    assert_eq!(transport.page_requests().len(), 20);
    assert!(transport.max_observed_in_flight() <= 3);
}

#[tokio::test]
async fn test_date_range_keeps_records_inside_window() {
    let data = vec![
        json!({"id": 1, "start_time": "2019-01-01T00:00:00Z"}),
        json!({"id": 2, "start_time": "2019-06-01T00:00:00Z"}),
        json!({"id": 3, "start_time": "2020-01-01T00:00:00Z"}),
        json!({"id": 4, "start_time": "not a date"}),
    ];
    let transport = Arc::new(MockTransport::listing(data));
    let fetcher = PaginatedFetcher::new(transport);
    let gate = AdmissionGate::new(2).unwrap();

    let range = DateRange::new(
        Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()),
        Some(Utc.with_ymd_and_hms(2019, 12, 31, 0, 0, 0).unwrap()),
        "start_time",
    )
    .unwrap();
    let query = Query::builder(Resource::Containers)
        .date_range(range)
        .build()
        .unwrap();

    let results = fetcher.fetch(&query, &gate).await.unwrap();
    let ids: Vec<u64> = results
        .success
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(results.failure.is_empty());
}

#[tokio::test]
async fn test_permitted_users_unwrap_users_key() {
    let transport = Arc::new(MockTransport::with_responder(|request| {
        assert_eq!(request.endpoint, "/container/12/permitted_users");
        Ok(json!({"users": [{"id": 1, "username": "admin"}, {"id": 2, "username": "analyst"}]}))
    }));
    let client = PhantomClient::with_transport(ClientConfig::default(), transport).unwrap();

    let results = client.get_containers(&Query::permitted_users(12)).await.unwrap();
    assert_eq!(results.success.len(), 2);
    assert_eq!(results.success[1]["username"], "analyst");
}

#[tokio::test]
async fn test_container_artifacts_are_paginated() {
    let transport = Arc::new(MockTransport::listing(records(12)));
    let client = PhantomClient::with_transport(ClientConfig::default(), transport.clone()).unwrap();

    let query = Query::builder(Resource::Container {
        id: 3,
        view: phantom_client::ContainerView::Artifacts,
    })
    .page_size(5)
    .build()
    .unwrap();
    let results = client.get_artifacts(&query).await.unwrap();

    assert_eq!(results.success.len(), 12);
    assert!(transport
        .requests()
        .iter()
        .all(|r| r.endpoint == "/container/3/artifacts"));
    assert_eq!(transport.page_requests().len(), 3);
}

#[tokio::test]
async fn test_probe_failure_surfaces_as_error() {
    let transport = Arc::new(MockTransport::new().fail_all(401));
    let client = PhantomClient::with_transport(ClientConfig::default(), transport.clone()).unwrap();

    let err = client.get_artifacts(&Query::artifacts()).await.unwrap_err();
    assert!(matches!(err, ClientError::CountProbeFailure { .. }));
    assert!(err.is_recoverable());
    assert_eq!(transport.request_count(), 1);
}
