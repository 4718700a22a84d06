//! Integration tests for InfoDengueClient response classification.

use std::time::Duration;

use aedes_client::InfoDengueClient;
use aedes_core::{AppError, FetchOutcome, HttpConfig, ReportClient, SyncWindow};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ALERTCITY_PATH: &str = "/api/alertcity/";

fn window() -> SyncWindow {
    SyncWindow {
        week_start: 1,
        year_start: 2023,
        week_end: 46,
        year_end: 2025,
    }
}

fn client_for(server: &MockServer) -> InfoDengueClient {
    let config = HttpConfig::default()
        .with_base_url(format!("{}{}", server.uri(), ALERTCITY_PATH))
        .with_timeout(Duration::from_millis(500));
    InfoDengueClient::new(&config).expect("client should build")
}

/// Test 1: A JSON array is returned as records, with all query parameters sent.
#[tokio::test]
async fn test_fetch_returns_records() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ALERTCITY_PATH))
        .and(query_param("geocode", "2611606"))
        .and(query_param("disease", "dengue"))
        .and(query_param("format", "json"))
        .and(query_param("ew_start", "1"))
        .and(query_param("ey_start", "2023"))
        .and(query_param("ew_end", "46"))
        .and(query_param("ey_end", "2025"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"SE": 202544, "data_iniSE": 1730000000000, "casos": 10, "nivel": 2}]"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let outcome = client_for(&mock_server)
        .fetch_reports("2611606", &window())
        .await;

    match outcome {
        FetchOutcome::Records(records) => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0]["SE"], 202544);
        }
        other => panic!("expected records, got {:?}", other),
    }
}

/// Test 2: An empty array is a successful empty result.
#[tokio::test]
async fn test_fetch_empty_array() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ALERTCITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let outcome = client_for(&mock_server)
        .fetch_alertcity("2611606", &window())
        .await;

    assert!(matches!(outcome, FetchOutcome::Records(ref r) if r.is_empty()));
}

/// Test 3: HTTP 404 is classified as not found.
#[tokio::test]
async fn test_fetch_not_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ALERTCITY_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let outcome = client_for(&mock_server)
        .fetch_alertcity("9999999", &window())
        .await;

    assert!(matches!(outcome, FetchOutcome::NotFound));
}

/// Test 4: Server and client errors other than 404 are soft failures.
#[tokio::test]
async fn test_fetch_error_status_is_soft() {
    for status in [400_u16, 429, 500, 503] {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ALERTCITY_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;

        let outcome = client_for(&mock_server)
            .fetch_alertcity("2611606", &window())
            .await;

        match outcome {
            FetchOutcome::SoftError(reason) => {
                assert_eq!(reason, format!("HTTP {}", status));
            }
            other => panic!("status {} should be soft, got {:?}", status, other),
        }
    }
}

/// Test 5: A JSON object body is an unexpected shape, not a failure.
#[tokio::test]
async fn test_fetch_non_list_body_is_soft() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ALERTCITY_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"error": "invalid geocode"}"#),
        )
        .mount(&mock_server)
        .await;

    let outcome = client_for(&mock_server)
        .fetch_alertcity("2611606", &window())
        .await;

    assert!(matches!(outcome, FetchOutcome::SoftError(ref r) if r.contains("object")));
    assert!(outcome.into_records().unwrap().is_empty());
}

/// Test 6: An undecodable body is a soft failure.
#[tokio::test]
async fn test_fetch_invalid_json_is_soft() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ALERTCITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let outcome = client_for(&mock_server)
        .fetch_alertcity("2611606", &window())
        .await;

    assert!(matches!(outcome, FetchOutcome::SoftError(_)));
}

/// Test 7: A response slower than the timeout is a hard failure.
#[tokio::test]
async fn test_fetch_timeout_is_hard() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ALERTCITY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let outcome = client_for(&mock_server)
        .fetch_alertcity("2611606", &window())
        .await;

    match outcome {
        FetchOutcome::HardError(err @ AppError::Timeout(_)) => {
            assert_eq!(err.to_string(), "Request timed out after 500ms");
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
}

/// Test 8: A refused connection is a hard failure.
#[tokio::test]
async fn test_fetch_connection_refused_is_hard() {
    // Start and drop a server to get an address with nothing listening.
    let uri = {
        let mock_server = MockServer::start().await;
        mock_server.uri()
    };
    let config = HttpConfig::default()
        .with_base_url(format!("{}{}", uri, ALERTCITY_PATH))
        .with_timeout(Duration::from_millis(500));
    let client = InfoDengueClient::new(&config).unwrap();

    let outcome = client.fetch_alertcity("2611606", &window()).await;

    assert!(matches!(outcome, FetchOutcome::HardError(_)));
}
