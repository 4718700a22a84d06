//! Integration tests for MunicipalitySource downloads.

use std::time::Duration;

use aedes_client::MunicipalitySource;
use aedes_core::{AppError, HttpConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CSV_PATH: &str = "/csv/municipios.csv";

fn source_for(server: &MockServer) -> MunicipalitySource {
    let config = HttpConfig::default().with_timeout(Duration::from_millis(500));
    MunicipalitySource::new(&format!("{}{}", server.uri(), CSV_PATH), &config)
        .expect("source should build")
}

/// Test 1: The downloaded file is parsed and deduplicated.
#[tokio::test]
async fn test_fetch_parses_csv() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CSV_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "codigo_ibge,nome,capital,codigo_uf\n\
             2611606,Recife,1,26\n\
             2609600,Olinda,0,26\n\
             2611606,Recife,1,26\n",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let territories = source_for(&mock_server).fetch().await.unwrap();

    let geocodes: Vec<&str> = territories.iter().map(|t| t.geocode.as_str()).collect();
    assert_eq!(geocodes, vec!["2611606", "2609600"]);
    assert!(territories.iter().all(|t| t.state_code == 26));
}

/// Test 2: A non-success status is a client error.
#[tokio::test]
async fn test_fetch_http_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CSV_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let err = source_for(&mock_server).fetch().await.unwrap_err();

    match err {
        AppError::ClientError(msg) => assert!(msg.contains("HTTP 404"), "got {msg}"),
        other => panic!("expected client error, got {:?}", other),
    }
}

/// Test 3: A slow server surfaces the configured timeout.
#[tokio::test]
async fn test_fetch_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CSV_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("codigo_ibge,nome,codigo_uf\n")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let err = source_for(&mock_server).fetch().await.unwrap_err();

    assert!(matches!(err, AppError::Timeout(limit) if limit == Duration::from_millis(500)));
}

/// Test 4: A file without the expected header is rejected.
#[tokio::test]
async fn test_fetch_malformed_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CSV_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not found</html>\n1\n"))
        .mount(&mock_server)
        .await;

    let err = source_for(&mock_server).fetch().await.unwrap_err();

    assert!(matches!(err, AppError::InvalidRecord(_)));
}
