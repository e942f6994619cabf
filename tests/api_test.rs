//! HTTP API tests
//!
//! Drive the router in-process with `oneshot`; Google APIs are served by wiremock.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{header as header_matcher, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vzla_cleaning::utils::excel::{read_table, write_table};
use vzla_cleaning::{
    create_router, AppState, CellValue, CredentialResolver, GcpCredentials, GcpEndpoints,
    ServerConfig, Table,
};

const BOUNDARY: &str = "----vzla-test-boundary";

fn sample_workbook() -> Vec<u8> {
    let table = Table::new(
        vec!["estado".into(), "total".into()],
        vec![
            vec![CellValue::String("Zulia".into()), CellValue::Int(4)],
            vec![CellValue::Empty, CellValue::Empty],
            vec![CellValue::String("Lara".into()), CellValue::Int(9)],
        ],
    );
    write_table(&table).unwrap()
}

fn multipart_body(field: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
    let disposition = match filename {
        Some(name) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, name),
        None => format!("form-data; name=\"{}\"", field),
    };
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn process_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn router(config: ServerConfig, resolver: CredentialResolver) -> Router {
    create_router(Arc::new(AppState::new(config, reqwest::Client::new(), resolver)))
}

/// Router whose Google calls go to `base_url` with a fixed token
fn router_against(base_url: &str) -> Router {
    let config = ServerConfig {
        endpoints: GcpEndpoints::single_host(base_url),
        ..ServerConfig::default()
    };
    let creds = GcpCredentials::from_static_token("ya29.test", Some("demo".into()));
    router(config, CredentialResolver::fixed(creds))
}

fn offline_router() -> Router {
    router_against("http://127.0.0.1:9")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================
// Health
// ============================================

#[tokio::test]
async fn test_health() {
    let response = offline_router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "status": "healthy",
            "service": "vzla-r011-direct-cleaning",
            "message": "Service is running"
        })
    );
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let response = offline_router()
        .oneshot(
            Request::get("/health")
                .header(header::ORIGIN, "https://example.org")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

// ============================================
// Upload validation
// ============================================

#[tokio::test]
async fn test_process_without_multipart_body() {
    let response = offline_router()
        .oneshot(Request::post("/process").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({
            "error": "No file provided",
            "message": "Please provide an Excel file in the \"file\" field"
        })
    );
}

#[tokio::test]
async fn test_process_with_wrong_field_name() {
    let body = multipart_body("upload", Some("datos.xlsx"), &sample_workbook());
    let response = offline_router()
        .oneshot(process_request("/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No file provided");
}

#[tokio::test]
async fn test_process_with_empty_filename() {
    let body = multipart_body("file", Some(""), b"");
    let response = offline_router()
        .oneshot(process_request("/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "No file selected", "message": "Please select a file to upload"})
    );
}

#[tokio::test]
async fn test_process_rejects_non_excel_names() {
    for name in ["datos.csv", "datos.XLSX", "datos.xlsx.txt"] {
        let body = multipart_body("file", Some(name), b"a,b\n1,2\n");
        let response = offline_router()
            .oneshot(process_request("/process", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", name);
        assert_eq!(
            json_body(response).await,
            json!({
                "error": "Invalid file type",
                "message": "Please upload an Excel file (.xlsx or .xls)"
            })
        );
    }
}

#[tokio::test]
async fn test_process_corrupt_workbook() {
    let body = multipart_body("file", Some("roto.xlsx"), b"definitely not a zip archive");
    let response = offline_router()
        .oneshot(process_request("/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Processing failed");
    assert!(!body["message"].as_str().unwrap().is_empty());
}

// ============================================
// Processing
// ============================================

#[tokio::test]
async fn test_process_returns_cleaned_attachment() {
    let body = multipart_body("file", Some("Reporte R011.xlsx"), &sample_workbook());
    let response = offline_router()
        .oneshot(process_request("/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"processed_Reporte_R011.xlsx\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let table = read_table(&bytes, "processed_Reporte_R011.xlsx").unwrap();
    assert_eq!(table.columns, vec!["estado", "total"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[1][0], CellValue::String("Lara".into()));
}

#[tokio::test]
async fn test_process_upload_flags_must_be_true() {
    // Anything other than "true" keeps the download behavior
    let body = multipart_body("file", Some("datos.xlsx"), &sample_workbook());
    let response = offline_router()
        .oneshot(process_request("/process?upload_storage=1&bucket_name=b", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_DISPOSITION).is_some());
}

#[tokio::test]
async fn test_process_reports_missing_upload_parameters() {
    let body = multipart_body("file", Some("datos.xlsx"), &sample_workbook());
    let response = offline_router()
        .oneshot(process_request(
            concat!(
                "/process?upload_bigquery=true&dataset_id=ds",
                "&upload_storage=True&upload_sheets=TRUE&spreadsheet_id="
            ),
            body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "success": true,
            "message": "File processed successfully",
            "filename": "datos.xlsx",
            "uploads": {
                "bigquery": {"success": false, "message": "dataset_id and table_id are required"},
                "storage": {"success": false, "message": "bucket_name is required"},
                "sheets": {"success": false, "message": "spreadsheet_id is required"}
            }
        })
    );
}

#[tokio::test]
async fn test_process_uploads_to_storage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/reportes/o"))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "Reporte_R011.xlsx"))
        .and(header_matcher("authorization", "Bearer ya29.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bucket": "reportes",
            "name": "Reporte_R011.xlsx",
            "size": "5120"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let body = multipart_body("file", Some("Reporte R011.xlsx"), &sample_workbook());
    let response = router_against(&server.uri())
        .oneshot(process_request("/process?upload_storage=true&bucket_name=reportes", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["filename"], "Reporte_R011.xlsx");
    assert_eq!(
        body["uploads"],
        json!({"storage": {"success": true, "bucket": "reportes", "blob": "Reporte_R011.xlsx"}})
    );
}

#[tokio::test]
async fn test_process_reports_failed_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/privado/o"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "Access denied", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let body = multipart_body("file", Some("datos.xlsx"), &sample_workbook());
    let response = router_against(&server.uri())
        .oneshot(process_request(
            "/process?upload_storage=true&bucket_name=privado&blob_name=entregas/datos.xlsx",
            body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["uploads"]["storage"],
        json!({"success": false, "bucket": "privado", "blob": "entregas/datos.xlsx"})
    );
}

#[tokio::test]
async fn test_slow_upload_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/lento/o"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"bucket": "lento", "name": "datos.xlsx"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = ServerConfig {
        endpoints: GcpEndpoints::single_host(&server.uri()),
        request_timeout: Duration::from_millis(200),
        ..ServerConfig::default()
    };
    let creds = GcpCredentials::from_static_token("ya29.test", Some("demo".into()));
    let app = router(config, CredentialResolver::fixed(creds));

    let body = multipart_body("file", Some("datos.xlsx"), &sample_workbook());
    let response = app
        .oneshot(process_request("/process?upload_storage=true&bucket_name=lento", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
}

#[tokio::test]
async fn test_process_fails_when_credentials_are_unavailable() {
    // Metadata detection hits a server with no routes, so ADC resolution fails
    let server = MockServer::start().await;
    let config = ServerConfig {
        endpoints: GcpEndpoints::single_host(&server.uri()),
        ..ServerConfig::default()
    };
    let resolver = CredentialResolver::new(
        PathBuf::from("/nonexistent/credentials.json"),
        config.endpoints.clone(),
        reqwest::Client::new(),
    );

    let body = multipart_body("file", Some("datos.xlsx"), &sample_workbook());
    let response = router(config, resolver)
        .oneshot(process_request("/process?upload_storage=true&bucket_name=b", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "Processing failed");
}

#[tokio::test]
async fn test_plain_download_needs_no_credentials() {
    let server = MockServer::start().await;
    let config = ServerConfig {
        endpoints: GcpEndpoints::single_host(&server.uri()),
        ..ServerConfig::default()
    };
    let resolver = CredentialResolver::new(
        PathBuf::from("/nonexistent/credentials.json"),
        config.endpoints.clone(),
        reqwest::Client::new(),
    );

    let body = multipart_body("file", Some("datos.xlsx"), &sample_workbook());
    let response = router(config, resolver)
        .oneshot(process_request("/process", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"processed_datos.xlsx\""
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ============================================
// Connection tests
// ============================================

#[tokio::test]
async fn test_bigquery_connection_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/demo/datasets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "datasets": [
                {"datasetReference": {"datasetId": "raw", "projectId": "demo"}},
                {"datasetReference": {"datasetId": "clean", "projectId": "demo"}}
            ]
        })))
        .mount(&server)
        .await;

    let response = router_against(&server.uri())
        .oneshot(Request::get("/test/bigquery").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "success": true,
            "message": "Successfully connected to BigQuery. Project: demo, Datasets found: 2"
        })
    );
}

#[tokio::test]
async fn test_storage_connection_endpoint_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Invalid Credentials"}
        })))
        .mount(&server)
        .await;

    let response = router_against(&server.uri())
        .oneshot(Request::get("/test/storage").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Error connecting to Cloud Storage: "), "{}", message);
    assert!(message.contains("Invalid Credentials"));
}

#[tokio::test]
async fn test_connection_endpoint_without_credentials() {
    let server = MockServer::start().await;
    let config = ServerConfig {
        endpoints: GcpEndpoints::single_host(&server.uri()),
        ..ServerConfig::default()
    };
    let resolver = CredentialResolver::new(
        PathBuf::from("/nonexistent/credentials.json"),
        config.endpoints.clone(),
        reqwest::Client::new(),
    );

    let response = router(config, resolver)
        .oneshot(Request::get("/test/storage").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Error testing Cloud Storage connection: "));
}
