//! End-to-end tests over the HTTP surface, using an in-memory metadata store
//! and a temporary bucket.

use std::path::Path;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::config::AppConfig;
use gateway::create_router;
use gateway::state::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "gateway-test-boundary";

struct TestApp {
    router: Router,
    dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            database_url: "sqlite::memory:".into(),
            bucket_dir: dir.path().join("bucket"),
            ..AppConfig::default()
        };
        let state = AppState::new(config).await.unwrap();
        Self {
            router: create_router(state),
            dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn upload(&self, filename: &str, bytes: &[u8]) -> (StatusCode, Value) {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::post("/bucket")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Uploads a seeded SQLite database and registers it; returns the connection uid.
    async fn sqlite_connection(&self) -> String {
        let bytes = sample_database(self.dir.path()).await;
        let (status, body) = self.upload("sample.db", &bytes).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let blob = body["data"]["uid"].as_str().unwrap().to_string();

        let (status, body) = self
            .json(
                "POST",
                "/connections",
                json!({"source": "sqlite", "name": "sample", "connection_uri": blob}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["uid"].as_str().unwrap().to_string()
    }
}

async fn sample_database(dir: &Path) -> Vec<u8> {
    let path = dir.join("seed.db");
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    for statement in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT)",
        "CREATE TABLE products (id INTEGER PRIMARY KEY, title TEXT NOT NULL, price REAL)",
        "INSERT INTO users (name, email) VALUES ('ada', 'ada@example.com'), ('grace', NULL)",
        "INSERT INTO products (title, price) VALUES ('lamp', 19.5)",
    ] {
        sqlx::query(statement).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();
    std::fs::read(path).unwrap()
}

fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

fn query_uri(uid: &str, entity: &str, sql: &str, extra: &str) -> String {
    format!(
        "/connection/{uid}/entitities/{entity}/queries?query={}{extra}",
        encode(sql)
    )
}

#[tokio::test]
async fn test_health_reports_connection_count() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"], 0);

    let (status, _) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_upload_keeps_extension() {
    let app = TestApp::new().await;
    let (status, body) = app.upload("local.db", b"not really sqlite").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let uid = body["data"]["uid"].as_str().unwrap();
    assert!(uid.ends_with(".db"));
    assert!(app.dir.path().join("bucket").join(uid).is_file());
}

#[tokio::test]
async fn test_upload_without_file_field_is_rejected() {
    let app = TestApp::new().await;
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::post("/bucket")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_connection_lifecycle() {
    let app = TestApp::new().await;
    let uid = app.sqlite_connection().await;

    let (status, body) = app.get(&format!("/connections/{uid}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source"], "sqlite");
    assert_eq!(body["data"]["name"], "sample");

    let (status, body) = app
        .json(
            "POST",
            "/connections",
            json!({"source": "postgres", "name": "pg", "connection_uri": "postgres://u:p@localhost/app"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let pg_uid = body["data"]["uid"].as_str().unwrap().to_string();

    let (_, body) = app.get("/connections").await;
    assert_eq!(body["data"]["total"], 2);

    let (status, body) = app
        .json(
            "PUT",
            &format!("/connections/{pg_uid}"),
            json!({"name": "warehouse"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "warehouse");
    assert_eq!(body["data"]["source"], "postgres");

    let (status, body) = app.delete(&format!("/connections/{pg_uid}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (_, body) = app.get("/connections").await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["connections"][0]["uid"], uid.as_str());

    let (status, body) = app.delete(&format!("/connections/{pg_uid}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_sqlite_connection_requires_uploaded_blob() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(
            "POST",
            "/connections",
            json!({"source": "sqlite", "name": "ghost", "connection_uri": "missing.db"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (_, body) = app.get("/connections").await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_sqlite_uri_must_stay_inside_bucket() {
    let app = TestApp::new().await;
    // leaves the seeded database next to the bucket directory
    let uid = app.sqlite_connection().await;
    let absolute = app.dir.path().join("seed.db");
    assert!(absolute.is_file());

    for uri in ["../seed.db", absolute.to_str().unwrap()] {
        let (status, body) = app
            .json(
                "POST",
                "/connections",
                json!({"source": "sqlite", "name": "escape", "connection_uri": uri}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}: {body}");
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    }

    let (status, _) = app
        .json(
            "PUT",
            &format!("/connections/{uid}"),
            json!({"connection_uri": "../seed.db"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/connections").await;
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn test_update_to_missing_blob_leaves_record_unchanged() {
    let app = TestApp::new().await;
    let uid = app.sqlite_connection().await;
    let (_, before) = app.get(&format!("/connections/{uid}")).await;

    let (status, _) = app
        .json(
            "PUT",
            &format!("/connections/{uid}"),
            json!({"connection_uri": "missing.db"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, after) = app.get(&format!("/connections/{uid}")).await;
    assert_eq!(before["data"], after["data"]);
}

#[tokio::test]
async fn test_unknown_source_kind_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(
            "POST",
            "/connections",
            json!({"source": "oracle", "name": "legacy", "connection_uri": "oracle://db"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("unsupported dialect"));
}

#[tokio::test]
async fn test_sqlite_introspection() {
    let app = TestApp::new().await;
    let uid = app.sqlite_connection().await;

    let (status, body) = app.get(&format!("/connection/{uid}/table")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["tables"],
        json!([{"name": "products"}, {"name": "users"}])
    );

    let (_, body) = app.get(&format!("/connections/{uid}/entities")).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["entities"][1]["name"], "users");

    let (status, body) = app.get(&format!("/connection/{uid}/schema")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["schemas"], json!([]));

    let (status, body) = app
        .get(&format!("/connection/{uid}/entitities/users/columns"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["columns"][1]["name"], "name");
    assert_eq!(body["data"]["columns"][1]["nullable"], false);
}

#[tokio::test]
async fn test_entity_preview() {
    let app = TestApp::new().await;
    let uid = app.sqlite_connection().await;

    let (status, body) = app
        .get(&format!("/connection/{uid}/entitities/users"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["query"], "SELECT * FROM users");
    assert_eq!(data["row_count"], 2);
    assert_eq!(data["columns"][0]["name"], "id");
    assert_eq!(data["columns"][0]["data_type"], "INTEGER");
    assert_eq!(data["rows"][0]["email"], "ada@example.com");
    assert_eq!(data["rows"][1]["email"], Value::Null);
}

#[tokio::test]
async fn test_select_with_limit() {
    let app = TestApp::new().await;
    let uid = app.sqlite_connection().await;

    let (status, body) = app
        .get(&query_uri(&uid, "users", "SELECT * FROM users LIMIT 1", "&limit=1&offset=0"))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert!(data["rows"].as_array().unwrap().len() <= 1);
    assert!(!data["columns"].as_array().unwrap().is_empty());
    assert_eq!(data["connection_id"], uid.as_str());
    assert_eq!(data["entity_name"], "users");
    assert_eq!(data["limit"], 1);
}

#[tokio::test]
async fn test_missing_table_is_classified() {
    let app = TestApp::new().await;
    let uid = app.sqlite_connection().await;

    let (status, body) = app
        .get(&query_uri(
            &uid,
            "nonexistent_table_12345",
            "SELECT * FROM nonexistent_table_12345",
            "",
        ))
        .await;
    assert!(status == StatusCode::BAD_REQUEST || status == StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "EXECUTION_FAILED");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no such table"));
}

#[tokio::test]
async fn test_insert_then_select() {
    let app = TestApp::new().await;
    let uid = app.sqlite_connection().await;

    let (status, body) = app
        .get(&query_uri(
            &uid,
            "products",
            "INSERT INTO products (title, price) VALUES ('desk', 120.0)",
            "",
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["affected_rows"], 1);

    let (_, body) = app
        .get(&query_uri(
            &uid,
            "products",
            "SELECT title, price FROM products WHERE title = 'desk'",
            "",
        ))
        .await;
    assert_eq!(body["data"]["rows"], json!([{"title": "desk", "price": 120.0}]));
}

#[tokio::test]
async fn test_dry_run_is_rolled_back() {
    let app = TestApp::new().await;
    let uid = app.sqlite_connection().await;

    let (status, body) = app
        .get(&query_uri(&uid, "users", "DELETE FROM users", "&commit=false"))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["affected_rows"], 2);

    let (_, body) = app
        .get(&query_uri(&uid, "users", "SELECT COUNT(*) AS n FROM users", ""))
        .await;
    assert_eq!(body["data"]["rows"][0]["n"], 2);
}

#[tokio::test]
async fn test_missing_query_parameter() {
    let app = TestApp::new().await;
    let uid = app.sqlite_connection().await;
    let (status, body) = app
        .get(&format!("/connection/{uid}/entitities/users/queries"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_unknown_connection_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/connection/does-not-exist/table").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_api_source_has_no_catalog() {
    let app = TestApp::new().await;
    let (_, body) = app
        .json(
            "POST",
            "/connections",
            json!({"source": "api", "name": "crm", "connection_uri": "https://crm.example.com"}),
        )
        .await;
    let uid = body["data"]["uid"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/connection/{uid}/schema")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);

    let (status, body) = app.get(&format!("/connection/{uid}/table")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DIALECT_BAD_REQUEST");
}

#[tokio::test]
async fn test_request_id_and_openapi() {
    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(doc["paths"]["/connections"].is_object());

    let (status, body) = app
        .send(
            Request::get("/connections")
                .header("x-request-id", "req-43")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["request_id"], "req-43");
    assert_eq!(body["meta"]["service"], "gateway");
    assert!(body["meta"]["duration_ms"].is_u64());
    assert!(doc["paths"]["/connection/{uid}/entitities/{entity}/queries"].is_object());
}
