use admin_sdk::{admin_router, common_routes, AdminOptions, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

fn settings_json() -> Value {
    json!({
        "models": [
            { "name": "User", "displayFields": ["email"], "fields": [
                { "name": "id", "type": "Int", "isId": true, "hasDefaultValue": true },
                { "name": "email", "type": "String", "isRequired": true },
                { "name": "posts", "kind": "relation", "type": "Post", "isList": true }
            ]},
            { "name": "Post", "fields": [
                { "name": "id", "type": "Int", "isId": true, "hasDefaultValue": true },
                { "name": "title", "type": "String", "isRequired": true },
                { "name": "authorId", "type": "Int" },
                { "name": "author", "kind": "relation", "type": "User",
                  "relation": { "fromFields": ["authorId"], "references": ["id"], "displayMode": "tags" } }
            ]},
            { "name": "Archive", "canCreate": false, "canDelete": false, "fields": [
                { "name": "id", "type": "Int", "isId": true, "hasDefaultValue": true },
                { "name": "note", "type": "String" }
            ]}
        ]
    })
}

/// Router over a temp settings file and a pool that never connects.
/// Every request below must be answered without touching the database.
fn app(dir: &tempfile::TempDir, import_max_bytes: usize) -> Router {
    let path = dir.path().join("admin-settings.json");
    std::fs::write(&path, settings_json().to_string()).unwrap();
    let options = AdminOptions {
        settings_path: path,
        import_max_bytes,
        ..AdminOptions::default()
    };
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://nobody@127.0.0.1:1/none")
        .unwrap();
    admin_router(AppState::new(pool, options))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    let body = body.to_string();
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_and_version() {
    let app = common_routes();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
    let (status, body) = send(&app, get("/version")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "admin-sdk");
}

#[tokio::test]
async fn settings_document_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, 1024);
    let (status, body) = send(&app, get("/api/v1/settings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["models"][0]["name"], "User");
}

#[tokio::test]
async fn invalid_settings_are_rejected_and_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, 1024);
    let bad = json!({ "models": [{ "name": "Broken", "fields": [] }] });
    let (status, body) = send(&app, json_request("PUT", "/api/v1/settings", bad)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");
    let (_, body) = send(&app, get("/api/v1/settings")).await;
    assert_eq!(body["data"]["models"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn relation_presentation_is_coerced() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, 1024);
    let (status, body) = send(&app, get("/api/v1/settings/Post/author/relation")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cardinality"], "manyToOne");
    // tags is a multi-valued display mode; the first single-valued mode is used instead
    assert_eq!(body["data"]["presentation"]["displayMode"], "link");
    assert_eq!(body["data"]["validActions"], json!(["filter", "view", "edit"]));

    let (status, _) = send(&app, get("/api/v1/settings/Post/title/relation")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_is_forbidden_before_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, 1024);
    let (status, body) = send(&app, json_request("POST", "/api/v1/models/Archive", json!({ "note": "x" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let (status, _) = send(&app, json_request("DELETE", "/api/v1/models/Archive/1", json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bad_list_requests() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, 1024);
    let (status, _) = send(&app, get("/api/v1/models/Nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/api/v1/models/Post?filters=%5Bnot-json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = send(&app, get("/api/v1/models/Post?orderBy=author")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/api/v1/models/Post/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn action_segments_are_not_record_ids() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, 1024);
    let (status, _) = send(&app, get("/api/v1/models/User/delete")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(&app, json_request("PATCH", "/api/v1/models/User/import", json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn missing_required_field_names_its_title() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, 1024);
    let (status, body) = send(&app, json_request("POST", "/api/v1/models/Post", json!({ "authorId": 1 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["message"], "Title is required");
    assert_eq!(body["error"]["details"]["field"], "title");
}

#[tokio::test]
async fn empty_bulk_delete_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, 1024);
    let (status, body) = send(&app, json_request("POST", "/api/v1/models/User/delete", json!({ "ids": [] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn import_mapping_and_limits() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir, 256);
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/models/Post/import/mapping",
            json!({ "headers": ["Title", "author id", "author"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "Title": "title", "author id": "authorId" }));

    let (status, _) = send(
        &app,
        json_request("POST", "/api/v1/models/Archive/import", json!({ "csv": "note\nx\n", "mapping": { "note": "note" } })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let big = "note\n".to_string() + &"x\n".repeat(500);
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/models/Post/import", json!({ "csv": big, "mapping": {} })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
