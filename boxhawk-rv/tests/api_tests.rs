//! Integration tests for boxhawk-rv API endpoints
//!
//! Tests cover:
//! - Health endpoint (no caller headers required)
//! - Submission create, list, detail and review transitions
//! - Blob upload, image registration and media serving
//! - Soft/hard delete and reassignment, with audit history

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use boxhawk_common::db::init_memory_database;
use boxhawk_rv::api::{PRINCIPAL_HEADER, ROLE_HEADER};
use boxhawk_rv::storage::LocalObjectStore;
use boxhawk_rv::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: app on an in-memory database with a temp blob directory
async fn setup_app() -> (Router, tempfile::TempDir) {
    let db = init_memory_database().await.expect("Should create database");
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let store = LocalObjectStore::new(dir.path().to_path_buf(), "http://localhost:5740/media");
    let state = AppState::new(db, Arc::new(store), 12).with_media_root(dir.path().to_path_buf());
    (build_router(state), dir)
}

/// Test helper: request as a given caller
fn request(method: &str, uri: &str, caller: Option<(&str, &str)>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = caller {
        builder = builder.header(PRINCIPAL_HEADER, id).header(ROLE_HEADER, role);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: send and decode the JSON body
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

const PHOTO: Option<(&str, &str)> = Some(("photo-1", "photouser"));
const EXPERT: Option<(&str, &str)> = Some(("expert-1", "expert"));
const ADMIN: Option<(&str, &str)> = Some(("admin-1", "admin"));

async fn create_submission(app: &Router, name: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/submissions",
            PHOTO,
            Some(json!({ "name": name, "manufacturer": "Acme" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn put_blob(app: &Router, path: &str) -> String {
    let req = Request::builder()
        .method("PUT")
        .uri(format!("/api/blobs/{}", path))
        .header(PRINCIPAL_HEADER, "photo-1")
        .header(ROLE_HEADER, "photouser")
        .body(Body::from(vec![0xFF, 0xD8, 0xFF]))
        .unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["storagePath"].as_str().unwrap().to_string()
}

async fn upload(app: &Router, submission_id: &str, paths: &[&str]) -> Vec<String> {
    let mut files = Vec::new();
    for path in paths {
        let storage_path = put_blob(app, path).await;
        files.push(json!({ "storage_path": storage_path, "mime_type": "image/jpeg", "size_bytes": 3 }));
    }
    let (status, body) = send(
        app,
        request(
            "POST",
            &format!("/api/submissions/{}/images", submission_id),
            PHOTO,
            Some(json!({ "files": files })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Health and session
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "boxhawk-rv");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_session_reports_pages() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, request("GET", "/api/session", PHOTO, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["defaultRedirect"], "/photo/upload");
    assert_eq!(body["accessiblePages"], json!(["/", "/success", "/photo/upload"]));

    let (_, body) = send(&app, request("GET", "/api/session/access?route=/items/abc", EXPERT, None)).await;
    assert_eq!(body["allowed"], true);
    let (_, body) = send(&app, request("GET", "/api/session/access?route=/admin/users", EXPERT, None)).await;
    assert_eq!(body["allowed"], false);
}

// =============================================================================
// Submission workflow
// =============================================================================

#[tokio::test]
async fn test_create_requires_name_and_manufacturer() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(
        &app,
        request("POST", "/api/submissions", PHOTO, Some(json!({ "name": "Gauze" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("manufacturer"));
}

#[tokio::test]
async fn test_review_flow_returns_next_in_queue() {
    let (app, _dir) = setup_app().await;
    let first = create_submission(&app, "First").await;
    let second = create_submission(&app, "Second").await;

    for id in [&first, &second] {
        let (status, body) = send(
            &app,
            request("POST", &format!("/api/submissions/{}/review/start", id), EXPERT, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_review");
    }

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/api/submissions/{}/complete", first),
            EXPERT,
            Some(json!({
                "name": "First (checked)",
                "manufacturer": "Acme",
                "ref": "REF-1",
                "labels": ["sterile", "single_use"],
                "recycling_symbol": ["pp_05"]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["ok"], true);
    assert_eq!(body["nextSubmissionId"], second.as_str());
    assert_eq!(body["submission"]["status"], "complete");
    assert_eq!(body["submission"]["labels"], json!(["sterile", "single_use"]));

    let (status, body) = send(
        &app,
        request("POST", &format!("/api/submissions/{}/reject", second), EXPERT, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["nextSubmissionId"].is_null());

    // Crossing terminal statuses needs a reopen
    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/api/submissions/{}/complete", second),
            EXPERT,
            Some(json!({ "name": "Second", "manufacturer": "Acme" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request("POST", &format!("/api/submissions/{}/reopen", second), EXPERT, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request("POST", &format!("/api/submissions/{}/reopen", second), ADMIN, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_review");
}

#[tokio::test]
async fn test_list_filters_and_paginates() {
    let (app, _dir) = setup_app().await;
    let a = create_submission(&app, "Gauze A").await;
    let b = create_submission(&app, "Gauze B").await;
    let c = create_submission(&app, "Syringe").await;
    send(&app, request("POST", &format!("/api/submissions/{}/reject", c), EXPERT, None)).await;

    let (status, body) = send(
        &app,
        request("GET", "/api/submissions?exclude=rejected&limit=1", EXPERT, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 2);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["id"], b.as_str());

    let (_, body) = send(
        &app,
        request("GET", "/api/submissions?exclude=rejected&limit=1&page=2", EXPERT, None),
    )
    .await;
    assert_eq!(body["items"][0]["id"], a.as_str());

    let (_, body) = send(&app, request("GET", "/api/submissions?search=SYRINGE", EXPERT, None)).await;
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["pageSize"], 12);

    let (status, _) = send(&app, request("GET", "/api/submissions?include=archived", EXPERT, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_excludes_are_combined() {
    let (app, _dir) = setup_app().await;
    let uploaded = create_submission(&app, "Gauze").await;
    let complete = create_submission(&app, "Swab").await;
    let rejected = create_submission(&app, "Syringe").await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/api/submissions/{}/complete", complete),
            EXPERT,
            Some(json!({ "name": "Swab", "manufacturer": "Acme" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        request("POST", &format!("/api/submissions/{}/reject", rejected), EXPERT, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        request("GET", "/api/submissions?exclude=complete,rejected&limit=1", EXPERT, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 1);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], uploaded.as_str());
    assert_eq!(items[0]["status"], "uploaded");
}

#[tokio::test]
async fn test_list_search_is_case_insensitive_beyond_ascii() {
    let (app, _dir) = setup_app().await;
    let id = create_submission(&app, "ÉTUDE Gauze").await;
    create_submission(&app, "Swab").await;

    // ÉTUDE, then étude
    for term in ["%C3%89TUDE", "%C3%A9tude"] {
        let (status, body) = send(
            &app,
            request("GET", &format!("/api/submissions?search={}", term), EXPERT, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalCount"], 1, "search {}", term);
        assert_eq!(body["items"][0]["id"], id.as_str());
    }
}

#[tokio::test]
async fn test_list_page_out_of_range_is_bad_request() {
    let (app, _dir) = setup_app().await;
    create_submission(&app, "Gauze").await;

    let (status, body) = send(
        &app,
        request(
            "GET",
            "/api/submissions?page=9223372036854775807&limit=100",
            EXPERT,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("page out of range"));

    // Far past the end but representable: empty page
    let (status, body) = send(
        &app,
        request("GET", "/api/submissions?page=9223372036854775807&limit=1", EXPERT, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 1);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_submission_not_found_and_bad_id() {
    let (app, _dir) = setup_app().await;

    let (status, _) = send(
        &app,
        request("GET", "/api/submissions/00000000-0000-0000-0000-000000000000", EXPERT, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, request("GET", "/api/submissions/nope", EXPERT, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// =============================================================================
// Images
// =============================================================================

#[tokio::test]
async fn test_upload_then_detail_shows_urls_and_media_serves_blob() {
    let (app, _dir) = setup_app().await;
    let id = create_submission(&app, "Gauze").await;
    let images = upload(&app, &id, &["photos/s1/a.jpg", "photos/s1/b.jpg"]).await;

    let (status, body) = send(&app, request("GET", &format!("/api/submissions/{}", id), EXPERT, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images"][0]["id"], images[0].as_str());
    assert_eq!(body["images"][0]["url"], "http://localhost:5740/media/photos/s1/a.jpg");

    let response = app
        .clone()
        .oneshot(request("GET", "/media/photos/s1/a.jpg", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), &[0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn test_soft_delete_then_hard_delete() {
    let (app, dir) = setup_app().await;
    let id = create_submission(&app, "Gauze").await;
    let images = upload(&app, &id, &["p/a.jpg", "p/b.jpg"]).await;

    let body = json!({ "imageIds": [images[0]] });
    let (status, resp) = send(&app, request("POST", "/api/images/delete", EXPERT, Some(body.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp, json!({ "softDeleted": 1 }));

    let (_, resp) = send(&app, request("POST", "/api/images/delete", EXPERT, Some(body))).await;
    assert_eq!(resp, json!({ "softDeleted": 0 }));

    let hard = json!({ "imageIds": [images[1]], "hardDelete": true });
    let (status, _) = send(&app, request("POST", "/api/images/delete", EXPERT, Some(hard.clone()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, resp) = send(&app, request("POST", "/api/images/delete", ADMIN, Some(hard))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp, json!({ "hardDeleted": 1 }));
    assert!(!dir.path().join("p/b.jpg").exists());

    let (_, detail) = send(&app, request("GET", &format!("/api/submissions/{}", id), EXPERT, None)).await;
    assert!(detail["images"].as_array().unwrap().is_empty());

    let (status, history) = send(
        &app,
        request("GET", &format!("/api/images/{}/history", images[1]), EXPERT, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = history["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["upload", "delete_hard"]);
    assert!(history["replayed"].is_null());
}

#[tokio::test]
async fn test_split_into_new_submission() {
    let (app, _dir) = setup_app().await;
    let source = create_submission(&app, "Mixed bag").await;
    let images = upload(&app, &source, &["p/1.jpg", "p/2.jpg", "p/3.jpg"]).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/images/reassign/new",
            EXPERT,
            Some(json!({
                "sourceSubmissionId": source,
                "imageIds": [images[0], images[1]],
                "newSubmission": { "name": "Syringe", "manufacturer": "Acme", "labels": ["sterile"] }
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["movedCount"], 2);
    let new_id = body["newSubmissionId"].as_str().unwrap().to_string();

    let (_, created) = send(&app, request("GET", &format!("/api/submissions/{}", new_id), EXPERT, None)).await;
    assert_eq!(created["status"], "in_review");
    assert_eq!(created["created_by"], "photo-1");
    assert_eq!(created["images"].as_array().unwrap().len(), 2);

    let (_, history) = send(
        &app,
        request("GET", &format!("/api/images/{}/history", images[0]), EXPERT, None),
    )
    .await;
    assert_eq!(history["replayed"]["submissionId"], new_id.as_str());
    assert_eq!(history["replayed"]["status"], "active");

    // Move the last one over as well
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/images/reassign/existing",
            EXPERT,
            Some(json!({ "imageIds": [images[2]], "targetSubmissionId": new_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movedCount"], 1);
}

#[tokio::test]
async fn test_split_with_foreign_image_creates_nothing() {
    let (app, _dir) = setup_app().await;
    let source = create_submission(&app, "Source").await;
    let other = create_submission(&app, "Other").await;
    let mine = upload(&app, &source, &["p/1.jpg"]).await;
    let theirs = upload(&app, &other, &["p/2.jpg"]).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/images/reassign/new",
            EXPERT,
            Some(json!({
                "sourceSubmissionId": source,
                "imageIds": [mine[0], theirs[0]],
                "newSubmission": { "name": "Syringe", "manufacturer": "Acme" }
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, list) = send(&app, request("GET", "/api/submissions", EXPERT, None)).await;
    assert_eq!(list["totalCount"], 2);
}
