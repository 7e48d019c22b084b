mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use kumoscan::domain::types::UserRole;
use kumoscan::infra::http::{build_admin_router, build_api_router};
use serde_json::{Value, json};
use tower::ServiceExt;

use support::{
    MemoryStore, PNG_HEADER, StaticVerifier, http_states, sample_chapter, sample_title, sample_user,
};

const UPLOAD_LIMIT: usize = 4 * 1024 * 1024;

fn verifier() -> StaticVerifier {
    StaticVerifier::default()
        .with("reader-token", "reader")
        .with("admin-token", "admin")
}

fn routers(store: &Arc<MemoryStore>, rate_limit: u32) -> (Router, Router) {
    store.insert_user(sample_user("admin", UserRole::Admin));
    let (api, admin) = http_states(store, verifier(), rate_limit);
    (build_api_router(api), build_admin_router(admin, UPLOAD_LIMIT))
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn catalog_listing_is_public() {
    let store = MemoryStore::new();
    store.insert_title(sample_title("Open Book", 1));
    let (api, _) = routers(&store, 100);

    let response = api
        .oneshot(request(Method::GET, "/api/v1/titles?sort=title", None, None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-limit")
            .and_then(|value| value.to_str().ok()),
        Some("100")
    );
    let body = json_body(response).await;
    assert_eq!(body["items"][0]["title"], "Open Book");
    assert_eq!(body["has_more"], false);
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn malformed_cursor_is_a_client_error() {
    let store = MemoryStore::new();
    let (api, _) = routers(&store, 100);

    let response = api
        .oneshot(request(Method::GET, "/api/v1/titles?cursor=%25%25", None, None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_cursor");
}

#[tokio::test]
async fn rating_requires_a_signed_in_reader() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Rated", 1));
    let (api, _) = routers(&store, 100);
    let uri = format!("/api/v1/titles/{title_id}/rating");

    let anonymous = api
        .clone()
        .oneshot(request(Method::PUT, &uri, None, Some(json!({ "stars": 4 }))))
        .await
        .expect("response");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(anonymous).await["error"]["code"], "unauthorized");

    let forged = api
        .clone()
        .oneshot(request(
            Method::PUT,
            &uri,
            Some("forged"),
            Some(json!({ "stars": 4 })),
        ))
        .await
        .expect("response");
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let signed_in = api
        .oneshot(request(
            Method::PUT,
            &uri,
            Some("reader-token"),
            Some(json!({ "stars": 4 })),
        ))
        .await
        .expect("response");
    assert_eq!(signed_in.status(), StatusCode::OK);
    let body = json_body(signed_in).await;
    assert_eq!(body["average"], 4.0);
    assert_eq!(body["count"], 1);
    assert!(store.user("reader").is_some());
}

#[tokio::test]
async fn reading_a_chapter_records_progress_for_signed_in_readers() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Serial", 1));
    let chapter_id = store.insert_chapter(sample_chapter(title_id, 1));
    let (api, _) = routers(&store, 100);

    let response = api
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/api/v1/titles/{title_id}/chapters/{chapter_id}"),
            Some("reader-token"),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let history = api
        .oneshot(request(
            Method::GET,
            "/api/v1/me/history",
            Some("reader-token"),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(history.status(), StatusCode::OK);
    let body = json_body(history).await;
    assert_eq!(body[0]["last_chapter_number"], 1);
}

#[tokio::test]
async fn clients_over_the_limit_are_refused() {
    let store = MemoryStore::new();
    let (api, _) = routers(&store, 2);

    for _ in 0..2 {
        let response = api
            .clone()
            .oneshot(request(Method::GET, "/api/v1/genres", None, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let refused = api
        .oneshot(request(Method::GET, "/api/v1/genres", None, None))
        .await
        .expect("response");
    assert_eq!(refused.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(refused.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(json_body(refused).await["error"]["code"], "rate_limited");
}

#[tokio::test]
async fn health_check_reports_database_state() {
    let store = MemoryStore::new();
    let (api, admin) = routers(&store, 100);

    let healthy = api
        .clone()
        .oneshot(request(Method::GET, "/api/v1/_health/db", None, None))
        .await
        .expect("response");
    assert_eq!(healthy.status(), StatusCode::OK);
    assert_eq!(json_body(healthy).await["status"], "ok");

    store.unhealthy.store(true, Ordering::SeqCst);
    let unhealthy = api
        .oneshot(request(Method::GET, "/api/v1/_health/db", None, None))
        .await
        .expect("response");
    assert_eq!(unhealthy.status(), StatusCode::SERVICE_UNAVAILABLE);

    let admin_health = admin
        .oneshot(request(Method::GET, "/admin/v1/_health/db", None, None))
        .await
        .expect("response");
    assert_eq!(admin_health.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_routes_require_the_admin_role() {
    let store = MemoryStore::new();
    let (_, admin) = routers(&store, 100);

    let anonymous = admin
        .clone()
        .oneshot(request(Method::GET, "/admin/v1/users", None, None))
        .await
        .expect("response");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let reader = admin
        .clone()
        .oneshot(request(
            Method::GET,
            "/admin/v1/users",
            Some("reader-token"),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(reader.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(reader).await["error"]["code"], "forbidden");

    let administrator = admin
        .oneshot(request(
            Method::GET,
            "/admin/v1/users?role=admin",
            Some("admin-token"),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(administrator.status(), StatusCode::OK);
    let body = json_body(administrator).await;
    assert_eq!(body["items"][0]["id"], "admin");
}

#[tokio::test]
async fn admin_updates_titles_and_records_audit_entries() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Draft", 1));
    let (_, admin) = routers(&store, 100);

    let updated = admin
        .clone()
        .oneshot(request(
            Method::PATCH,
            &format!("/admin/v1/titles/{title_id}"),
            Some("admin-token"),
            Some(json!({
                "title": "Final",
                "description": "Rewritten",
                "status": "completed",
                "genres": ["drama"]
            })),
        ))
        .await
        .expect("response");
    assert_eq!(updated.status(), StatusCode::OK);
    let body = json_body(updated).await;
    assert_eq!(body["title"], "Final");
    assert_eq!(body["status"], "completed");

    let audit = admin
        .clone()
        .oneshot(request(
            Method::GET,
            "/admin/v1/audit?actor_id=admin&subject=title",
            Some("admin-token"),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(audit.status(), StatusCode::OK);
    let body = json_body(audit).await;
    assert_eq!(body["items"][0]["action"], "title_updated");
    assert_eq!(body["items"][0]["actor_id"], "admin");
    assert_eq!(body["items"][0]["label"], "Final");
    assert_eq!(body["items"][0]["details"]["status"], "completed");

    let history = admin
        .oneshot(request(
            Method::GET,
            &format!("/admin/v1/titles/{title_id}/history"),
            Some("admin-token"),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(history.status(), StatusCode::OK);
    let body = json_body(history).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["items"][0]["title_id"], title_id.to_string());
}

#[tokio::test]
async fn admin_adds_chapters_from_multipart_uploads() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Serial", 1));
    let (_, admin) = routers(&store, 100);

    let boundary = "kumoscan-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"payload\"\r\n\r\n\
             {{\"chapter_number\":1,\"title\":\"Prologue\"}}\r\n"
        )
        .as_bytes(),
    );
    for name in ["001.png", "002.png"] {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"page\"; \
                 filename=\"{name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(&PNG_HEADER);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/admin/v1/titles/{title_id}/chapters"))
        .header(header::AUTHORIZATION, "Bearer admin-token")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request");

    let response = admin.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["chapter_number"], 1);
    assert_eq!(body["pages"].as_array().map(Vec::len), Some(2));
    assert_eq!(store.chapters_of(title_id).len(), 1);
}

#[tokio::test]
async fn admin_chapter_upload_without_payload_is_rejected() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Serial", 1));
    let (_, admin) = routers(&store, 100);

    let boundary = "kumoscan-test-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"page\"; filename=\"a.png\"\r\n\
         Content-Type: image/png\r\n\r\nnot-really\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/admin/v1/titles/{title_id}/chapters"))
        .header(header::AUTHORIZATION, "Bearer admin-token")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request");

    let response = admin.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.chapters_of(title_id).is_empty());
}
