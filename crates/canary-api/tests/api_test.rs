//! HTTP-level tests: the full router over an in-memory store.
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use canary_api::{AppStateInner, router};
use canary_core::{CanaryCore, PasswordCost, Settings};
use canary_db::Database;

fn app(settings: Settings) -> Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let core = CanaryCore::new(db, &settings).unwrap();
    router(Arc::new(AppStateInner { core }), "/api")
}

fn cheap() -> Settings {
    Settings {
        password_cost: PasswordCost::minimal(),
        ..Settings::default()
    }
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, username: &str) -> String {
    let creds = json!({ "username": username, "password": "test" });
    let resp = send(app, "POST", "/api/register", None, Some(creds.clone())).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(app, "POST", "/api/login", None, Some(creds)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    json_body(resp).await["token"].as_str().unwrap().to_string()
}

async fn new_canary(app: &Router, token: &str, body: Value) -> String {
    let resp = send(app, "POST", "/api/canary/new", Some(token), Some(body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn image_canary_lifecycle() {
    let app = app(cheap());
    let token = login(&app, "peter").await;
    let id = new_canary(&app, &token, json!({ "name": "test", "type": "image" })).await;

    let mut trigger = Request::builder()
        .uri(format!("/api/trigger/{}", id))
        .header(header::USER_AGENT, "Thunderbird")
        .header(header::ACCEPT_LANGUAGE, "de-DE")
        .body(Body::empty())
        .unwrap();
    trigger
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 7], 40000))));
    let resp = app.clone().oneshot(trigger).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    let png = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&png[1..4], b"PNG");

    let resp = send(&app, "GET", "/api/canary", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let listed = json_body(resp).await;
    let canary = &listed["canaries"][0];
    assert_eq!(canary["id"], id.as_str());
    assert_eq!(canary["type"], "image");
    assert_eq!(canary["history"][0]["ip"], "203.0.113.7");
    assert_eq!(canary["history"][0]["user_agent"], "Thunderbird");
    assert_eq!(canary["history"][0]["accept_language"], "de-DE");

    let resp = send(&app, "POST", &format!("/api/canary/{}/wipe", id), Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&app, "GET", &format!("/api/canary/{}/history", id), Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!([]));
}

#[tokio::test]
async fn text_and_redirect_decoys() {
    let app = app(cheap());
    let token = login(&app, "peter").await;

    let text = new_canary(&app, &token, json!({ "name": "t", "type": "text" })).await;
    let resp = send(&app, "GET", &format!("/api/trigger/{}", text), None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"This is a test page.");

    let redirect = new_canary(
        &app,
        &token,
        json!({ "name": "r", "type": "redirect", "redirect": "https://example.com/" }),
    )
    .await;
    let resp = send(&app, "GET", &format!("/api/trigger/{}", redirect), None, None).await;
    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(resp.headers()[header::LOCATION], "https://example.com/");
}

#[tokio::test]
async fn unknown_trigger_is_not_found() {
    let app = app(cheap());
    let resp = send(&app, "GET", &format!("/api/trigger/{}", uuid::Uuid::new_v4()), None, None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, "GET", "/api/trigger/not-a-canary", None, None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn protected_routes_need_a_valid_bearer() {
    let app = app(cheap());

    let resp = send(&app, "GET", "/api/canary", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(&app, "GET", "/api/canary", Some("made-up"), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_canaries_look_missing() {
    let app = app(cheap());
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;
    let id = new_canary(&app, &bob, json!({ "name": "b", "type": "text" })).await;

    let resp = send(&app, "GET", &format!("/api/canary/{}", id), Some(&alice), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send(&app, "DELETE", &format!("/api/canary/{}", id), Some(&alice), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let update = json!({ "id": id, "name": "mine", "type": "image" });
    let resp = send(&app, "POST", "/api/canary/update", Some(&alice), Some(update)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, "GET", &format!("/api/canary/{}", id), Some(&bob), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["name"], "b");
}

#[tokio::test]
async fn update_and_delete_by_name() {
    let app = app(cheap());
    let token = login(&app, "peter").await;
    let id = new_canary(&app, &token, json!({ "name": "a", "type": "image" })).await;
    new_canary(&app, &token, json!({ "name": "a", "type": "text" })).await;

    let update = json!({ "id": id, "name": "b", "type": "redirect", "redirect": "https://x.test" });
    let resp = send(&app, "POST", "/api/canary/update", Some(&token), Some(update)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, "GET", &format!("/api/canary/{}", id), Some(&token), None).await;
    let canary = json_body(resp).await;
    assert_eq!(canary["name"], "b");
    assert_eq!(canary["type"], "redirect");
    assert_eq!(canary["redirect"], "https://x.test");

    let resp = send(&app, "DELETE", "/api/canary?name=a", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["deleted"], 1);
}

#[tokio::test]
async fn registration_errors_map_to_statuses() {
    let app = app(cheap());
    let creds = json!({ "username": "peter", "password": "test" });

    let resp = send(&app, "POST", "/api/register", None, Some(creds.clone())).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = send(&app, "POST", "/api/register", None, Some(creds)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let empty = json!({ "username": "", "password": "x" });
    let resp = send(&app, "POST", "/api/register", None, Some(empty)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let wrong = json!({ "username": "peter", "password": "wrongpass" });
    let resp = send(&app, "POST", "/api/login", None, Some(wrong)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let closed = self::app(Settings {
        registration_enabled: false,
        ..cheap()
    });
    let resp = send(&closed, "POST", "/api/register", None, Some(json!({ "username": "x", "password": "y" }))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reset_password_and_delete_account() {
    let app = app(cheap());
    let token = login(&app, "peter").await;

    let resp = send(&app, "POST", "/api/reset", Some(&token), Some(json!({ "password": "new" }))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, "POST", "/api/login", None, Some(json!({ "username": "peter", "password": "new" }))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, "DELETE", "/api/user", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&app, "GET", "/api/canary", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn redirect_canary_requires_target() {
    let app = app(cheap());
    let token = login(&app, "peter").await;

    let resp = send(&app, "POST", "/api/canary/new", Some(&token), Some(json!({ "name": "r", "type": "redirect" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn header_breaking_redirect_targets_are_rejected() {
    let app = app(cheap());
    let token = login(&app, "peter").await;
    let injected = "https://a.example/\nSet-Cookie: y";

    let body = json!({ "name": "r", "type": "redirect", "redirect": injected });
    let resp = send(&app, "POST", "/api/canary/new", Some(&token), Some(body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, "GET", "/api/canary", Some(&token), None).await;
    assert_eq!(json_body(resp).await["canaries"], json!([]));

    let id = new_canary(
        &app,
        &token,
        json!({ "name": "r", "type": "redirect", "redirect": "https://example.com/" }),
    )
    .await;
    let update = json!({ "id": id, "name": "r", "type": "redirect", "redirect": injected });
    let resp = send(&app, "POST", "/api/canary/update", Some(&token), Some(update)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, "GET", &format!("/api/trigger/{}", id), None, None).await;
    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(resp.headers()[header::LOCATION], "https://example.com/");
}

#[tokio::test]
async fn routes_mount_at_root_without_base_path() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let core = CanaryCore::new(db, &cheap()).unwrap();
    let app = router(Arc::new(AppStateInner { core }), "/");

    let resp = send(&app, "GET", "/canary", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
