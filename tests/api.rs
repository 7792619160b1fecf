use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use conduit::{
    AppState, ConfigTemplate, GracefulShutdown, HaproxyConfig, RedbStore, SyncService,
    build_router,
};

struct TestApp {
    router: Router,
    shutdown: Arc<GracefulShutdown>,
    _dir: tempfile::TempDir,
}

fn app_with_reload(reload: &str) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let service = service_in(dir.path(), reload);
    let shutdown = Arc::new(GracefulShutdown::new());
    let router = build_router(AppState {
        service: Arc::new(service),
        shutdown: shutdown.clone(),
        metrics: None,
    });
    TestApp {
        router,
        shutdown,
        _dir: dir,
    }
}

fn service_in(dir: &Path, reload: &str) -> SyncService<RedbStore, HaproxyConfig> {
    let store = RedbStore::open(dir.join("db")).unwrap();
    let haproxy = HaproxyConfig::new(
        dir.join("haproxy.cfg"),
        ConfigTemplate::default(),
        reload,
        Duration::from_secs(5),
    );
    SyncService::new(store, haproxy)
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn send_json(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.send(method, uri, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

#[tokio::test]
async fn test_put_creates_then_replaces() {
    let app = app_with_reload("true");
    let listener = json!({"name": "web", "bind": "*:80", "defaultBackend": "app"});

    let (status, body) = app.send_json("PUT", "/frontends", Some(listener.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["defaultBackend"], "app");

    let (status, _) = app.send_json("PUT", "/frontends", Some(listener)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send_json("GET", "/frontends", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_put_named_uses_path_name() {
    let app = app_with_reload("true");

    let (status, body) = app
        .send_json("PUT", "/backends/app%20one", Some(json!({"name": "ignored", "balance": "roundrobin"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "app_one");

    let (status, _) = app.send_json("GET", "/backends/app_one", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send_json("GET", "/backends/ignored", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_missing_entity() {
    let app = app_with_reload("true");

    let (status, body) = app.send_json("GET", "/frontends/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["message"], "the frontend with name nope does not exist");
}

#[tokio::test]
async fn test_invalid_payloads_are_bad_requests() {
    let app = app_with_reload("true");

    let (status, bytes) = app
        .send("PUT", "/frontends", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "bad_data");

    let (status, body) = app
        .send_json("PUT", "/backends", Some(json!({"name": "x", "members": "not a list"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("the backend data is invalid"));

    let (status, body) = app.send_json("PUT", "/frontends", Some(json!({"bind": "*:80"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Name is required");
}

#[tokio::test]
async fn test_post_merges_fields() {
    let app = app_with_reload("true");
    let pool = json!({
        "name": "app",
        "balance": "roundrobin",
        "members": [{"name": "app_1", "host": "10.0.0.1", "port": 8080}]
    });
    app.send_json("PUT", "/backends", Some(pool)).await;

    let (status, body) = app
        .send_json("POST", "/backends/app", Some(json!({"balance": "leastconn"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], "leastconn");
    assert_eq!(body["members"][0]["host"], "10.0.0.1");

    let (status, body) = app.send_json("GET", "/backends/app/members", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["port"], 8080);

    let (status, _) = app
        .send_json("POST", "/backends/missing", Some(json!({"balance": "leastconn"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send_json("GET", "/backends/missing/members", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete() {
    let app = app_with_reload("true");
    app.send_json("PUT", "/frontends", Some(json!({"name": "web"}))).await;

    let (status, bytes) = app.send("DELETE", "/frontends/web", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(bytes.is_empty());

    let (status, body) = app.send_json("DELETE", "/frontends/web", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "the frontend to delete does not exist");
}

#[tokio::test]
async fn test_haproxy_config_and_reload() {
    let app = app_with_reload("true");
    app.send_json("PUT", "/frontends", Some(json!({"name": "web", "bind": "*:80"}))).await;

    let (status, bytes) = app.send("GET", "/haproxy/config", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("  frontend web\n    bind *:80\n"));

    let (status, body) = app.send_json("GET", "/haproxy/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "reloaded");
}

#[tokio::test]
async fn test_sync_failure_is_server_error() {
    let app = app_with_reload("false");

    let (status, body) = app.send_json("PUT", "/frontends", Some(json!({"name": "web"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "sync");

    let (_, body) = app.send_json("GET", "/frontends", None).await;
    assert_eq!(body, json!([]));

    let (status, body) = app.send_json("GET", "/haproxy/reload", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "sync");
}

#[tokio::test]
async fn test_missing_config_file_is_unknown_error() {
    let app = app_with_reload("true");
    let (status, body) = app.send_json("GET", "/haproxy/config", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "unknown");
}

#[tokio::test]
async fn test_status_restart_and_metrics() {
    let app = app_with_reload("true");

    let (status, body) = app.send_json("GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["hareload"], "true");
    assert_eq!(body["shutting_down"], false);

    let (status, _) = app.send_json("GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.send_json("GET", "/restart", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "restarting");
    assert!(app.shutdown.is_shutdown_initiated());

    let (_, body) = app.send_json("GET", "/status", None).await;
    assert_eq!(body["shutting_down"], true);
}
