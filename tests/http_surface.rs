mod common;

use std::sync::atomic::Ordering;

use axum::{Router, body::Body, http::StatusCode};
use common::{
    ADMIN_PASSWORD, FakeConnector, Scenario, body_json, body_string, spawn_app, test_config,
    write_file,
};
use keel::config::AppConfig;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;

async fn frontend() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "public/index.html", "<html>dashboard</html>").await;
    write_file(dir.path(), "public/assets/app.css", "body{}").await;
    write_file(dir.path(), "secret.txt", "top secret").await;
    dir
}

fn config_for(dir: &TempDir) -> AppConfig {
    test_config(&dir.path().join("public"))
}

async fn get(router: &Router, uri: &str, token: Option<&str>) -> axum::response::Response {
    let mut builder = http::Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn login(router: &Router) -> String {
    let response = router
        .clone()
        .oneshot(
            http::Request::builder()
                .method("POST")
                .uri("/api/v1/auth/token")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"username": "admin", "password": ADMIN_PASSWORD}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_api_list_reports_registered_controllers() {
    let dir = frontend().await;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config_for(&dir), &connector).await;

    let response = get(&app.router, "/api/list", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let catalog = body_json(response.into_body()).await;

    assert_eq!(
        catalog["controllers"],
        json!(["auth", "users", "groups", "posts", "rbac"])
    );
    let routes: Vec<&str> = catalog["routes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r.as_str().unwrap())
        .collect();
    assert!(routes.contains(&"/api/v1/users/{id}"));
    assert!(routes.contains(&"/healthz"));
    assert!(routes.contains(&"/swagger/openapi.json"));
    assert!(!routes.iter().any(|r| r.contains("containers") || r.contains("namespaces")));
}

#[tokio::test]
async fn test_optional_controllers_follow_provisioning() {
    let dir = frontend().await;
    let mut config = config_for(&dir);
    config.docker.enable = true;
    config.kubernetes.enable = true;

    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config.clone(), &connector).await;
    let catalog = body_json(get(&app.router, "/api/list", None).await.into_body()).await;
    let controllers = catalog["controllers"].as_array().unwrap();
    assert_eq!(controllers.len(), 7);
    assert!(controllers.contains(&json!("containers")));
    assert!(controllers.contains(&json!("kubernetes")));

    let connector = FakeConnector::new(Scenario {
        containers_unreachable: true,
        ..Default::default()
    });
    let app = spawn_app(config, &connector).await;
    let catalog = body_json(get(&app.router, "/api/list", None).await.into_body()).await;
    assert_eq!(
        catalog["controllers"],
        json!(["auth", "users", "groups", "posts", "rbac", "kubernetes"])
    );
    assert_eq!(
        get(&app.router, "/api/v1/containers", None).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_assets_are_served_without_authentication() {
    let dir = frontend().await;
    // an asset that shadows an API path proves authentication never ran
    write_file(&dir.path().join("public"), "api/v1/users", "static users").await;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config_for(&dir), &connector).await;

    let response = get(&app.router, "/assets/app.css", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/css");
    assert_eq!(body_string(response.into_body()).await, "body{}");

    let response = get(&app.router, "/api/v1/users", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response.into_body()).await, "static users");

    let response = get(&app.router, "/", None).await;
    assert_eq!(body_string(response.into_body()).await, "<html>dashboard</html>");
}

#[tokio::test]
async fn test_parent_traversal_falls_through_in_development() {
    let dir = frontend().await;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config_for(&dir), &connector).await;

    for uri in ["/../secret.txt", "/assets/%2e%2e/%2e%2e/secret.txt"] {
        let response = get(&app.router, uri, None).await;
        let body = body_string(response.into_body()).await;
        assert!(!body.contains("top secret"), "{uri} leaked {body}");
    }
}

#[tokio::test]
async fn test_client_side_routes_get_entry_document() {
    let dir = frontend().await;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config_for(&dir), &connector).await;

    let response = get(&app.router, "/users/3/edit", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response.into_body()).await, "<html>dashboard</html>");

    let token = login(&app.router).await;
    let response = get(&app.router, "/api/v1/missing", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response.into_body()).await["code"], 404);
}

#[tokio::test]
async fn test_authentication_rejection_skips_authorization() {
    let dir = frontend().await;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config_for(&dir), &connector).await;

    // a member write would be forbidden, but without a token the answer is 401
    let response = app
        .router
        .clone()
        .oneshot(
            http::Request::builder()
                .method("DELETE")
                .uri("/api/v1/users/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["message"], "missing bearer token");
}

#[tokio::test]
async fn test_member_cannot_write() {
    let dir = frontend().await;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config_for(&dir), &connector).await;
    let hash = keel::core::auth::hash_password("hunter2").unwrap();
    connector.repository.add_user("bob", "member", Some(hash));

    let response = app
        .router
        .clone()
        .oneshot(
            http::Request::builder()
                .method("POST")
                .uri("/api/v1/auth/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("username=bob&password=hunter2"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response.into_body()).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    assert_eq!(
        get(&app.router, "/api/v1/groups", Some(&token)).await.status(),
        StatusCode::OK
    );
    let response = app
        .router
        .clone()
        .oneshot(
            http::Request::builder()
                .method("DELETE")
                .uri("/api/v1/users/1")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_flow() {
    let dir = frontend().await;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config_for(&dir), &connector).await;

    let response = app
        .router
        .clone()
        .oneshot(
            http::Request::builder()
                .method("POST")
                .uri("/api/v1/auth/token")
                .header("content-type", "application/json")
                .body(Body::from(json!({"username": "admin", "password": "wrong"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = login(&app.router).await;
    let response = get(&app.router, "/api/v1/users", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["items"][0]["name"], "admin");

    let response = get(&app.router, "/api/v1/auth/me", Some(&token)).await;
    let me = body_json(response.into_body()).await;
    assert_eq!(me["kind"], "user");
    assert_eq!(me["role"], "admin");
}

#[tokio::test]
async fn test_user_lookups_are_cached() {
    let dir = frontend().await;
    let mut config = config_for(&dir);
    config.redis.enable = true;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config, &connector).await;
    let token = login(&app.router).await;

    for _ in 0..3 {
        let response = get(&app.router, "/api/v1/users/1", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(connector.repository.user_lookups.load(Ordering::SeqCst), 1);
    assert!(connector.cache.hits.load(Ordering::SeqCst) >= 5);
}

#[tokio::test]
async fn test_healthz_reflects_storage() {
    let dir = frontend().await;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config_for(&dir), &connector).await;

    let health = body_json(get(&app.router, "/healthz", None).await.into_body()).await;
    assert_eq!(health, json!({"ping": true, "dbRepository": true}));

    connector.repository.set_healthy(false);
    let health = body_json(get(&app.router, "/healthz", None).await.into_body()).await;
    assert_eq!(health, json!({"ping": true, "dbRepository": false}));
}

#[tokio::test]
async fn test_kubernetes_controller_lists_cached_objects() {
    let dir = frontend().await;
    let mut config = config_for(&dir);
    config.kubernetes.enable = true;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config, &connector).await;
    let token = login(&app.router).await;

    let response = get(&app.router, "/api/v1/namespaces/shop/pods", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["items"][0]["namespace"], "shop");

    let response = get(&app.router, "/api/v1/namespaces/shop/services", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_operational_routes() {
    let dir = frontend().await;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config_for(&dir), &connector).await;

    let version = body_json(get(&app.router, "/version", None).await.into_body()).await;
    assert_eq!(version["version"], env!("CARGO_PKG_VERSION"));

    let response = get(&app.router, "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let response = get(&app.router, "/debug/pprof/heap", None).await;
    let stats = body_json(response.into_body()).await;
    assert!(stats["workers"].as_u64().unwrap() >= 1);

    let response = get(&app.router, "/swagger/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&app.router, "/api/index", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let index = body_json(response.into_body()).await;
    assert_eq!(index["name"], "keel");
    assert_eq!(index["api"], "/api/v1");
    assert_eq!(index["docs"], "/swagger/");
}

#[tokio::test]
async fn test_release_mode_hides_swagger() {
    let dir = frontend().await;
    let mut config = config_for(&dir);
    config.server.env = keel::config::RunMode::Release;
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config, &connector).await;

    let catalog = body_json(get(&app.router, "/api/list", None).await.into_body()).await;
    let routes = catalog["routes"].as_array().unwrap();
    assert!(!routes.iter().any(|r| r.as_str().unwrap().starts_with("/swagger")));

    let index = body_json(get(&app.router, "/api/index", None).await.into_body()).await;
    assert!(index["docs"].is_null());
}

#[tokio::test]
async fn test_cors_preflight_is_answered_before_authentication() {
    let dir = frontend().await;
    let mut config = config_for(&dir);
    config.cors.allowed_origins = vec!["https://dashboard.example.com".to_string()];
    let connector = FakeConnector::new(Scenario::default());
    let app = spawn_app(config, &connector).await;

    let preflight = |origin: &'static str| {
        http::Request::builder()
            .method("OPTIONS")
            .uri("/api/v1/users")
            .header("origin", origin)
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap()
    };

    // no bearer token, yet no 401
    let response = app
        .router
        .clone()
        .oneshot(preflight("https://dashboard.example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://dashboard.example.com"
    );

    let response = app
        .router
        .clone()
        .oneshot(preflight("https://evil.example"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("access-control-allow-origin").is_none());
}
