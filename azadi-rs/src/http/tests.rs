#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use axum_test::TestServer;
use bytes::Bytes;

use crate::store::{MemoryStore, SettingsStore, KEY_PASSWORD, KEY_UPSTREAM};
use crate::upstream::DEFAULT_UPSTREAM;

use super::{router, AppState};

fn test_state(store: Arc<MemoryStore>) -> AppState {
    AppState {
        settings: Some(store),
        http: reqwest::Client::new(),
        default_upstream: String::from(DEFAULT_UPSTREAM),
    }
}

fn server_with(store: Arc<MemoryStore>) -> Result<TestServer> {
    Ok(TestServer::new(router(test_state(store)))?)
}

/// Spawns a stub DoH upstream on a random local port. Echoes the request
/// body prefixed with `stub:` so tests can tell which upstream answered.
async fn spawn_upstream_stub() -> SocketAddr {
    async fn echo(body: Bytes) -> impl axum::response::IntoResponse {
        let mut reply = b"stub:".to_vec();
        reply.extend_from_slice(&body);
        ([(CONTENT_TYPE, "application/octet-stream")], reply)
    }

    let app = Router::new().route("/dns-query", post(echo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn spawn_failing_upstream_stub() -> SocketAddr {
    async fn unavailable() -> impl axum::response::IntoResponse {
        (StatusCode::SERVICE_UNAVAILABLE, "resolver down")
    }

    let app = Router::new().route("/dns-query", post(unavailable));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn set_password(server: &TestServer, password: &str) {
    let response = server
        .post("/set-password")
        .json(&serde_json::json!({
            "password": password,
            "confirmPassword": password,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

/// Logs in and returns the `sessionToken=<value>` cookie pair.
async fn login(server: &TestServer, password: &str) -> String {
    let response = server
        .post("/login")
        .json(&serde_json::json!({ "password": password }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let set_cookie = response.header("set-cookie");
    let raw = set_cookie.to_str().unwrap();
    raw.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn missing_store_short_circuits_every_route() -> Result<()> {
    let state = AppState {
        settings: None,
        http: reqwest::Client::new(),
        default_upstream: String::from(DEFAULT_UPSTREAM),
    };
    let server = TestServer::new(router(state))?;

    for response in [
        server.get("/").await,
        server.post("/set-doh-address").await,
        server.post("/dns-query").await,
        server.get("/no-such-page").await,
    ] {
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().contains("settings store is not configured"));
    }
    Ok(())
}

#[tokio::test]
async fn dns_query_relays_to_saved_upstream() -> Result<()> {
    let upstream = spawn_upstream_stub().await;
    let store = Arc::new(MemoryStore::new());
    let server = server_with(Arc::clone(&store))?;

    let saved = server
        .post("/set-doh-address")
        .json(&serde_json::json!({
            "dohaddress": format!("http://{upstream}/dns-query"),
        }))
        .await;
    assert_eq!(saved.status_code(), StatusCode::OK);
    assert_eq!(saved.text(), "DNS over HTTPS Address saved!");

    let response = server
        .post("/dns-query")
        .bytes(Bytes::from_static(b"\x12\x34query"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header("content-type"), "application/dns-message");
    assert_eq!(response.as_bytes().as_ref(), b"stub:\x12\x34query".as_slice());
    Ok(())
}

#[tokio::test]
async fn dns_query_with_empty_body_still_relays() -> Result<()> {
    let upstream = spawn_upstream_stub().await;
    let store = Arc::new(MemoryStore::new());
    store
        .put(KEY_UPSTREAM, &format!("http://{upstream}/dns-query"))
        .await?;
    let server = server_with(store)?;

    let response = server.post("/dns-query").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header("content-type"), "application/dns-message");
    assert_eq!(response.as_bytes().as_ref(), b"stub:".as_slice());
    Ok(())
}

#[tokio::test]
async fn dns_query_propagates_upstream_status() -> Result<()> {
    let upstream = spawn_failing_upstream_stub().await;
    let store = Arc::new(MemoryStore::new());
    store
        .put(KEY_UPSTREAM, &format!("http://{upstream}/dns-query"))
        .await?;
    let server = server_with(store)?;

    let response = server.post("/dns-query").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.header("content-type"), "application/dns-message");
    Ok(())
}

#[tokio::test]
async fn dns_query_unreachable_upstream_is_bad_gateway() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    // Port 9 (discard) is not listening.
    store
        .put(KEY_UPSTREAM, "http://127.0.0.1:9/dns-query")
        .await?;
    let server = server_with(store)?;

    let response = server.post("/dns-query").await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    Ok(())
}

#[tokio::test]
async fn reset_restores_default_regardless_of_prior_state() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.put(KEY_UPSTREAM, "https://dns.example/other").await?;
    let server = server_with(Arc::clone(&store))?;

    let response = server.post("/reset-doh-address").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "DNS over HTTPS Address reset to default!");
    assert_eq!(
        store.get(KEY_UPSTREAM).await?.as_deref(),
        Some(DEFAULT_UPSTREAM)
    );
    Ok(())
}

#[tokio::test]
async fn set_doh_address_rejects_invalid_url() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let server = server_with(Arc::clone(&store))?;

    let response = server
        .post("/set-doh-address")
        .json(&serde_json::json!({ "dohaddress": "not a url" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Invalid DNS over HTTPS Address");
    assert_eq!(store.get(KEY_UPSTREAM).await?, None);
    Ok(())
}

#[tokio::test]
async fn set_doh_address_malformed_json_is_server_error() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;

    let response = server
        .post("/set-doh-address")
        .bytes(Bytes::from_static(b"{not json"))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "Failed to save DNS over HTTPS Address");
    Ok(())
}

#[tokio::test]
async fn set_doh_address_store_failure_is_server_error() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.fail_writes(true);
    let server = server_with(store)?;

    let response = server
        .post("/set-doh-address")
        .json(&serde_json::json!({ "dohaddress": "https://dns.example/dns-query" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "Failed to save DNS over HTTPS Address");
    Ok(())
}

#[tokio::test]
async fn first_visit_renders_setup_and_login_redirects_to_setup() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;

    let root = server.get("/").await;
    assert_eq!(root.status_code(), StatusCode::OK);
    assert!(root.text().contains("Set Password"));

    let login_page = server.get("/login").await;
    assert_eq!(login_page.status_code(), StatusCode::FOUND);
    assert_eq!(login_page.header("location"), "/set-password");
    Ok(())
}

#[tokio::test]
async fn set_password_mismatch_is_rejected_without_persisting() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let server = server_with(Arc::clone(&store))?;

    let response = server
        .post("/set-password")
        .json(&serde_json::json!({ "password": "a", "confirmPassword": "b" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Passwords do not match");
    assert_eq!(store.get(KEY_PASSWORD).await?, None);
    Ok(())
}

#[tokio::test]
async fn set_password_is_one_shot_and_form_redirects_away() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;
    set_password(&server, "hunter2").await;

    let form = server.get("/set-password").await;
    assert_eq!(form.status_code(), StatusCode::FOUND);
    assert_eq!(form.header("location"), "/");

    let again = server
        .post("/set-password")
        .json(&serde_json::json!({ "password": "x", "confirmPassword": "x" }))
        .await;
    assert_eq!(again.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(again.text(), "Password already set");
    Ok(())
}

#[tokio::test]
async fn password_is_not_stored_in_plaintext() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let server = server_with(Arc::clone(&store))?;
    set_password(&server, "correct horse battery staple").await;

    let record = store.get(KEY_PASSWORD).await?.unwrap();
    assert!(record.starts_with("sha256$"));
    assert!(!record.contains("correct horse"));
    Ok(())
}

#[tokio::test]
async fn login_grants_session_and_logout_revokes_it() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store
        .put(KEY_UPSTREAM, "https://dns.example/dns-query")
        .await?;
    let server = server_with(store)?;
    set_password(&server, "hunter2").await;

    let rejected = server
        .post("/login")
        .json(&serde_json::json!({ "password": "wrong" }))
        .await;
    assert_eq!(rejected.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(rejected.text(), "Invalid password");

    let cookie = login(&server, "hunter2").await;

    let panel = server.get("/").add_header("Cookie", &cookie).await;
    assert_eq!(panel.status_code(), StatusCode::OK);
    assert!(panel.text().contains("https://dns.example/dns-query"));

    let logout = server.post("/logout").add_header("Cookie", &cookie).await;
    assert_eq!(logout.status_code(), StatusCode::OK);
    let cleared = logout.header("set-cookie");
    assert!(cleared.to_str().unwrap().contains("Max-Age=0"));

    // The old cookie now behaves as unauthenticated.
    let stale = server.get("/").add_header("Cookie", &cookie).await;
    assert_eq!(stale.status_code(), StatusCode::FOUND);
    assert_eq!(stale.header("location"), "/login");
    Ok(())
}

#[tokio::test]
async fn login_while_authenticated_redirects_home() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;
    set_password(&server, "hunter2").await;
    let cookie = login(&server, "hunter2").await;

    let form = server.get("/login").add_header("Cookie", &cookie).await;
    assert_eq!(form.status_code(), StatusCode::FOUND);
    assert_eq!(form.header("location"), "/");
    Ok(())
}

#[tokio::test]
async fn unauthenticated_panel_redirects_to_login() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;
    set_password(&server, "hunter2").await;

    let root = server.get("/").await;
    assert_eq!(root.status_code(), StatusCode::FOUND);
    assert_eq!(root.header("location"), "/login");

    let forged = server
        .get("/")
        .add_header("Cookie", "sessionToken=forged")
        .await;
    assert_eq!(forged.status_code(), StatusCode::FOUND);
    Ok(())
}

#[tokio::test]
async fn change_password_requires_session() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;
    set_password(&server, "hunter2").await;

    let form = server.get("/change-password").await;
    assert_eq!(form.status_code(), StatusCode::FOUND);
    assert_eq!(form.header("location"), "/login");

    let submit = server
        .post("/change-password")
        .json(&serde_json::json!({
            "currentPassword": "hunter2",
            "newPassword": "x",
            "confirmNewPassword": "x",
        }))
        .await;
    assert_eq!(submit.status_code(), StatusCode::FOUND);
    Ok(())
}

#[tokio::test]
async fn change_password_validates_and_rotates_credentials() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;
    set_password(&server, "old-password").await;
    let cookie = login(&server, "old-password").await;

    let wrong_current = server
        .post("/change-password")
        .add_header("Cookie", &cookie)
        .json(&serde_json::json!({
            "currentPassword": "nope",
            "newPassword": "new-password",
            "confirmNewPassword": "new-password",
        }))
        .await;
    assert_eq!(wrong_current.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(wrong_current.text(), "Current password is incorrect");

    let mismatch = server
        .post("/change-password")
        .add_header("Cookie", &cookie)
        .json(&serde_json::json!({
            "currentPassword": "old-password",
            "newPassword": "new-password",
            "confirmNewPassword": "different",
        }))
        .await;
    assert_eq!(mismatch.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(mismatch.text(), "New passwords do not match");

    let changed = server
        .post("/change-password")
        .add_header("Cookie", &cookie)
        .json(&serde_json::json!({
            "currentPassword": "old-password",
            "newPassword": "new-password",
            "confirmNewPassword": "new-password",
        }))
        .await;
    assert_eq!(changed.status_code(), StatusCode::OK);
    assert_eq!(changed.text(), "Password changed!");

    let old_login = server
        .post("/login")
        .json(&serde_json::json!({ "password": "old-password" }))
        .await;
    assert_eq!(old_login.status_code(), StatusCode::UNAUTHORIZED);

    login(&server, "new-password").await;
    Ok(())
}

#[tokio::test]
async fn unknown_paths_and_wrong_methods_return_not_found() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;

    for response in [
        server.get("/foo").await,
        server.get("/logout").await,
        server.delete("/set-doh-address").await,
        server.post("/").await,
    ] {
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert!(response.text().contains("Not Found"));
    }
    Ok(())
}

#[tokio::test]
async fn security_headers_are_attached_everywhere() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;

    for response in [server.get("/").await, server.get("/missing").await] {
        assert_eq!(response.header("x-content-type-options"), "nosniff");
        assert_eq!(response.header("x-frame-options"), "DENY");
        assert_eq!(response.header("x-xss-protection"), "1; mode=block");
        assert_eq!(
            response.header("strict-transport-security"),
            "max-age=31536000; includeSubDomains; preload"
        );
        assert!(response
            .header("content-security-policy")
            .to_str()
            .unwrap()
            .starts_with("default-src 'self'"));
    }
    Ok(())
}

#[tokio::test]
async fn panel_interpolates_origin_from_host_header() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;
    set_password(&server, "hunter2").await;
    let cookie = login(&server, "hunter2").await;

    let panel = server
        .get("/")
        .add_header("Cookie", &cookie)
        .add_header("Host", "panel.example")
        .add_header("X-Forwarded-Proto", "https")
        .await;
    assert_eq!(panel.status_code(), StatusCode::OK);
    assert!(panel.text().contains("https://panel.example/dns-query"));
    Ok(())
}

#[tokio::test]
async fn login_sets_strict_session_cookie() -> Result<()> {
    let server = server_with(Arc::new(MemoryStore::new()))?;
    set_password(&server, "hunter2").await;

    let response = server
        .post("/login")
        .json(&serde_json::json!({ "password": "hunter2" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let raw = response.header("set-cookie");
    let raw = raw.to_str().unwrap();
    assert!(raw.starts_with("sessionToken="));
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("Secure"));
    assert!(raw.contains("SameSite=Strict"));
    assert!(raw.contains("Path=/"));
    Ok(())
}
