use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, HOST, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::Router;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::auth::{hash_password, verify_password};
use crate::store::{StoreError, KEY_PASSWORD, KEY_SESSION, KEY_UPSTREAM};
use crate::upstream::{is_valid_upstream, resolve_upstream};

use super::auth::{clear_session_cookie, mint_session_token, session_cookie, session_is_valid};
use super::error::ApiError;
use super::pages;
use super::state::AppState;

const DNS_MESSAGE: &str = "application/dns-message";

pub fn router(state: AppState) -> Router {
    // Wrong method on a known path 404s like an unknown path, hence the
    // per-route fallbacks.
    Router::new()
        .route("/", get(panel).fallback(not_found))
        .route("/dns-query", any(dns_query))
        .route("/set-doh-address", post(set_doh_address).fallback(not_found))
        .route(
            "/reset-doh-address",
            post(reset_doh_address).fallback(not_found),
        )
        .route(
            "/set-password",
            get(set_password_form).post(set_password).fallback(not_found),
        )
        .route("/login", get(login_form).post(login).fallback(not_found))
        .route(
            "/change-password",
            get(change_password_form)
                .post(change_password)
                .fallback(not_found),
        )
        .route("/logout", post(logout).fallback(not_found))
        .fallback(not_found)
        .layer(map_response(pages::attach_security_headers))
        .layer(tower_http::request_id::SetRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
            tower_http::request_id::MakeRequestUuid::default(),
        ))
        .layer(tower_http::request_id::PropagateRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SetDohAddress {
    dohaddress: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetPassword {
    password: String,
    confirm_password: String,
}

#[derive(Debug, Deserialize)]
struct Login {
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePassword {
    current_password: String,
    new_password: String,
    confirm_new_password: String,
}

/// Relay a DoH query to the resolved upstream. Method-agnostic and the body
/// is opaque: empty bodies relay too. The upstream's status and body pass
/// through unchanged; the content type is forced.
async fn dns_query(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let store = state.store()?;
    let upstream = resolve_upstream(store, &state.default_upstream).await;
    debug!(upstream = %upstream, bytes = body.len(), "relaying DNS query");

    let reply = match state
        .http
        .post(&upstream)
        .header(CONTENT_TYPE, DNS_MESSAGE)
        .body(body)
        .send()
        .await
    {
        Ok(reply) => reply,
        Err(err) => {
            warn!(upstream = %upstream, error = %err, "upstream relay failed");
            return Err(ApiError::UpstreamRelay(err));
        }
    };

    let status = reply.status();
    let payload = reply.bytes().await.map_err(|err| {
        warn!(upstream = %upstream, error = %err, "upstream body read failed");
        ApiError::UpstreamRelay(err)
    })?;

    Ok((status, [(CONTENT_TYPE, DNS_MESSAGE)], payload).into_response())
}

async fn set_doh_address(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let store = state.store()?;
    let payload: SetDohAddress =
        serde_json::from_slice(&body).map_err(bad_payload("save DNS over HTTPS Address"))?;

    if !is_valid_upstream(&payload.dohaddress) {
        return Err(ApiError::BadRequest("Invalid DNS over HTTPS Address"));
    }

    store
        .put(KEY_UPSTREAM, &payload.dohaddress)
        .await
        .map_err(store_failure("save DNS over HTTPS Address"))?;
    info!(address = %payload.dohaddress, "upstream address saved");

    Ok((StatusCode::OK, "DNS over HTTPS Address saved!").into_response())
}

async fn reset_doh_address(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = state.store()?;
    store
        .put(KEY_UPSTREAM, &state.default_upstream)
        .await
        .map_err(store_failure("reset DNS over HTTPS Address"))?;
    info!(address = %state.default_upstream, "upstream address reset to default");

    Ok((StatusCode::OK, "DNS over HTTPS Address reset to default!").into_response())
}

async fn panel(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let store = state.store()?;

    let password = store
        .get(KEY_PASSWORD)
        .await
        .map_err(store_failure("load settings"))?;
    if password.is_none() {
        // First-time setup: no password yet, render the setup form directly.
        return Ok(pages::html(StatusCode::OK, pages::SET_PASSWORD_HTML));
    }
    if !session_is_valid(store, &headers).await {
        return Ok(pages::redirect("/login"));
    }

    let upstream = resolve_upstream(store, &state.default_upstream).await;
    let origin = request_origin(&headers);
    Ok(pages::html(
        StatusCode::OK,
        pages::render_panel(&upstream, &origin),
    ))
}

async fn set_password_form(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = state.store()?;
    let password = store
        .get(KEY_PASSWORD)
        .await
        .map_err(store_failure("load settings"))?;
    if password.is_some() {
        return Ok(pages::redirect("/"));
    }
    Ok(pages::html(StatusCode::OK, pages::SET_PASSWORD_HTML))
}

async fn set_password(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let store = state.store()?;

    let existing = store
        .get(KEY_PASSWORD)
        .await
        .map_err(store_failure("set password"))?;
    if existing.is_some() {
        return Err(ApiError::BadRequest("Password already set"));
    }

    let payload: SetPassword = serde_json::from_slice(&body).map_err(bad_payload("set password"))?;
    if payload.password != payload.confirm_password {
        return Err(ApiError::BadRequest("Passwords do not match"));
    }

    store
        .put(KEY_PASSWORD, &hash_password(&payload.password))
        .await
        .map_err(store_failure("set password"))?;
    info!("password set");

    Ok((StatusCode::OK, "Password set!").into_response())
}

async fn login_form(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let store = state.store()?;

    let password = store
        .get(KEY_PASSWORD)
        .await
        .map_err(store_failure("load settings"))?;
    if password.is_none() {
        return Ok(pages::redirect("/set-password"));
    }
    if session_is_valid(store, &headers).await {
        return Ok(pages::redirect("/"));
    }
    Ok(pages::html(StatusCode::OK, pages::LOGIN_HTML))
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let store = state.store()?;

    if session_is_valid(store, &headers).await {
        return Ok(pages::redirect("/"));
    }

    let payload: Login = serde_json::from_slice(&body).map_err(bad_payload("login"))?;
    let stored = store
        .get(KEY_PASSWORD)
        .await
        .map_err(store_failure("login"))?;
    let correct = stored
        .as_deref()
        .is_some_and(|record| verify_password(&payload.password, record));
    if !correct {
        warn!("login rejected: invalid password");
        return Err(ApiError::InvalidPassword);
    }

    let token = mint_session_token();
    store
        .put(KEY_SESSION, &token)
        .await
        .map_err(store_failure("login"))?;
    info!("login successful");

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, session_cookie(&token))],
        "Login successful",
    )
        .into_response())
}

async fn change_password_form(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let store = state.store()?;
    if !session_is_valid(store, &headers).await {
        return Ok(pages::redirect("/login"));
    }
    Ok(pages::html(StatusCode::OK, pages::CHANGE_PASSWORD_HTML))
}

async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let store = state.store()?;
    if !session_is_valid(store, &headers).await {
        return Ok(pages::redirect("/login"));
    }

    let payload: ChangePassword =
        serde_json::from_slice(&body).map_err(bad_payload("change password"))?;
    let stored = store
        .get(KEY_PASSWORD)
        .await
        .map_err(store_failure("change password"))?;
    let current_correct = stored
        .as_deref()
        .is_some_and(|record| verify_password(&payload.current_password, record));
    if !current_correct {
        return Err(ApiError::BadRequest("Current password is incorrect"));
    }
    if payload.new_password != payload.confirm_new_password {
        return Err(ApiError::BadRequest("New passwords do not match"));
    }

    store
        .put(KEY_PASSWORD, &hash_password(&payload.new_password))
        .await
        .map_err(store_failure("change password"))?;
    info!("password changed");

    Ok((StatusCode::OK, "Password changed!").into_response())
}

async fn logout(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = state.store()?;
    store
        .delete(KEY_SESSION)
        .await
        .map_err(store_failure("logout"))?;
    info!("session cleared");

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, clear_session_cookie())],
        "Logout successful",
    )
        .into_response())
}

/// Catch-all for unknown paths and wrong methods. The store precondition
/// applies here too: a misconfigured deployment answers 500 everywhere.
async fn not_found(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.store()?;
    Ok(pages::html(StatusCode::NOT_FOUND, pages::NOT_FOUND_HTML))
}

/// Service origin as seen by the client, for the panel's relay-endpoint
/// field. Honors `X-Forwarded-Proto` when a TLS terminator sits in front.
fn request_origin(headers: &HeaderMap) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}

fn store_failure(action: &'static str) -> impl FnOnce(StoreError) -> ApiError {
    move |err| {
        error!(error = %err, action, "settings store operation failed");
        ApiError::Failed { action }
    }
}

fn bad_payload(action: &'static str) -> impl FnOnce(serde_json::Error) -> ApiError {
    move |err| {
        warn!(error = %err, action, "malformed request payload");
        ApiError::Failed { action }
    }
}
