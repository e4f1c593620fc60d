//! Session cookie handling and the session-validity check.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::store::{SettingsStore, KEY_SESSION};

pub const SESSION_COOKIE: &str = "sessionToken";

/// Extract the session token from the `Cookie` request header, if any.
/// Malformed cookie headers are treated as absent.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(COOKIE).and_then(|value| value.to_str().ok())?;
    cookie::Cookie::split_parse(raw)
        .filter_map(Result::ok)
        .find(|candidate| candidate.name() == SESSION_COOKIE)
        .map(|candidate| candidate.value().to_string())
}

/// Compare the presented token against the stored one in constant time.
/// Absence of either side, or a store read failure, means unauthenticated.
pub async fn session_is_valid(store: &dyn SettingsStore, headers: &HeaderMap) -> bool {
    let Some(presented) = session_token_from_headers(headers) else {
        return false;
    };

    let stored = match store.get(KEY_SESSION).await {
        Ok(Some(token)) => token,
        Ok(None) => return false,
        Err(err) => {
            warn!(error = %err, "session token read failed; treating as unauthenticated");
            return false;
        }
    };

    let valid = bool::from(presented.as_bytes().ct_eq(stored.as_bytes()));
    if valid {
        debug!("authorized request using session cookie");
    }
    valid
}

pub fn mint_session_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// `Set-Cookie` value binding a freshly minted session token.
pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; Secure; SameSite=Strict")
}

/// `Set-Cookie` value clearing the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age=0")
}
