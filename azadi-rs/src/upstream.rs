//! Upstream DoH address resolution.

use tracing::warn;

use crate::store::{SettingsStore, KEY_UPSTREAM};

/// Upstream used until an address is saved through the panel.
pub const DEFAULT_UPSTREAM: &str = "https://cloudflare-dns.com/dns-query";

/// Current DoH target for relayed queries.
///
/// An absent or empty key, or a store read failure, degrades to `default`.
/// Never fails: `/dns-query` must keep relaying even when settings reads do
/// not.
pub async fn resolve_upstream(store: &dyn SettingsStore, default: &str) -> String {
    match store.get(KEY_UPSTREAM).await {
        Ok(Some(address)) if !address.is_empty() => address,
        Ok(_) => default.to_string(),
        Err(err) => {
            warn!(error = %err, "upstream address read failed; using default");
            default.to_string()
        }
    }
}

/// Write-time validation for addresses submitted through the panel: any
/// syntactically valid absolute URL is accepted.
pub fn is_valid_upstream(raw: &str) -> bool {
    reqwest::Url::parse(raw).is_ok()
}
