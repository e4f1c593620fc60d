use std::sync::Arc;

use crate::store::SettingsStore;

use super::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    /// `None` models a misconfigured deployment (no usable store); every
    /// route short-circuits with the store-error page in that case.
    pub settings: Option<Arc<dyn SettingsStore>>,
    pub http: reqwest::Client,
    pub default_upstream: String,
}

impl AppState {
    pub fn store(&self) -> Result<&dyn SettingsStore, ApiError> {
        self.settings
            .as_deref()
            .ok_or(ApiError::StoreNotConfigured)
    }
}
