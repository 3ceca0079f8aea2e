//! Calls REST resource.
//!
//! Only the single read the live view needs: fetching a call record to see
//! whether its analysis has been attached.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use carewatch_core::{CallId, CallRecord};

use crate::auth::TokenSource;
use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Response envelope used by the backend: `{ "data": ... }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Client for `GET /api/calls/{id}`.
#[derive(Clone)]
pub struct CallsApi {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl CallsApi {
    pub fn new(base_url: impl Into<String>, tokens: impl TokenSource) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into(),
            tokens: Arc::new(tokens),
        }
    }

    fn call_url(&self, call_id: &CallId) -> String {
        format!("{}/api/calls/{}", self.base_url.trim_end_matches('/'), call_id)
    }

    /// Fetches one call record.
    ///
    /// # Errors
    ///
    /// - `ApiError::Http` on connection failure, non-2xx status or an
    ///   unexpected body
    pub async fn get_call(&self, call_id: &CallId) -> Result<CallRecord, ApiError> {
        let url = self.call_url(call_id);
        debug!(call_id = %call_id, "Fetching call record");

        let mut request = self.http.get(&url);
        if let Some(token) = self.tokens.access_token() {
            request = request.bearer_auth(token);
        }

        let envelope = request
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope<CallRecord>>()
            .await?;
        Ok(envelope.data)
    }
}
