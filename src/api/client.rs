//! The request gateway: single entry and exit point for the DROPUX API.
//!
//! `ApiClient` builds the target address from the configured base, merges a
//! JSON content type with caller headers, attaches the session's bearer
//! token unless the caller supplied its own `Authorization`, and performs
//! exactly one exchange per call. Retry policy, if any, belongs to the
//! caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::SessionStore;
use crate::config::Config;
use crate::models::{
    ConnectedStore, HealthCheck, LoginResponse, StoreSetupRequest, StoreSetupResponse,
    SystemStatus, VerifyResponse,
};

use super::{ApiError, ErrorBody};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const LOGIN_ENDPOINT: &str = "/auth/login";
const VERIFY_ENDPOINT: &str = "/auth/me";
const STORES_ENDPOINT: &str = "/api/ml/stores";
const STORE_SETUP_ENDPOINT: &str = "/api/ml/stores/setup";
const STATUS_ENDPOINT: &str = "/status";
const HEALTH_ENDPOINT: &str = "/health";

/// Per-request overrides: method, extra headers, JSON body. Caller-supplied
/// headers win over the defaults, including `Authorization`.
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: header::HeaderMap,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }
}

/// Gateway for the DROPUX API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            session,
        })
    }

    /// The session store this gateway consults and invalidates.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Perform one exchange with the remote API.
    ///
    /// A 401 clears the session and fails with [`ApiError::SessionExpired`];
    /// any other non-success status fails with [`ApiError::Api`] carrying
    /// the classified body; a success status with an unparsable body fails
    /// with [`ApiError::MalformedResponse`].
    pub async fn execute(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        for (name, value) in options.headers.iter() {
            headers.insert(name, value.clone());
        }
        if !headers.contains_key(header::AUTHORIZATION) {
            if let Some(token) = self.session.bearer_token() {
                match header::HeaderValue::from_str(&format!("Bearer {}", token)) {
                    Ok(value) => {
                        headers.insert(header::AUTHORIZATION, value);
                    }
                    Err(_) => warn!("Stored token is not a valid header value"),
                }
            }
        }

        debug!(url = %url, method = %options.method, "API request");

        let mut request = self.http.request(options.method, &url).headers(headers);
        if let Some(ref body) = options.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = %status, "API response");

        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "Received 401, clearing session");
            self.session.clear();
            return Err(ApiError::SessionExpired);
        }

        if !status.is_success() {
            return Err(ApiError::Api {
                status,
                body: ErrorBody::from_text(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, "Success status with unparsable body");
            ApiError::malformed(&text)
        })
    }

    async fn execute_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let value = self.execute(endpoint, options).await?;
        serde_json::from_value(value).map_err(|e| {
            warn!(endpoint, error = %e, "Response did not match expected shape");
            ApiError::malformed(&e.to_string())
        })
    }

    // ===== Authentication =====

    /// `POST /auth/login`. On a response carrying an access token the
    /// session is established; the full response is returned either way,
    /// since a token-less success is not an error at this layer.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response: LoginResponse = self
            .execute_as(LOGIN_ENDPOINT, RequestOptions::post(body))
            .await?;

        if let Some(ref token) = response.access_token {
            if let Err(e) = self.session.set_session(token, response.user.clone()) {
                // The in-memory session is live; only the durable copy is
                // degraded, so the login itself still succeeds.
                warn!(error = %e, "Failed to persist session");
            }
        }

        Ok(response)
    }

    /// `GET /auth/me`. Any failure clears the session before propagating,
    /// including pure network failures: verification failure is treated as
    /// an invalid session, so connectivity loss here forces a fresh login.
    pub async fn verify_session(&self) -> Result<VerifyResponse, ApiError> {
        match self.execute_as(VERIFY_ENDPOINT, RequestOptions::get()).await {
            Ok(response) => Ok(response),
            Err(e) => {
                self.session.clear();
                Err(e)
            }
        }
    }

    /// The only sanctioned way for UI collaborators to branch on auth state.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_valid()
    }

    /// Clears the session locally. No network call; server-side
    /// invalidation, if any, is out of scope.
    pub fn logout(&self) {
        self.session.clear();
    }

    // ===== Stores =====

    pub async fn list_connected_stores(&self) -> Result<Vec<ConnectedStore>, ApiError> {
        self.execute_as(STORES_ENDPOINT, RequestOptions::get()).await
    }

    pub async fn submit_store_setup(
        &self,
        payload: &StoreSetupRequest,
    ) -> Result<StoreSetupResponse, ApiError> {
        let body = serde_json::json!({
            "site_id": payload.site_id,
            "app_number": payload.app_number,
            "app_id": payload.app_id,
            "app_secret": payload.app_secret,
            "store_name": payload.store_name,
        });
        self.execute_as(STORE_SETUP_ENDPOINT, RequestOptions::post(body))
            .await
    }

    // ===== System =====

    pub async fn get_system_status(&self) -> Result<SystemStatus, ApiError> {
        self.execute_as(STATUS_ENDPOINT, RequestOptions::get()).await
    }

    pub async fn get_health_check(&self) -> Result<HealthCheck, ApiError> {
        self.execute_as(HEALTH_ENDPOINT, RequestOptions::get()).await
    }
}
