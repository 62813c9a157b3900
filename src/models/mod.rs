//! Wire models for the DROPUX API.
//!
//! Only the fields the client relies on are typed; everything else the
//! server sends is tolerated and ignored. The user profile is carried as an
//! opaque JSON value, never interpreted by this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response from `POST /auth/login`. A missing `access_token` on an
/// otherwise-successful response is not an error at this layer; the caller
/// sees the full response either way.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Value,
}

/// Response from `GET /auth/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub user: Value,
}

/// A connected marketplace store, from `GET /api/ml/stores`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedStore {
    pub id: String,
    pub store_name: Option<String>,
    pub site_id: Option<String>,
    #[serde(default)]
    pub is_connected: bool,
}

/// Payload for `POST /api/ml/stores/setup`: the app credentials the user
/// registers before the OAuth connection.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSetupRequest {
    /// Marketplace site, e.g. `MLC` or `MLA`.
    pub site_id: String,
    pub app_number: String,
    pub app_id: String,
    pub app_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
}

/// Response from store setup. `redirect_uri` is shown to the user for their
/// app configuration; `auth_url` opens the marketplace OAuth screen.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSetupResponse {
    pub id: String,
    pub store_name: String,
    pub site_id: String,
    pub redirect_uri: String,
    pub auth_url: String,
    #[serde(default)]
    pub is_connected: bool,
}

/// Response from `GET /status`.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemStatus {
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Response from `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub service: Option<String>,
}
