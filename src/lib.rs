//! Client library for the DROPUX sales platform.
//!
//! This crate owns the authentication session and mediates every network
//! call to the remote API:
//!
//! - [`SessionStore`]: holds the bearer token, its expiry, and the last-known
//!   user profile, persisted to durable storage so it survives restarts.
//!   Expired sessions are cleared lazily on the next observation.
//! - [`ApiClient`]: the single chokepoint for outbound calls. It injects the
//!   bearer token, classifies failures into [`ApiError`], and clears the
//!   session whenever the server answers 401.
//!
//! UI concerns (rendering, routing, the OAuth screens) live outside this
//! crate: collaborators call the typed operations and render from the
//! results.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError, ErrorBody, RequestOptions};
pub use auth::{ExpiryWatch, SessionStore};
pub use config::{Config, Environment};
pub use storage::{FileStore, KeyStore};
