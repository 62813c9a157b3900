//! Request gateway for the DROPUX API.
//!
//! Every outbound call passes through [`ApiClient::execute`], which joins
//! the configured base address with the endpoint, injects the bearer token,
//! and normalizes error and expiry handling. A 401 from any call clears the
//! session and surfaces as [`ApiError::SessionExpired`].

pub mod client;
pub mod error;

pub use client::{ApiClient, RequestOptions};
pub use error::{ApiError, ErrorBody};
