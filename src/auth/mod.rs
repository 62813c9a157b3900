//! Authentication module for managing the user session.
//!
//! `SessionStore` owns the bearer token, its expiry timestamp, and the
//! last-known user profile. The session lives in memory and in durable
//! storage at the same time; every mutation updates both.

pub mod session;

pub use session::{ExpiryWatch, SessionStore};
