//! Token-based session management with lazy expiry.
//!
//! A session is valid while a token is held and the current time is before
//! its expiry, which is fixed at the end of the calendar day the token was
//! issued (local time). Expired sessions are cleared on the next
//! observation; an optional background watch shrinks the window in which an
//! expired session goes unnoticed, but every gated operation re-checks
//! validity itself.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::storage::{KeyStore, TOKEN_EXPIRY_KEY, TOKEN_KEY, USER_KEY};

/// In-memory session record. Token and expiry are always set together;
/// the session is never partially updated.
#[derive(Debug, Clone)]
struct SessionState {
    token: String,
    expires_at: DateTime<Local>,
    user: Value,
}

/// Owns the authentication token, its expiry, and the user profile snapshot.
///
/// Shared as `Arc<SessionStore>` between the request gateway and the expiry
/// watch; all mutations are synchronous and serialized by an internal mutex,
/// so no caller can observe a torn session.
pub struct SessionStore {
    store: Box<dyn KeyStore>,
    state: Mutex<Option<SessionState>>,
}

impl SessionStore {
    pub fn new(store: Box<dyn KeyStore>) -> Self {
        Self {
            store,
            state: Mutex::new(None),
        }
    }

    /// Load the persisted session at startup. If the expiry is absent,
    /// unparsable, or already past, all session state is cleared (durable
    /// and in-memory) and the store is left empty.
    pub fn initialize(&self) -> Result<()> {
        let token = self.store.get(TOKEN_KEY).context("Failed to load token")?;
        let expiry = self
            .store
            .get(TOKEN_EXPIRY_KEY)
            .context("Failed to load token expiry")?;

        let (token, expires_at) = match (token, expiry) {
            (None, None) => return Ok(()),
            (Some(token), Some(raw)) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(parsed) if Local::now() < parsed => (token, parsed.with_timezone(&Local)),
                Ok(_) => {
                    debug!("Persisted session already expired, clearing");
                    self.clear();
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Unparsable session expiry, clearing");
                    self.clear();
                    return Ok(());
                }
            },
            // Token without expiry (or the reverse) violates the session
            // invariant; treat it as no session.
            _ => {
                warn!("Incomplete persisted session, clearing");
                self.clear();
                return Ok(());
            }
        };

        let user = self.load_user();
        let mut state = self.state.lock();
        *state = Some(SessionState {
            token,
            expires_at,
            user,
        });
        info!(expires_at = %expires_at, "Adopted persisted session");
        Ok(())
    }

    /// Establish a new session. The expiry is 23:59:59.999 of the current
    /// local day. The token is treated as opaque; any non-empty string is
    /// accepted.
    pub fn set_session(&self, token: &str, user: Value) -> Result<()> {
        let expires_at = end_of_local_day(Local::now());

        {
            let mut state = self.state.lock();
            *state = Some(SessionState {
                token: token.to_string(),
                expires_at,
                user: user.clone(),
            });
        }

        self.store
            .set(TOKEN_KEY, token)
            .context("Failed to persist token")?;
        self.store
            .set(TOKEN_EXPIRY_KEY, &expires_at.to_rfc3339())
            .context("Failed to persist token expiry")?;
        self.store
            .set(USER_KEY, &user.to_string())
            .context("Failed to persist user profile")?;

        info!(expires_at = %expires_at, "Session established");
        Ok(())
    }

    /// Check session validity. An expired session is cleared as a side
    /// effect before returning false.
    pub fn is_valid(&self) -> bool {
        let mut state = self.state.lock();
        let expired = match state.as_ref() {
            None => return false,
            Some(session) => Local::now() >= session.expires_at,
        };
        if expired {
            warn!("Session expired, clearing");
            self.clear_locked(&mut state);
            return false;
        }
        true
    }

    /// The bearer token, if the session is still valid. Performs the same
    /// lazy expiry check as [`is_valid`](Self::is_valid).
    pub fn bearer_token(&self) -> Option<String> {
        let mut state = self.state.lock();
        let token = match state.as_ref() {
            None => return None,
            Some(session) if Local::now() >= session.expires_at => None,
            Some(session) => Some(session.token.clone()),
        };
        if token.is_none() {
            warn!("Session expired, clearing");
            self.clear_locked(&mut state);
        }
        token
    }

    /// Remove token, expiry, and user from memory and durable storage.
    /// Idempotent; durable-storage failures are logged, not propagated,
    /// so a clear can never be observed as partially applied in memory.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        self.clear_locked(&mut state);
    }

    fn clear_locked(&self, state: &mut Option<SessionState>) {
        *state = None;
        for key in [TOKEN_KEY, TOKEN_EXPIRY_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to remove session key");
            }
        }
    }

    /// The last-known user profile, or an empty object if there is none or
    /// the durable copy cannot be parsed. Corrupt storage is non-fatal.
    pub fn user(&self) -> Value {
        if let Some(session) = self.state.lock().as_ref() {
            return session.user.clone();
        }
        self.load_user()
    }

    fn load_user(&self) -> Value {
        match self.store.get(USER_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Unparsable persisted user profile");
                empty_profile()
            }),
            Ok(None) => empty_profile(),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted user profile");
                empty_profile()
            }
        }
    }

    /// Spawn a recurring expiry check so that an expired session is noticed
    /// even without an active request. Advisory only: every gated operation
    /// re-checks validity itself. A single tick task runs at a time; drop or
    /// stop the returned handle for clean shutdown.
    pub fn start_expiry_watch(self: Arc<Self>, interval: Duration) -> ExpiryWatch {
        let store = self;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.observe_expiry();
            }
        });
        ExpiryWatch { handle }
    }

    /// Same expiry logic as `is_valid`, invoked by the watch tick.
    fn observe_expiry(&self) {
        let mut state = self.state.lock();
        let expired = state
            .as_ref()
            .is_some_and(|session| Local::now() >= session.expires_at);
        if expired {
            warn!("Expiry watch: session expired, clearing");
            self.clear_locked(&mut state);
        }
    }

    #[cfg(test)]
    fn inject_state(&self, token: &str, expires_at: DateTime<Local>, user: Value) {
        let mut state = self.state.lock();
        *state = Some(SessionState {
            token: token.to_string(),
            expires_at,
            user,
        });
    }
}

/// Handle for the background expiry watch. Stops the tick task when dropped.
pub struct ExpiryWatch {
    handle: JoinHandle<()>,
}

impl ExpiryWatch {
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ExpiryWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn empty_profile() -> Value {
    Value::Object(serde_json::Map::new())
}

/// 23:59:59.999 of `now`'s calendar day in the local timezone. Falls back to
/// `now` itself in the degenerate case where that wall-clock time does not
/// exist locally.
fn end_of_local_day(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .and_then(|naive| naive.and_local_timezone(Local).latest())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileStore;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> SessionStore {
        let file_store = FileStore::new(dir.path().to_path_buf()).expect("file store");
        SessionStore::new(Box::new(file_store))
    }

    #[test]
    fn test_end_of_local_day() {
        let now = Local::now();
        let end = end_of_local_day(now);
        assert_eq!(end.date_naive(), now.date_naive());
        assert_eq!(end.hour(), 23);
        assert_eq!(end.minute(), 59);
        assert_eq!(end.second(), 59);
        assert_eq!(end.timestamp_subsec_millis(), 999);
        assert!(end >= now);
        assert_eq!(end.day(), now.day());
    }

    #[test]
    fn test_set_session_then_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = store_in(&dir);

        session
            .set_session("tok123", json!({"email": "a@b.com"}))
            .expect("set_session");

        assert!(session.is_valid());
        assert_eq!(session.bearer_token().as_deref(), Some("tok123"));
        assert_eq!(session.user()["email"], "a@b.com");
    }

    #[test]
    fn test_set_session_persists_all_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = store_in(&dir);
        session
            .set_session("tok123", json!({"id": 1}))
            .expect("set_session");

        assert!(dir.path().join("token").exists());
        assert!(dir.path().join("token_expiry").exists());
        assert!(dir.path().join("user").exists());

        let raw = std::fs::read_to_string(dir.path().join("token_expiry")).unwrap();
        let expiry = DateTime::parse_from_rfc3339(&raw).expect("rfc3339 expiry");
        assert_eq!(expiry.with_timezone(&Local).date_naive(), Local::now().date_naive());
    }

    #[test]
    fn test_expired_session_cleared_on_observation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = store_in(&dir);
        session
            .set_session("tok123", json!({"email": "a@b.com"}))
            .expect("set_session");

        // Rewind the in-memory expiry to the past; the durable keys are
        // still present from set_session.
        session.inject_state(
            "tok123",
            Local::now() - chrono::Duration::seconds(1),
            json!({"email": "a@b.com"}),
        );

        assert!(!session.is_valid());
        // The clear removed the durable copy as well.
        assert!(!dir.path().join("token").exists());
        assert_eq!(session.user(), json!({}));
        assert_eq!(session.bearer_token(), None);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = store_in(&dir);
        session.set_session("tok123", json!({})).expect("set_session");

        session.clear();
        assert!(!session.is_valid());
        session.clear();
        assert!(!session.is_valid());
    }

    #[test]
    fn test_initialize_adopts_valid_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let session = store_in(&dir);
            session
                .set_session("tok123", json!({"email": "a@b.com"}))
                .expect("set_session");
        }

        // Fresh store over the same directory, as after a process restart.
        let session = store_in(&dir);
        session.initialize().expect("initialize");
        assert!(session.is_valid());
        assert_eq!(session.bearer_token().as_deref(), Some("tok123"));
        assert_eq!(session.user()["email"], "a@b.com");
    }

    #[test]
    fn test_initialize_clears_expired_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("token"), "tok123").unwrap();
        let past = (Local::now() - chrono::Duration::days(1)).to_rfc3339();
        std::fs::write(dir.path().join("token_expiry"), past).unwrap();
        std::fs::write(dir.path().join("user"), "{}").unwrap();

        let session = store_in(&dir);
        session.initialize().expect("initialize");
        assert!(!session.is_valid());
        assert!(!dir.path().join("token").exists());
        assert!(!dir.path().join("user").exists());
    }

    #[test]
    fn test_initialize_clears_token_without_expiry() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("token"), "tok123").unwrap();

        let session = store_in(&dir);
        session.initialize().expect("initialize");
        assert!(!session.is_valid());
        assert!(!dir.path().join("token").exists());
    }

    #[test]
    fn test_initialize_clears_unparsable_expiry() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("token"), "tok123").unwrap();
        std::fs::write(dir.path().join("token_expiry"), "not-a-timestamp").unwrap();

        let session = store_in(&dir);
        session.initialize().expect("initialize");
        assert!(!session.is_valid());
    }

    #[test]
    fn test_corrupt_user_profile_is_non_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("user"), "{not json").unwrap();

        let session = store_in(&dir);
        assert_eq!(session.user(), json!({}));
    }

    #[tokio::test]
    async fn test_expiry_watch_clears_expired_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Arc::new(store_in(&dir));
        session.set_session("tok123", json!({})).expect("set_session");
        session.inject_state("tok123", Local::now() - chrono::Duration::seconds(1), json!({}));

        let watch = Arc::clone(&session).start_expiry_watch(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        watch.stop();

        // Cleared by the watch without any is_valid call.
        assert!(session.state.lock().is_none());
    }
}
