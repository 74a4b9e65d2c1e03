//! One-time login tokens bridging a chat identity to a web session.
//!
//! The bridge never caches token state in-process: every issue/redeem goes to
//! the durable store, since this is a security boundary.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::util::now_epoch;

/// Fixed token lifetime from issuance.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Redeemed tokens are kept this long before garbage collection.
pub const USED_RETENTION_SECS: i64 = 7 * 86_400;

const TOKEN_LEN: usize = 43;

/// A durable login token row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginToken {
    pub token: String,
    pub subject_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub used: bool,
}

/// Why a redemption was refused. Each reason is surfaced distinctly to the
/// end user, never collapsed into a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotFound,
    AlreadyUsed,
    Expired,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::NotFound => write!(f, "not found"),
            RejectReason::AlreadyUsed => write!(f, "already used"),
            RejectReason::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RedeemError {
    #[error("login token rejected: {0}")]
    Rejected(RejectReason),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Durable storage for login tokens.
///
/// `consume` must be atomic: the lookup and the used-flag flip happen as one
/// step so two concurrent redemptions of the same token cannot both succeed.
pub trait TokenStore: Send + Sync {
    fn insert(&self, token: &LoginToken) -> Result<(), StorageError>;

    /// Atomically check and mark a token used. `Ok(Ok(subject_id))` on the
    /// single successful redemption, `Ok(Err(reason))` on refusal.
    fn consume(&self, token: &str, now: i64)
        -> Result<Result<String, RejectReason>, StorageError>;

    /// Delete tokens that are expired, or used and older than the retention
    /// window. Returns how many rows went.
    fn purge_stale(&self, now: i64, used_retention_secs: i64) -> Result<usize, StorageError>;
}

/// Issues and consumes login tokens against a durable [`TokenStore`].
pub struct TokenBridge {
    store: Arc<dyn TokenStore>,
}

impl TokenBridge {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Mint a token for the subject with the fixed TTL. Piggybacks a cleanup
    /// of stale rows so no separate scheduled job is needed.
    pub fn issue(&self, subject_id: &str) -> Result<String, StorageError> {
        self.issue_at(subject_id, now_epoch())
    }

    pub fn issue_at(&self, subject_id: &str, now: i64) -> Result<String, StorageError> {
        match self.store.purge_stale(now, USED_RETENTION_SECS) {
            Ok(0) => {}
            Ok(n) => debug!("Purged {} stale login tokens", n),
            Err(e) => warn!("Login token cleanup failed: {}", e),
        }

        let token = generate_token();
        self.store.insert(&LoginToken {
            token: token.clone(),
            subject_id: subject_id.to_string(),
            issued_at: now,
            expires_at: now + TOKEN_TTL_SECS,
            used: false,
        })?;
        Ok(token)
    }

    /// Redeem a token, returning the subject it authenticates. Succeeds at
    /// most once per token.
    pub fn redeem(&self, token: &str) -> Result<String, RedeemError> {
        self.redeem_at(token, now_epoch())
    }

    pub fn redeem_at(&self, token: &str, now: i64) -> Result<String, RedeemError> {
        match self.store.consume(token, now)? {
            Ok(subject_id) => Ok(subject_id),
            Err(reason) => Err(RedeemError::Rejected(reason)),
        }
    }
}

/// URL-safe random token from the thread-local CSPRNG.
fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// In-memory token store for tests and local development. Production uses
/// the SQLite-backed store in [`crate::storage`].
pub struct MemoryTokenStore {
    tokens: std::sync::Mutex<std::collections::HashMap<String, LoginToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for MemoryTokenStore {
    fn insert(&self, token: &LoginToken) -> Result<(), StorageError> {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    fn consume(
        &self,
        token: &str,
        now: i64,
    ) -> Result<Result<String, RejectReason>, StorageError> {
        let mut tokens = self.tokens.lock().unwrap();
        let Some(row) = tokens.get_mut(token) else {
            return Ok(Err(RejectReason::NotFound));
        };
        if row.used {
            return Ok(Err(RejectReason::AlreadyUsed));
        }
        if now > row.expires_at {
            return Ok(Err(RejectReason::Expired));
        }
        row.used = true;
        Ok(Ok(row.subject_id.clone()))
    }

    fn purge_stale(&self, now: i64, used_retention_secs: i64) -> Result<usize, StorageError> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|_, row| {
            let expired = now > row.expires_at;
            let used_and_old = row.used && now > row.issued_at + used_retention_secs;
            !expired && !used_and_old
        });
        Ok(before - tokens.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> (TokenBridge, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        (TokenBridge::new(store.clone()), store)
    }

    #[test]
    fn test_issue_and_redeem_once() {
        let (bridge, _) = bridge();
        let token = bridge.issue_at("15551234", 1_000).unwrap();
        assert_eq!(token.len(), 43);

        assert_eq!(bridge.redeem_at(&token, 1_010).unwrap(), "15551234");
        match bridge.redeem_at(&token, 1_020) {
            Err(RedeemError::Rejected(RejectReason::AlreadyUsed)) => {}
            other => panic!("expected AlreadyUsed, got {other:?}"),
        }
    }

    #[test]
    fn test_redeem_unknown_token() {
        let (bridge, _) = bridge();
        match bridge.redeem_at("nope", 1_000) {
            Err(RedeemError::Rejected(RejectReason::NotFound)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_redeem_after_ttl_is_expired() {
        let (bridge, _) = bridge();
        let token = bridge.issue_at("15551234", 1_000).unwrap();

        // One second past the TTL.
        match bridge.redeem_at(&token, 1_000 + TOKEN_TTL_SECS + 1) {
            Err(RedeemError::Rejected(RejectReason::Expired)) => {}
            other => panic!("expected Expired, got {other:?}"),
        }
        // Expiry wins even though the token was never used.
        match bridge.redeem_at(&token, 1_000 + TOKEN_TTL_SECS + 100) {
            Err(RedeemError::Rejected(RejectReason::Expired)) => {}
            other => panic!("expected Expired, got {other:?}"),
        }
    }

    #[test]
    fn test_redeem_at_exact_expiry_still_valid() {
        let (bridge, _) = bridge();
        let token = bridge.issue_at("15551234", 1_000).unwrap();
        assert!(bridge.redeem_at(&token, 1_000 + TOKEN_TTL_SECS).is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_redeem_single_winner() {
        let (bridge, _) = bridge();
        let bridge = Arc::new(bridge);
        let token = bridge.issue_at("15551234", 1_000).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let bridge = bridge.clone();
            let token = token.clone();
            handles.push(tokio::spawn(
                async move { bridge.redeem_at(&token, 1_010) },
            ));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[test]
    fn test_purge_on_issue_drops_expired_and_old_used() {
        let (bridge, store) = bridge();

        let expired = bridge.issue_at("a", 0).unwrap();
        let redeemed = bridge.issue_at("b", 0).unwrap();
        assert!(bridge.redeem_at(&redeemed, 10).is_ok());

        // Well past expiry and the used-retention window.
        let now = USED_RETENTION_SECS + TOKEN_TTL_SECS + 10;
        let fresh = bridge.issue_at("c", now).unwrap();

        assert!(matches!(
            bridge.redeem_at(&expired, now),
            Err(RedeemError::Rejected(RejectReason::NotFound))
        ));
        assert!(matches!(
            bridge.redeem_at(&redeemed, now),
            Err(RedeemError::Rejected(RejectReason::NotFound))
        ));
        assert!(bridge.redeem_at(&fresh, now + 5).is_ok());
        let _ = store;
    }

    #[test]
    fn test_tokens_are_unique_and_urlsafe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
