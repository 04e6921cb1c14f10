//! Short-lived bearer token registry.
//!
//! Tokens are opaque 256-bit random values (hex) mapped to the owning user and
//! an expiry instant. A single mutex guards the token table and the
//! user-id → name table, so issuance (with its sweep) and lookups never
//! interleave.
//!
//! Expired tokens are removed two ways: lazily when a lookup finds one, and by
//! a full sweep on every [`TokenRegistry::issue`]. With no new logins, expired
//! entries linger until the next issuance; lookups check expiry regardless.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::debug;

/// Primary key of the `users` table.
pub type UserId = i64;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Returned by [`TokenRegistry::resolve_name`] for ids it has never seen.
pub const UNKNOWN_USER: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct TokenEntry {
    user_id: UserId,
    expires_at: Instant,
}

impl TokenEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct Tables {
    tokens: HashMap<String, TokenEntry>,
    // Never pruned; an entry may outlive every token that referenced it.
    names: HashMap<UserId, String>,
}

/// Process-wide token store, constructed once at startup and shared through
/// [`crate::state::AppState`].
#[derive(Debug)]
pub struct TokenRegistry {
    ttl: Duration,
    tables: Mutex<Tables>,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}

impl TokenRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, tables: Mutex::new(Tables::default()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new token for `user_id`.
    ///
    /// Older tokens of the same user stay valid until they expire on their
    /// own. Every expired entry is swept as a side effect.
    pub fn issue(&self, user_id: UserId, username: &str) -> String {
        let token = generate_token();
        let now = Instant::now();

        let mut tables = self.lock();
        tables.tokens.insert(
            token.clone(),
            TokenEntry { user_id, expires_at: now + self.ttl },
        );
        tables.names.insert(user_id, username.to_owned());

        let before = tables.tokens.len();
        tables.tokens.retain(|_, entry| !entry.is_expired(now));
        let swept = before - tables.tokens.len();
        if swept > 0 {
            debug!(swept, live = tables.tokens.len(), "swept expired tokens");
        }

        token
    }

    /// `false` when the token is unknown or expired. An expired entry found
    /// here is deleted immediately.
    pub fn is_valid(&self, token: &str) -> bool {
        self.resolve_user(token).is_some()
    }

    /// The user owning `token`, if the token is still valid.
    pub fn resolve_user(&self, token: &str) -> Option<UserId> {
        let now = Instant::now();
        let mut tables = self.lock();
        let entry = *tables.tokens.get(token)?;
        if entry.is_expired(now) {
            tables.tokens.remove(token);
            return None;
        }
        Some(entry.user_id)
    }

    /// Display name recorded at login, or [`UNKNOWN_USER`].
    pub fn resolve_name(&self, user_id: UserId) -> String {
        self.lock()
            .names
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_USER.to_owned())
    }

    /// Validate `token` and resolve both the user id and name in one step.
    pub fn authorize(&self, token: &str) -> Option<(UserId, String)> {
        let user_id = self.resolve_user(token)?;
        Some((user_id, self.resolve_name(user_id)))
    }

    /// Number of retained token entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().tokens.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
