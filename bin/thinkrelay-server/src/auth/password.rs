//! Password hashing.
//!
//! bcrypt is CPU-bound, so both operations run on the blocking pool
//! instead of stalling a runtime worker.

use tracing::warn;

use crate::error::ServerError;

/// bcrypt work factor used for new hashes.
pub const BCRYPT_COST: u32 = 10;

pub async fn hash_password(password: String) -> Result<String, ServerError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|e| ServerError::Internal(format!("hash task failed: {e}")))?
        .map_err(|e| ServerError::Internal(format!("bcrypt hash failed: {e}")))
}

/// `Ok(false)` on mismatch. A stored hash that bcrypt cannot parse also counts
/// as a mismatch so a corrupt row never becomes a 500 on login.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ServerError> {
    let verdict = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ServerError::Internal(format!("verify task failed: {e}")))?;
    match verdict {
        Ok(matches) => Ok(matches),
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            Ok(false)
        }
    }
}
