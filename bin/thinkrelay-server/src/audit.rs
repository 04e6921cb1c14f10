//! User-attributed audit log.
//!
//! Every request outcome is recorded as one `info` event from this module
//! carrying the resolved username (or `unknown`) and a short action string.
//! Audit lines can be selected on their own with
//! `THINKRELAY_LOG=thinkrelay_server::audit=info`.

use std::fmt::Display;

use tracing::info;

/// Record `action` on behalf of `user`.
pub fn record(user: &str, action: impl Display) {
    info!(user = %user, action = %action, "audit");
}

#[cfg(test)]
mod test {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn audit_line_carries_user_and_action() {
        record("alice", "login successful");
        assert!(logs_contain("user=alice"));
        assert!(logs_contain("action=login successful"));
    }
}
