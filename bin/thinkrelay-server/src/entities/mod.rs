//! Persistence layer.
//!
//! [`UserStore`] defines the interface for the credential table. The default
//! implementation is [`SqliteStore`]. To swap to another database, implement
//! [`UserStore`] for your new type and change the concrete type in
//! [`crate::state::AppState`].
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required here.
//!
//! `sqlx::migrate!("./migrations")` resolves its path at compile time relative
//! to `CARGO_MANIFEST_DIR`, so the migrations are embedded into the binary.
//! Queries use the runtime-checked `sqlx::query` form so no `DATABASE_URL` is
//! needed at build time.

pub mod user;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use user::{UserRecord, UserStore};

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://users.db"`
    /// or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool = SqlitePoolOptions::new();
        if url.contains(":memory:") {
            // Every pooled connection to `:memory:` is its own database; keep
            // exactly one alive for the lifetime of the pool.
            pool = pool.max_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = pool.connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}
