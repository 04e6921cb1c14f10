use std::future::Future;

use chrono::NaiveDateTime;

use crate::auth::UserId;
use crate::entities::SqliteStore;

/// One row of the `users` table. `password` is a bcrypt hash.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub password: String,
    pub created_at: Option<NaiveDateTime>,
}

pub trait UserStore: Send + Sync + 'static {
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;

    /// Insert a user. `Ok(None)` when the username is already taken.
    fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> impl Future<Output = Result<Option<UserId>, sqlx::Error>> + Send;
}

impl UserStore for SqliteStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<(i64, String, String, Option<NaiveDateTime>)> = sqlx::query_as(
            "SELECT id, username, password, created_at FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, username, password, created_at)| UserRecord {
            id,
            username,
            password,
            created_at,
        }))
    }

    async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<UserId>, sqlx::Error> {
        let result = sqlx::query("INSERT INTO users (username, password) VALUES (?1, ?2)")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await;
        match result {
            Ok(done) => Ok(Some(done.last_insert_rowid())),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = store().await;
        let id = store.insert_user("alice", "$2b$10$hash").await.unwrap().unwrap();
        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.username, "alice");
        assert_eq!(found.password, "$2b$10$hash");
        assert!(found.created_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_username_is_reported_not_raised() {
        let store = store().await;
        assert!(store.insert_user("bob", "h1").await.unwrap().is_some());
        assert!(store.insert_user("bob", "h2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_none() {
        let store = store().await;
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }
}
