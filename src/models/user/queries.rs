use sqlx::PgPool;

use super::types::{NewUser, User};

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password, is_admin, created_at FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
}

/// Create a user. The very first account becomes admin.
pub async fn create(pool: &PgPool, new: &NewUser) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (username, password, is_admin) \
         VALUES ($1, $2, NOT EXISTS (SELECT 1 FROM users)) \
         RETURNING id, username, password, is_admin, created_at",
    )
    .bind(&new.username)
    .bind(&new.password)
    .fetch_one(pool)
    .await
}
