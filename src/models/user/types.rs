use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Stored account, including the argon2 password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// New user data for creation.
pub struct NewUser {
    pub username: String,
    pub password: String,
}

/// Form data from the registration page.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub registration_password: String,
    pub csrf_token: String,
}
