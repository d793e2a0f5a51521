use bcrypt::{hash, verify, DEFAULT_COST};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(sqlx::FromRow, Debug)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Public view of a user, safe to return to any authenticated caller.
#[derive(sqlx::FromRow, Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Create a user, hashing the password before it touches the database.
///
/// Email uniqueness is enforced by the UNIQUE constraint on the column, not
/// by an application-level lookup; a check-then-insert would race with a
/// concurrent registration for the same address.
pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let password_hash = hash(password, DEFAULT_COST).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        AppError::InternalServerError("Password hashing error".to_string())
    })?;

    let result = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)
         RETURNING id, name, email, password_hash",
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(AppError::Conflict("Email already exists".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Returns the user only when both the email and the password check out.
/// An unknown email and a wrong password are indistinguishable to the caller.
pub async fn find_by_credentials(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let Some(user) = find_by_email(pool, email).await? else {
        return Ok(None);
    };

    if verify(password, &user.password_hash)? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<UserSummary>, AppError> {
    let users =
        sqlx::query_as::<_, UserSummary>("SELECT id, name, email FROM users ORDER BY id")
            .fetch_all(pool)
            .await?;

    Ok(users)
}
