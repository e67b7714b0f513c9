use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, ProfileUpdate, User};

/// Credential store.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<User>;
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate<'_>) -> anyhow::Result<User>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
}

/// An insert or update hit the unique index on `field`.
#[derive(Debug, thiserror::Error)]
#[error("{field} already in use")]
pub struct Duplicate {
    pub field: &'static str,
}

/// Turns unique violations on `users` into [`Duplicate`] so callers can
/// report them on the form; other errors keep their context.
fn write_error(err: sqlx::Error, context: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some("users_username_key") => Some("username"),
                Some("users_email_key") => Some("email"),
                _ => None,
            };
            if let Some(field) = field {
                return Duplicate { field }.into();
            }
        }
    }
    anyhow::Error::new(err).context(context)
}

const USER_COLUMNS: &str = "id, username, email, password_hash, image_file, created_at";

#[async_trait]
impl UserRepo for PgPool {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Exact match, no case folding.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(self)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .fetch_one(self)
        .await
        .map_err(|e| write_error(e, "insert user"))?;
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username = $2,
                   email = $3,
                   image_file = COALESCE($4, image_file)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.username)
        .bind(update.email)
        .bind(update.image_file)
        .fetch_one(self)
        .await
        .map_err(|e| write_error(e, "update user profile"))?;
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let res = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self)
            .await
            .context("update user password")?;
        anyhow::ensure!(res.rows_affected() == 1, "user {} not found", id);
        Ok(())
    }
}
