use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Picture assigned to users who never uploaded one.
pub const DEFAULT_IMAGE_FILE: &str = "default.jpg";

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub image_file: String,
    pub created_at: OffsetDateTime,
}

/// Values needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Profile fields overwritten by the account form. `image_file` is only
/// written when a new picture was stored.
#[derive(Debug, Clone)]
pub struct ProfileUpdate<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub image_file: Option<&'a str>,
}
