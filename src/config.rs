use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub session_ttl_minutes: i64,
    pub remember_ttl_days: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    /// Base URL used when building links sent by mail.
    pub public_url: String,
    /// Prefix under which profile pictures are served.
    pub static_url: String,
    pub posts_per_page: i64,
    pub cookie_secure: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_string("JWT_ISSUER", "inkwell"),
            audience: env_string("JWT_AUDIENCE", "inkwell-users"),
            session_ttl_minutes: env_or("SESSION_TTL_MINUTES", 60 * 24),
            remember_ttl_days: env_or("REMEMBER_TTL_DAYS", 365),
            reset_ttl_minutes: env_or("RESET_TTL_MINUTES", 30),
        };
        let storage = StorageConfig {
            endpoint: env_string("MINIO_ENDPOINT", "http://localhost:9000"),
            bucket: env_string("MINIO_BUCKET", "inkwell"),
            access_key: env_string("MINIO_ACCESS_KEY", "minioadmin"),
            secret_key: env_string("MINIO_SECRET_KEY", "minioadmin"),
            region: env_string("MINIO_REGION", "us-east-1"),
        };

        let posts_per_page = env_or("POSTS_PER_PAGE", 3i64);
        anyhow::ensure!(posts_per_page > 0, "POSTS_PER_PAGE must be positive");

        Ok(Self {
            database_url,
            jwt,
            storage,
            public_url: env_string("PUBLIC_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_string(),
            static_url: env_string("STATIC_URL", "/static")
                .trim_end_matches('/')
                .to_string(),
            posts_per_page,
            cookie_secure: env_or("COOKIE_SECURE", false),
        })
    }

    /// Public URL of a stored profile picture.
    pub fn picture_url(&self, image_file: &str) -> String {
        format!("{}/profile_pics/{}", self.static_url, image_file)
    }
}
