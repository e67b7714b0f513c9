use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    auth::session::JwtKeys,
    config::AppConfig,
    mail::{LogMailer, Mailer},
    posts::repo::PostRepo,
    storage::{S3Storage, StorageClient},
    users::repo::UserRepo,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Built once from `config.jwt`.
    pub jwt: Arc<JwtKeys>,
    pub users: Arc<dyn UserRepo>,
    pub posts: Arc<dyn PostRepo>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let storage = Arc::new(S3Storage::connect(&config.storage).await?) as Arc<dyn StorageClient>;

        Ok(Self::from_parts(
            config,
            Arc::new(db.clone()),
            Arc::new(db),
            storage,
            Arc::new(LogMailer),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        posts: Arc<dyn PostRepo>,
        storage: Arc<dyn StorageClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            jwt: Arc::new(JwtKeys::from_config(&config.jwt)),
            config,
            users,
            posts,
            storage,
            mailer,
        }
    }
}
