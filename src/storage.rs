use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Region, Client, Config};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::config::StorageConfig;

/// Picture names are random and never rewritten.
const PICTURE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Object store holding uploaded profile pictures.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
}

/// S3 compatible store (MinIO in development).
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Client built only from `cfg`; ambient AWS env vars and profiles are ignored.
    pub fn new(cfg: &StorageConfig) -> Self {
        let conf = Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "inkwell-config",
            ))
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        }
    }

    /// Like [`S3Storage::new`], creating the bucket on first start.
    pub async fn connect(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let storage = Self::new(cfg);
        storage.ensure_bucket().await?;
        Ok(storage)
    }

    async fn ensure_bucket(&self) -> anyhow::Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .with_context(|| format!("create bucket {}", self.bucket))?;
        info!(bucket = %self.bucket, "picture bucket created");
        Ok(())
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .cache_control(PICTURE_CACHE_CONTROL)
            .send()
            .await
            .with_context(|| format!("store object {key}"))?;
        Ok(())
    }

    /// Deleting a missing key succeeds, as in S3.
    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("delete object {key}"))?;
        Ok(())
    }
}
