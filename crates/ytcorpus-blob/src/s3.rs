//! S3-compatible `BlobStore` implementation (e.g. Cloudflare R2, any
//! S3 API-compatible object store).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{BlobError, BlobResult};
use crate::store::{BlobStore, ObjectInfo};

/// Configuration for the S3-compatible client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 API endpoint URL (e.g. R2's account-scoped endpoint).
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Region (usually "auto" for R2).
    pub region: String,
}

impl S3Config {
    /// Build from `BLOB_S3_*` environment variables (spec §6).
    pub fn from_env() -> BlobResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("BLOB_S3_ENDPOINT_URL")
                .map_err(|_| BlobError::config_error("BLOB_S3_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("BLOB_S3_ACCESS_KEY_ID")
                .map_err(|_| BlobError::config_error("BLOB_S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("BLOB_S3_SECRET_ACCESS_KEY")
                .map_err(|_| BlobError::config_error("BLOB_S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("BLOB_S3_BUCKET_NAME")
                .map_err(|_| BlobError::config_error("BLOB_S3_BUCKET_NAME not set"))?,
            region: std::env::var("BLOB_S3_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub async fn new(config: S3Config) -> BlobResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "ytcorpus-blob",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        })
    }

    pub async fn from_env() -> BlobResult<Self> {
        Self::new(S3Config::from_env()?).await
    }

    /// Head the bucket to check connectivity at startup.
    pub async fn check_connectivity(&self) -> BlobResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| BlobError::Backend(format!("connectivity check failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_bytes(&self, key: &str, bytes: Vec<u8>) -> BlobResult<()> {
        debug!(%key, bytes = bytes.len(), "putting blob");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| BlobError::put_failed(e.to_string()))?;
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> BlobResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    BlobError::not_found(key)
                } else {
                    BlobError::get_failed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| BlobError::get_failed(e.to_string()))?
            .into_bytes()
            .to_vec();
        Ok(bytes)
    }

    async fn exists(&self, key: &str) -> BlobResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(BlobError::Backend(e.to_string()))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| BlobError::delete_failed(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| BlobError::list_failed(e.to_string()))?;

            if let Some(ref contents) = response.contents {
                for obj in contents {
                    objects.push(ObjectInfo {
                        key: obj.key.clone().unwrap_or_default(),
                        size: obj.size.unwrap_or(0) as u64,
                    });
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }
}
