use async_trait::async_trait;
use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::{
        objects::{
            delete::DeleteObjectRequest,
            upload::{Media, UploadObjectRequest, UploadType},
        },
        Error as GcsError,
    },
};

use crate::error::{AppError, AppResult};

use super::StorageBackend;

pub struct GcsBackend {
    client: Client,
    bucket: String,
    public_base: String,
}

impl GcsBackend {
    pub async fn new(bucket: String, public_base: Option<String>) -> AppResult<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| AppError::Storage(format!("GCS auth failed: {}", e)))?;
        let client = Client::new(config);
        let public_base = public_base
            .unwrap_or_else(|| format!("https://storage.googleapis.com/{}", bucket))
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            bucket,
            public_base,
        })
    }
}

#[async_trait]
impl StorageBackend for GcsBackend {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<String> {
        let mut media = Media::new(key.to_string());
        media.content_type = std::borrow::Cow::Owned(content_type.to_string());
        let upload_type = UploadType::Simple(media);

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data.to_vec(),
                &upload_type,
            )
            .await
            .map_err(|e| AppError::Storage(format!("GCS upload failed: {}", e)))?;

        tracing::info!("GCS upload: bucket={}, key={}", self.bucket, key);
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let result = self
            .client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!("GCS delete: bucket={}, key={}", self.bucket, key);
                Ok(())
            }
            Err(GcsError::Response(e)) if e.code == 404 => {
                tracing::debug!("GCS delete of missing key: bucket={}, key={}", self.bucket, key);
                Ok(())
            }
            Err(e) => Err(AppError::Storage(format!("GCS delete failed: {}", e))),
        }
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
