use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::Region;

use crate::error::{AppError, AppResult};

use super::StorageBackend;

pub struct R2Backend {
    bucket: Box<Bucket>,
    bucket_name: String,
    public_base: String,
}

impl R2Backend {
    /// `public_base` is the bucket's public domain (r2.dev or custom); without
    /// one, URLs point at the account endpoint.
    pub fn new(
        bucket_name: String,
        account_id: String,
        access_key: String,
        secret_key: String,
        public_base: Option<String>,
    ) -> AppResult<Self> {
        let endpoint = format!("https://{}.r2.cloudflarestorage.com", account_id);
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.clone(),
        };

        let credentials = Credentials::new(
            Some(&access_key),
            Some(&secret_key),
            None, // security token
            None, // session token
            None, // profile
        )
        .map_err(|e| AppError::Storage(format!("R2 credentials error: {}", e)))?;

        let bucket = Bucket::new(&bucket_name, region, credentials)
            .map_err(|e| AppError::Storage(format!("R2 bucket error: {}", e)))?;

        let public_base = public_base
            .unwrap_or_else(|| format!("{}/{}", endpoint, bucket_name))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bucket,
            bucket_name,
            public_base,
        })
    }
}

#[async_trait]
impl StorageBackend for R2Backend {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<String> {
        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(|e| AppError::Storage(format!("R2 upload failed: {}", e)))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(AppError::Storage(format!(
                "R2 upload failed: key={}, status={}",
                key, status
            )));
        }

        tracing::info!("R2 upload: bucket={}, key={}", self.bucket_name, key);
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let response = self
            .bucket
            .delete_object(key)
            .await
            .map_err(|e| AppError::Storage(format!("R2 delete failed: {}", e)))?;

        match response.status_code() {
            200..=299 => {
                tracing::info!("R2 delete: bucket={}, key={}", self.bucket_name, key);
                Ok(())
            }
            404 => {
                tracing::debug!("R2 delete of missing key: bucket={}, key={}", self.bucket_name, key);
                Ok(())
            }
            status => Err(AppError::Storage(format!(
                "R2 delete failed: key={}, status={}",
                key, status
            ))),
        }
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }
}
