use crate::error::{BackupError, Result};
use crate::job::StoreTarget;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// 对象存储上传能力
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 使用 `store` 的凭证把本地文件上传到 `store.bucket/key`
    async fn upload(&self, store: &StoreTarget, local_path: &Path, key: &str) -> Result<()>;
}

/// S3（及兼容服务）上传实现，每次上传按任务凭证构建客户端
#[derive(Debug, Clone, Default)]
pub struct S3ObjectStore;

impl S3ObjectStore {
    pub fn client_for(store: &StoreTarget) -> S3Client {
        let credentials = Credentials::new(
            store.access_key.clone(),
            store.secret_key.clone(),
            None,
            None,
            "backup-config",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(store.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &store.endpoint {
            builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
        }

        S3Client::from_conf(builder.build())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, store: &StoreTarget, local_path: &Path, key: &str) -> Result<()> {
        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            BackupError::upload(format!("读取 {} 失败: {e}", local_path.display()))
        })?;

        Self::client_for(store)
            .put_object()
            .bucket(&store.bucket)
            .key(key)
            .body(body)
            .content_type("application/gzip")
            .send()
            .await
            .map_err(|e| {
                BackupError::upload(format!(
                    "s3://{}/{}: {}",
                    store.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }
}

/// 上传阶段：对象键等于归档文件名
#[derive(Clone)]
pub struct UploadStage {
    store: Arc<dyn ObjectStore>,
}

impl UploadStage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn object_key(archive_path: &Path) -> Result<String> {
        archive_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                BackupError::upload(format!("无法获取文件名: {}", archive_path.display()))
            })
    }

    /// 上传归档，成功时返回对象键
    pub async fn upload(&self, target: &StoreTarget, archive_path: &Path) -> Result<String> {
        let key = Self::object_key(archive_path)?;
        info!(file = %archive_path.display(), bucket = %target.bucket, key = %key, "开始上传");

        match self.store.upload(target, archive_path, &key).await {
            Ok(()) => {
                info!(bucket = %target.bucket, key = %key, "上传完成");
                Ok(key)
            }
            Err(e) => {
                error!(bucket = %target.bucket, key = %key, error = %e, "上传失败");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::fixtures;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        uploads: Mutex<Vec<(String, PathBuf, String)>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn upload(&self, store: &StoreTarget, local_path: &Path, key: &str) -> Result<()> {
            self.uploads.lock().unwrap().push((
                store.bucket.clone(),
                local_path.to_path_buf(),
                key.to_string(),
            ));
            Ok(())
        }
    }

    #[test]
    fn test_object_key_is_base_file_name() {
        let key = UploadStage::object_key(Path::new("/var/backups/daily_20250101.tar.gz")).unwrap();
        assert_eq!(key, "daily_20250101.tar.gz");
        assert!(UploadStage::object_key(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn test_upload_uses_bucket_and_key() {
        let store = Arc::new(RecordingStore::default());
        let stage = UploadStage::new(store.clone());
        let archive = PathBuf::from("/tmp/users_20250101.tar.gz");

        let key = stage.upload(&fixtures::store(false), &archive).await.unwrap();

        assert_eq!(key, "users_20250101.tar.gz");
        let uploads = store.uploads.lock().unwrap();
        assert_eq!(
            uploads.as_slice(),
            &[("backups".to_string(), archive.clone(), key.clone())]
        );
    }

    #[tokio::test]
    async fn test_client_builds_with_custom_endpoint() {
        let mut target = fixtures::store(false);
        target.endpoint = Some("http://127.0.0.1:9000".to_string());
        let client = S3ObjectStore::client_for(&target);
        assert_eq!(
            client.config().region().map(|r| r.as_ref()),
            Some("us-east-1")
        );
    }
}
