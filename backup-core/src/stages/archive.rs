use crate::constants::archive::DEFAULT_COMPRESSION_LEVEL;
use crate::error::{BackupError, Result};
use crate::job::archive_path_for;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use walkdir::WalkDir;

/// 将工作目录压缩为单个归档文件
#[async_trait]
pub trait Archiver: Send + Sync {
    /// 归档 `dir`，成功时返回 `<dir>.tar.gz`
    async fn archive(&self, dir: &Path) -> Result<PathBuf>;
}

/// 使用 tar + gzip 在后台线程中压缩
#[derive(Debug, Clone)]
pub struct TarGzArchiver {
    compression_level: u32,
}

impl Default for TarGzArchiver {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl TarGzArchiver {
    pub fn new(compression_level: u32) -> Self {
        Self { compression_level }
    }
}

#[async_trait]
impl Archiver for TarGzArchiver {
    async fn archive(&self, dir: &Path) -> Result<PathBuf> {
        let archive_path = archive_path_for(dir);
        info!(dir = %dir.display(), "开始压缩");

        // 在后台线程中执行压缩操作，避免阻塞异步运行时
        let source_dir = dir.to_path_buf();
        let target = archive_path.clone();
        let level = self.compression_level;
        let result = tokio::task::spawn_blocking(move || write_tar_gz(&source_dir, &target, level))
            .await
            .map_err(BackupError::from)
            .and_then(|r| r);

        match result {
            Ok(()) => {
                info!(archive = %archive_path.display(), "压缩完成");
                Ok(archive_path)
            }
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "压缩失败");
                Err(e)
            }
        }
    }
}

fn write_tar_gz(source_dir: &Path, backup_path: &Path, compression_level: u32) -> Result<()> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs::File;
    use tar::Builder;

    if !source_dir.is_dir() {
        return Err(BackupError::external_tool(format!(
            "待压缩目录不存在: {}",
            source_dir.display()
        )));
    }

    let dir_name = source_dir
        .file_name()
        .ok_or_else(|| BackupError::external_tool("无法获取目录名"))?
        .to_string_lossy()
        .to_string();

    let file = File::create(backup_path)?;
    let encoder = GzEncoder::new(file, Compression::new(compression_level));
    let mut archive = Builder::new(encoder);

    archive.append_dir(&dir_name, source_dir)?;
    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let relative_path = path
            .strip_prefix(source_dir)
            .map_err(|e| BackupError::external_tool(format!("计算相对路径失败: {e}")))?;

        // tar归档内部统一使用Unix风格路径
        let archive_name = format!(
            "{}/{}",
            dir_name,
            relative_path.to_string_lossy().replace('\\', "/")
        );

        if entry.file_type().is_dir() {
            archive.append_dir(&archive_name, path)?;
        } else if entry.file_type().is_file() {
            archive.append_path_with_name(path, &archive_name)?;
        }
    }

    archive.into_inner()?.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tar::Archive;
    use tempfile::tempdir;

    fn entry_names(archive_path: &Path) -> Vec<String> {
        let file = std::fs::File::open(archive_path).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_archive_path_and_contents() {
        let temp_dir = tempdir().unwrap();
        let working = temp_dir.path().join("daily_20250101020000000");
        std::fs::create_dir(&working).unwrap();
        std::fs::write(working.join("shop_users.sql"), "-- users").unwrap();
        std::fs::write(working.join("shop_orders.sql"), "-- orders").unwrap();

        let archive_path = TarGzArchiver::default().archive(&working).await.unwrap();

        assert_eq!(
            archive_path,
            temp_dir.path().join("daily_20250101020000000.tar.gz")
        );
        let names = entry_names(&archive_path);
        assert!(names.contains(&"daily_20250101020000000/shop_users.sql".to_string()));
        assert!(names.contains(&"daily_20250101020000000/shop_orders.sql".to_string()));
    }

    #[tokio::test]
    async fn test_empty_directory_still_archives() {
        let temp_dir = tempdir().unwrap();
        let working = temp_dir.path().join("empty_run");
        std::fs::create_dir(&working).unwrap();

        let archive_path = TarGzArchiver::new(1).archive(&working).await.unwrap();
        assert!(archive_path.exists());
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let temp_dir = tempdir().unwrap();
        let result = TarGzArchiver::default()
            .archive(&temp_dir.path().join("missing"))
            .await;
        assert!(result.is_err());
    }
}
