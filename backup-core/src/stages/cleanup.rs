use super::StageOutcome;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// 递归、强制删除文件或目录，路径不存在视为成功，从不向调用方返回错误
pub async fn remove_path(path: &Path) -> StageOutcome {
    info!(path = %path.display(), "删除本地文件");

    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "路径不存在，无需删除");
            return StageOutcome::Succeeded;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "读取路径信息失败");
            return StageOutcome::Failed(e.to_string());
        }
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Ok(()) => {
            info!(path = %path.display(), "删除完成");
            StageOutcome::Succeeded
        }
        // 并发删除时目标可能已经消失
        Err(e) if e.kind() == ErrorKind::NotFound => StageOutcome::Succeeded,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "删除失败");
            StageOutcome::Failed(e.to_string())
        }
    }
}

/// 目录为空时删除，非空或不存在都不算失败
pub async fn remove_dir_if_empty(path: &Path) -> StageOutcome {
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return StageOutcome::Succeeded,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "读取目录失败");
            return StageOutcome::Failed(e.to_string());
        }
    };

    match entries.next_entry().await {
        Ok(Some(_)) => {
            debug!(path = %path.display(), "目录非空，保留");
            return StageOutcome::skipped("目录非空");
        }
        Ok(None) => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "读取目录失败");
            return StageOutcome::Failed(e.to_string());
        }
    }

    // remove_dir 只会删除空目录，其它运行刚好写入时会失败并保留目录
    match tokio::fs::remove_dir(path).await {
        Ok(()) => {
            info!(path = %path.display(), "已删除空的基础目录");
            StageOutcome::Succeeded
        }
        Err(e) if e.kind() == ErrorKind::NotFound => StageOutcome::Succeeded,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "基础目录未删除");
            StageOutcome::skipped(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_remove_directory_recursively() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("run");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/a.sql"), "x").unwrap();

        assert!(remove_path(&dir).await.is_success());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_remove_file() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("run.tar.gz");
        std::fs::write(&file, "x").unwrap();

        assert!(remove_path(&file).await.is_success());
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing");

        assert!(remove_path(&missing).await.is_success());
        assert!(remove_path(&missing).await.is_success());
    }

    #[tokio::test]
    async fn test_remove_dir_if_empty() {
        let temp_dir = tempdir().unwrap();
        let base = temp_dir.path().join("base");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("other.tar.gz"), "x").unwrap();

        assert!(remove_dir_if_empty(&base).await.is_skipped());
        assert!(base.exists());

        std::fs::remove_file(base.join("other.tar.gz")).unwrap();
        assert!(remove_dir_if_empty(&base).await.is_success());
        assert!(!base.exists());
        assert!(remove_dir_if_empty(&base).await.is_success());
    }
}
