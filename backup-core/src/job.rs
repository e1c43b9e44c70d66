use crate::constants::{archive, dump, workdir};
use crate::error::Result;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

/// 数据库连接信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// 非空时按表导出
    pub tables: Vec<String>,
}

/// 导出模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    WholeDatabase,
    Tables,
}

impl DatabaseTarget {
    pub fn dump_mode(&self) -> DumpMode {
        if self.tables.is_empty() {
            DumpMode::WholeDatabase
        } else {
            DumpMode::Tables
        }
    }

    /// 整库导出文件名: `<database>.sql`
    pub fn database_dump_file_name(&self) -> String {
        format!("{}.{}", self.database, dump::DUMP_FILE_EXTENSION)
    }

    /// 单表导出文件名: `<database>_<table>.sql`
    pub fn table_dump_file_name(&self, table: &str) -> String {
        format!("{}_{}.{}", self.database, table, dump::DUMP_FILE_EXTENSION)
    }
}

/// 对象存储目标
#[derive(Clone, PartialEq, Eq)]
pub struct StoreTarget {
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// S3 兼容服务（如 MinIO）的自定义地址
    pub endpoint: Option<String>,
    pub sender_email: Option<String>,
    pub recipient_email: Option<String>,
}

impl StoreTarget {
    /// 发件人与收件人都配置时才发送通知
    pub fn notification_addresses(&self) -> Option<(&str, &str)> {
        match (self.sender_email.as_deref(), self.recipient_email.as_deref()) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }

    pub fn notification_enabled(&self) -> bool {
        self.notification_addresses().is_some()
    }
}

// 避免在日志中打印密钥
impl fmt::Debug for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreTarget")
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("sender_email", &self.sender_email)
            .field("recipient_email", &self.recipient_email)
            .finish()
    }
}

/// 导出或归档失败后的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// 继续上传已有的归档
    #[default]
    Continue,
    /// 跳过上传，只做清理和通知
    Abort,
}

impl FailurePolicy {
    pub fn display_name(&self) -> &'static str {
        match self {
            FailurePolicy::Continue => "continue",
            FailurePolicy::Abort => "abort",
        }
    }
}

/// 备份任务，启动时由配置构建，之后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    pub name: String,
    pub cron: String,
    pub database: DatabaseTarget,
    pub output_dir: PathBuf,
    pub store: StoreTarget,
    pub on_failure: FailurePolicy,
}

impl BackupJob {
    /// 本次运行工作目录的候选名称: `<output_dir>/<name>_<timestamp>`
    pub fn working_dir_name<Tz: TimeZone>(&self, started_at: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        format!(
            "{}_{}",
            self.name,
            started_at.format(workdir::TIMESTAMP_FORMAT)
        )
    }

    /// 独占地创建本次运行的工作目录
    ///
    /// 同名目录已存在时追加 `_1`、`_2` ... 后缀，保证两次运行不会共用同一个目录。
    pub async fn create_working_dir<Tz: TimeZone>(&self, started_at: &DateTime<Tz>) -> Result<PathBuf>
    where
        Tz::Offset: fmt::Display,
    {
        let base_name = self.working_dir_name(started_at);
        let mut attempt = 0u32;

        loop {
            let candidate = if attempt == 0 {
                self.output_dir.join(&base_name)
            } else {
                self.output_dir.join(format!("{base_name}_{attempt}"))
            };

            tokio::fs::create_dir_all(&self.output_dir).await?;
            match tokio::fs::create_dir(&candidate).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                // 基础目录可能刚被并发运行的清理步骤删除，重新创建即可
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }

            attempt += 1;
            if attempt >= workdir::MAX_CREATE_ATTEMPTS {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("无法创建唯一的工作目录: {}", candidate.display()),
                )
                .into());
            }
        }
    }
}

/// 进程内严格递增的运行时间戳（微秒精度）
///
/// 同一进程内先后两次运行即使落在同一微秒，也会得到不同的时间戳。
pub fn next_run_timestamp() -> DateTime<Local> {
    static LAST_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

    let now = Local::now();
    let now_micros = now.timestamp_micros();
    let previous = LAST_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now_micros.max(last.saturating_add(1)))
        })
        .unwrap_or(now_micros);
    let micros = now_micros.max(previous.saturating_add(1));

    Local.timestamp_micros(micros).single().unwrap_or(now)
}

/// 由目录路径推导归档路径: `<dir>.tar.gz`
pub fn archive_path_for(dir: &Path) -> PathBuf {
    let mut path: OsString = dir.as_os_str().to_owned();
    path.push(archive::ARCHIVE_SUFFIX);
    PathBuf::from(path)
}

/// 单次上传的结果，只供通知使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub artifact_path: PathBuf,
    pub size_bytes: u64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn database(tables: &[&str]) -> DatabaseTarget {
        DatabaseTarget {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: "secret".to_string(),
            database: "shop".to_string(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn store(with_emails: bool) -> StoreTarget {
        StoreTarget {
            bucket: "backups".to_string(),
            access_key: "AKIAEXAMPLE".to_string(),
            secret_key: "example-secret".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            sender_email: with_emails.then(|| "backup@example.com".to_string()),
            recipient_email: with_emails.then(|| "ops@example.com".to_string()),
        }
    }

    pub fn job(name: &str, tables: &[&str], output_dir: &Path, with_emails: bool) -> BackupJob {
        BackupJob {
            name: name.to_string(),
            cron: "0 2 * * *".to_string(),
            database: database(tables),
            output_dir: output_dir.to_path_buf(),
            store: store(with_emails),
            on_failure: FailurePolicy::Continue,
        }
    }
}
