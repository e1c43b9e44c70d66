use crate::constants::{archive, config, dump};
use crate::cron::CronSchedule;
use crate::error::{BackupError, Result};
use crate::job::{BackupJob, DatabaseTarget, FailurePolicy, StoreTarget};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// 应用配置结构
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub backups: Vec<BackupConfig>,
}

/// 全局设置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_dump_command")]
    pub dump_command: String,
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dump_command: default_dump_command(),
            compression_level: default_compression_level(),
        }
    }
}

fn default_dump_command() -> String {
    dump::DEFAULT_DUMP_COMMAND.to_string()
}

fn default_compression_level() -> u32 {
    archive::DEFAULT_COMPRESSION_LEVEL
}

fn default_mysql_port() -> u16 {
    dump::DEFAULT_MYSQL_PORT
}

/// 单个备份任务配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackupConfig {
    pub name: String,
    pub cron: String,
    pub output_dir: String,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    pub mysql: MySqlConfig,
    pub s3: S3Config,
}

/// MySQL 连接配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MySqlConfig {
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
}

/// S3 及通知配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
}

impl AppConfig {
    /// 智能查找并加载配置文件
    /// 按优先级查找：config.yaml -> config.yml -> backup.yaml -> config.toml
    pub fn find_and_load_config() -> Result<(PathBuf, Self)> {
        for config_file in config::CONFIG_FILE_CANDIDATES {
            let path = Path::new(config_file);
            if path.exists() {
                tracing::info!("找到配置文件: {}", config_file);
                return Ok((path.to_path_buf(), Self::load_from_file(path)?));
            }
        }

        Err(BackupError::config(format!(
            "未找到配置文件，已尝试: {}",
            config::CONFIG_FILE_CANDIDATES.join(", ")
        )))
    }

    /// 从指定文件加载配置，`.toml` 按 TOML 解析，其余按 YAML 解析
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            BackupError::config(format!("读取配置文件 {} 失败: {e}", path.display()))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 写出带注释的示例配置
    pub fn write_template<P: AsRef<Path>>(path: P) -> Result<()> {
        fs::write(path, Self::template())?;
        Ok(())
    }

    pub fn template() -> &'static str {
        include_str!("../templates/config.yaml.template")
    }

    /// 校验配置并构建不可变的备份任务列表
    ///
    /// 任意任务校验失败即返回错误，调度器不会启动。
    pub fn into_jobs(self) -> Result<Vec<BackupJob>> {
        if self.settings.compression_level > archive::MAX_COMPRESSION_LEVEL {
            return Err(BackupError::config(format!(
                "compression_level 必须在 0-{} 之间，当前为 {}",
                archive::MAX_COMPRESSION_LEVEL,
                self.settings.compression_level
            )));
        }
        if self.settings.dump_command.trim().is_empty() {
            return Err(BackupError::config("dump_command 不能为空"));
        }
        if self.backups.is_empty() {
            return Err(BackupError::config("配置中没有任何备份任务 (backups)"));
        }

        let mut names = HashSet::new();
        let mut jobs = Vec::with_capacity(self.backups.len());
        for backup in self.backups {
            if !names.insert(backup.name.clone()) {
                return Err(BackupError::config(format!(
                    "备份任务名称重复: {}",
                    backup.name
                )));
            }
            jobs.push(backup.into_job()?);
        }

        Ok(jobs)
    }
}

impl BackupConfig {
    fn into_job(self) -> Result<BackupJob> {
        let name = self.name.trim().to_string();
        require_non_empty("", "name", &name)?;
        if name.contains(['/', '\\']) {
            return Err(BackupError::config(format!(
                "备份任务名称不能包含路径分隔符: {name}"
            )));
        }

        CronSchedule::parse(&self.cron)
            .map_err(|e| BackupError::config(format!("[{name}] {e}")))?;

        require_non_empty(&name, "output_dir", &self.output_dir)?;
        require_non_empty(&name, "mysql.host", &self.mysql.host)?;
        require_non_empty(&name, "mysql.user", &self.mysql.user)?;
        require_non_empty(&name, "mysql.database", &self.mysql.database)?;
        require_non_empty(&name, "s3.bucket", &self.s3.bucket)?;
        require_non_empty(&name, "s3.region", &self.s3.region)?;

        let tables = self.mysql.tables.unwrap_or_default();
        if tables.iter().any(|t| t.trim().is_empty()) {
            return Err(BackupError::config(format!(
                "[{name}] mysql.tables 中包含空表名"
            )));
        }

        let sender_email = non_blank(self.s3.sender_email);
        let recipient_email = non_blank(self.s3.recipient_email);
        if sender_email.is_some() != recipient_email.is_some() {
            tracing::warn!(
                job = %name,
                "只配置了发件人或收件人之一，备份完成通知已禁用"
            );
        }

        Ok(BackupJob {
            cron: self.cron,
            database: DatabaseTarget {
                host: self.mysql.host,
                port: self.mysql.port,
                user: self.mysql.user,
                password: self.mysql.password,
                database: self.mysql.database,
                tables,
            },
            output_dir: PathBuf::from(self.output_dir),
            store: StoreTarget {
                bucket: self.s3.bucket,
                access_key: self.s3.access_key,
                secret_key: self.s3.secret_key,
                region: self.s3.region,
                endpoint: non_blank(self.s3.endpoint),
                sender_email,
                recipient_email,
            },
            on_failure: self.on_failure,
            name,
        })
    }
}

fn require_non_empty(job: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        let prefix = if job.is_empty() {
            String::new()
        } else {
            format!("[{job}] ")
        };
        return Err(BackupError::config(format!("{prefix}{field} 不能为空")));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
