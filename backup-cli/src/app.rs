use anyhow::Context;
use backup_core::config::AppConfig;
use backup_core::constants::config::CONFIG_FILE_NAME;
use backup_core::job::BackupJob;
use backup_core::pipeline::PipelineRunner;
use backup_core::process::locate_program;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::Commands;
use crate::commands;

/// 已加载并校验过配置的应用
#[derive(Clone)]
pub struct CliApp {
    pub config_path: PathBuf,
    pub jobs: Vec<BackupJob>,
    pub pipeline: Arc<PipelineRunner>,
}

impl CliApp {
    /// 加载配置文件并构建任务与流水线
    ///
    /// 使用默认文件名且文件不存在时，按候选列表自动查找配置文件。
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let (config_path, config) = if config_path.exists() {
            let config = AppConfig::load_from_file(config_path)
                .with_context(|| format!("加载配置文件 {} 失败", config_path.display()))?;
            (config_path.to_path_buf(), config)
        } else if config_path == Path::new(CONFIG_FILE_NAME) {
            AppConfig::find_and_load_config().context("自动查找配置文件失败")?
        } else {
            return Err(backup_core::BackupError::config(format!(
                "配置文件不存在: {}",
                config_path.display()
            ))
            .into());
        };

        let pipeline = Arc::new(PipelineRunner::from_settings(&config.settings));
        let jobs = config
            .into_jobs()
            .with_context(|| format!("配置文件 {} 校验失败", config_path.display()))?;

        Ok(Self::with_pipeline(config_path, jobs, pipeline))
    }

    pub fn with_pipeline(config_path: PathBuf, jobs: Vec<BackupJob>, pipeline: Arc<PipelineRunner>) -> Self {
        info!(config = %config_path.display(), jobs = jobs.len(), "配置加载完成");
        Self {
            config_path,
            jobs,
            pipeline,
        }
    }

    /// 导出工具不在 PATH 中只警告，不阻止启动
    pub fn check_dump_program(&self) {
        let program = self.pipeline.dump_program();
        match locate_program(program) {
            Ok(path) => info!(program, path = %path.display(), "找到导出工具"),
            Err(e) => warn!("⚠️  {e}，导出阶段将会失败"),
        }
    }

    /// 运行应用命令
    pub async fn run_command(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Run => {
                self.check_dump_program();
                commands::run_scheduler(self).await?;
            }
            Commands::Once { job } => {
                self.check_dump_program();
                commands::run_once(self, job.as_deref()).await?;
            }
            Commands::Check { count } => commands::run_check(self, count)?,
            Commands::Init { .. } => unreachable!(), // 已经在 main.rs 中处理
        }
        Ok(())
    }
}
