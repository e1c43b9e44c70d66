use crate::project_info::{metadata, version_info};
use backup_core::constants::config::CONFIG_FILE_NAME;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MySQL Backup CLI - 定时备份 MySQL 到 S3
#[derive(Parser, Debug)]
#[command(name = "backup-cli")]
#[command(about = metadata::PROJECT_DESCRIPTION)]
#[command(version = version_info::CLI_VERSION)]
#[command(long_about = metadata::display::DESCRIPTION_LONG)]
#[command(author = metadata::PROJECT_AUTHORS)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// 启动调度器，按各任务的 cron 表达式执行备份，直到收到 Ctrl+C / SIGTERM
    Run,
    /// 立即按顺序执行一轮备份，并输出统计
    Once {
        /// 只执行指定名称的任务
        #[arg(long)]
        job: Option<String>,
    },
    /// 校验配置并显示各任务接下来的执行时间
    Check {
        /// 每个任务显示的执行时间数量
        #[arg(long, default_value = "5")]
        count: usize,
    },
    /// 生成带注释的示例配置文件
    Init {
        /// 如果配置文件已存在，强制覆盖
        #[arg(long)]
        force: bool,
    },
}
