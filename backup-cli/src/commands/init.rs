use backup_core::config::AppConfig;
use backup_core::error::Result;
use std::path::Path;
use tracing::{info, warn};

/// 生成示例配置文件
pub async fn run_init(config_path: &Path, force: bool) -> Result<()> {
    info!("🦆 MySQL Backup 初始化");

    if config_path.exists() && !force {
        warn!("⚠️  配置文件已存在: {}", config_path.display());
        info!("如果要覆盖，请使用 --force 参数");
        info!("示例: backup-cli init --force");
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    AppConfig::write_template(config_path)?;

    info!("   ✅ 创建配置文件: {}", config_path.display());
    info!("   👉 修改数据库、S3 和邮件配置后运行 'backup-cli check' 检查配置");
    Ok(())
}
