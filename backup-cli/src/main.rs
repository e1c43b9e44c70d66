use backup_cli::{Cli, CliApp, Commands, run_init, setup_logging};
use backup_core::BackupError;
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 设置日志记录，guard 需要持有到程序结束
    let _log_guard = setup_logging(cli.verbose);

    // `init` 命令不需要预先加载配置
    if let Commands::Init { force } = cli.command {
        if let Err(e) = run_init(&cli.config, force).await {
            error!("❌ 初始化失败: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let app = match CliApp::load(&cli.config) {
        Ok(app) => app,
        Err(e) => {
            let is_config_error = e
                .chain()
                .filter_map(|err| err.downcast_ref::<BackupError>())
                .any(BackupError::is_fatal_config);

            error!("❌ 应用初始化失败: {:#}", e);
            if is_config_error {
                error!("👉 请检查配置文件，或运行 'backup-cli init' 生成示例配置。");
            }
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run_command(cli.command).await {
        error!("❌ 操作失败: {:#}", e);
        std::process::exit(1);
    }
}
