use crate::app::CliApp;
use backup_core::error::Result;
use backup_core::scheduler::Scheduler;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 启动调度器，阻塞直到收到停止信号且正在执行的备份全部结束
pub async fn run_scheduler(app: &CliApp) -> Result<()> {
    let scheduler = Scheduler::new(app.jobs.clone(), app.pipeline.clone())?;
    info!("🦆 {} 已启动，共 {} 个备份任务", crate::project_info::get_version_string(), scheduler.job_count());

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    scheduler.run(shutdown).await;
    signal_task.abort();

    info!("👋 已退出");
    Ok(())
}

/// 收到 Ctrl+C 或 SIGTERM 时取消 `shutdown`
async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("监听 Ctrl+C 失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("监听 SIGTERM 失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到 Ctrl+C，准备停止"),
        _ = terminate => info!("收到 SIGTERM，准备停止"),
    }
    shutdown.cancel();
}
