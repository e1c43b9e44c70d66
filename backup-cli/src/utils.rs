use backup_core::constants::config::LOG_FILE_ENV;
use std::fs::OpenOptions;
use tracing_appender::non_blocking::WorkerGuard;

/// 设置日志记录系统
///
/// - 库代码只使用 `tracing` 宏，日志输出只在这里配置
/// - `RUST_LOG` 优先，其次 `-v`（debug），默认 info
/// - 设置 `BACKUP_LOG_FILE` 时通过非阻塞写入器输出到文件，否则输出到终端
///
/// 返回的 guard 必须在程序结束前一直持有，否则缓冲中的日志会丢失。
///
/// ```bash
/// # 详细日志输出到终端
/// backup-cli -v once
///
/// # 日志输出到文件
/// BACKUP_LOG_FILE=backup.log backup-cli run
/// ```
pub fn setup_logging(verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file = std::env::var(LOG_FILE_ENV).ok().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("⚠️  无法打开日志文件 {path}: {e}，改为输出到终端");
                None
            }
        }
    });

    match file {
        Some(file) => {
            // 文件输出 - 详细格式便于排查
            let (writer, guard) = tracing_appender::non_blocking(file);
            fmt()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true)
                .init();
            Some(guard)
        }
        None => {
            // 终端输出 - 简洁格式
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_names(false)
                .with_line_number(false)
                .compact()
                .init();
            None
        }
    }
}
