use crate::app::CliApp;
use backup_core::error::{BackupError, Result};
use backup_core::job::BackupJob;
use backup_core::pipeline::RunSummary;
use std::sync::Arc;
use tracing::{info, warn};

/// 手动执行一轮备份：按配置顺序逐个运行，结束后输出汇总
pub async fn run_once(app: &CliApp, job_name: Option<&str>) -> Result<RunSummary> {
    let jobs = select_jobs(&app.jobs, job_name)?;
    info!("🚀 手动执行 {} 个备份任务", jobs.len());

    let mut summary = RunSummary::default();
    for job in jobs {
        let report = app.pipeline.run(Arc::new(job.clone())).await;
        summary.add(&report);
    }

    info!("📊 备份统计:");
    for line in summary.to_string().lines() {
        info!("   {line}");
    }
    if summary.has_failures() {
        warn!("⚠️  部分阶段执行失败，详情见上方日志");
    }
    Ok(summary)
}

fn select_jobs<'a>(jobs: &'a [BackupJob], job_name: Option<&str>) -> Result<Vec<&'a BackupJob>> {
    match job_name {
        None => Ok(jobs.iter().collect()),
        Some(name) => jobs
            .iter()
            .find(|job| job.name == name)
            .map(|job| vec![job])
            .ok_or_else(|| BackupError::config(format!("备份任务不存在: {name}"))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use backup_core::job::{DatabaseTarget, FailurePolicy, StoreTarget};
    use backup_core::pipeline::{PipelineRunner, StageTally};
    use backup_core::process::{CommandOutput, CommandRunner, CommandSpec};
    use backup_core::stages::{DumpStage, Mailer, Notifier, ObjectStore, TarGzArchiver, UploadStage};
    use std::path::Path;
    use tempfile::tempdir;

    struct WritingRunner;

    #[async_trait]
    impl CommandRunner for WritingRunner {
        async fn run(&self, _spec: &CommandSpec, stdout_path: Option<&Path>) -> Result<CommandOutput> {
            if let Some(path) = stdout_path {
                std::fs::write(path, "-- dump")?;
            }
            Ok(CommandOutput::succeeded())
        }
    }

    struct AcceptingStore;

    #[async_trait]
    impl ObjectStore for AcceptingStore {
        async fn upload(&self, _store: &StoreTarget, local_path: &Path, _key: &str) -> Result<()> {
            assert!(local_path.is_file());
            Ok(())
        }
    }

    struct NoopMailer;

    #[async_trait]
    impl Mailer for NoopMailer {
        async fn send(&self, _: &StoreTarget, _: &str, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    pub(crate) fn test_app(output_dir: &Path, names: &[&str]) -> CliApp {
        let jobs = names
            .iter()
            .map(|name| BackupJob {
                name: name.to_string(),
                cron: "0 2 * * *".to_string(),
                database: DatabaseTarget {
                    host: "127.0.0.1".to_string(),
                    port: 3306,
                    user: "root".to_string(),
                    password: String::new(),
                    database: "shop".to_string(),
                    tables: Vec::new(),
                },
                output_dir: output_dir.to_path_buf(),
                store: StoreTarget {
                    bucket: "backups".to_string(),
                    access_key: "AKIAEXAMPLE".to_string(),
                    secret_key: "secret".to_string(),
                    region: "us-east-1".to_string(),
                    endpoint: None,
                    sender_email: None,
                    recipient_email: None,
                },
                on_failure: FailurePolicy::Continue,
            })
            .collect();

        let pipeline = PipelineRunner::new(
            DumpStage::new(Arc::new(WritingRunner), "mysqldump"),
            Arc::new(TarGzArchiver::default()),
            UploadStage::new(Arc::new(AcceptingStore)),
            Notifier::new(Arc::new(NoopMailer)),
        );
        CliApp::with_pipeline(output_dir.join("config.yaml"), jobs, Arc::new(pipeline))
    }

    #[tokio::test]
    async fn test_once_runs_all_jobs_and_summarizes() {
        let temp_dir = tempdir().unwrap();
        let app = test_app(&temp_dir.path().join("backups"), &["daily", "weekly"]);

        let summary = run_once(&app, None).await.unwrap();

        assert_eq!(summary.runs, 2);
        assert_eq!(summary.dumps, StageTally { succeeded: 2, total: 2 });
        assert_eq!(summary.compressions, StageTally { succeeded: 2, total: 2 });
        assert_eq!(summary.uploads, StageTally { succeeded: 2, total: 2 });
        // 未配置邮箱，通知被跳过，不计入总数
        assert_eq!(summary.notifications, StageTally::default());
        assert!(!summary.has_failures());
        assert!(!temp_dir.path().join("backups").exists());
    }

    #[tokio::test]
    async fn test_once_single_job() {
        let temp_dir = tempdir().unwrap();
        let app = test_app(&temp_dir.path().join("backups"), &["daily", "weekly"]);

        let summary = run_once(&app, Some("weekly")).await.unwrap();
        assert_eq!(summary.runs, 1);

        let err = run_once(&app, Some("missing")).await.err().unwrap();
        assert!(err.is_fatal_config());
    }
}
