mod report;

pub use report::{RunReport, RunSummary, StageTally};

use crate::config::Settings;
use crate::job::{BackupJob, FailurePolicy, UploadResult, archive_path_for, next_run_timestamp};
use crate::process::TokioCommandRunner;
use crate::stages::{
    Archiver, DumpStage, Notifier, S3ObjectStore, SesMailer, StageKind, StageOutcome,
    TarGzArchiver, UploadStage, remove_dir_if_empty, remove_path,
};
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use tracing::{Instrument, Span, error, field, info, info_span, warn};

/// 按顺序执行单个备份任务的各个阶段
///
/// 每个阶段的失败只记录在 [`RunReport`] 中，不会中断本次运行：
/// 导出 -> 压缩 -> 清理导出目录 -> 上传 -> 清理归档 -> 清理空的基础目录 -> 通知。
#[derive(Clone)]
pub struct PipelineRunner {
    dump: DumpStage,
    archiver: Arc<dyn Archiver>,
    upload: UploadStage,
    notifier: Notifier,
}

impl PipelineRunner {
    pub fn new(
        dump: DumpStage,
        archiver: Arc<dyn Archiver>,
        upload: UploadStage,
        notifier: Notifier,
    ) -> Self {
        Self {
            dump,
            archiver,
            upload,
            notifier,
        }
    }

    /// 生产环境组件：mysqldump + tar.gz + S3 + SES
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            DumpStage::new(Arc::new(TokioCommandRunner), &settings.dump_command),
            Arc::new(TarGzArchiver::new(settings.compression_level)),
            UploadStage::new(Arc::new(S3ObjectStore)),
            Notifier::new(Arc::new(SesMailer)),
        )
    }

    pub fn dump_program(&self) -> &str {
        self.dump.program()
    }

    /// 执行一次备份，`job` 是不可变快照，本次运行的状态只存在于返回的报告中
    pub async fn run(&self, job: Arc<BackupJob>) -> RunReport {
        let span = info_span!("backup", job = %job.name, working_dir = field::Empty);
        self.run_stages(&job).instrument(span).await
    }

    async fn run_stages(&self, job: &BackupJob) -> RunReport {
        let started_at = next_run_timestamp();
        let mut report = RunReport::new(&job.name, started_at);
        info!(mode = ?job.database.dump_mode(), "🚀 开始备份任务");

        let working_dir = match job.create_working_dir(&started_at).await {
            Ok(dir) => {
                Span::current().record("working_dir", field::display(dir.display()));
                info!(dir = %dir.display(), "创建工作目录");
                report.record(StageKind::Prepare, dir.display().to_string(), StageOutcome::Succeeded);
                dir
            }
            Err(e) => {
                error!(dir = %job.output_dir.display(), error = %e, "创建工作目录失败，跳过导出、压缩和上传");
                report.record(
                    StageKind::Prepare,
                    job.output_dir.display().to_string(),
                    StageOutcome::Failed(e.to_string()),
                );
                self.notify(job, None, &mut report).await;
                return finish(report);
            }
        };
        report.working_dir = Some(working_dir.clone());

        info!(stage = %StageKind::Dump, "进入阶段");
        let dump_records = self.dump.run(&job.database, &working_dir).await;
        report.records.extend(dump_records);

        info!(stage = %StageKind::Archive, "进入阶段");
        let archived = match self.archiver.archive(&working_dir).await {
            Ok(path) => {
                report.record(StageKind::Archive, working_dir.display().to_string(), StageOutcome::Succeeded);
                Some(path)
            }
            Err(e) => {
                report.record(
                    StageKind::Archive,
                    working_dir.display().to_string(),
                    StageOutcome::Failed(e.to_string()),
                );
                None
            }
        };
        report.archive_path = archived.clone();

        let artifact = match &archived {
            Some(path) => Some(UploadResult {
                artifact_path: path.clone(),
                size_bytes: artifact_size(path).await,
            }),
            None => None,
        };

        info!(stage = %StageKind::CleanupRaw, "进入阶段");
        let outcome = remove_path(&working_dir).await;
        report.record(StageKind::CleanupRaw, working_dir.display().to_string(), outcome);

        info!(stage = %StageKind::Upload, "进入阶段");
        self.upload_artifact(job, artifact.as_ref(), &mut report).await;

        // 无论上传是否成功都删除本地归档（包括压缩失败留下的残缺文件）
        info!(stage = %StageKind::CleanupArchive, "进入阶段");
        let archive_path = archive_path_for(&working_dir);
        let outcome = remove_path(&archive_path).await;
        report.record(StageKind::CleanupArchive, archive_path.display().to_string(), outcome);

        let outcome = remove_dir_if_empty(&job.output_dir).await;
        report.record(StageKind::CleanupBase, job.output_dir.display().to_string(), outcome);

        self.notify(job, artifact.as_ref(), &mut report).await;
        finish(report)
    }

    async fn upload_artifact(
        &self,
        job: &BackupJob,
        artifact: Option<&UploadResult>,
        report: &mut RunReport,
    ) {
        let Some(artifact) = artifact else {
            warn!("没有可上传的归档，跳过上传");
            report.record(StageKind::Upload, job.store.bucket.clone(), StageOutcome::skipped("没有可上传的归档"));
            return;
        };

        let subject = artifact.artifact_path.display().to_string();
        if job.on_failure == FailurePolicy::Abort
            && report.has_failures_in(&[StageKind::Dump, StageKind::Archive])
        {
            warn!(policy = job.on_failure.display_name(), "导出或压缩失败，按策略跳过上传");
            report.record(
                StageKind::Upload,
                subject,
                StageOutcome::skipped("导出或压缩失败，按 abort 策略跳过上传"),
            );
            return;
        }

        match self.upload.upload(&job.store, &artifact.artifact_path).await {
            Ok(_key) => {
                report.upload = Some(artifact.clone());
                report.record(StageKind::Upload, subject, StageOutcome::Succeeded);
            }
            Err(e) => report.record(StageKind::Upload, subject, StageOutcome::Failed(e.to_string())),
        }
    }

    async fn notify(&self, job: &BackupJob, artifact: Option<&UploadResult>, report: &mut RunReport) {
        info!(stage = %StageKind::Notify, "进入阶段");
        let failures = report.failures();
        let outcome = self.notifier.notify(job, artifact, &failures).await;
        report.record(StageKind::Notify, job.name.clone(), outcome);
    }
}

fn finish(mut report: RunReport) -> RunReport {
    report.finished_at = Some(Local::now());
    let failures = report.failures();
    if failures.is_empty() && report.upload.is_some() {
        info!(
            size = report.upload.as_ref().map(|u| u.size_bytes),
            "✅ 备份任务完成"
        );
    } else {
        warn!(failures = failures.len(), "⚠️  备份任务完成，但存在失败或跳过的阶段");
    }
    report
}

async fn artifact_size(path: &Path) -> u64 {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "读取归档大小失败");
            0
        }
    }
}
