use super::{StageOutcome, StageRecord};
use crate::constants::notify::CHARSET;
use crate::error::{BackupError, Result};
use crate::job::{BackupJob, StoreTarget, UploadResult};
use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sesv2::error::DisplayErrorContext;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use std::sync::Arc;
use tracing::{debug, error, info};

/// 邮件发送能力
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        store: &StoreTarget,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<()>;
}

/// 通过 AWS SES v2 发送纯文本邮件，复用任务的存储凭证与区域
#[derive(Debug, Clone, Default)]
pub struct SesMailer;

impl SesMailer {
    fn client_for(store: &StoreTarget) -> SesClient {
        let credentials = Credentials::new(
            store.access_key.clone(),
            store.secret_key.clone(),
            None,
            None,
            "backup-config",
        );
        let config = aws_sdk_sesv2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(store.region.clone()))
            .credentials_provider(credentials)
            .build();
        SesClient::from_conf(config)
    }

    fn text(data: &str) -> Result<Content> {
        Content::builder()
            .data(data)
            .charset(CHARSET)
            .build()
            .map_err(|e| BackupError::notification(format!("构建邮件内容失败: {e}")))
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(
        &self,
        store: &StoreTarget,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<()> {
        let message = Message::builder()
            .subject(Self::text(subject)?)
            .body(Body::builder().text(Self::text(body)?).build())
            .build();

        Self::client_for(store)
            .send_email()
            .from_email_address(from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| BackupError::notification(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

/// 通知阶段
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// 生成邮件主题与正文
    pub fn compose(
        job: &BackupJob,
        upload: Option<&UploadResult>,
        failures: &[StageRecord],
    ) -> (String, String) {
        let (path, size) = match upload {
            Some(result) => (result.artifact_path.display().to_string(), result.size_bytes),
            None => ("-".to_string(), 0),
        };

        if failures.is_empty() && upload.is_some() {
            let subject = format!("Backup {} completed", job.name);
            let body = format!(
                "Backup {} successfully uploaded to {}.\nFile: {}\nSize: {} bytes\n",
                job.name, job.store.bucket, path, size
            );
            return (subject, body);
        }

        let subject = format!("Backup {} failed", job.name);
        let stages = failures
            .iter()
            .map(|record| {
                let detail = match &record.outcome {
                    StageOutcome::Failed(detail) | StageOutcome::Skipped(detail) => detail.as_str(),
                    StageOutcome::Succeeded => "",
                };
                format!("- {} {}: {}\n", record.stage, record.subject, detail)
            })
            .collect::<Vec<_>>()
            .join("");
        let body = format!(
            "Backup {} finished with errors.\nFile: {}\nSize: {} bytes\nFailed stages:\n{}",
            job.name, path, size, stages
        );
        (subject, body)
    }

    /// 发件人和收件人都配置时发送一封邮件，否则跳过；失败只记录日志
    pub async fn notify(
        &self,
        job: &BackupJob,
        upload: Option<&UploadResult>,
        failures: &[StageRecord],
    ) -> StageOutcome {
        let Some((from, to)) = job.store.notification_addresses() else {
            debug!(job = %job.name, "未配置通知邮箱，跳过通知");
            return StageOutcome::skipped("未配置通知邮箱");
        };

        let (subject, body) = Self::compose(job, upload, failures);
        info!(job = %job.name, to, "发送备份通知");

        match self.mailer.send(&job.store, from, to, &subject, &body).await {
            Ok(()) => {
                info!(job = %job.name, "通知已发送");
                StageOutcome::Succeeded
            }
            Err(e) => {
                error!(job = %job.name, error = %e, "通知发送失败");
                StageOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::fixtures;
    use crate::stages::StageKind;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(
            &self,
            _store: &StoreTarget,
            from: &str,
            to: &str,
            subject: &str,
            body: &str,
        ) -> Result<()> {
            self.sent.lock().unwrap().push((
                from.to_string(),
                to.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            if self.fail {
                return Err(BackupError::notification("throttled"));
            }
            Ok(())
        }
    }

    fn upload_result() -> UploadResult {
        UploadResult {
            artifact_path: PathBuf::from("/tmp/daily_1.tar.gz"),
            size_bytes: 2048,
        }
    }

    #[test]
    fn test_compose_success_message() {
        let job = fixtures::job("daily", &[], Path::new("/tmp"), true);
        let (subject, body) = Notifier::compose(&job, Some(&upload_result()), &[]);

        assert_eq!(subject, "Backup daily completed");
        assert!(body.starts_with("Backup daily successfully"));
        assert!(body.contains("File: /tmp/daily_1.tar.gz"));
        assert!(body.contains("Size: 2048"));
    }

    #[test]
    fn test_compose_failure_lists_stages() {
        let job = fixtures::job("daily", &[], Path::new("/tmp"), true);
        let failures = vec![StageRecord::new(
            StageKind::Upload,
            "daily_1.tar.gz",
            StageOutcome::Failed("AccessDenied".to_string()),
        )];
        let (subject, body) = Notifier::compose(&job, Some(&upload_result()), &failures);

        assert_eq!(subject, "Backup daily failed");
        assert!(body.contains("AccessDenied"));
    }

    #[test]
    fn test_compose_failure_body_has_one_line_per_stage() {
        let job = fixtures::job("users", &["users", "orders"], Path::new("/tmp"), true);
        let failures = vec![
            StageRecord::new(StageKind::Dump, "shop/users", StageOutcome::Failed("exit 2".to_string())),
            StageRecord::new(StageKind::Archive, "/tmp/run", StageOutcome::Failed("disk full".to_string())),
        ];
        let (_, body) = Notifier::compose(&job, None, &failures);

        assert_eq!(
            body,
            "Backup users finished with errors.\nFile: -\nSize: 0 bytes\nFailed stages:\n\
             - 导出 shop/users: exit 2\n\
             - 压缩 /tmp/run: disk full\n"
        );
    }

    #[tokio::test]
    async fn test_notify_sends_once_with_both_addresses() {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(mailer.clone());
        let job = fixtures::job("daily", &[], Path::new("/tmp"), true);

        let outcome = notifier.notify(&job, Some(&upload_result()), &[]).await;

        assert!(outcome.is_success());
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "backup@example.com");
        assert_eq!(sent[0].1, "ops@example.com");
    }

    #[tokio::test]
    async fn test_notify_skipped_without_addresses() {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(mailer.clone());
        let job = fixtures::job("daily", &[], Path::new("/tmp"), false);

        let outcome = notifier.notify(&job, Some(&upload_result()), &[]).await;

        assert!(outcome.is_skipped());
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notify_failure_is_reported_not_raised() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let notifier = Notifier::new(mailer);
        let job = fixtures::job("daily", &[], Path::new("/tmp"), true);

        let outcome = notifier.notify(&job, None, &[]).await;
        assert!(outcome.is_failure());
    }
}
