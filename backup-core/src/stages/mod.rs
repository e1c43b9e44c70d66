// 流水线各阶段：导出、归档、清理、上传、通知
pub mod archive;
pub mod cleanup;
pub mod dump;
pub mod notify;
pub mod upload;

use crate::error::Result;
use std::fmt;

pub use archive::{Archiver, TarGzArchiver};
pub use cleanup::{remove_dir_if_empty, remove_path};
pub use dump::DumpStage;
pub use notify::{Mailer, Notifier, SesMailer};
pub use upload::{ObjectStore, S3ObjectStore, UploadStage};

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Prepare,
    Dump,
    Archive,
    CleanupRaw,
    Upload,
    CleanupArchive,
    CleanupBase,
    Notify,
}

impl StageKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            StageKind::Prepare => "创建工作目录",
            StageKind::Dump => "导出",
            StageKind::Archive => "压缩",
            StageKind::CleanupRaw => "清理导出目录",
            StageKind::Upload => "上传",
            StageKind::CleanupArchive => "清理归档",
            StageKind::CleanupBase => "清理基础目录",
            StageKind::Notify => "通知",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// 单个阶段的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Succeeded,
    Failed(String),
    Skipped(String),
}

impl StageOutcome {
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => StageOutcome::Succeeded,
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped(_))
    }
}

/// 某个阶段针对某个对象（表、目录、文件）的执行记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: StageKind,
    pub subject: String,
    pub outcome: StageOutcome,
}

impl StageRecord {
    pub fn new(stage: StageKind, subject: impl Into<String>, outcome: StageOutcome) -> Self {
        Self {
            stage,
            subject: subject.into(),
            outcome,
        }
    }
}
