use crate::job::UploadResult;
use crate::stages::{StageKind, StageOutcome, StageRecord};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;

/// 单次流水线运行的结果，由调用方汇总
#[derive(Debug, Clone)]
pub struct RunReport {
    pub job_name: String,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub working_dir: Option<PathBuf>,
    pub archive_path: Option<PathBuf>,
    pub upload: Option<UploadResult>,
    pub records: Vec<StageRecord>,
}

impl RunReport {
    pub fn new(job_name: impl Into<String>, started_at: DateTime<Local>) -> Self {
        Self {
            job_name: job_name.into(),
            started_at,
            finished_at: None,
            working_dir: None,
            archive_path: None,
            upload: None,
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: StageKind, subject: impl Into<String>, outcome: StageOutcome) {
        self.records.push(StageRecord::new(stage, subject, outcome));
    }

    pub fn records_for(&self, stage: StageKind) -> impl Iterator<Item = &StageRecord> {
        self.records.iter().filter(move |r| r.stage == stage)
    }

    /// 某阶段的第一条记录
    pub fn outcome_of(&self, stage: StageKind) -> Option<&StageOutcome> {
        self.records_for(stage).next().map(|r| &r.outcome)
    }

    pub fn failures(&self) -> Vec<StageRecord> {
        self.records
            .iter()
            .filter(|r| r.outcome.is_failure())
            .cloned()
            .collect()
    }

    pub fn has_failures_in(&self, stages: &[StageKind]) -> bool {
        self.records
            .iter()
            .any(|r| stages.contains(&r.stage) && r.outcome.is_failure())
    }

    pub fn is_success(&self) -> bool {
        self.upload.is_some() && self.records.iter().all(|r| !r.outcome.is_failure())
    }
}

/// 成功数 / 总数（跳过的不计入总数）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTally {
    pub succeeded: usize,
    pub total: usize,
}

impl StageTally {
    fn add(&mut self, outcome: &StageOutcome) {
        match outcome {
            StageOutcome::Succeeded => {
                self.succeeded += 1;
                self.total += 1;
            }
            StageOutcome::Failed(_) => self.total += 1,
            StageOutcome::Skipped(_) => {}
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

impl fmt::Display for StageTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.succeeded, self.total)
    }
}

/// 多次运行的汇总统计，手动执行一轮备份后输出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub runs: usize,
    pub dumps: StageTally,
    pub compressions: StageTally,
    pub uploads: StageTally,
    pub notifications: StageTally,
}

impl RunSummary {
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a RunReport>) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.add(report);
        }
        summary
    }

    pub fn add(&mut self, report: &RunReport) {
        self.runs += 1;
        for record in &report.records {
            let tally = match record.stage {
                StageKind::Dump => &mut self.dumps,
                StageKind::Archive => &mut self.compressions,
                StageKind::Upload => &mut self.uploads,
                StageKind::Notify => &mut self.notifications,
                _ => continue,
            };
            tally.add(&record.outcome);
        }
    }

    pub fn has_failures(&self) -> bool {
        [self.dumps, self.compressions, self.uploads, self.notifications]
            .iter()
            .any(|t| t.failed() > 0)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dumps: {}", self.dumps)?;
        writeln!(f, "compressions: {}", self.compressions)?;
        writeln!(f, "uploads: {}", self.uploads)?;
        write!(f, "notifications: {}", self.notifications)
    }
}
