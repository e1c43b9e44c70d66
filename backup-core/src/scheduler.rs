use crate::constants::cron::MAX_IDLE_SLEEP_SECS;
use crate::cron::CronSchedule;
use crate::error::{BackupError, Result};
use crate::job::BackupJob;
use crate::pipeline::{PipelineRunner, RunSummary};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// 已注册到调度器的任务
struct ScheduledJob {
    job: Arc<BackupJob>,
    schedule: CronSchedule,
    /// 同一任务上一次运行尚未结束时为 true
    running: Arc<AtomicBool>,
}

/// 调度器读取当前时间的方式，默认为 `Local::now`
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// 运行结束（包括 panic）时清除运行标记
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 多任务 cron 调度器
///
/// 每次触发都在独立的 tokio 任务中运行流水线，不同任务可以并行；
/// 同一任务上一次运行未结束时跳过本次触发。
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    pipeline: Arc<PipelineRunner>,
    tracker: TaskTracker,
    clock: Clock,
}

impl Scheduler {
    /// 校验所有任务的 cron 表达式并注册，任意一个无效都会返回错误
    pub fn new(jobs: Vec<BackupJob>, pipeline: Arc<PipelineRunner>) -> Result<Self> {
        let mut scheduled = Vec::with_capacity(jobs.len());
        for job in jobs {
            let schedule = CronSchedule::parse(&job.cron)
                .map_err(|e| BackupError::config(format!("[{}] {e}", job.name)))?;
            info!(job = %job.name, cron = %schedule.expression(), "注册备份任务");
            scheduled.push(ScheduledJob {
                job: Arc::new(job),
                schedule,
                running: Arc::new(AtomicBool::new(false)),
            });
        }

        Ok(Self {
            jobs: scheduled,
            pipeline,
            tracker: TaskTracker::new(),
            clock: Arc::new(Local::now),
        })
    }

    /// 替换时间来源，休眠仍然使用 tokio 的计时器
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// 每个任务在 `after` 之后的下一次触发时间
    pub fn next_fire_times(&self, after: &DateTime<Local>) -> Vec<(String, Option<DateTime<Local>>)> {
        self.jobs
            .iter()
            .map(|entry| (entry.job.name.clone(), entry.schedule.next_after(after)))
            .collect()
    }

    /// 同一任务是否正在运行
    pub fn is_running(&self, name: &str) -> bool {
        self.jobs
            .iter()
            .any(|entry| entry.job.name == name && entry.running.load(Ordering::Acquire))
    }

    /// 主调度循环，直到 `shutdown` 被取消；返回前等待所有正在执行的备份完成
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(jobs = self.jobs.len(), "⏰ 调度器启动");

        let started = (self.clock)();
        let mut next_fires: Vec<Option<DateTime<Local>>> = self
            .jobs
            .iter()
            .map(|entry| {
                let next = entry.schedule.next_after(&started);
                match next {
                    Some(at) => info!(job = %entry.job.name, next = %at, "下一次执行时间"),
                    None => warn!(job = %entry.job.name, "cron 表达式没有未来的触发时间"),
                }
                next
            })
            .collect();

        loop {
            let sleep_duration = time_until(next_fires.iter().flatten().min(), (self.clock)());
            debug!(?sleep_duration, "调度器休眠");

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {}
                _ = shutdown.cancelled() => {
                    info!("调度器收到停止信号，不再触发新的备份");
                    break;
                }
            }

            let now = (self.clock)();
            for (entry, next) in self.jobs.iter().zip(next_fires.iter_mut()) {
                let due = match next {
                    Some(at) => *at <= now,
                    None => false,
                };
                if !due {
                    continue;
                }

                self.dispatch(entry);
                *next = entry.schedule.next_after(&now);
                if let Some(at) = next {
                    debug!(job = %entry.job.name, next = %at, "下一次执行时间");
                }
            }
        }

        self.drain().await;
        info!("调度器已停止");
    }

    /// 立即触发指定任务，返回是否真正启动了新的运行
    pub fn trigger(&self, name: &str) -> Result<bool> {
        let entry = self
            .jobs
            .iter()
            .find(|entry| entry.job.name == name)
            .ok_or_else(|| BackupError::config(format!("备份任务不存在: {name}")))?;
        Ok(self.dispatch(entry))
    }

    /// 停止接收新的运行并等待正在执行的运行结束
    pub async fn drain(&self) {
        self.tracker.close();
        if !self.tracker.is_empty() {
            info!(in_flight = self.tracker.len(), "等待正在执行的备份任务完成");
        }
        self.tracker.wait().await;
    }

    fn dispatch(&self, entry: &ScheduledJob) -> bool {
        if entry
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(job = %entry.job.name, "上一次备份尚未结束，跳过本次触发");
            return false;
        }

        let guard = RunningGuard(Arc::clone(&entry.running));
        let job = Arc::clone(&entry.job);
        let pipeline = Arc::clone(&self.pipeline);
        info!(job = %job.name, "触发备份任务");

        self.tracker.spawn(async move {
            let _guard = guard;
            let report = pipeline.run(job).await;
            let summary = RunSummary::from_reports([&report]);
            info!(
                job = %report.job_name,
                dumps = %summary.dumps,
                compressions = %summary.compressions,
                uploads = %summary.uploads,
                notifications = %summary.notifications,
                "本次备份统计"
            );
        });
        true
    }
}

fn time_until(next: Option<&DateTime<Local>>, now: DateTime<Local>) -> Duration {
    let max_idle = Duration::from_secs(MAX_IDLE_SLEEP_SECS);
    match next {
        Some(at) => (*at - now).to_std().unwrap_or(Duration::ZERO).min(max_idle),
        None => max_idle,
    }
}
