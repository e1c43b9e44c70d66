use crate::app::CliApp;
use backup_core::cron::CronSchedule;
use backup_core::error::Result;
use backup_core::job::DumpMode;
use chrono::{DateTime, Local};
use tracing::{info, warn};

/// 显示每个任务接下来的执行时间
pub fn run_check(app: &CliApp, count: usize) -> Result<()> {
    info!("✅ 配置校验通过: {}", app.config_path.display());

    for (name, times) in upcoming_fire_times(app, &Local::now(), count)? {
        if let Some(job) = app.jobs.iter().find(|j| j.name == name) {
            let target = match job.database.dump_mode() {
                DumpMode::WholeDatabase => job.database.database.clone(),
                DumpMode::Tables => format!("{} ({})", job.database.database, job.database.tables.join(", ")),
            };
            info!("📋 {} [{}] {} -> s3://{}", job.name, job.cron, target, job.store.bucket);
        }

        if times.is_empty() {
            warn!("   ⚠️  没有未来的执行时间");
        }
        for time in times {
            info!("   ⏰ {}", time.format("%Y-%m-%d %H:%M:%S %Z"));
        }
    }
    Ok(())
}

fn upcoming_fire_times(
    app: &CliApp,
    after: &DateTime<Local>,
    count: usize,
) -> Result<Vec<(String, Vec<DateTime<Local>>)>> {
    app.jobs
        .iter()
        .map(|job| {
            let schedule = CronSchedule::parse(&job.cron)?;
            Ok((job.name.clone(), schedule.upcoming(after, count)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::once::tests::test_app;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_upcoming_fire_times_per_job() {
        let temp_dir = tempdir().unwrap();
        let mut app = test_app(temp_dir.path(), &["daily", "hourly"]);
        app.jobs[1].cron = "0 * * * *".to_string();

        let after = Local.with_ymd_and_hms(2025, 3, 10, 12, 30, 0).unwrap();
        let times = upcoming_fire_times(&app, &after, 3).unwrap();

        assert_eq!(times.len(), 2);
        assert_eq!(times[0].0, "daily");
        assert_eq!(times[0].1.len(), 3);
        assert_eq!(times[0].1[0], Local.with_ymd_and_hms(2025, 3, 11, 2, 0, 0).unwrap());
        assert_eq!(times[1].1[0], Local.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap());
        assert!(run_check(&app, 2).is_ok());
    }
}
