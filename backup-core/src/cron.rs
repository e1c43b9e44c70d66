use crate::constants::cron::CRON_FIELDS_COUNT;
use crate::error::{BackupError, Result};
use chrono::{DateTime, TimeZone};
use croner::Cron;

/// 已校验的五段式 cron 表达式（分 时 日 月 周）
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        validate_field_count(expression)?;

        let normalized = expression.split_whitespace().collect::<Vec<_>>().join(" ");
        let cron = Cron::new(&normalized)
            .parse()
            .map_err(|e| BackupError::cron(expression, e.to_string()))?;

        Ok(Self {
            expression: normalized,
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 严格晚于 `after` 的下一次触发时间
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.cron.find_next_occurrence(after, false).ok()
    }

    /// 从 `after` 开始的后续 `count` 次触发时间
    pub fn upcoming<Tz: TimeZone>(&self, after: &DateTime<Tz>, count: usize) -> Vec<DateTime<Tz>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = after.clone();
        while times.len() < count {
            match self.next_after(&cursor) {
                Some(next) => {
                    cursor = next.clone();
                    times.push(next);
                }
                None => break,
            }
        }
        times
    }
}

/// 标准cron表达式应该有5个字段: 分 时 日 月 周
pub fn validate_field_count(expression: &str) -> Result<()> {
    let fields = expression.split_whitespace().count();
    if fields != CRON_FIELDS_COUNT {
        return Err(BackupError::cron(
            expression,
            format!("需要 {CRON_FIELDS_COUNT} 个字段，实际为 {fields} 个"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Utc};

    #[test]
    fn test_rejects_wrong_field_count() {
        for expr in ["", "* * * *", "0 0 2 * * *", "@daily"] {
            let err = CronSchedule::parse(expr).unwrap_err();
            assert!(matches!(err, BackupError::Cron { .. }), "{expr}");
        }
    }

    #[test]
    fn test_rejects_invalid_field_values() {
        assert!(CronSchedule::parse("61 2 * * *").is_err());
        assert!(CronSchedule::parse("0 25 * * *").is_err());
    }

    #[test]
    fn test_normalizes_whitespace() {
        let schedule = CronSchedule::parse("  0   2 *  * * ").unwrap();
        assert_eq!(schedule.expression(), "0 2 * * *");
    }

    #[test]
    fn test_next_after_daily() {
        let schedule = CronSchedule::parse("0 2 * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 12, 30, 0).unwrap();

        let next = schedule.next_after(&start).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 11, 2, 0, 0).unwrap());
    }

    #[test]
    fn test_next_after_is_strict() {
        let schedule = CronSchedule::parse("*/15 * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 12, 30, 0).unwrap();

        let next = schedule.next_after(&start).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 10, 12, 45, 0).unwrap());
    }

    #[test]
    fn test_upcoming_returns_increasing_times() {
        let schedule = CronSchedule::parse("0 * * * *").unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 12, 30, 0).unwrap();

        let times = schedule.upcoming(&start, 3);
        assert_eq!(times.len(), 3);
        assert_eq!(
            times.iter().map(|t| t.hour()).collect::<Vec<_>>(),
            vec![13, 14, 15]
        );
    }
}
