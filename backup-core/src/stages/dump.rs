use super::{StageKind, StageOutcome, StageRecord};
use crate::constants::dump;
use crate::error::Result;
use crate::job::{DatabaseTarget, DumpMode};
use crate::process::{CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// 导出阶段：整库导出或逐表导出
#[derive(Clone)]
pub struct DumpStage {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl DumpStage {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn base_command(&self, db: &DatabaseTarget) -> CommandSpec {
        let spec = CommandSpec::new(&self.program).args([
            format!("-h{}", db.host),
            format!("-P{}", db.port),
            format!("-u{}", db.user),
        ]);
        if db.password.is_empty() {
            spec
        } else {
            spec.env(dump::PASSWORD_ENV, &db.password)
        }
    }

    /// 整库导出命令
    pub fn database_command(&self, db: &DatabaseTarget) -> CommandSpec {
        self.base_command(db)
            .arg(&db.database)
            .args(dump::CONSISTENCY_FLAGS.iter().copied())
    }

    /// 单表导出命令
    pub fn table_command(&self, db: &DatabaseTarget, table: &str) -> CommandSpec {
        self.base_command(db)
            .arg(&db.database)
            .arg(table)
            .args(dump::CONSISTENCY_FLAGS.iter().copied())
    }

    /// 按导出模式执行，每个导出独立记录结果，失败不影响后续导出
    pub async fn run(&self, db: &DatabaseTarget, working_dir: &Path) -> Vec<StageRecord> {
        match db.dump_mode() {
            DumpMode::WholeDatabase => {
                let result = self.dump_database(db, working_dir).await;
                vec![StageRecord::new(
                    StageKind::Dump,
                    db.database.clone(),
                    StageOutcome::from_result(&result),
                )]
            }
            DumpMode::Tables => {
                let mut records = Vec::with_capacity(db.tables.len());
                for table in &db.tables {
                    let result = self.dump_table(db, working_dir, table).await;
                    records.push(StageRecord::new(
                        StageKind::Dump,
                        format!("{}/{}", db.database, table),
                        StageOutcome::from_result(&result),
                    ));
                }
                records
            }
        }
    }

    /// 导出整个数据库到 `<working_dir>/<database>.sql`
    pub async fn dump_database(&self, db: &DatabaseTarget, working_dir: &Path) -> Result<PathBuf> {
        let output_file = working_dir.join(db.database_dump_file_name());
        let spec = self.database_command(db);

        info!(database = %db.database, "开始导出数据库");
        self.execute(&spec, &output_file, &db.database).await
    }

    /// 导出单张表到 `<working_dir>/<database>_<table>.sql`
    pub async fn dump_table(
        &self,
        db: &DatabaseTarget,
        working_dir: &Path,
        table: &str,
    ) -> Result<PathBuf> {
        let output_file = working_dir.join(db.table_dump_file_name(table));
        let spec = self.table_command(db, table);
        let subject = format!("{}/{}", db.database, table);

        info!(table = %subject, "开始导出数据表");
        self.execute(&spec, &output_file, &subject).await
    }

    async fn execute(&self, spec: &CommandSpec, output_file: &Path, subject: &str) -> Result<PathBuf> {
        let result = match self.runner.run(spec, Some(output_file)).await {
            Ok(output) => output.ensure_success(spec),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(subject, file = %output_file.display(), "导出完成");
                Ok(output_file.to_path_buf())
            }
            Err(e) => {
                error!(subject, error = %e, "导出失败");
                Err(e)
            }
        }
    }
}
