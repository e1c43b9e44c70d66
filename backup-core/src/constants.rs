/// 定时任务相关常量
pub mod cron {
    /// Cron表达式字段数量
    pub const CRON_FIELDS_COUNT: usize = 5;

    /// 调度器在没有任何任务到期时的最长休眠时间（秒）
    pub const MAX_IDLE_SLEEP_SECS: u64 = 60;
}

/// 数据库导出相关常量
pub mod dump {
    /// 默认导出工具
    pub const DEFAULT_DUMP_COMMAND: &str = "mysqldump";

    /// 默认 MySQL 端口
    pub const DEFAULT_MYSQL_PORT: u16 = 3306;

    /// 传递密码的环境变量，避免密码出现在进程参数中
    pub const PASSWORD_ENV: &str = "MYSQL_PWD";

    /// 导出一致性与存储过程/触发器相关参数
    pub const CONSISTENCY_FLAGS: &[&str] = &["-R", "-e", "--triggers", "--single-transaction"];

    /// 导出文件扩展名
    pub const DUMP_FILE_EXTENSION: &str = "sql";
}

/// 归档相关常量
pub mod archive {
    /// 归档文件后缀
    pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

    /// 默认压缩级别 (0-9)
    pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

    /// 最大压缩级别
    pub const MAX_COMPRESSION_LEVEL: u32 = 9;
}

/// 工作目录相关常量
pub mod workdir {
    /// 工作目录时间戳格式（精确到微秒）
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%6f";

    /// 同名工作目录已存在时的最大重试次数
    pub const MAX_CREATE_ATTEMPTS: u32 = 100;
}

/// 通知相关常量
pub mod notify {
    /// 邮件字符集
    pub const CHARSET: &str = "UTF-8";
}

/// 应用配置相关常量
pub mod config {
    /// 默认配置文件名
    pub const CONFIG_FILE_NAME: &str = "config.yaml";

    /// 按优先级查找的配置文件
    pub const CONFIG_FILE_CANDIDATES: &[&str] = &["config.yaml", "config.yml", "backup.yaml", "config.toml"];

    /// 日志文件环境变量
    pub const LOG_FILE_ENV: &str = "BACKUP_LOG_FILE";
}
