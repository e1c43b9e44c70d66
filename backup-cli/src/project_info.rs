/// 项目元数据（自动从 backup-cli 的 Cargo.toml 同步）
pub mod metadata {
    /// 项目描述
    pub const PROJECT_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

    /// 项目作者
    pub const PROJECT_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

    pub mod display {
        /// CLI 工具的完整名称
        pub const CLI_FULL_NAME: &str = "MySQL Backup CLI";

        /// 项目详细描述
        pub const DESCRIPTION_LONG: &str = "按 cron 表达式定时导出 MySQL 数据库（整库或指定表），打包为 tar.gz 上传到 S3 兼容存储，清理本地文件后通过邮件通知结果";
    }
}

/// 版本信息
pub mod version_info {
    /// CLI 版本
    pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// 获取版本信息字符串
pub fn get_version_string() -> String {
    format!("{} v{}", metadata::display::CLI_FULL_NAME, version_info::CLI_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_contains_name_and_version() {
        let version = get_version_string();
        assert!(version.starts_with(metadata::display::CLI_FULL_NAME));
        assert!(version.ends_with(&format!("v{}", version_info::CLI_VERSION)));
    }
}
