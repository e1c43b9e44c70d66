use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("无效的cron表达式 '{expression}': {reason}")]
    Cron { expression: String, reason: String },

    #[error("YAML 解析错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML 解析错误: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("目录遍历错误: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("外部命令执行失败: {0}")]
    ExternalTool(String),

    #[error("上传失败: {0}")]
    Upload(String),

    #[error("通知发送失败: {0}")]
    Notification(String),

    #[error("自定义错误: {0}")]
    Custom(String),
}

impl BackupError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn cron(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cron {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    pub fn external_tool(msg: impl Into<String>) -> Self {
        Self::ExternalTool(msg.into())
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// 是否属于启动阶段的致命错误（配置或 cron 校验失败）
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Cron { .. } | Self::Yaml(_) | Self::Toml(_)
        )
    }
}
