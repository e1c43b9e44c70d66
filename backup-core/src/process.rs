use crate::error::{BackupError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// 待执行的外部命令
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// 额外的环境变量（可能包含密码，不会出现在日志中）
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.envs.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("envs", &env_keys)
            .finish()
    }
}

/// 外部命令的执行结果
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stderr: String,
}

impl CommandOutput {
    pub fn succeeded() -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            success: false,
            stderr: stderr.into(),
        }
    }

    /// 非零退出码转换为 `ExternalTool` 错误
    pub fn ensure_success(&self, spec: &CommandSpec) -> Result<()> {
        if self.success {
            return Ok(());
        }

        let code = self
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "被信号终止".to_string());
        let stderr = self.stderr.trim();
        Err(BackupError::external_tool(if stderr.is_empty() {
            format!("{} 退出码: {code}", spec.program)
        } else {
            format!("{} 退出码: {code}, 错误输出: {stderr}", spec.program)
        }))
    }
}

/// 运行外部命令的能力，测试中可替换为替身实现
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// 执行命令并等待结束；`stdout_path` 存在时标准输出写入该文件
    async fn run(&self, spec: &CommandSpec, stdout_path: Option<&Path>) -> Result<CommandOutput>;
}

/// 基于 tokio::process 的默认实现
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec, stdout_path: Option<&Path>) -> Result<CommandOutput> {
        let stdout = match stdout_path {
            Some(path) => Stdio::from(std::fs::File::create(path)?),
            None => Stdio::null(),
        };

        // output() 会强制捕获 stdout，这里必须 spawn 后再等待
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackupError::external_tool(format!("无法启动 {}: {e}", spec.program)))?;
        let output = child.wait_with_output().await?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// 在 PATH 中查找外部命令
pub fn locate_program(program: &str) -> Result<PathBuf> {
    which::which(program)
        .map_err(|e| BackupError::external_tool(format!("{program} 未安装或不在 PATH 中: {e}")))
}
