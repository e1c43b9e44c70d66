pub mod config;
pub mod constants;
pub mod cron;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod process;
pub mod scheduler;
pub mod stages;

pub use error::{BackupError, Result};
