mod check;
mod init;
mod once;
mod run;

pub use check::run_check;
pub use init::run_init;
pub use once::run_once;
pub use run::run_scheduler;
