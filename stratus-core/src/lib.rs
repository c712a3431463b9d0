pub mod args;
pub mod command;
pub mod job;
pub mod output;
pub mod restic;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
