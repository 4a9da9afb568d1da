/// Installs the process-wide `tracing` subscriber with stdout and file output.
pub mod loggerlocal;

pub use loggerlocal::{rotate_logs, LoggerError, LoggerLocal, LoggerLocalOptions};
