pub mod env;
pub mod error;
pub mod format;
pub mod logger;
pub mod models;

pub use env::Environment;
pub use error::{ExitFailure, Result, ShellError};
pub use format::format_command;
pub use logger::{BufferLogger, LogKind, LogLine, Logger, StderrLogger, TracingLogger};
pub use models::{ExecutionMode, ExecutionOptions};
