pub mod config;
pub mod executor;
pub mod exit;
pub mod lock;
pub mod output;
pub mod process;
pub mod pty;
pub mod resolver;
pub mod shell;
pub mod signals;
pub mod streamer;

pub use config::{ConfigError, ScriptMode, ShellConfig};
pub use executor::{OutputSink, ProcessExecutor};
pub use exit::{exit_code, exit_code_of};
pub use lock::PidLock;
pub use output::SharedBuffer;
pub use process::{build_command, ProcessDescriptor};
pub use resolver::{look_path, parse_extensions};
pub use shell::Shell;
pub use signals::SignalRelay;
pub use streamer::LoggerStreamer;
