use crate::config::ShellConfig;
use crate::executor::ProcessExecutor;
use crate::lock::PidLock;
use crate::process::{self, ProcessDescriptor};
use bootshell_core::{
    format_command, Environment, ExecutionOptions, Logger, Result, ShellError, TracingLogger,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A virtual shell that runs commands on behalf of a job.
///
/// It tracks its own working directory and environment (the agent's process
/// state is never changed), echoes commands through its [`Logger`] and
/// copies their output to its writer. A shell is meant to be driven by one
/// caller at a time; every run is independent of the previous one.
pub struct Shell {
    logger: Arc<dyn Logger>,

    /// Environment handed to every command the shell runs.
    pub env: Environment,

    pty: bool,
    debug: bool,

    /// Where command stdout goes; the agent's stdout by default.
    writer: Box<dyn AsyncWrite + Send + Unpin>,

    wd: PathBuf,
    cancel: CancellationToken,
    config: ShellConfig,
}

impl Shell {
    /// A shell in the agent's current directory with the agent's environment.
    pub fn new() -> Result<Self> {
        Self::with_config(ShellConfig::default())
    }

    pub fn with_config(config: ShellConfig) -> Result<Self> {
        let wd = std::env::current_dir()?;

        Ok(Self {
            logger: Arc::new(TracingLogger),
            env: Environment::from_os(),
            pty: config.pty,
            debug: config.debug,
            writer: Box::new(tokio::io::stdout()),
            wd,
            cancel: CancellationToken::new(),
            config,
        })
    }

    /// Use `token` to abort waits such as lock acquisition.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_writer<W>(mut self, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.writer = Box::new(writer);
        self
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn pty(&self) -> bool {
        self.pty
    }

    pub fn set_pty(&mut self, pty: bool) {
        self.pty = pty;
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn getwd(&self) -> &Path {
        &self.wd
    }

    /// Change the working directory commands run in. Relative paths are
    /// taken relative to the current one. On error the directory is left
    /// unchanged.
    pub fn chdir<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.wd.join(path)
        };

        if !path.is_dir() {
            return Err(ShellError::DirectoryNotFound { path });
        }

        self.logger
            .comment(&format!("Changing working directory to \"{}\"", path.display()));
        self.wd = path;
        Ok(())
    }

    /// Absolute path to `executable` using the shell's `PATH` and `PATHEXT`.
    pub fn absolute_path(&self, executable: &str) -> Result<PathBuf> {
        process::resolve(executable, &self.env, &self.wd)
    }

    /// Take a cross-process PID-file lock, retrying until `timeout` elapses
    /// or the shell's cancellation token fires. Relative paths are taken
    /// relative to the working directory.
    pub async fn lock_file<P: AsRef<Path>>(&self, path: P, timeout: Duration) -> Result<PidLock> {
        let path = self.wd.join(path.as_ref());
        PidLock::acquire(
            &path,
            timeout,
            self.config.lock_retry_interval(),
            &self.cancel,
            self.logger.as_ref(),
        )
        .await
    }

    /// Run a command, echoing it first and writing its output to the shell's
    /// writer.
    pub async fn run<S: AsRef<str>>(&mut self, command: &str, args: &[S]) -> Result<()> {
        self.logger.prompt(&format_command(command, args));

        let descriptor = match self.build_command(command, args) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.logger.error(&format!("Error building command: {}", err));
                return Err(err);
            }
        };

        let options = ExecutionOptions::for_run(self.pty, self.debug);
        self.executor()
            .execute(&descriptor, self.writer.as_mut(), options)
            .await
    }

    /// Run a command and return its stdout with surrounding whitespace
    /// trimmed. Stderr is discarded, or only streamed to the logger in debug
    /// mode. A PTY is never used.
    pub async fn run_and_capture<S: AsRef<str>>(&self, command: &str, args: &[S]) -> Result<String> {
        if self.debug {
            self.logger.prompt(&format_command(command, args));
        }

        let descriptor = self.build_command(command, args)?;

        let mut captured: Vec<u8> = Vec::new();
        self.executor()
            .execute(&descriptor, &mut captured, ExecutionOptions::for_capture(self.debug))
            .await?;

        Ok(String::from_utf8_lossy(&captured).trim().to_string())
    }

    /// Run an interpreted script. Scripts often lack a shebang line, so where
    /// the platform cannot execute them directly they are handed to the
    /// configured interpreter, with the path as a single argument so paths
    /// with spaces survive. `extra` is layered over the shell's environment
    /// for this run only.
    pub async fn run_script<P: AsRef<Path>>(&mut self, path: P, extra: &Environment) -> Result<()> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let (command, args) = self.config.script_mode.command_for(&path);

        self.logger.prompt(&format_command(&command, args.as_slice()));

        let descriptor = match self.build_command(&command, args.as_slice()) {
            Ok(descriptor) => descriptor.with_extra_env(extra),
            Err(err) => {
                self.logger.error(&format!("Error building command: {}", err));
                return Err(err);
            }
        };

        let options = ExecutionOptions::for_run(self.pty, self.debug);
        self.executor()
            .execute(&descriptor, self.writer.as_mut(), options)
            .await
    }

    /// Resolve `name` and freeze the current environment and working
    /// directory into a descriptor.
    pub fn build_command<S: AsRef<str>>(&self, name: &str, args: &[S]) -> Result<ProcessDescriptor> {
        let descriptor = process::build_command(name, args, &self.env, &self.wd)?;
        debug!(command = %descriptor.display(), dir = %self.wd.display(), "Built command");
        Ok(descriptor)
    }

    fn executor(&self) -> ProcessExecutor {
        ProcessExecutor::new(self.logger.clone(), self.debug)
    }
}
