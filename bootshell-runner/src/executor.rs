use crate::process::ProcessDescriptor;
use crate::pty;
use crate::signals::SignalRelay;
use crate::streamer::LoggerStreamer;
use bootshell_core::{ExecutionMode, ExecutionOptions, ExitFailure, Logger, Result, ShellError};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Output sink a command's stdout is copied into.
pub type OutputSink<'a> = &'a mut (dyn AsyncWrite + Send + Unpin);

/// Runs process descriptors to completion.
///
/// Each call owns the child, a signal relay forwarding interruptions to it
/// and the output copies; all of them are finished before the call returns.
#[derive(Clone)]
pub struct ProcessExecutor {
    logger: Arc<dyn Logger>,
    debug: bool,
}

struct DebugStreams<'a> {
    stdout: &'a LoggerStreamer,
    stderr: &'a LoggerStreamer,
}

impl ProcessExecutor {
    pub fn new(logger: Arc<dyn Logger>, debug: bool) -> Self {
        Self { logger, debug }
    }

    pub async fn execute(
        &self,
        descriptor: &ProcessDescriptor,
        sink: OutputSink<'_>,
        options: ExecutionOptions,
    ) -> Result<()> {
        let execution_id = Uuid::new_v4();
        info!(
            execution_id = %execution_id,
            command = %descriptor.display(),
            mode = ?options.mode,
            "Executing command"
        );

        let mut relay = SignalRelay::install(self.logger.clone());

        let result = match options.mode {
            ExecutionMode::Pty => self.execute_pty(descriptor, sink, &mut relay).await,
            ExecutionMode::Pipe => self.execute_pipe(descriptor, sink, &mut relay, None).await,
            ExecutionMode::Debug => {
                let stdout = LoggerStreamer::new(self.logger.clone());
                let stderr = LoggerStreamer::new(self.logger.clone());
                let streams = DebugStreams {
                    stdout: &stdout,
                    stderr: &stderr,
                };
                let result = self
                    .execute_pipe(descriptor, sink, &mut relay, Some(streams))
                    .await;
                stdout.close().await;
                stderr.close().await;
                result
            }
        };

        relay.stop().await;

        match &result {
            Ok(()) => info!(execution_id = %execution_id, "Command completed"),
            Err(err) => {
                warn!(execution_id = %execution_id, error = %err, "Command failed");
                if self.debug {
                    self.logger.printf(&format!("Exited with error: {}", err));
                }
            }
        }

        result
    }

    async fn execute_pipe(
        &self,
        descriptor: &ProcessDescriptor,
        sink: OutputSink<'_>,
        relay: &mut SignalRelay,
        streams: Option<DebugStreams<'_>>,
    ) -> Result<()> {
        let mut command = descriptor.to_command();
        command.stdout(Stdio::piped());
        command.stderr(if streams.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command.spawn().map_err(|source| ShellError::Spawn {
            command: descriptor.display().to_string(),
            source,
        })?;
        if let Some(pid) = child.id() {
            debug!(pid, "Spawned child process");
            relay.attach(pid);
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_streamer = streams.as_ref().map(|s| s.stdout);
        let stderr_streamer = streams.as_ref().map(|s| s.stderr);

        let copy_stdout = async {
            match stdout {
                Some(reader) => copy_output(reader, Some(&mut *sink), stdout_streamer).await,
                None => Ok(()),
            }
        };
        let copy_stderr = async {
            match (stderr, stderr_streamer) {
                (Some(reader), Some(streamer)) => copy_output(reader, None, Some(streamer)).await,
                _ => Ok(()),
            }
        };
        let (stdout_result, stderr_result) = tokio::join!(copy_stdout, copy_stderr);

        let status = child.wait().await?;
        if let Some(failure) = ExitFailure::from_status(status) {
            return Err(ShellError::CommandExecution {
                command: descriptor.display().to_string(),
                source: failure,
            });
        }

        stdout_result?;
        stderr_result?;
        Ok(())
    }

    async fn execute_pty(
        &self,
        descriptor: &ProcessDescriptor,
        sink: OutputSink<'_>,
        relay: &mut SignalRelay,
    ) -> Result<()> {
        let process = pty::start(descriptor)?;
        if let Some(pid) = process.pid() {
            debug!(pid, "Spawned child process on PTY");
            relay.attach(pid);
        }
        let pty::PtyProcess {
            reader,
            mut child,
            master,
        } = process;

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
        let pump = tokio::task::spawn_blocking(move || pty::pump(reader, tx));

        // Keep draining after a failed write so the child never blocks on a
        // full terminal buffer.
        let mut write_result: io::Result<()> = Ok(());
        while let Some(chunk) = rx.recv().await {
            if write_result.is_ok() {
                write_result = sink.write_all(&chunk).await;
            }
        }
        if write_result.is_ok() {
            write_result = sink.flush().await;
        }
        let read_result = pump.await.map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

        let status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))??;
        drop(master);

        if let Some(failure) = pty::exit_failure(&status) {
            return Err(ShellError::CommandExecution {
                command: descriptor.display().to_string(),
                source: failure,
            });
        }

        read_result?;
        write_result?;
        Ok(())
    }
}

/// Copy `reader` to the optional sink and streamer until end-of-stream.
async fn copy_output<R>(
    mut reader: R,
    mut sink: Option<&mut (dyn AsyncWrite + Send + Unpin)>,
    streamer: Option<&LoggerStreamer>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if let Some(streamer) = streamer {
            streamer.write(&buf[..n]);
        }
        if let Some(sink) = sink.as_mut() {
            sink.write_all(&buf[..n]).await?;
        }
    }
    if let Some(sink) = sink.as_mut() {
        sink.flush().await?;
    }
    Ok(())
}
