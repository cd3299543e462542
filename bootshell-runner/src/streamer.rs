use bootshell_core::Logger;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Streams raw output bytes to a logger one line at a time.
///
/// Writes never wait on the logger: bytes are queued and a background task
/// splits them into lines. [`LoggerStreamer::close`] flushes any trailing
/// partial line and waits for the task, so everything written before the
/// close has reached the logger once it returns.
pub struct LoggerStreamer {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    task: JoinHandle<()>,
}

impl LoggerStreamer {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let task = tokio::spawn(async move {
            let mut pending: Vec<u8> = Vec::new();
            while let Some(chunk) = rx.recv().await {
                pending.extend_from_slice(&chunk);
                while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    logger.printf(&decode_line(&line));
                }
            }
            if !pending.is_empty() {
                logger.printf(&decode_line(&pending));
            }
        });

        Self { tx, task }
    }

    pub fn write(&self, bytes: &[u8]) {
        if !bytes.is_empty() {
            let _ = self.tx.send(bytes.to_vec());
        }
    }

    pub async fn close(self) {
        let Self { tx, task } = self;
        drop(tx);
        let _ = task.await;
    }
}

fn decode_line(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    text.trim_end_matches(['\n', '\r']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootshell_core::{BufferLogger, LogKind};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_splits_lines_across_chunks() {
        let logger = Arc::new(BufferLogger::new());
        let streamer = LoggerStreamer::new(logger.clone());

        streamer.write(b"first li");
        streamer.write(b"ne\r\nsecond\nthi");
        streamer.write(b"rd");
        streamer.close().await;

        assert_eq!(
            logger.messages(LogKind::Printf),
            vec!["first line".to_string(), "second".to_string(), "third".to_string()]
        );
    }

    #[tokio::test]
    async fn test_close_without_output_logs_nothing() {
        let logger = Arc::new(BufferLogger::new());
        LoggerStreamer::new(logger.clone()).close().await;
        assert!(logger.lines().is_empty());
    }
}
