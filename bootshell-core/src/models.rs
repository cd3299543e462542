use serde::{Deserialize, Serialize};

/// How a child's output is wired up for one invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Stdout to the output sink, stderr and stdin discarded.
    Pipe,
    /// Like `Pipe`, but stdout and stderr are also streamed line by line to
    /// the logger.
    Debug,
    /// Attached to a pseudo-terminal; stdout and stderr arrive as a single
    /// combined stream.
    Pty,
}

/// Options for a single invocation. Never mutated after creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub mode: ExecutionMode,
}

impl ExecutionOptions {
    /// Wiring for an interactive run: a PTY wins over debug streaming.
    pub fn for_run(pty: bool, debug: bool) -> Self {
        let mode = if pty {
            ExecutionMode::Pty
        } else if debug {
            ExecutionMode::Debug
        } else {
            ExecutionMode::Pipe
        };
        Self { mode }
    }

    /// Wiring for a run whose stdout is parsed by the caller. A PTY is never
    /// used since it would mix stderr into the captured text.
    pub fn for_capture(debug: bool) -> Self {
        let mode = if debug {
            ExecutionMode::Debug
        } else {
            ExecutionMode::Pipe
        };
        Self { mode }
    }

    pub fn is_pty(&self) -> bool {
        self.mode == ExecutionMode::Pty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_wins_over_debug() {
        assert_eq!(ExecutionOptions::for_run(true, true).mode, ExecutionMode::Pty);
        assert_eq!(ExecutionOptions::for_run(false, true).mode, ExecutionMode::Debug);
        assert_eq!(ExecutionOptions::for_run(false, false).mode, ExecutionMode::Pipe);
    }

    #[test]
    fn test_capture_never_uses_pty() {
        assert!(!ExecutionOptions::for_capture(true).is_pty());
        assert!(!ExecutionOptions::for_capture(false).is_pty());
    }
}
