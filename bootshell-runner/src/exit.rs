use bootshell_core::{ExitFailure, ShellError};
use std::error::Error;

/// Numeric exit status for the outcome of a command.
///
/// `None` is success (0). Otherwise the error and its `source()` chain are
/// searched for the process's exit failure, so errors that callers wrapped in
/// extra context still yield the child's own status. A process killed by a
/// signal has no status and maps to -1. Any other error maps to 1.
pub fn exit_code(error: Option<&(dyn Error + 'static)>) -> i32 {
    let Some(error) = error else {
        return 0;
    };

    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(failure) = err.downcast_ref::<ExitFailure>() {
            return failure.code.unwrap_or(-1);
        }
        current = err.source();
    }

    1
}

/// [`exit_code`] for a shell result.
pub fn exit_code_of<T>(result: &Result<T, ShellError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => exit_code(Some(err as &(dyn Error + 'static))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Context {
        inner: ShellError,
    }

    impl fmt::Display for Context {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "while running the checkout hook")
        }
    }

    impl Error for Context {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.inner)
        }
    }

    fn failed(code: Option<i32>) -> ShellError {
        ShellError::CommandExecution {
            command: "make".to_string(),
            source: ExitFailure { code, signal: None },
        }
    }

    #[test]
    fn test_no_error_is_zero() {
        assert_eq!(exit_code(None), 0);
        assert_eq!(exit_code_of(&Ok::<(), ShellError>(())), 0);
    }

    #[test]
    fn test_native_status_is_used() {
        assert_eq!(exit_code_of::<()>(&Err(failed(Some(3)))), 3);
    }

    #[test]
    fn test_wrapped_error_is_unwrapped() {
        let wrapped = Context { inner: failed(Some(42)) };
        assert_eq!(exit_code(Some(&wrapped as &(dyn Error + 'static))), 42);
    }

    #[test]
    fn test_signal_without_status() {
        assert_eq!(exit_code_of::<()>(&Err(failed(None))), -1);
    }

    #[test]
    fn test_other_errors_are_one() {
        let err = ShellError::NotFound {
            name: "make".to_string(),
        };
        assert_eq!(exit_code(Some(&err as &(dyn Error + 'static))), 1);
    }
}
