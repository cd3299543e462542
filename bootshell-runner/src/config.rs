use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config \"{}\": {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How interpreted scripts are launched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ScriptMode {
    /// The platform executes scripts itself (shebang or file association);
    /// the script path is the program.
    Direct,
    /// The script path is passed as one argument after `args`, e.g.
    /// `/bin/bash -c <path>`, which also lets the kernel honour a shebang
    /// when the script has one.
    Interpreter { program: String, args: Vec<String> },
}

impl ScriptMode {
    pub fn bash() -> Self {
        ScriptMode::Interpreter {
            program: "/bin/bash".to_string(),
            args: vec!["-c".to_string()],
        }
    }

    /// Program and arguments needed to run the script at `path`.
    ///
    /// For an interpreter the path becomes one shell-quoted argument, so
    /// `/bin/bash -c` runs `my script.sh` rather than `my` with an argument.
    pub fn command_for(&self, path: &str) -> (String, Vec<String>) {
        match self {
            ScriptMode::Direct => (path.to_string(), Vec::new()),
            ScriptMode::Interpreter { program, args } => {
                let quoted = shlex::try_quote(path)
                    .map(|q| q.into_owned())
                    .unwrap_or_else(|_| path.to_string());
                let mut args = args.clone();
                args.push(quoted);
                (program.clone(), args)
            }
        }
    }
}

impl Default for ScriptMode {
    fn default() -> Self {
        if cfg!(windows) {
            ScriptMode::Direct
        } else {
            ScriptMode::bash()
        }
    }
}

/// Shell settings, usually loaded from a TOML file.
///
/// ```toml
/// pty = true
/// debug = false
/// lock_retry_interval_ms = 250
///
/// [script_mode]
/// kind = "interpreter"
/// program = "/bin/sh"
/// args = ["-c"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub pty: bool,
    pub debug: bool,
    pub lock_retry_interval_ms: u64,
    pub script_mode: ScriptMode,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            pty: false,
            debug: false,
            lock_retry_interval_ms: 1000,
            script_mode: ScriptMode::default(),
        }
    }
}

impl ShellConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_interval_ms)
    }
}
