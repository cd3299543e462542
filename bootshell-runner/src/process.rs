// Process descriptors: everything needed to launch one child, frozen when
// the command is built.

use crate::resolver::{look_path, parse_extensions};
use bootshell_core::{format_command, Environment, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    program: PathBuf,
    args: Vec<String>,
    dir: PathBuf,
    env: Vec<String>,
    display: String,
}

impl ProcessDescriptor {
    pub fn new(program: PathBuf, args: Vec<String>, dir: PathBuf, env: &Environment) -> Self {
        let display = format_command(&program.to_string_lossy(), &args);
        Self {
            program,
            args,
            dir,
            env: env.to_vec(),
            display,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Environment as `KEY=VALUE` entries.
    pub fn env(&self) -> &[String] {
        &self.env
    }

    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().filter_map(|entry| entry.split_once('='))
    }

    /// Human-readable command line used in prompts and errors.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// A copy of this descriptor with `extra` layered over its environment;
    /// values from `extra` win.
    pub fn with_extra_env(&self, extra: &Environment) -> Self {
        let merged = Environment::from_vec(&self.env).merge(extra);
        Self {
            env: merged.to_vec(),
            ..self.clone()
        }
    }

    /// A pipe-attached command with stdin closed. Stdout and stderr are left
    /// for the executor to wire up.
    pub(crate) fn to_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.dir)
            .env_clear()
            .envs(self.env_pairs())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

/// Resolve `name` against the `PATH`/`PATHEXT` of `env` and snapshot `env`
/// and `dir` into a descriptor.
///
/// Resolution happens here rather than at spawn time because Windows cannot
/// reliably find bare executable names once the working directory differs
/// from the agent's own.
pub fn build_command<S: AsRef<str>>(
    name: &str,
    args: &[S],
    env: &Environment,
    dir: &Path,
) -> Result<ProcessDescriptor> {
    let program = resolve(name, env, dir)?;
    let args = args.iter().map(|a| a.as_ref().to_string()).collect();
    Ok(ProcessDescriptor::new(program, args, dir.to_path_buf(), env))
}

pub(crate) fn resolve(name: &str, env: &Environment, dir: &Path) -> Result<PathBuf> {
    let search_path = env.get("PATH").unwrap_or_default();
    let extensions = parse_extensions(env.get("PATHEXT").unwrap_or_default());
    look_path(name, search_path, &extensions, dir)
}
