use anyhow::Context;
use bootshell_core::{Environment, StderrLogger};
use bootshell_runner::{exit_code, Shell, ShellConfig};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "bootshell")]
#[command(about = "Run commands the way a build agent's job shell does", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Shell settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run commands attached to a pseudo-terminal
    #[arg(long, global = true)]
    pty: bool,

    /// Stream command output and failures to the log as well
    #[arg(long, global = true)]
    debug: bool,

    /// Working directory for the job
    #[arg(short = 'C', long, global = true)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command, streaming its output
    Run {
        command: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run a command and print its trimmed stdout
    Capture {
        command: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run a script through the configured interpreter
    Script {
        path: PathBuf,

        /// Extra environment for the script (KEY=VALUE, repeatable)
        #[arg(short, long = "env", value_parser = parse_env_entry)]
        env: Vec<String>,
    },

    /// Hold a PID-file lock while running a command
    Lock {
        path: PathBuf,

        /// Seconds to wait for the lock
        #[arg(short, long, default_value = "30")]
        timeout: u64,

        command: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the absolute path of an executable
    Which { name: String },
}

fn parse_env_entry(entry: &str) -> Result<String, String> {
    match entry.split_once('=') {
        Some((key, _)) if !key.is_empty() => Ok(entry.to_string()),
        _ => Err(format!("expected KEY=VALUE, got \"{}\"", entry)),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        let err: &(dyn Error + 'static) = err.as_ref();
        process::exit(exit_code(Some(err)));
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => ShellConfig::from_file(path)?,
        None => ShellConfig::default(),
    };
    // flags only ever switch modes on
    config.pty |= cli.pty;
    config.debug |= cli.debug;

    let cancel = CancellationToken::new();
    let mut shell = Shell::with_config(config)?
        .with_logger(Arc::new(StderrLogger))
        .with_cancellation(cancel.clone());

    if let Some(dir) = &cli.dir {
        shell.chdir(dir)?;
    }

    match cli.command {
        Commands::Run { command, args } => {
            shell
                .run(&command, args.as_slice())
                .await
                .with_context(|| format!("Error running `{}`", command))?;
        }
        Commands::Capture { command, args } => {
            let output = shell
                .run_and_capture(&command, args.as_slice())
                .await
                .with_context(|| format!("Error running `{}`", command))?;
            println!("{}", output);
        }
        Commands::Script { path, env } => {
            let extra = Environment::from_vec(env);
            shell
                .run_script(&path, &extra)
                .await
                .with_context(|| format!("Error running script \"{}\"", path.display()))?;
        }
        Commands::Lock {
            path,
            timeout,
            command,
            args,
        } => {
            // Ctrl-C while waiting abandons the lock instead of killing us.
            let watcher = tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                }
            });

            let acquired = shell.lock_file(&path, Duration::from_secs(timeout)).await;
            watcher.abort();
            let mut lock = acquired?;
            debug!(path = %lock.path().display(), "Holding lock");

            let result = shell
                .run(&command, args.as_slice())
                .await
                .with_context(|| format!("Error running `{}`", command));
            lock.release()?;
            result?;
        }
        Commands::Which { name } => {
            let path = shell.absolute_path(&name)?;
            println!("{}", path.display());
        }
    }

    Ok(())
}
