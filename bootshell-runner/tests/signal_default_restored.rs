//! Checks that the agent goes back to the default signal behaviour between
//! runs. The check re-runs this test binary so that the process being
//! killed is not the test harness itself.
#![cfg(unix)]

use bootshell_runner::Shell;
use nix::sys::signal::{kill, Signal};
use nix::unistd::getpid;
use std::os::unix::process::ExitStatusExt;
use std::process::Command;
use std::time::Duration;

const AGENT_ENV: &str = "BOOTSHELL_TEST_AGENT";
const NO_ARGS: [&str; 0] = [];

/// Acts as the agent: finish one run, then signal ourselves. Returning
/// normally means the signal was swallowed.
fn agent(sig: Signal) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let mut shell = Shell::new().unwrap();
        shell.run("true", &NO_ARGS).await.unwrap();
    });

    kill(getpid(), sig).unwrap();
    std::thread::sleep(Duration::from_secs(5));
}

fn run_agent(test_name: &str, sig: Signal) -> std::process::ExitStatus {
    Command::new(std::env::current_exe().unwrap())
        .args([test_name, "--exact", "--nocapture", "--test-threads=1"])
        .env(AGENT_ENV, sig.as_str())
        .status()
        .unwrap()
}

fn agent_signal() -> Option<Signal> {
    let name = std::env::var(AGENT_ENV).ok()?;
    name.parse().ok()
}

#[test]
fn test_sigterm_after_run_terminates_agent() {
    if let Some(sig) = agent_signal() {
        return agent(sig);
    }

    let status = run_agent("test_sigterm_after_run_terminates_agent", Signal::SIGTERM);
    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32), "agent exited with {status:?}");
}

#[test]
fn test_sighup_after_run_terminates_agent() {
    if let Some(sig) = agent_signal() {
        return agent(sig);
    }

    let status = run_agent("test_sighup_after_run_terminates_agent", Signal::SIGHUP);
    assert_eq!(status.signal(), Some(Signal::SIGHUP as i32), "agent exited with {status:?}");
}
