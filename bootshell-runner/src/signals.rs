//! Forwarding of interruption signals received by the agent to the child it
//! is currently running.
//!
//! A relay is owned by exactly one execution. It is installed before the
//! child is spawned (signals that arrive in between are buffered), attached
//! once the child's pid is known and stopped after the child has been waited
//! on, so a late signal can never reach a pid that has been reused.
//!
//! While no relay is installed the relayed signals keep their default
//! action: an agent between runs still dies on SIGTERM.

use bootshell_core::Logger;
use std::sync::Arc;
#[cfg(unix)]
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[cfg(unix)]
pub use nix::sys::signal::Signal;

/// Hangup, interrupt, terminate and quit.
#[cfg(unix)]
pub const RELAYED_SIGNALS: [Signal; 4] = [
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGQUIT,
];

pub struct SignalRelay {
    #[cfg_attr(not(unix), allow(dead_code))]
    logger: Arc<dyn Logger>,
    #[cfg(unix)]
    handle: Option<signal_hook::iterator::Handle>,
    #[cfg(unix)]
    active: bool,
    listener: Option<JoinHandle<()>>,
    #[cfg(unix)]
    pending: Option<mpsc::UnboundedReceiver<Signal>>,
    forwarder: Option<JoinHandle<()>>,
}

impl SignalRelay {
    /// Start listening for [`RELAYED_SIGNALS`].
    #[cfg(unix)]
    pub fn install(logger: Arc<dyn Logger>) -> Self {
        use signal_hook::iterator::Signals;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut relay = Self {
            logger,
            handle: None,
            active: false,
            listener: None,
            pending: Some(rx),
            forwarder: None,
        };

        let signals = match Signals::new(RELAYED_SIGNALS.iter().map(|sig| *sig as i32)) {
            Ok(signals) => signals,
            Err(err) => {
                warn!(error = %err, "Failed to register signal handlers");
                return relay;
            }
        };

        relay.handle = Some(signals.handle());
        relay.listener = Some(tokio::task::spawn_blocking(move || listen(signals, tx)));
        default_action::suspend();
        relay.active = true;
        relay
    }

    #[cfg(not(unix))]
    pub fn install(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            listener: None,
            forwarder: None,
        }
    }

    /// Start delivering received signals to `pid`, including any that were
    /// buffered since [`SignalRelay::install`].
    #[cfg(unix)]
    pub fn attach(&mut self, pid: u32) {
        let Some(mut rx) = self.pending.take() else {
            return;
        };
        let logger = self.logger.clone();

        self.forwarder = Some(tokio::spawn(async move {
            while let Some(sig) = rx.recv().await {
                debug!(pid, signal = sig.as_str(), "Forwarding signal to child process");
                if let Err(err) = forward(pid, sig) {
                    logger.error(&format!("Error passing signal to child process: {}", err));
                }
            }
        }));
    }

    #[cfg(not(unix))]
    pub fn attach(&mut self, pid: u32) {
        debug!(pid, "Signal forwarding is not supported on this platform");
    }

    /// Deregister the handlers and wait for every signal already received to
    /// be delivered.
    pub async fn stop(mut self) {
        self.deregister();
        if let Some(listener) = self.listener.take() {
            let _ = listener.await;
        }
        #[cfg(unix)]
        drop(self.pending.take());
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.await;
        }
    }

    fn deregister(&mut self) {
        #[cfg(unix)]
        {
            if std::mem::take(&mut self.active) {
                default_action::resume();
            }
            if let Some(handle) = self.handle.take() {
                handle.close();
            }
        }
    }
}

impl Drop for SignalRelay {
    fn drop(&mut self) {
        // Only does anything when the owning future was cancelled before `stop`.
        self.deregister();
    }
}

/// Blocking loop moving signals into the relay channel. Ends once the
/// handle is closed; dropping `signals` unregisters its handlers.
#[cfg(unix)]
fn listen(mut signals: signal_hook::iterator::Signals, tx: mpsc::UnboundedSender<Signal>) {
    for raw in signals.forever() {
        if !queue(raw, &tx) {
            return;
        }
    }
    // Signals caught just before the close have not been read yet.
    for raw in signals.pending() {
        queue(raw, &tx);
    }
}

#[cfg(unix)]
fn queue(raw: i32, tx: &mpsc::UnboundedSender<Signal>) -> bool {
    match Signal::try_from(raw) {
        Ok(sig) => tx.send(sig).is_ok(),
        Err(_) => true,
    }
}

/// Process-wide default action for the relayed signals, switched off while
/// at least one relay is installed.
#[cfg(unix)]
mod default_action {
    use super::RELAYED_SIGNALS;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
    use tracing::warn;

    static INSTALLED_RELAYS: Mutex<usize> = Mutex::new(0);
    static IDLE: OnceLock<Arc<AtomicBool>> = OnceLock::new();

    fn idle() -> &'static Arc<AtomicBool> {
        IDLE.get_or_init(|| {
            let idle = Arc::new(AtomicBool::new(true));
            for sig in RELAYED_SIGNALS {
                if let Err(err) = signal_hook::flag::register_conditional_default(sig as i32, Arc::clone(&idle)) {
                    warn!(signal = sig.as_str(), error = %err, "Failed to register default signal action");
                }
            }
            idle
        })
    }

    fn installed() -> MutexGuard<'static, usize> {
        INSTALLED_RELAYS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(super) fn suspend() {
        let idle = idle();
        let mut count = installed();
        *count += 1;
        idle.store(false, Ordering::SeqCst);
    }

    pub(super) fn resume() {
        let idle = idle();
        let mut count = installed();
        *count = count.saturating_sub(1);
        if *count == 0 {
            idle.store(true, Ordering::SeqCst);
        }
    }
}

/// Deliver `sig` to the process `pid`.
#[cfg(unix)]
pub fn forward(pid: u32, sig: Signal) -> nix::Result<()> {
    use nix::unistd::Pid;
    nix::sys::signal::kill(Pid::from_raw(pid as i32), sig)
}
