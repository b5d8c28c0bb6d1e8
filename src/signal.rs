//! External interrupt handling.
//!
//! SIGINT and SIGTERM only flip a process-wide flag; the executor polls it
//! between waits on the running child and tears the child down itself.
use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

static INTERRUPTED: OnceLock<Arc<AtomicBool>> = OnceLock::new();

fn interrupt_flag() -> &'static Arc<AtomicBool> {
    INTERRUPTED.get_or_init(Arc::default)
}

/// Route SIGINT/SIGTERM into the interrupt flag.
pub fn install() -> std::io::Result<()> {
    for signum in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signum, Arc::clone(interrupt_flag()))?;
    }
    Ok(())
}

/// Cancellation check handed to step runners.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    local: Arc<AtomicBool>,
    signals: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    /// Token that trips when the process receives an interrupt.
    pub fn from_signals() -> Self {
        Self {
            local: Arc::default(),
            signals: Some(Arc::clone(interrupt_flag())),
        }
    }

    #[cfg(test)]
    pub fn cancel(&self) {
        self.local.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.local.load(Ordering::SeqCst)
            || self
                .signals
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}
