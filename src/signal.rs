//! Ctrl+C handling for cooperative cancellation.
//!
//! A single [`ShutdownHandler`] wraps the `Arc<AtomicBool>` that the walker,
//! the hasher and the engine poll. Once the flag is set no new group starts;
//! a group already past its scoring stage finishes its action.
//!
//! ```rust,no_run
//! use photodedup::duplicates::EngineConfig;
//! use photodedup::signal::install_handler;
//!
//! let handler = install_handler()?;
//! let config = EngineConfig::new("/photos").with_shutdown_flag(handler.get_flag());
//! # Ok::<(), photodedup::signal::SignalError>(())
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation without a signal.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Flag to hand to [`EngineConfig::with_shutdown_flag`](crate::duplicates::EngineConfig::with_shutdown_flag).
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag so the handler can serve another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C hook and return its handler.
///
/// Repeated calls return the same handler with its flag cleared, so
/// several runs in one process (tests, library callers) can each
/// install without conflict.
///
/// # Errors
///
/// Returns [`SignalError`] if the hook cannot be registered and no
/// handler was registered earlier in this process.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(
            std::io::stderr(),
            "\nInterrupted. Finishing groups in progress..."
        );
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(GLOBAL_HANDLER.get().cloned().unwrap_or(handler))
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            // Another thread won the race, or a host registered its own hook.
            let handler = GLOBAL_HANDLER.get_or_init(|| {
                log::debug!("Ctrl+C hook already registered, using unhooked handler");
                ShutdownHandler::new()
            });
            handler.reset();
            Ok(handler.clone())
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}
