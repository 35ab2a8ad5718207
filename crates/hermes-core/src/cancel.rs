//! Caller-supplied cancellation.
//!
//! A [`CancelSignal`] is created by the caller and handed to the mediator.
//! The same signal reaches every middleware and handler of the dispatch. The
//! engine never triggers it and imposes no deadline of its own; callers
//! compose timeouts into the signal themselves.
//!
//! # Example
//!
//! ```rust
//! use hermes_core::CancelSignal;
//!
//! let cancel = CancelSignal::new();
//! let for_handler = cancel.clone();
//!
//! cancel.cancel();
//! assert!(for_handler.is_cancelled());
//! assert!(for_handler.check().is_err());
//! ```

use crate::error::DispatchError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

/// A cloneable cancellation signal.
///
/// All clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl CancelSignal {
    /// Creates a signal that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Creates a signal for callers that never cancel.
    #[must_use]
    pub fn none() -> Self {
        Self::new()
    }

    /// Creates a signal that triggers itself after `timeout`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let signal = Self::new();
        let timer = signal.clone();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timer.cancel();
        });

        signal
    }

    /// Triggers the signal. Idempotent.
    pub fn cancel(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the signal has been triggered.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns `Err(DispatchError::Cancelled)` if the signal was triggered.
    ///
    /// Handlers call this at convenient points and propagate with `?`.
    pub fn check(&self) -> Result<(), DispatchError> {
        if self.is_cancelled() {
            Err(DispatchError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Completes when the signal is triggered.
    ///
    /// Completes immediately if it already was.
    pub async fn cancelled(&self) {
        // Subscribe before reading the flag so a concurrent cancel is not missed
        let mut receiver = self.sender.subscribe();
        if self.is_cancelled() {
            return;
        }
        let _ = receiver.recv().await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
