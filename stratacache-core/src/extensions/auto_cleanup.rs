//! # Auto-Cleanup Extension Module
//!
//! Background compaction driver: a single long-running task that sleeps
//! for the configured frequency, then invokes [`CacheStack::cleanup`] on
//! the owning stack. The task holds only a weak reference to the stack,
//! so a dropped stack ends the loop; explicit disposal cancels the task
//! cooperatively and waits for it to exit.
//!
//! [`CacheStack::cleanup`]: crate::stack::CacheStack::cleanup

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AutoCleanupConfig;
use crate::error::{CacheError, CacheResult};
use crate::extensions::CacheExtension;
use crate::stack::CacheStack;

/// Periodic background compaction of expired cache entries.
pub struct AutoCleanupExtension {
    frequency: Duration,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    registered: AtomicBool,
}

impl AutoCleanupExtension {
    /// Create an extension that compacts every `frequency`. The frequency
    /// must be strictly positive.
    pub fn new(frequency: Duration) -> CacheResult<Self> {
        if frequency.is_zero() {
            return Err(CacheError::usage("cleanup frequency must be strictly positive"));
        }
        Ok(Self {
            frequency,
            token: CancellationToken::new(),
            task: Mutex::new(None),
            registered: AtomicBool::new(false),
        })
    }

    /// Create an extension from its configuration struct.
    pub fn from_config(config: &AutoCleanupConfig) -> CacheResult<Self> {
        Self::new(config.frequency)
    }
}

#[async_trait]
impl CacheExtension for AutoCleanupExtension {
    async fn register(&self, stack: Arc<CacheStack>) -> CacheResult<()> {
        if self.registered.swap(true, Ordering::SeqCst) {
            return Err(CacheError::usage(
                "auto-cleanup extension is already registered to a cache stack",
            ));
        }

        let stack = Arc::downgrade(&stack);
        let token = self.token.clone();
        let frequency = self.frequency;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(frequency) => {
                        let Some(stack) = stack.upgrade() else { break };
                        if let Err(error) = stack.cleanup().await {
                            tracing::warn!(error = %error, "scheduled cache cleanup failed");
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
            tracing::debug!("auto-cleanup task exited");
        });
        *self.task.lock().unwrap() = Some(handle);
        Ok(())
    }

    async fn dispose(&self) -> CacheResult<()> {
        self.token.cancel();
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            // Cancellation is a normal exit.
            let _ = handle.await;
        }
        Ok(())
    }
}
