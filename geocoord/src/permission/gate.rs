//! Permission prompt de-duplication.
//!
//! Only one system prompt may be on screen at a time. The first caller that
//! finds the status undetermined starts the prompt; everyone arriving while
//! it is in flight subscribes to the same broadcast and receives the same
//! answer.
//!
//! ```text
//! request_permission() A ─┐
//!                         ├──► PermissionGate ──► provider.request()  (once)
//! request_permission() B ─┘         │                    │
//!                                   ◄────── broadcast ───┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use super::{PermissionProvider, PermissionRequest, PermissionStatus};

type InFlight = Arc<Mutex<Option<broadcast::Sender<PermissionStatus>>>>;

/// Wraps a [`PermissionProvider`] so concurrent requests share one prompt.
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    in_flight: InFlight,
    prompts: AtomicU64,
    coalesced: AtomicU64,
}

impl PermissionGate {
    /// Create a gate over `provider`.
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            in_flight: Arc::new(Mutex::new(None)),
            prompts: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Current status, without prompting.
    pub fn check(&self) -> PermissionStatus {
        self.provider.check()
    }

    /// Resolve the permission status, prompting if it is undetermined.
    ///
    /// A determined status is returned as is. With `skip_prompt` the current
    /// status is returned even when undetermined.
    pub async fn request(&self, request: PermissionRequest, skip_prompt: bool) -> PermissionStatus {
        let status = self.provider.check();
        if skip_prompt || status != PermissionStatus::Undetermined {
            return status;
        }

        let mut rx = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            // A prompt may have finished between the check above and the lock.
            let status = self.provider.check();
            if status != PermissionStatus::Undetermined {
                return status;
            }
            match in_flight.as_ref() {
                Some(tx) => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!("Permission prompt in flight, waiting for its answer");
                    tx.subscribe()
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    *in_flight = Some(tx);
                    self.prompts.fetch_add(1, Ordering::Relaxed);
                    self.spawn_prompt(request);
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(status) => status,
            // Prompt task went away without an answer; report whatever the
            // platform says now.
            Err(_) => self.provider.check(),
        }
    }

    /// Number of prompts shown and number of callers that shared one.
    pub fn counts(&self) -> (u64, u64) {
        (
            self.prompts.load(Ordering::Relaxed),
            self.coalesced.load(Ordering::Relaxed),
        )
    }

    // The prompt runs in its own task so a caller dropping its future does
    // not cancel the prompt for the others.
    fn spawn_prompt(&self, request: PermissionRequest) {
        let prompt = self.provider.request(request);
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            let status = prompt.await;
            debug!(status = %status, background = request.background, "Permission prompt answered");

            let tx = in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(tx) = tx {
                let _ = tx.send(status);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::AuthorizationLevel;
    use crate::permission::{BoxFuture, SimulatedPermissions};

    const REQUEST: PermissionRequest = PermissionRequest {
        level: AuthorizationLevel::WhenInUse,
        background: false,
    };

    #[tokio::test]
    async fn test_determined_status_does_not_prompt() {
        let permissions = SimulatedPermissions::new(PermissionStatus::Denied);
        let gate = PermissionGate::new(Arc::new(permissions.clone()));

        assert_eq!(gate.request(REQUEST, false).await, PermissionStatus::Denied);
        assert_eq!(permissions.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_undetermined_prompts_once() {
        let permissions = SimulatedPermissions::new(PermissionStatus::Undetermined);
        permissions.set_prompt_result(PermissionStatus::Granted);
        let gate = PermissionGate::new(Arc::new(permissions.clone()));

        assert_eq!(gate.request(REQUEST, false).await, PermissionStatus::Granted);
        // Now determined, so no second prompt.
        assert_eq!(gate.request(REQUEST, false).await, PermissionStatus::Granted);
        assert_eq!(permissions.prompt_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_prompt() {
        let permissions = SimulatedPermissions::new(PermissionStatus::Undetermined);
        permissions.set_prompt_result(PermissionStatus::Granted);
        permissions.set_prompt_delay(Duration::from_millis(500));
        let gate = Arc::new(PermissionGate::new(Arc::new(permissions.clone())));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.request(REQUEST, false).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), PermissionStatus::Granted);
        }
        assert_eq!(permissions.prompt_count(), 1);
        assert_eq!(gate.counts(), (1, 2));
    }

    /// Undetermined on the first check, granted afterwards, as when another
    /// caller's prompt finishes just before the in-flight slot is locked.
    struct AnsweredMeanwhile {
        checks: AtomicU64,
        prompts: AtomicU64,
    }

    impl PermissionProvider for AnsweredMeanwhile {
        fn check(&self) -> PermissionStatus {
            if self.checks.fetch_add(1, Ordering::SeqCst) == 0 {
                PermissionStatus::Undetermined
            } else {
                PermissionStatus::Granted
            }
        }

        fn request(&self, _request: PermissionRequest) -> BoxFuture<'static, PermissionStatus> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { PermissionStatus::Granted })
        }
    }

    #[tokio::test]
    async fn test_status_answered_before_lock_does_not_prompt() {
        let provider = Arc::new(AnsweredMeanwhile {
            checks: AtomicU64::new(0),
            prompts: AtomicU64::new(0),
        });
        let gate = PermissionGate::new(Arc::clone(&provider) as Arc<dyn PermissionProvider>);

        assert_eq!(gate.request(REQUEST, false).await, PermissionStatus::Granted);
        assert_eq!(provider.prompts.load(Ordering::SeqCst), 0);
        assert_eq!(gate.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_skip_prompt_returns_current_status() {
        let permissions = SimulatedPermissions::new(PermissionStatus::Undetermined);
        let gate = PermissionGate::new(Arc::new(permissions.clone()));

        assert_eq!(
            gate.request(REQUEST, true).await,
            PermissionStatus::Undetermined
        );
        assert_eq!(permissions.prompt_count(), 0);
    }
}
