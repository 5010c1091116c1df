//! In-process permission provider for tests and hosts without a platform API.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{BoxFuture, PermissionProvider, PermissionRequest, PermissionStatus};

#[derive(Debug)]
struct State {
    status: PermissionStatus,
    prompt_result: PermissionStatus,
    prompt_delay: Duration,
    prompts: u32,
    last_request: Option<PermissionRequest>,
}

/// Scriptable [`PermissionProvider`].
///
/// Clones share state, so a test can keep one handle while the coordinator
/// owns another.
#[derive(Debug, Clone)]
pub struct SimulatedPermissions {
    state: Arc<Mutex<State>>,
}

impl SimulatedPermissions {
    /// Start with `status`. Prompts answer `Granted` immediately unless
    /// scripted otherwise.
    pub fn new(status: PermissionStatus) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                status,
                prompt_result: PermissionStatus::Granted,
                prompt_delay: Duration::ZERO,
                prompts: 0,
                last_request: None,
            })),
        }
    }

    /// Already granted.
    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted)
    }

    /// Change the status, as if the user edited it in system settings.
    pub fn set_status(&self, status: PermissionStatus) {
        self.lock().status = status;
    }

    /// The answer the next prompts give.
    pub fn set_prompt_result(&self, status: PermissionStatus) {
        self.lock().prompt_result = status;
    }

    /// How long a prompt stays on screen.
    pub fn set_prompt_delay(&self, delay: Duration) {
        self.lock().prompt_delay = delay;
    }

    /// Number of prompts shown.
    pub fn prompt_count(&self) -> u32 {
        self.lock().prompts
    }

    /// The most recent prompt request.
    pub fn last_request(&self) -> Option<PermissionRequest> {
        self.lock().last_request
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PermissionProvider for SimulatedPermissions {
    fn check(&self) -> PermissionStatus {
        self.lock().status
    }

    fn request(&self, request: PermissionRequest) -> BoxFuture<'static, PermissionStatus> {
        let (result, delay) = {
            let mut state = self.lock();
            state.prompts += 1;
            state.last_request = Some(request);
            (state.prompt_result, state.prompt_delay)
        };
        let state = Arc::clone(&self.state);

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            state.lock().unwrap_or_else(PoisonError::into_inner).status = result;
            result
        })
    }
}
