use std::sync::Arc;

use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Process-wide shared state: the root cancellation signal and the tracker
/// used to fan background tasks out of `main`.
///
/// This replaces any notion of a global singleton: the listener and every
/// connection handler receive an `Arc<AppContext>` explicitly rather than
/// reaching for a process-wide static.
pub struct AppContext {
    pub token: CancellationToken,
    pub tasks: TaskTracker,
}

impl AppContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            token: CancellationToken::new(),
            tasks: TaskTracker::new(),
        })
    }

    /// A cancellation token scoped to one connection, linked to the
    /// server-wide shutdown signal: tripping either tears the connection
    /// down.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }
}
