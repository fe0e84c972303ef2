use std::sync::Arc;
use std::time::Instant;

use crate::executor::Executor;

#[derive(Clone)]
pub struct AppState {
    /// Shared by all requests; holds only read-only limits and settings
    pub executor: Arc<Executor>,
    /// When the server was started (for uptime tracking)
    pub started_at: Instant,
}

impl AppState {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self {
            executor,
            started_at: Instant::now(),
        }
    }
}
