//! Application state shared across handlers

use std::sync::Arc;

use crate::db::ConnectionManager;
use crate::query::Executor;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    executor: Executor,
}

impl AppState {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                executor: Executor::new(manager),
            }),
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    pub fn connections(&self) -> &ConnectionManager {
        self.inner.executor.manager()
    }
}
