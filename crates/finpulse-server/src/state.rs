//! Server state management.

use std::sync::Arc;

use finpulse_core::{Engine, PipelineRuntime};
use tokio::sync::Mutex;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    runtime: Arc<Mutex<Option<PipelineRuntime>>>,
}

impl AppState {
    /// State over an engine whose background work is driven elsewhere.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            runtime: Arc::new(Mutex::new(None)),
        }
    }

    /// State that owns the pipeline runtime until shutdown.
    pub fn with_runtime(runtime: PipelineRuntime) -> Self {
        Self {
            engine: runtime.engine().clone(),
            runtime: Arc::new(Mutex::new(Some(runtime))),
        }
    }

    /// Whether the background pipeline is running.
    pub async fn is_running(&self) -> bool {
        self.runtime
            .lock()
            .await
            .as_ref()
            .map(PipelineRuntime::is_running)
            .unwrap_or(false)
    }

    /// Take the runtime for shutdown. Returns `None` after the first call.
    pub async fn take_runtime(&self) -> Option<PipelineRuntime> {
        self.runtime.lock().await.take()
    }
}
