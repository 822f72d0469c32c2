//! Background runtime for the pipeline.
//!
//! Runs the activity drain loop on its own task and the presence and
//! engagement sweeps on a job scheduler, with unified start and shutdown.
//! The presence sweep also purges expired keys from the expiring store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::Engine;
use crate::error::{PulseError, PulseResult};

/// Owns the background tasks that keep the pipeline moving.
///
/// # Example
///
/// ```ignore
/// let engine = Arc::new(Engine::open(config, reasoning).await?);
/// let mut runtime = PipelineRuntime::new(engine.clone());
/// runtime.start().await?;
///
/// // ... serve requests ...
///
/// runtime.shutdown().await?;
/// ```
pub struct PipelineRuntime {
    engine: Arc<Engine>,
    scheduler: Option<JobScheduler>,
    drain: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl PipelineRuntime {
    /// Create the runtime. Nothing runs until [`start`](Self::start).
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            scheduler: None,
            drain: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.drain.is_some()
    }

    /// Start the drain loop and the scheduled sweeps.
    pub async fn start(&mut self) -> PulseResult<()> {
        if self.is_running() {
            debug!("Pipeline runtime already running");
            return Ok(());
        }

        let config = self.engine.config();
        let drain_interval = config.drain_interval();
        let presence_interval = config.presence_sweep_interval();
        let engagement_interval = config.engagement_interval();

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| PulseError::internal(format!("Failed to create job scheduler: {}", e)))?;
        self.add_sweeps(&scheduler, presence_interval, engagement_interval)
            .await?;
        scheduler
            .start()
            .await
            .map_err(|e| PulseError::internal(format!("Failed to start job scheduler: {}", e)))?;
        self.scheduler = Some(scheduler);

        self.cancel = CancellationToken::new();
        self.drain = Some(tokio::spawn(drain_loop(
            self.engine.clone(),
            drain_interval,
            self.cancel.clone(),
        )));

        info!(
            drain_interval_ms = drain_interval.as_millis() as u64,
            presence_sweep_secs = presence_interval.as_secs(),
            engagement_sweep_secs = engagement_interval.as_secs(),
            "Pipeline runtime started"
        );
        Ok(())
    }

    async fn add_sweeps(
        &self,
        scheduler: &JobScheduler,
        presence_interval: Duration,
        engagement_interval: Duration,
    ) -> PulseResult<()> {
        let engine = self.engine.clone();
        let presence_job = Job::new_repeated_async(presence_interval, move |_uuid, _lock| {
            let engine = engine.clone();
            Box::pin(async move {
                let removed = engine.sweep_presence(Utc::now());
                let purged = engine.purge_expired_keys().await;
                if removed > 0 || purged > 0 {
                    info!(removed, purged, "Stale presence and expired keys removed");
                }
            })
        })
        .map_err(|e| PulseError::internal(format!("Failed to create presence sweep: {}", e)))?;

        let engine = self.engine.clone();
        let engagement_job = Job::new_repeated_async(engagement_interval, move |_uuid, _lock| {
            let engine = engine.clone();
            Box::pin(async move {
                if let Err(e) = engine.run_engagement_sweep(Utc::now()).await {
                    error!(error = %e, "Engagement sweep failed");
                }
            })
        })
        .map_err(|e| PulseError::internal(format!("Failed to create engagement sweep: {}", e)))?;

        for job in [presence_job, engagement_job] {
            scheduler
                .add(job)
                .await
                .map_err(|e| PulseError::internal(format!("Failed to schedule sweep: {}", e)))?;
        }
        Ok(())
    }

    /// Stop the drain loop after its current batch and shut the scheduler down.
    pub async fn shutdown(&mut self) -> PulseResult<()> {
        debug!("Shutting down pipeline runtime");
        self.cancel.cancel();

        if let Some(handle) = self.drain.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Drain loop ended abnormally");
            }
        }

        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| PulseError::internal(format!("Failed to stop job scheduler: {}", e)))?;
        }

        info!(pending = self.engine.queue_len(), "Pipeline runtime stopped");
        Ok(())
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}

/// Drain one batch per tick until cancelled. A batch in progress always finishes.
async fn drain_loop(engine: Arc<Engine>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if engine.queue_len() == 0 {
                    continue;
                }
                let report = engine.run_drain_cycle().await;
                debug!(
                    processed = report.processed,
                    failed = report.failed,
                    remaining = engine.queue_len(),
                    "Drain cycle complete"
                );
            }
        }
    }
    debug!("Drain loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::store::{MemoryExpiringStore, SqliteFinanceStore};
    use crate::traits::MockReasoningModel;
    use crate::types::{ActivityEvent, ActivityKind};
    use serde_json::json;

    fn engine(drain_ms: u64) -> Arc<Engine> {
        let config = PipelineConfig::default()
            .with_drain_interval(Duration::from_millis(drain_ms))
            .with_batch_size(10);
        Arc::new(Engine::new(
            config,
            Arc::new(SqliteFinanceStore::in_memory().unwrap()),
            Arc::new(MemoryExpiringStore::new()),
            Arc::new(MockReasoningModel::new()),
        ))
    }

    async fn ingest_page_views(engine: &Engine, count: usize) {
        for i in 0..count {
            engine
                .ingest_activity(
                    &format!("user-{}", i),
                    ActivityEvent::new("", ActivityKind::PageView, json!({"page": "/home"})),
                )
                .await;
        }
    }

    #[tokio::test]
    async fn test_drain_loop_empties_queue_in_batches() {
        let engine = engine(20);
        ingest_page_views(&engine, 25).await;

        let mut runtime = PipelineRuntime::new(engine.clone());
        runtime.start().await.unwrap();
        assert!(runtime.is_running());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(engine.queue_len(), 0);
        assert_eq!(engine.active_user_count(), 25);

        runtime.shutdown().await.unwrap();
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_stops_draining() {
        let engine = engine(20);
        let mut runtime = PipelineRuntime::new(engine.clone());
        runtime.start().await.unwrap();
        runtime.shutdown().await.unwrap();

        ingest_page_views(&engine, 3).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.queue_len(), 3);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let engine = engine(50);
        let mut runtime = PipelineRuntime::new(engine);
        runtime.start().await.unwrap();
        runtime.start().await.unwrap();
        runtime.shutdown().await.unwrap();
        runtime.shutdown().await.unwrap();
    }
}
