//! Job polling and concurrent execution.
//!
//! Polls the job store for pending work on an interval, claims jobs through
//! the state machine's compare-and-set, and runs each claimed job on its own
//! task. A semaphore bounds how many jobs run at once; shutdown waits for
//! in-flight jobs up to a configured timeout.

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use lingua_jobs::JobStore;

use crate::config::WorkerConfig;
use crate::pipeline::PipelineOrchestrator;

/// Polls for pending jobs and dispatches them to the pipeline.
pub struct JobExecutor {
    config: WorkerConfig,
    jobs: Arc<dyn JobStore>,
    pipeline: Arc<PipelineOrchestrator>,
    semaphore: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(
        config: WorkerConfig,
        jobs: Arc<dyn JobStore>,
        pipeline: Arc<PipelineOrchestrator>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            jobs,
            pipeline,
            semaphore,
            shutdown_tx,
        }
    }

    /// Request a graceful stop. `run` finishes in-flight jobs (up to the
    /// shutdown timeout) and returns.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Poll-dispatch loop. Returns after [`shutdown`](Self::shutdown), or in
    /// drain mode once no pending or in-flight jobs remain.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            store = self.jobs.name(),
            max_concurrent = self.config.max_concurrent_jobs,
            poll_secs = self.config.poll_interval.as_secs(),
            drain = self.config.drain,
            "executor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => {
                    info!("shutdown requested, draining in-flight jobs");
                    break;
                }
            }

            let pending = match self.jobs.list_pending().await {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(error = %e, "failed to list pending jobs");
                    continue;
                }
            };

            if self.config.drain && pending.is_empty() && self.idle() {
                info!("drain complete, no pending jobs remain");
                break;
            }

            for job in pending {
                let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
                    Ok(permit) => permit,
                    // At capacity; remaining jobs wait for the next poll.
                    Err(_) => break,
                };

                let claimed = match self.pipeline.state_machine().claim(&job.id).await {
                    Ok(claimed) => claimed,
                    Err(e) if e.is_invalid_transition() => {
                        // Another worker won the claim.
                        debug!(job_id = %job.id, "job already claimed");
                        continue;
                    }
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "failed to claim job");
                        continue;
                    }
                };

                let pipeline = Arc::clone(&self.pipeline);
                tokio::spawn(async move {
                    pipeline.run(claimed).await;
                    drop(permit);
                });
            }
        }

        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_idle())
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "shutdown timeout elapsed with jobs still in flight"
            );
        } else {
            info!("executor stopped");
        }
    }

    fn idle(&self) -> bool {
        self.semaphore.available_permits() == self.config.max_concurrent_jobs
    }

    async fn wait_idle(&self) {
        // All permits available again means no job task is running.
        let _ = self
            .semaphore
            .acquire_many(self.config.max_concurrent_jobs as u32)
            .await;
    }
}
