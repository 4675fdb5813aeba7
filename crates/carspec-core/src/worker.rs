use crate::batch::BatchSummary;
use crate::error::AppError;
use crate::models::ScrapeTarget;
use crate::scrape::ScrapeService;
use crate::traits::{AutomationSession, ResultSink, SessionFactory};

/// Events emitted by the batch worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
        targets: usize,
    },
    TargetStarted {
        target: &'a ScrapeTarget,
        position: usize,
        total: usize,
    },
    TargetCompleted {
        target: &'a ScrapeTarget,
        vehicles: usize,
        rows_written: usize,
    },
    TargetFailed {
        target: &'a ScrapeTarget,
        error: &'a str,
    },
    SessionRebuilt {
        worker_id: &'a str,
    },
    Finished {
        worker_id: &'a str,
        summary: &'a BatchSummary,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id, targets } => {
                tracing::info!(%worker_id, %targets, "Worker started");
            }
            WorkerEvent::TargetStarted {
                target,
                position,
                total,
            } => {
                tracing::info!(%target, "[{}/{}] Processing", position, total);
            }
            WorkerEvent::TargetCompleted {
                target,
                vehicles,
                rows_written,
            } => {
                tracing::info!(%target, %vehicles, %rows_written, "Target completed");
            }
            WorkerEvent::TargetFailed { target, error } => {
                tracing::warn!(%target, %error, "Target failed");
            }
            WorkerEvent::SessionRebuilt { worker_id } => {
                tracing::warn!(%worker_id, "Browser session rebuilt");
            }
            WorkerEvent::Finished { worker_id, summary } => {
                summary.log(worker_id);
            }
        }
    }
}

/// Processes one batch strictly in order with a single automation session.
///
/// After any failure that is not a property of the target itself, the
/// session gets a liveness probe; a dead session is closed and replaced
/// before the next target.
pub struct BatchWorker<SF, K>
where
    SF: SessionFactory,
    K: ResultSink,
{
    factory: SF,
    service: ScrapeService<K>,
}

impl<SF, K> BatchWorker<SF, K>
where
    SF: SessionFactory,
    K: ResultSink,
{
    pub fn new(factory: SF, service: ScrapeService<K>) -> Self {
        Self { factory, service }
    }

    pub async fn run<WR: WorkerReporter>(
        &self,
        targets: &[ScrapeTarget],
        reporter: &WR,
    ) -> Result<BatchSummary, AppError> {
        let worker_id = self.service.config().worker_id.as_str();
        reporter.report(WorkerEvent::Started {
            worker_id,
            targets: targets.len(),
        });

        let mut session = self.factory.create().await?;
        let mut summary = BatchSummary::default();

        for (idx, target) in targets.iter().enumerate() {
            reporter.report(WorkerEvent::TargetStarted {
                target,
                position: idx + 1,
                total: targets.len(),
            });

            let err = match self.service.scrape(&session, target).await {
                Ok(outcome) => {
                    summary.record_success();
                    reporter.report(WorkerEvent::TargetCompleted {
                        target,
                        vehicles: outcome.vehicles,
                        rows_written: outcome.save.rows_written,
                    });
                    continue;
                }
                Err(e) => e,
            };

            summary.record_failure(target);
            let error_msg = err.to_string();
            reporter.report(WorkerEvent::TargetFailed {
                target,
                error: &error_msg,
            });

            if err.is_target_failure() || self.is_alive(&session).await {
                continue;
            }

            tracing::warn!(%worker_id, "Session unresponsive, rebuilding");
            session.close().await;
            session = self.factory.create().await.map_err(|e| {
                AppError::SessionCrash(format!("rebuild after {target} failed: {e}"))
            })?;
            reporter.report(WorkerEvent::SessionRebuilt { worker_id });
        }

        session.close().await;
        reporter.report(WorkerEvent::Finished {
            worker_id,
            summary: &summary,
        });
        Ok(summary)
    }

    async fn is_alive(&self, session: &SF::Session) -> bool {
        let limit = self.service.timings().ping_timeout;
        matches!(
            tokio::time::timeout(limit, session.ping()).await,
            Ok(Ok(()))
        )
    }
}
