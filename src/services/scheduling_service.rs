//! Maintenance Scheduling Service
//!
//! Runs periodic housekeeping on a cron schedule: old system logs are
//! purged and chat rooms with a retention period lose older messages.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::info;

use crate::logging::log_maintenance_run;
use crate::services::audit_service::AuditService;
use crate::services::chat_service::ChatService;

/// Errors that can occur during scheduling operations
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("Failed to create job scheduler: {0}")]
    Scheduler(#[from] JobSchedulerError),

    #[error("Invalid cron expression: {cron_expression}")]
    InvalidCronExpression { cron_expression: String },
}

pub type SchedulingResult<T> = Result<T, SchedulingError>;

/// Rows removed by one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub audit_logs_removed: u64,
    pub messages_removed: u64,
}

/// The housekeeping work itself, independent of any schedule
#[derive(Clone)]
struct MaintenanceJobs {
    audit: AuditService,
    chat: ChatService,
    audit_retention_days: u32,
}

impl MaintenanceJobs {
    /// Each job runs even if the other fails; failures are logged
    async fn run(&self) -> MaintenanceReport {
        let audit_logs_removed = match self.audit.purge_older_than(self.audit_retention_days).await {
            Ok(removed) => {
                log_maintenance_run("audit_log_retention", removed, true);
                removed
            }
            Err(e) => {
                tracing::error!(error = %e, "Audit log purge failed");
                log_maintenance_run("audit_log_retention", 0, false);
                0
            }
        };

        let messages_removed = match self.chat.purge_expired_messages().await {
            Ok(removed) => {
                log_maintenance_run("chat_message_retention", removed, true);
                removed
            }
            Err(e) => {
                tracing::error!(error = %e, "Chat message purge failed");
                log_maintenance_run("chat_message_retention", 0, false);
                0
            }
        };

        MaintenanceReport {
            audit_logs_removed,
            messages_removed,
        }
    }
}

/// Cron-driven maintenance
pub struct MaintenanceScheduler {
    scheduler: Arc<Mutex<Option<JobScheduler>>>,
    jobs: MaintenanceJobs,
    cron_expression: String,
}

impl MaintenanceScheduler {
    pub fn new(
        audit: AuditService,
        chat: ChatService,
        audit_retention_days: u32,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            scheduler: Arc::new(Mutex::new(None)),
            jobs: MaintenanceJobs {
                audit,
                chat,
                audit_retention_days,
            },
            cron_expression: cron_expression.into(),
        }
    }

    /// Start the cron job. Calling it while running does nothing.
    pub async fn start(&self) -> SchedulingResult<()> {
        let mut guard = self.scheduler.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let jobs = self.jobs.clone();
        let job = Job::new_async(self.cron_expression.as_str(), move |_uuid, _scheduler| {
            let jobs = jobs.clone();
            Box::pin(async move {
                let report = jobs.run().await;
                info!(
                    audit_logs_removed = report.audit_logs_removed,
                    messages_removed = report.messages_removed,
                    "Scheduled maintenance finished"
                );
            })
        })
        .map_err(|_| SchedulingError::InvalidCronExpression {
            cron_expression: self.cron_expression.clone(),
        })?;

        let scheduler = JobScheduler::new().await?;
        scheduler.add(job).await?;
        scheduler.start().await?;
        *guard = Some(scheduler);

        info!(cron = %self.cron_expression, "Maintenance scheduler started");
        Ok(())
    }

    /// Stop the cron job. Calling it while stopped does nothing.
    pub async fn stop(&self) -> SchedulingResult<()> {
        let mut guard = self.scheduler.lock().await;
        if let Some(mut scheduler) = guard.take() {
            scheduler.shutdown().await?;
            info!("Maintenance scheduler stopped");
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    /// One maintenance pass, outside the schedule
    pub async fn run_once(&self) -> MaintenanceReport {
        self.jobs.run().await
    }
}
