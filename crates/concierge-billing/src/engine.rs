use chrono::{Timelike, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::db::init_db;
use crate::error::Result;
use crate::quota::{run_quota_alerts_80, QuotaAlertSink, QuotaSnapshotSource, TenantContact};
use crate::suspension::run_suspension_job;
use crate::usage::{run_metered_usage_push, MinutesSource, UsageSink};

/// Drives the billing subsystem's daily jobs: suspension sweep, metered
/// usage push, and 80% quota alerts. Adapted from the generic job-scheduler
/// tick loop, specialised to three fixed daily jobs instead of an arbitrary
/// `Schedule` table.
pub struct BillingEngine {
    conn: Connection,
    usage_sink: Box<dyn UsageSink>,
    minutes_source: Box<dyn MinutesSource>,
    quota_snapshots: Box<dyn QuotaSnapshotSource>,
    tenant_contact: Box<dyn TenantContact>,
    quota_alert_sink: Box<dyn QuotaAlertSink>,
    /// UTC hour at which the daily jobs are eligible to run.
    run_hour_utc: u32,
}

impl BillingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conn: Connection,
        usage_sink: Box<dyn UsageSink>,
        minutes_source: Box<dyn MinutesSource>,
        quota_snapshots: Box<dyn QuotaSnapshotSource>,
        tenant_contact: Box<dyn TenantContact>,
        quota_alert_sink: Box<dyn QuotaAlertSink>,
        run_hour_utc: u32,
    ) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn,
            usage_sink,
            minutes_source,
            quota_snapshots,
            tenant_contact,
            quota_alert_sink,
            run_hour_utc,
        })
    }

    /// Main event loop. Polls once a minute until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("billing engine started");

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("billing engine tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("billing engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Runs any daily job that is due: the current UTC hour matches
    /// `run_hour_utc` and the job has not already completed today. A missed
    /// run (service down across the run hour) is simply picked up on the
    /// next tick whose hour is still `>= run_hour_utc` for that UTC date.
    async fn tick(&mut self) -> Result<()> {
        let now = Utc::now();
        if now.hour() < self.run_hour_utc {
            return Ok(());
        }

        if !self.ran_today("suspension")? {
            let summary = run_suspension_job(&self.conn, now)?;
            info!(suspended = summary.suspended, "daily suspension sweep complete");
            self.mark_ran("suspension", now)?;
        }

        if !self.ran_today("usage_push")? {
            let summary = run_metered_usage_push(
                &self.conn,
                self.usage_sink.as_ref(),
                self.minutes_source.as_ref(),
                now,
            )
            .await?;
            info!(
                pushed = summary.pushed,
                retried = summary.retried,
                failed = summary.failed,
                "daily metered usage push complete"
            );
            if summary.failed == 0 {
                self.mark_ran("usage_push", now)?;
            } else {
                warn!("usage push had failures, will retry the eligible days again tomorrow");
            }
        }

        if !self.ran_today("quota_alerts")? {
            let month_utc = now.format("%Y-%m").to_string();
            let summary = run_quota_alerts_80(
                &self.conn,
                self.quota_snapshots.as_ref(),
                self.tenant_contact.as_ref(),
                self.quota_alert_sink.as_ref(),
                &month_utc,
                now,
            )
            .await?;
            info!(sent = summary.sent, skipped = summary.skipped, "daily quota alert sweep complete");
            self.mark_ran("quota_alerts", now)?;
        }

        Ok(())
    }

    fn ran_today(&self, job_name: &str) -> Result<bool> {
        let today = Utc::now().date_naive().to_string();
        let last_run: Option<String> = self
            .conn
            .query_row(
                "SELECT last_run_date FROM scheduler_state WHERE job_name = ?1",
                [job_name],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        Ok(last_run.as_deref() == Some(today.as_str()))
    }

    fn mark_ran(&self, job_name: &str, now: chrono::DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO scheduler_state (job_name, last_run_date) VALUES (?1, ?2)
             ON CONFLICT(job_name) DO UPDATE SET last_run_date = excluded.last_run_date",
            params![job_name, now.date_naive().to_string()],
        )?;
        Ok(())
    }
}
