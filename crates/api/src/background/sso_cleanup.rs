//! Periodic cleanup of SSO handoff state.
//!
//! Each pass:
//!
//! 1. marks issued tokens past their lifetime as `expired`;
//! 2. deletes pending media whose token can no longer be exchanged;
//! 3. deletes tokens and sessions that ended before the retention cutoff.

use std::time::Duration;

use chrono::Utc;
use plume_db::repositories::{MediaReferenceRepo, SsoSessionRepo, SsoTokenRepo};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::SsoConfig;

/// Row counts touched by one cleanup pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired_tokens: u64,
    pub deleted_media: u64,
    pub deleted_tokens: u64,
    pub deleted_sessions: u64,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.expired_tokens + self.deleted_media + self.deleted_tokens + self.deleted_sessions
    }
}

/// Run a single cleanup pass.
pub async fn run_once(pool: &PgPool, retention_hours: i64) -> Result<CleanupReport, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::hours(retention_hours);

    let expired_tokens = SsoTokenRepo::expire_stale(pool).await?;
    // Pending media belongs to a token until it is attached; once the token
    // is terminal nothing will attach it.
    let deleted_media = MediaReferenceRepo::delete_orphaned_pending(pool, Utc::now()).await?;
    let deleted_tokens = SsoTokenRepo::delete_finished_before(pool, cutoff).await?;
    let deleted_sessions = SsoSessionRepo::cleanup_ended_before(pool, cutoff).await?;

    Ok(CleanupReport {
        expired_tokens,
        deleted_media,
        deleted_tokens,
        deleted_sessions,
    })
}

/// Run the cleanup loop until `cancel` is triggered.
pub async fn run(pool: PgPool, config: SsoConfig, cancel: CancellationToken) {
    let period = Duration::from_secs(config.cleanup_interval_secs);

    tracing::info!(
        retention_hours = config.retention_hours,
        interval_secs = period.as_secs(),
        "SSO cleanup job started"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("SSO cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match run_once(&pool, config.retention_hours).await {
                    Ok(report) if report.total() > 0 => {
                        tracing::info!(
                            expired_tokens = report.expired_tokens,
                            deleted_media = report.deleted_media,
                            deleted_tokens = report.deleted_tokens,
                            deleted_sessions = report.deleted_sessions,
                            "SSO cleanup: purged stale rows"
                        );
                    }
                    Ok(_) => {
                        tracing::debug!("SSO cleanup: nothing to purge");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "SSO cleanup: pass failed");
                    }
                }
            }
        }
    }
}
