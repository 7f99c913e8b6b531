//! Background maintenance sweeps.
//!
//! # Responsibility
//! - Run every TTL expiration in one pass driven by the host clock.
//! - Report per-collection removal counts and an error tally.
//!
//! # Invariants
//! - A failing sweep never aborts the remaining sweeps.
//! - Sweeps are idempotent; re-running with the same clock removes nothing
//!   new.

use crate::model::activity::ACTIVITY_RETENTION_MS;
use crate::model::history::HISTORY_RETENTION_MS;
use crate::repo::activity_repo::ActivityRepository;
use crate::repo::history_repo::HistoryRepository;
use crate::repo::invitation_repo::InvitationRepository;
use crate::repo::presence_repo::PresenceRepository;
use log::{info, warn};

/// Outcome of one [`run_ttl_sweeps`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// History ledger entries removed (90-day retention).
    pub history_removed: usize,
    /// Activity feed entries removed (180-day retention).
    pub activity_removed: usize,
    /// Presence sessions removed (1-hour idle TTL).
    pub presence_removed: usize,
    /// Pending invitations flipped to expired.
    pub invitations_expired: usize,
    /// Number of individual sweeps that failed.
    pub failures: u32,
}

/// Runs every TTL sweep once against the supplied clock.
///
/// Each sweep's outcome is logged; a failing sweep is counted in the report
/// and the remaining sweeps still run.
pub fn run_ttl_sweeps<H, A, P, I>(
    history: &H,
    activity: &A,
    presence: &P,
    invitations: &I,
    now_ms: i64,
) -> SweepReport
where
    H: HistoryRepository,
    A: ActivityRepository,
    P: PresenceRepository,
    I: InvitationRepository,
{
    let mut report = SweepReport::default();

    match history.prune_entries_before(now_ms - HISTORY_RETENTION_MS) {
        Ok(removed) => {
            report.history_removed = removed;
            info!("event=ttl_sweep module=maintenance status=ok target=history removed={removed}");
        }
        Err(err) => {
            report.failures += 1;
            warn!("event=ttl_sweep module=maintenance status=error target=history error={err}");
        }
    }

    match activity.prune_activity_before(now_ms - ACTIVITY_RETENTION_MS) {
        Ok(removed) => {
            report.activity_removed = removed;
            info!(
                "event=ttl_sweep module=maintenance status=ok target=activity removed={removed}"
            );
        }
        Err(err) => {
            report.failures += 1;
            warn!("event=ttl_sweep module=maintenance status=error target=activity error={err}");
        }
    }

    match presence.delete_idle_sessions(now_ms) {
        Ok(removed) => {
            report.presence_removed = removed;
            info!(
                "event=ttl_sweep module=maintenance status=ok target=presence removed={removed}"
            );
        }
        Err(err) => {
            report.failures += 1;
            warn!("event=ttl_sweep module=maintenance status=error target=presence error={err}");
        }
    }

    match invitations.expire_pending(now_ms) {
        Ok(flipped) => {
            report.invitations_expired = flipped;
            info!(
                "event=ttl_sweep module=maintenance status=ok target=invitations expired={flipped}"
            );
        }
        Err(err) => {
            report.failures += 1;
            warn!(
                "event=ttl_sweep module=maintenance status=error target=invitations error={err}"
            );
        }
    }

    report
}
