//! Activity feed use-case service.
//!
//! # Responsibility
//! - Expose the notification-oriented event feed per document.
//! - Drive retention pruning from a caller-supplied clock.
//!
//! Feed entries are independent from the history ledger: the feed serves
//! notifications and is pruned on its own 180-day window, while the ledger
//! serves audit and replay.

use crate::model::activity::{ActivityEntry, ActivityKind, ACTIVITY_RETENTION_MS};
use crate::model::document::DocumentId;
use crate::model::ActorId;
use crate::repo::activity_repo::ActivityRepository;
use crate::repo::RepoResult;

/// Activity service facade over the feed repository.
pub struct ActivityService<A: ActivityRepository> {
    repo: A,
}

impl<A: ActivityRepository> ActivityService<A> {
    /// Creates service from repository implementation.
    pub fn new(repo: A) -> Self {
        Self { repo }
    }

    /// Appends one feed entry and returns its sequence number.
    pub fn record(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        kind: ActivityKind,
        details: Option<&serde_json::Value>,
    ) -> RepoResult<i64> {
        self.repo.record_activity(document_id, actor_id, kind, details)
    }

    /// Newest-first page of feed entries.
    pub fn list(
        &self,
        document_id: DocumentId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<ActivityEntry>> {
        self.repo.list_activity(document_id, limit, offset)
    }

    /// Removes entries past the retention window. Returns the number removed.
    pub fn prune_expired(&self, now_ms: i64) -> RepoResult<usize> {
        let cutoff = now_ms - ACTIVITY_RETENTION_MS;
        self.repo.prune_activity_before(cutoff)
    }
}
