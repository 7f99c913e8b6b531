//! History ledger use-case service.
//!
//! # Responsibility
//! - Expose audit listing and point-in-time replay over the ledger.
//! - Drive retention pruning from a caller-supplied clock.
//!
//! # Invariants
//! - Replay never runs on the live edit path; it reads committed entries
//!   only.
//! - Entries older than [`HISTORY_RETENTION_MS`] are removed by the sweep.

use crate::model::document::DocumentId;
use crate::model::graph::GraphSnapshot;
use crate::model::history::{HistoryEntry, HISTORY_RETENTION_MS};
use crate::repo::history_repo::HistoryRepository;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from history service operations.
#[derive(Debug)]
pub enum HistoryServiceError {
    /// No replayable entry at this position. Either it never existed or
    /// retention removed every snapshot base at or before it.
    EntryNotFound { document_id: DocumentId, seq: i64 },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for HistoryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntryNotFound { document_id, seq } => {
                write!(f, "no replayable history entry {seq} for document {document_id}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HistoryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for HistoryServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// History service facade over the ledger repository.
pub struct HistoryService<H: HistoryRepository> {
    repo: H,
}

impl<H: HistoryRepository> HistoryService<H> {
    /// Creates service from repository implementation.
    pub fn new(repo: H) -> Self {
        Self { repo }
    }

    /// Newest-first page of ledger entries for audit display.
    pub fn list_history(
        &self,
        document_id: DocumentId,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<HistoryEntry>, HistoryServiceError> {
        self.repo
            .list_entries(document_id, limit, offset)
            .map_err(Into::into)
    }

    /// Reconstructs graph state as of ledger position `seq`.
    ///
    /// # Errors
    /// - `EntryNotFound` when the position does not exist for this document
    ///   or no snapshot base at or before it survived retention.
    pub fn replay(
        &self,
        document_id: DocumentId,
        seq: i64,
    ) -> Result<GraphSnapshot, HistoryServiceError> {
        self.repo
            .replay_state_at(document_id, seq)?
            .ok_or(HistoryServiceError::EntryNotFound { document_id, seq })
    }

    /// Removes entries past the retention window. Returns the number removed.
    pub fn prune_expired(&self, now_ms: i64) -> Result<usize, HistoryServiceError> {
        let cutoff = now_ms - HISTORY_RETENTION_MS;
        self.repo.prune_entries_before(cutoff).map_err(Into::into)
    }
}
