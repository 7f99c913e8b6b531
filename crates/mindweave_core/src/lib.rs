//! Core domain logic for MindWeave.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::document::{
    DocumentId, DocumentSpec, DocumentStatus, GraphDocument, GraphPatch,
};
pub use model::{ActorId, ValidationError};
pub use repo::document_repo::{DocumentListQuery, DocumentRepository, SqliteDocumentRepository};
pub use repo::{RepoError, RepoResult};
pub use search::fts::{search_documents, SearchError, SearchHit, SearchQuery, SearchResult};
pub use service::document_service::DocumentService;
pub use service::maintenance::{run_ttl_sweeps, SweepReport};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
