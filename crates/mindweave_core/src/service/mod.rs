//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce access rules and cross-entity invariants above storage.
//! - Keep transport layers decoupled from persistence details.

pub mod activity_service;
pub mod collaboration_service;
pub mod comment_service;
pub mod document_service;
pub mod history_service;
pub mod maintenance;
pub mod presence_service;
pub mod template_service;
pub mod version_service;
