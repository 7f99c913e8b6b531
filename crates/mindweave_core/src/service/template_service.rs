//! Template catalog use-case service.
//!
//! # Responsibility
//! - Register and list reusable templates.
//! - Instantiate templates into new documents with an atomic usage bump.
//!
//! # Invariants
//! - Template graphs pass the same structural rules as documents.
//! - The usage counter moves through a single in-place increment, so
//!   concurrent instantiations never lose updates.
//! - Only active templates are served or instantiated.

use crate::model::activity::ActivityKind;
use crate::model::document::{DocumentSpec, GraphDocument};
use crate::model::graph::GraphViolation;
use crate::model::history::{HistoryAction, DEFAULT_SNAPSHOT_EVERY};
use crate::model::template::{Template, TemplateSpec, TemplateStatus};
use crate::model::{ActorId, ValidationError};
use crate::repo::activity_repo::ActivityRepository;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::history_repo::HistoryRepository;
use crate::repo::template_repo::{TemplateListQuery, TemplateRepository};
use crate::repo::RepoError;
use log::warn;
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from template service operations.
#[derive(Debug)]
pub enum TemplateServiceError {
    /// Target template does not exist.
    TemplateNotFound(Uuid),
    /// Template exists but is not active.
    TemplateInactive {
        template_id: Uuid,
        status: TemplateStatus,
    },
    /// Caller lacks the role required by the operation.
    PermissionDenied {
        template_id: Uuid,
        actor_id: ActorId,
    },
    /// Field-level validation rejected the input.
    InvalidSpec(ValidationError),
    /// The template graph breaks a structural invariant.
    InvariantViolation(GraphViolation),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for TemplateServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateNotFound(id) => write!(f, "template not found: {id}"),
            Self::TemplateInactive {
                template_id,
                status,
            } => write!(
                f,
                "template {template_id} is {}, expected active",
                status.as_db_str()
            ),
            Self::PermissionDenied {
                template_id,
                actor_id,
            } => write!(
                f,
                "actor {actor_id} lacks permission on template {template_id}"
            ),
            Self::InvalidSpec(err) => write!(f, "{err}"),
            Self::InvariantViolation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TemplateServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSpec(err) => Some(err),
            Self::InvariantViolation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TemplateServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidSpec(err),
            RepoError::Graph(err) => Self::InvariantViolation(err),
            other => Self::Repo(other),
        }
    }
}

/// Template service facade over repository implementations.
pub struct TemplateService<T, D, H, A>
where
    T: TemplateRepository,
    D: DocumentRepository,
    H: HistoryRepository,
    A: ActivityRepository,
{
    templates: T,
    documents: D,
    history: H,
    activity: A,
}

impl<T, D, H, A> TemplateService<T, D, H, A>
where
    T: TemplateRepository,
    D: DocumentRepository,
    H: HistoryRepository,
    A: ActivityRepository,
{
    /// Creates service from repository implementations.
    pub fn new(templates: T, documents: D, history: H, activity: A) -> Self {
        Self {
            templates,
            documents,
            history,
            activity,
        }
    }

    /// Registers a new template.
    ///
    /// # Contract
    /// - Name constraints and graph structure are validated before any
    ///   write, with the same rules documents use.
    pub fn register(
        &self,
        creator_id: ActorId,
        spec: &TemplateSpec,
    ) -> Result<Template, TemplateServiceError> {
        self.templates
            .create_template(creator_id, spec)
            .map_err(Into::into)
    }

    /// Loads one template regardless of status.
    pub fn get_template(&self, id: Uuid) -> Result<Template, TemplateServiceError> {
        self.templates
            .get_template(id)?
            .ok_or(TemplateServiceError::TemplateNotFound(id))
    }

    /// Newest-first page of active public templates.
    pub fn list_templates(
        &self,
        query: &TemplateListQuery,
    ) -> Result<Vec<Template>, TemplateServiceError> {
        self.templates.list_templates(query).map_err(Into::into)
    }

    /// Most instantiated active public templates.
    pub fn popular(&self, limit: u32) -> Result<Vec<Template>, TemplateServiceError> {
        self.templates.list_popular(limit).map_err(Into::into)
    }

    /// Clones a template's graph into a new private document.
    ///
    /// # Contract
    /// - Only active templates instantiate; others fail `TemplateInactive`.
    /// - The title defaults to the template name; category and tags carry
    ///   over.
    /// - The usage counter is bumped in place after the document commit.
    ///
    /// # Side effects
    /// - Appends a `create` ledger entry and a `template_used` activity entry
    ///   on the new document, best-effort.
    pub fn instantiate(
        &self,
        template_id: Uuid,
        owner_id: ActorId,
        title_override: Option<&str>,
    ) -> Result<GraphDocument, TemplateServiceError> {
        let template = self.get_template(template_id)?;
        if template.status != TemplateStatus::Active {
            return Err(TemplateServiceError::TemplateInactive {
                template_id,
                status: template.status,
            });
        }

        let spec = DocumentSpec {
            title: title_override.unwrap_or(&template.title).to_string(),
            description: template.description.clone().unwrap_or_default(),
            nodes: template.snapshot.nodes.clone(),
            edges: template.snapshot.edges.clone(),
            viewport: Some(template.snapshot.viewport),
            settings: Some(template.snapshot.settings.clone()),
            category: template.category,
            tags: template.tags.clone(),
            is_public: false,
        };

        let document = self.documents.create_document(owner_id, &spec)?;
        self.templates.increment_usage(template_id)?;

        let snapshot = document.snapshot();
        if let Err(err) = self.history.append_entry(
            document.id,
            owner_id,
            HistoryAction::Create,
            None,
            &snapshot,
            DEFAULT_SNAPSHOT_EVERY,
        ) {
            warn!(
                "event=history_append module=template_service status=error document_id={} error={err}",
                document.id
            );
        }
        if let Err(err) = self.activity.record_activity(
            document.id,
            owner_id,
            ActivityKind::TemplateUsed,
            Some(&json!({ "template_id": template_id })),
        ) {
            warn!(
                "event=activity_record module=template_service status=error document_id={} error={err}",
                document.id
            );
        }

        Ok(document)
    }

    /// Archives a template so it stops serving and instantiating.
    /// Creator-only.
    pub fn archive_template(
        &self,
        template_id: Uuid,
        caller_id: ActorId,
    ) -> Result<(), TemplateServiceError> {
        let template = self.get_template(template_id)?;
        if template.created_by != caller_id {
            return Err(TemplateServiceError::PermissionDenied {
                template_id,
                actor_id: caller_id,
            });
        }
        if template.status != TemplateStatus::Active {
            return Err(TemplateServiceError::TemplateInactive {
                template_id,
                status: template.status,
            });
        }

        self.templates
            .set_status(template_id, TemplateStatus::Archived)
            .map_err(Into::into)
    }
}
