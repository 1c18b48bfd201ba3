use crate::db::DbPool;
use crate::error::CoreError;
use crate::identity::OccurrenceId;
use crate::models::{
    EditScope, MaterializedOccurrence, MutationResult, NewTemplateData, OccurrenceChanges,
    OccurrenceView, TodoTemplate, UpdateTemplateData,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod mutations;
pub mod occurrences;
pub mod projection;
pub mod templates;

/// Domain-specific trait for template operations
#[async_trait]
pub trait TemplateRepository {
    async fn add_template(&self, data: NewTemplateData) -> Result<TodoTemplate, CoreError>;
    async fn find_template_by_id(&self, id: Uuid) -> Result<Option<TodoTemplate>, CoreError>;
    async fn find_templates(&self, include_retired: bool) -> Result<Vec<TodoTemplate>, CoreError>;
    async fn find_template_tags(&self, id: Uuid) -> Result<Vec<String>, CoreError>;
    async fn update_template(
        &self,
        id: Uuid,
        data: UpdateTemplateData,
    ) -> Result<TodoTemplate, CoreError>;
    async fn retire_template(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for materialized override rows
#[async_trait]
pub trait OccurrenceRepository {
    async fn find_override(
        &self,
        template_id: Uuid,
        offset: i64,
    ) -> Result<Option<MaterializedOccurrence>, CoreError>;
    async fn find_overrides_for_template(
        &self,
        template_id: Uuid,
    ) -> Result<Vec<MaterializedOccurrence>, CoreError>;
    /// Override rows whose offset the template's current rule no longer
    /// generates (typically left behind by a rule edit)
    async fn find_orphaned_overrides(
        &self,
        template_id: Uuid,
    ) -> Result<Vec<MaterializedOccurrence>, CoreError>;
}

/// Domain-specific trait for scoped occurrence mutations
#[async_trait]
pub trait MutationRepository {
    async fn edit_occurrence(
        &self,
        id: OccurrenceId,
        scope: EditScope,
        changes: OccurrenceChanges,
    ) -> Result<MutationResult, CoreError>;
    async fn delete_occurrence(
        &self,
        id: OccurrenceId,
        scope: EditScope,
    ) -> Result<MutationResult, CoreError>;
    /// Completion is always per-occurrence; `None` clears the mark
    async fn complete_occurrence(
        &self,
        id: OccurrenceId,
        completed_on: Option<DateTime<Utc>>,
    ) -> Result<MutationResult, CoreError>;
}

/// Domain-specific trait for projecting occurrences out of templates
#[async_trait]
pub trait ProjectionRepository {
    /// All occurrences of all active templates inside the window, sorted by
    /// scheduled instant
    async fn project_occurrences(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceView>, CoreError>;
    async fn project_template_occurrences(
        &self,
        template_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceView>, CoreError>;
    /// Resolve a single occurrence by composite id. Orphaned overrides stay
    /// addressable here even though they no longer appear in listings.
    async fn find_occurrence(&self, id: OccurrenceId) -> Result<Option<OccurrenceView>, CoreError>;
    async fn next_occurrence(
        &self,
        template_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError>;
}

/// Main repository trait that composes all domain traits
#[async_trait]
pub trait Repository:
    TemplateRepository + OccurrenceRepository + MutationRepository + ProjectionRepository
{
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Repository for SqliteRepository {}
