use crate::error::CoreError;
use crate::identity::instant_for;
use crate::models::MaterializedOccurrence;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Sqlite;
use uuid::Uuid;

impl SqliteRepository {
    /// Writes (or rewrites) an override row inside an existing transaction.
    pub(crate) async fn upsert_override(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        row: &MaterializedOccurrence,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO materialized_occurrences
            (template_id, occurrence_offset, title, description, priority, category, deleted, completed_on, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (template_id, occurrence_offset) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                priority = excluded.priority,
                category = excluded.category,
                deleted = excluded.deleted,
                completed_on = excluded.completed_on,
                updated_at = excluded.updated_at"#,
        )
        .bind(row.template_id)
        .bind(row.offset)
        .bind(&row.title)
        .bind(&row.description)
        .bind(row.priority)
        .bind(&row.category)
        .bind(row.deleted)
        .bind(row.completed_on)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl super::OccurrenceRepository for SqliteRepository {
    async fn find_override(
        &self,
        template_id: Uuid,
        offset: i64,
    ) -> Result<Option<MaterializedOccurrence>, CoreError> {
        let row = sqlx::query_as(
            "SELECT * FROM materialized_occurrences WHERE template_id = $1 AND occurrence_offset = $2",
        )
        .bind(template_id)
        .bind(offset)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn find_overrides_for_template(
        &self,
        template_id: Uuid,
    ) -> Result<Vec<MaterializedOccurrence>, CoreError> {
        let rows = sqlx::query_as(
            "SELECT * FROM materialized_occurrences WHERE template_id = $1 ORDER BY occurrence_offset",
        )
        .bind(template_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn find_orphaned_overrides(
        &self,
        template_id: Uuid,
    ) -> Result<Vec<MaterializedOccurrence>, CoreError> {
        let template = self.require_template(template_id).await?;
        let overrides = self.find_overrides_for_template(template_id).await?;

        let mut orphans = Vec::new();
        match &template.rule {
            // A one-off has exactly one addressable occurrence, at offset 0
            None => {
                orphans.extend(overrides.into_iter().filter(|o| o.offset != 0));
            }
            Some(rule) => {
                for row in overrides {
                    if instant_for(rule, template.base_time, row.offset)?.is_none() {
                        orphans.push(row);
                    }
                }
            }
        }
        Ok(orphans)
    }
}

/// Applies sparse changes from a mutation plan onto an override row,
/// creating a blank row first if none existed.
pub(crate) fn merged_override(
    existing: Option<MaterializedOccurrence>,
    template_id: Uuid,
    offset: i64,
    changes: &crate::models::OccurrenceChanges,
    completed_on: Option<Option<chrono::DateTime<Utc>>>,
    deleted: Option<bool>,
) -> MaterializedOccurrence {
    let mut row = existing.unwrap_or_else(|| MaterializedOccurrence::blank(template_id, offset));
    if let Some(title) = &changes.title {
        row.title = Some(title.clone());
    }
    if let Some(description) = &changes.description {
        row.description = description.clone();
    }
    if let Some(priority) = changes.priority {
        row.priority = Some(priority);
    }
    if let Some(category) = &changes.category {
        row.category = category.clone();
    }
    if let Some(completed_on) = completed_on {
        row.completed_on = completed_on;
    }
    if let Some(deleted) = deleted {
        row.deleted = deleted;
    }
    row.updated_at = Utc::now();
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OccurrenceChanges, Priority};

    #[test]
    fn test_merged_override_preserves_unrelated_fields() {
        let template_id = Uuid::now_v7();
        let mut existing = MaterializedOccurrence::blank(template_id, 5);
        existing.completed_on = Some(Utc::now());
        existing.priority = Some(Priority::Low);

        let changes = OccurrenceChanges {
            title: Some("Edited".to_string()),
            ..Default::default()
        };
        let merged = merged_override(Some(existing.clone()), template_id, 5, &changes, None, None);

        assert_eq!(merged.title.as_deref(), Some("Edited"));
        // Completion and the earlier priority override survive the edit
        assert_eq!(merged.completed_on, existing.completed_on);
        assert_eq!(merged.priority, Some(Priority::Low));
        assert!(!merged.deleted);
    }

    #[test]
    fn test_merged_override_can_clear_completion() {
        let template_id = Uuid::now_v7();
        let mut existing = MaterializedOccurrence::blank(template_id, 2);
        existing.completed_on = Some(Utc::now());

        let merged = merged_override(
            Some(existing),
            template_id,
            2,
            &OccurrenceChanges::default(),
            Some(None),
            None,
        );
        assert_eq!(merged.completed_on, None);
    }
}
