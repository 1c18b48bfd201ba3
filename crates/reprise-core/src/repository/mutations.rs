use crate::error::CoreError;
use crate::identity::{instant_for, OccurrenceId};
use crate::models::{EditScope, MutationResult, OccurrenceChanges, TodoTemplate};
use crate::mutation::{plan_completion, plan_delete, plan_edit, MutationPlan};
use crate::repository::occurrences::merged_override;
use crate::repository::SqliteRepository;
use crate::rule::EndCondition;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Sqlite;

#[async_trait]
impl super::MutationRepository for SqliteRepository {
    async fn edit_occurrence(
        &self,
        id: OccurrenceId,
        scope: EditScope,
        changes: OccurrenceChanges,
    ) -> Result<MutationResult, CoreError> {
        if changes.is_empty() {
            return Err(CoreError::InvalidInput(
                "edit contains no field changes".to_string(),
            ));
        }
        let mut tx = self.pool().begin().await?;
        let template = Self::require_template_tx(&mut tx, id.template_id).await?;
        if scope == EditScope::ThisOccurrence {
            Self::ensure_occurrence_exists(&mut tx, &template, id.offset).await?;
        }
        let plan = plan_edit(&template, id.offset, scope, changes)?;
        let result = Self::execute_plan(&mut tx, &template, plan).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn delete_occurrence(
        &self,
        id: OccurrenceId,
        scope: EditScope,
    ) -> Result<MutationResult, CoreError> {
        let mut tx = self.pool().begin().await?;
        let template = Self::require_template_tx(&mut tx, id.template_id).await?;
        if scope == EditScope::ThisOccurrence {
            Self::ensure_occurrence_exists(&mut tx, &template, id.offset).await?;
        }
        let plan = plan_delete(&template, id.offset, scope)?;
        let result = Self::execute_plan(&mut tx, &template, plan).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn complete_occurrence(
        &self,
        id: OccurrenceId,
        completed_on: Option<DateTime<Utc>>,
    ) -> Result<MutationResult, CoreError> {
        let mut tx = self.pool().begin().await?;
        let template = Self::require_template_tx(&mut tx, id.template_id).await?;
        Self::ensure_occurrence_exists(&mut tx, &template, id.offset).await?;
        let plan = plan_completion(&template, id.offset, completed_on);
        let result = Self::execute_plan(&mut tx, &template, plan).await?;
        tx.commit().await?;
        Ok(result)
    }
}

impl SqliteRepository {
    /// A this-only mutation must address an occurrence that exists: one the
    /// rule generates, or one that already has an override row (orphans stay
    /// editable by id). Anything else would materialize a row for an
    /// occurrence no listing will ever show.
    async fn ensure_occurrence_exists(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        template: &TodoTemplate,
        offset: i64,
    ) -> Result<(), CoreError> {
        let generated = match &template.rule {
            None => offset == 0,
            Some(rule) => instant_for(rule, template.base_time, offset)?.is_some(),
        };
        if generated {
            return Ok(());
        }
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT occurrence_offset FROM materialized_occurrences WHERE template_id = $1 AND occurrence_offset = $2",
        )
        .bind(template.id)
        .bind(offset)
        .fetch_optional(&mut **tx)
        .await?;
        if existing.is_some() {
            Ok(())
        } else {
            Err(CoreError::InvalidInput(format!(
                "occurrence {}:{} does not exist",
                template.id, offset
            )))
        }
    }

    /// Executes a mutation plan within the transaction the template was read
    /// under, so concurrent mutations of the same series cannot both plan
    /// against a stale snapshot. Multi-row plans (series splits in
    /// particular) stay atomic for the same reason: a failure leaves both
    /// the original and the successor untouched.
    async fn execute_plan(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        template: &TodoTemplate,
        plan: MutationPlan,
    ) -> Result<MutationResult, CoreError> {
        match plan {
            MutationPlan::UpsertOverride {
                template_id,
                offset,
                changes,
                completed_on,
                deleted,
            } => {
                let existing = sqlx::query_as(
                    "SELECT * FROM materialized_occurrences WHERE template_id = $1 AND occurrence_offset = $2",
                )
                .bind(template_id)
                .bind(offset)
                .fetch_optional(&mut **tx)
                .await?;
                let row = merged_override(
                    existing,
                    template_id,
                    offset,
                    &changes,
                    completed_on,
                    deleted,
                );
                Self::upsert_override(tx, &row).await?;

                if deleted == Some(true) {
                    Ok(MutationResult::OccurrenceTombstoned {
                        template_id,
                        offset,
                    })
                } else {
                    Ok(MutationResult::OccurrenceOverridden { occurrence: row })
                }
            }

            MutationPlan::SplitSeries {
                original_id,
                truncate_until,
                split_offset,
                successor,
            } => {
                let truncated_rule = Self::truncated_rule(template, truncate_until)?;
                sqlx::query(
                    "UPDATE todo_templates SET rule = $1, updated_at = $2 WHERE id = $3",
                )
                .bind(serde_json::to_string(&truncated_rule)?)
                .bind(Utc::now())
                .bind(original_id)
                .execute(&mut **tx)
                .await?;

                Self::insert_template(tx, &successor).await?;

                // Override rows from the split point onward move with the
                // series, re-keyed to the successor's anchor
                sqlx::query(
                    r#"UPDATE materialized_occurrences
                    SET template_id = $1, occurrence_offset = occurrence_offset - $2, updated_at = $3
                    WHERE template_id = $4 AND occurrence_offset >= $2"#,
                )
                .bind(successor.id)
                .bind(split_offset)
                .bind(Utc::now())
                .bind(original_id)
                .execute(&mut **tx)
                .await?;

                sqlx::query(
                    r#"INSERT INTO template_tags (template_id, tag_name)
                    SELECT $1, tag_name FROM template_tags WHERE template_id = $2"#,
                )
                .bind(successor.id)
                .bind(original_id)
                .execute(&mut **tx)
                .await?;

                let original = Self::require_template_tx(tx, original_id).await?;
                Ok(MutationResult::SeriesSplit {
                    original,
                    successor,
                })
            }

            MutationPlan::UpdateTemplate { template_id, data } => {
                let updated = Self::update_template_tx(tx, template_id, data).await?;
                Ok(MutationResult::TemplateUpdated(updated))
            }

            MutationPlan::TruncateSeries { template_id, until } => {
                let truncated_rule = Self::truncated_rule(template, until)?;
                sqlx::query(
                    "UPDATE todo_templates SET rule = $1, updated_at = $2 WHERE id = $3",
                )
                .bind(serde_json::to_string(&truncated_rule)?)
                .bind(Utc::now())
                .bind(template_id)
                .execute(&mut **tx)
                .await?;
                let updated = Self::require_template_tx(tx, template_id).await?;
                Ok(MutationResult::SeriesTruncated(updated))
            }

            MutationPlan::RetireSeries { template_id } => {
                Self::retire_template_tx(tx, template_id).await?;
                Ok(MutationResult::SeriesRetired { template_id })
            }
        }
    }

    fn truncated_rule(
        template: &TodoTemplate,
        until: NaiveDate,
    ) -> Result<crate::rule::RecurrenceRule, CoreError> {
        let mut rule = template
            .rule
            .clone()
            .ok_or_else(|| CoreError::InvalidInput("template has no recurrence rule".to_string()))?;
        rule.end_condition = EndCondition::Until { date: until };
        Ok(rule)
    }
}
