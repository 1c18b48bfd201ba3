use crate::error::CoreError;
use crate::models::{NewTemplateData, Priority, TodoTemplate, UpdateTemplateData};
use crate::repository::SqliteRepository;
use crate::rule::RecurrenceRule;
use crate::validate::{validate, ValidationMode};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use uuid::Uuid;

/// Persistence shape of a template. The rule is stored as a JSON document,
/// so the row type carries it as text and the conversion to [`TodoTemplate`]
/// deserializes it.
#[derive(Debug, FromRow)]
pub(crate) struct TemplateRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Option<String>,
    pub anchor_date: NaiveDate,
    pub base_time: NaiveTime,
    pub rule: Option<String>,
    pub active: bool,
    pub split_from: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for TodoTemplate {
    type Error = CoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let rule: Option<RecurrenceRule> = row
            .rule
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(TodoTemplate {
            id: row.id,
            title: row.title,
            description: row.description,
            priority: row.priority,
            category: row.category,
            anchor_date: row.anchor_date,
            base_time: row.base_time,
            rule,
            active: row.active,
            split_from: row.split_from,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl SqliteRepository {
    pub(crate) async fn fetch_template(
        &self,
        id: Uuid,
    ) -> Result<Option<TodoTemplate>, CoreError> {
        let row: Option<TemplateRow> = sqlx::query_as("SELECT * FROM todo_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(TodoTemplate::try_from).transpose()
    }

    pub(crate) async fn require_template(&self, id: Uuid) -> Result<TodoTemplate, CoreError> {
        self.fetch_template(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Template with id {} not found", id)))
    }

    /// Reads a template inside an existing transaction, so a mutation plans
    /// against the exact state it is about to change.
    pub(crate) async fn require_template_tx(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<TodoTemplate, CoreError> {
        let row: Option<TemplateRow> = sqlx::query_as("SELECT * FROM todo_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        row.map(TodoTemplate::try_from)
            .transpose()?
            .ok_or_else(|| CoreError::NotFound(format!("Template with id {} not found", id)))
    }

    /// Writes a full template row inside an existing transaction. Used by
    /// creation and by series splits, which insert their successor alongside
    /// other writes.
    pub(crate) async fn insert_template(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        template: &TodoTemplate,
    ) -> Result<(), CoreError> {
        let rule_json = template
            .rule
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            r#"INSERT INTO todo_templates
            (id, title, description, priority, category, anchor_date, base_time, rule, active, split_from, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(template.id)
        .bind(&template.title)
        .bind(&template.description)
        .bind(template.priority)
        .bind(&template.category)
        .bind(template.anchor_date)
        .bind(template.base_time)
        .bind(rule_json)
        .bind(template.active)
        .bind(template.split_from)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl super::TemplateRepository for SqliteRepository {
    async fn add_template(&self, data: NewTemplateData) -> Result<TodoTemplate, CoreError> {
        if let Some(rule) = &data.rule {
            validate(rule, ValidationMode::Create).map_err(CoreError::RuleValidation)?;
        }

        // The template anchor always mirrors the rule's anchor so day
        // offsets have a single source of truth
        let anchor_date = match &data.rule {
            Some(rule) => rule.anchor_date,
            None => data
                .anchor_date
                .unwrap_or_else(|| Utc::now().date_naive()),
        };
        let now = Utc::now();
        let template = TodoTemplate {
            id: Uuid::now_v7(),
            title: data.title,
            description: data.description,
            priority: data.priority.unwrap_or(Priority::None),
            category: data.category,
            anchor_date,
            base_time: data
                .base_time
                .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()),
            rule: data.rule,
            active: true,
            split_from: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool().begin().await?;
        Self::insert_template(&mut tx, &template).await?;
        for tag in &data.tags {
            sqlx::query(
                "INSERT OR IGNORE INTO template_tags (template_id, tag_name) VALUES ($1, $2)",
            )
            .bind(template.id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(template)
    }

    async fn find_template_by_id(&self, id: Uuid) -> Result<Option<TodoTemplate>, CoreError> {
        self.fetch_template(id).await
    }

    async fn find_templates(&self, include_retired: bool) -> Result<Vec<TodoTemplate>, CoreError> {
        let query = if include_retired {
            "SELECT * FROM todo_templates ORDER BY created_at"
        } else {
            "SELECT * FROM todo_templates WHERE active = TRUE ORDER BY created_at"
        };
        let rows: Vec<TemplateRow> = sqlx::query_as(query).fetch_all(self.pool()).await?;
        rows.into_iter().map(TodoTemplate::try_from).collect()
    }

    async fn find_template_tags(&self, id: Uuid) -> Result<Vec<String>, CoreError> {
        let tags = sqlx::query_scalar(
            "SELECT tag_name FROM template_tags WHERE template_id = $1 ORDER BY tag_name",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;
        Ok(tags)
    }

    async fn update_template(
        &self,
        id: Uuid,
        data: UpdateTemplateData,
    ) -> Result<TodoTemplate, CoreError> {
        let mut tx = self.pool().begin().await?;
        let updated = Self::update_template_tx(&mut tx, id, data).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn retire_template(&self, id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        Self::retire_template_tx(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }
}

impl SqliteRepository {
    /// Partial template update as part of an existing transaction.
    pub(crate) async fn update_template_tx(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        id: Uuid,
        data: UpdateTemplateData,
    ) -> Result<TodoTemplate, CoreError> {
        if let Some(Some(rule)) = &data.rule {
            validate(rule, ValidationMode::Update).map_err(CoreError::RuleValidation)?;
        }

        let current: Option<TemplateRow> =
            sqlx::query_as("SELECT * FROM todo_templates WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        if current.is_none() {
            return Err(CoreError::NotFound(format!(
                "Template with id {} not found",
                id
            )));
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE todo_templates SET ");
        let mut updated = false;

        if let Some(title) = &data.title {
            qb.push("title = ");
            qb.push_bind(title);
            updated = true;
        }
        if let Some(description) = &data.description {
            if updated {
                qb.push(", ");
            }
            qb.push("description = ");
            qb.push_bind(description.clone());
            updated = true;
        }
        if let Some(priority) = data.priority {
            if updated {
                qb.push(", ");
            }
            qb.push("priority = ");
            qb.push_bind(priority);
            updated = true;
        }
        if let Some(category) = &data.category {
            if updated {
                qb.push(", ");
            }
            qb.push("category = ");
            qb.push_bind(category.clone());
            updated = true;
        }
        if let Some(base_time) = data.base_time {
            if updated {
                qb.push(", ");
            }
            qb.push("base_time = ");
            qb.push_bind(base_time);
            updated = true;
        }
        if let Some(rule) = &data.rule {
            if updated {
                qb.push(", ");
            }
            let rule_json = rule.as_ref().map(serde_json::to_string).transpose()?;
            qb.push("rule = ");
            qb.push_bind(rule_json);
            // A rule change moves the anchor with it; removing the rule
            // keeps the current anchor as the one-off date
            if let Some(rule) = rule {
                qb.push(", anchor_date = ");
                qb.push_bind(rule.anchor_date);
            }
            updated = true;
        }

        if updated {
            qb.push(", updated_at = ");
            qb.push_bind(Utc::now());
            qb.push(" WHERE id = ");
            qb.push_bind(id);
            qb.build().execute(&mut **tx).await?;
        }

        if let Some(add_tags) = &data.add_tags {
            for tag in add_tags {
                sqlx::query(
                    "INSERT OR IGNORE INTO template_tags (template_id, tag_name) VALUES ($1, $2)",
                )
                .bind(id)
                .bind(tag)
                .execute(&mut **tx)
                .await?;
            }
        }
        if let Some(remove_tags) = &data.remove_tags {
            for tag in remove_tags {
                sqlx::query("DELETE FROM template_tags WHERE template_id = $1 AND tag_name = $2")
                    .bind(id)
                    .bind(tag)
                    .execute(&mut **tx)
                    .await?;
            }
        }

        let row: TemplateRow = sqlx::query_as("SELECT * FROM todo_templates WHERE id = $1")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
        row.try_into()
    }

    /// Retires a template and tombstones its materialized rows, so the
    /// series' occurrences stop resolving by id as well as by listing.
    pub(crate) async fn retire_template_tx(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE todo_templates SET active = FALSE, updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "Template with id {} not found",
                id
            )));
        }
        sqlx::query(
            "UPDATE materialized_occurrences SET deleted = TRUE, updated_at = $1 WHERE template_id = $2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
