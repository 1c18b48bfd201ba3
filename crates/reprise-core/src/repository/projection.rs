use crate::error::CoreError;
use crate::expand::{expand_in_zone, next_occurrence_after};
use crate::identity::{date_for, instant_for, offset_for, OccurrenceId};
use crate::models::{MaterializedOccurrence, OccurrenceView, TodoTemplate};
use crate::projection::merge_occurrence;
use crate::repository::{OccurrenceRepository, SqliteRepository, TemplateRepository};
use crate::timezone::{parse_timezone, resolve_local, to_local};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

impl SqliteRepository {
    async fn project_template(
        &self,
        template: &TodoTemplate,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceView>, CoreError> {
        if !template.active {
            return Ok(Vec::new());
        }
        let tags = self.find_template_tags(template.id).await?;
        let overrides: HashMap<i64, MaterializedOccurrence> = self
            .find_overrides_for_template(template.id)
            .await?
            .into_iter()
            .map(|row| (row.offset, row))
            .collect();

        let mut views = Vec::new();
        match &template.rule {
            None => {
                let scheduled_local = template.anchor_date.and_time(template.base_time);
                let scheduled_at = scheduled_local.and_utc();
                if scheduled_at >= window_start && scheduled_at <= window_end {
                    views.extend(merge_occurrence(
                        template,
                        &tags,
                        0,
                        scheduled_at,
                        scheduled_local,
                        overrides.get(&0),
                    ));
                }
            }
            Some(rule) => {
                let zoned =
                    expand_in_zone(rule, template.base_time, window_start, window_end)?;
                for instant in zoned {
                    let offset = offset_for(rule.anchor_date, instant.date_naive());
                    views.extend(merge_occurrence(
                        template,
                        &tags,
                        offset,
                        instant.with_timezone(&Utc),
                        instant.naive_local(),
                        overrides.get(&offset),
                    ));
                }
            }
        }
        Ok(views)
    }
}

#[async_trait]
impl super::ProjectionRepository for SqliteRepository {
    async fn project_occurrences(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceView>, CoreError> {
        let templates = self.find_templates(false).await?;
        let mut views = Vec::new();
        for template in &templates {
            views.extend(
                self.project_template(template, window_start, window_end)
                    .await?,
            );
        }
        views.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then(a.template_id.cmp(&b.template_id))
                .then(a.offset.cmp(&b.offset))
        });
        Ok(views)
    }

    async fn project_template_occurrences(
        &self,
        template_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceView>, CoreError> {
        let template = self.require_template(template_id).await?;
        self.project_template(&template, window_start, window_end)
            .await
    }

    async fn find_occurrence(
        &self,
        id: OccurrenceId,
    ) -> Result<Option<OccurrenceView>, CoreError> {
        let Some(template) = self.fetch_template(id.template_id).await? else {
            return Ok(None);
        };
        // Retired series resolve nothing, matching the listings
        if !template.active {
            return Ok(None);
        }
        let tags = self.find_template_tags(template.id).await?;
        let row = self.find_override(id.template_id, id.offset).await?;

        match &template.rule {
            None => {
                if id.offset != 0 && row.is_none() {
                    return Ok(None);
                }
                let Some(local_date) = date_for(template.anchor_date, id.offset) else {
                    return Ok(None);
                };
                let scheduled_local = local_date.and_time(template.base_time);
                Ok(merge_occurrence(
                    &template,
                    &tags,
                    id.offset,
                    scheduled_local.and_utc(),
                    scheduled_local,
                    row.as_ref(),
                ))
            }
            Some(rule) => {
                match instant_for(rule, template.base_time, id.offset)? {
                    Some(instant) => {
                        let tz = parse_timezone(&rule.timezone)?;
                        Ok(merge_occurrence(
                            &template,
                            &tags,
                            id.offset,
                            instant,
                            to_local(tz, instant),
                            row.as_ref(),
                        ))
                    }
                    // The rule no longer generates this offset, but an
                    // orphaned override stays addressable by id
                    None if row.is_some() => {
                        let Some(local_date) = date_for(rule.anchor_date, id.offset) else {
                            return Ok(None);
                        };
                        let tz = parse_timezone(&rule.timezone)?;
                        let scheduled_local = local_date.and_time(template.base_time);
                        let scheduled_at =
                            resolve_local(tz, scheduled_local).with_timezone(&Utc);
                        Ok(merge_occurrence(
                            &template,
                            &tags,
                            id.offset,
                            scheduled_at,
                            scheduled_local,
                            row.as_ref(),
                        ))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    async fn next_occurrence(
        &self,
        template_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        let template = self.require_template(template_id).await?;
        if !template.active {
            return Ok(None);
        }
        match &template.rule {
            None => {
                let instant = template
                    .anchor_date
                    .and_time(template.base_time)
                    .and_utc();
                Ok((instant > after).then_some(instant))
            }
            Some(rule) => next_occurrence_after(rule, template.base_time, after),
        }
    }
}
