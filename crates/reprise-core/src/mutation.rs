//! Scoped mutation planning.
//!
//! Editing, deleting, or completing one occurrence of a recurring todo can
//! take very different shapes in storage: a sparse override row, a tombstone,
//! a series split, or a plain template update. The functions here decide
//! which shape applies — pure decisions, no I/O — and return a
//! [`MutationPlan`] the repository layer executes inside one transaction.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::expand::occurrences_before;
use crate::identity::date_for;
use crate::models::{EditScope, OccurrenceChanges, TodoTemplate, UpdateTemplateData};
use crate::rule::{EndCondition, RecurrenceRule};

/// The storage shape a scoped mutation resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationPlan {
    /// Write (or update) the sparse override row for one occurrence.
    /// `None` in `completed_on`/`deleted` means "leave that field as-is".
    UpsertOverride {
        template_id: Uuid,
        offset: i64,
        changes: OccurrenceChanges,
        completed_on: Option<Option<DateTime<Utc>>>,
        deleted: Option<bool>,
    },
    /// Truncate the original series to the day before the split point and
    /// insert the successor template in the same transaction.
    SplitSeries {
        original_id: Uuid,
        /// New `Until` date for the original series
        truncate_until: NaiveDate,
        /// Offset of the split occurrence in the original series; override
        /// rows at or past it are re-keyed onto the successor
        split_offset: i64,
        successor: TodoTemplate,
    },
    /// Rewrite template fields in place, past occurrences included
    UpdateTemplate {
        template_id: Uuid,
        data: UpdateTemplateData,
    },
    /// End the series before a given date without a successor
    TruncateSeries {
        template_id: Uuid,
        until: NaiveDate,
    },
    /// Retire the template entirely
    RetireSeries { template_id: Uuid },
}

/// Plans an edit of the occurrence at `offset` under the given scope.
///
/// One-off templates have a single occurrence, so every scope collapses to
/// a plain template update.
pub fn plan_edit(
    template: &TodoTemplate,
    offset: i64,
    scope: EditScope,
    changes: OccurrenceChanges,
) -> Result<MutationPlan, CoreError> {
    if template.rule.is_none() {
        return Ok(MutationPlan::UpdateTemplate {
            template_id: template.id,
            data: template_data_from(changes),
        });
    }
    match scope {
        EditScope::ThisOccurrence => Ok(MutationPlan::UpsertOverride {
            template_id: template.id,
            offset,
            changes,
            completed_on: None,
            deleted: None,
        }),
        EditScope::ThisAndFuture => plan_split(template, offset, changes),
        EditScope::EntireSeries => Ok(MutationPlan::UpdateTemplate {
            template_id: template.id,
            data: template_data_from(changes),
        }),
    }
}

/// Plans a delete of the occurrence at `offset` under the given scope.
pub fn plan_delete(
    template: &TodoTemplate,
    offset: i64,
    scope: EditScope,
) -> Result<MutationPlan, CoreError> {
    if template.rule.is_none() {
        return Ok(MutationPlan::RetireSeries {
            template_id: template.id,
        });
    }
    match scope {
        EditScope::ThisOccurrence => Ok(MutationPlan::UpsertOverride {
            template_id: template.id,
            offset,
            changes: OccurrenceChanges::default(),
            completed_on: None,
            deleted: Some(true),
        }),
        EditScope::ThisAndFuture => {
            let rule = template.rule.as_ref().ok_or_else(|| {
                CoreError::InvalidInput("cannot truncate a one-off todo".to_string())
            })?;
            let occurrence_date = occurrence_date(template, offset)?;
            ensure_series_reaches(rule, template.base_time, occurrence_date)?;
            Ok(MutationPlan::TruncateSeries {
                template_id: template.id,
                until: day_before(occurrence_date),
            })
        }
        EditScope::EntireSeries => Ok(MutationPlan::RetireSeries {
            template_id: template.id,
        }),
    }
}

/// Plans marking the occurrence at `offset` complete (or clearing the mark).
///
/// Completion is always a per-occurrence fact: it never splits or rewrites
/// the series, so no scope parameter exists here.
pub fn plan_completion(
    template: &TodoTemplate,
    offset: i64,
    completed_on: Option<DateTime<Utc>>,
) -> MutationPlan {
    MutationPlan::UpsertOverride {
        template_id: template.id,
        offset,
        changes: OccurrenceChanges::default(),
        completed_on: Some(completed_on),
        deleted: None,
    }
}

fn plan_split(
    template: &TodoTemplate,
    offset: i64,
    changes: OccurrenceChanges,
) -> Result<MutationPlan, CoreError> {
    let rule = template
        .rule
        .as_ref()
        .ok_or_else(|| CoreError::InvalidInput("cannot split a one-off todo".to_string()))?;
    let split_date = occurrence_date(template, offset)?;
    ensure_series_reaches(rule, template.base_time, split_date)?;

    let mut successor_rule = rule.clone();
    successor_rule.anchor_date = split_date;
    if let EndCondition::Count { count } = rule.end_condition {
        // The successor inherits only the occurrences not yet consumed by
        // the truncated original; ensure_series_reaches guarantees at
        // least one remains
        let consumed = occurrences_before(rule, template.base_time, split_date)?;
        let remaining = u64::from(count).saturating_sub(consumed);
        successor_rule.end_condition = EndCondition::Count {
            count: remaining.min(u64::from(u32::MAX)) as u32,
        };
    }
    // Dates before the split stay with the original series
    if let Some(exceptions) = &mut successor_rule.exception_dates {
        exceptions.retain(|d| *d >= split_date);
    }
    if let Some(additions) = &mut successor_rule.additional_dates {
        additions.retain(|d| *d >= split_date);
    }

    let now = Utc::now();
    let successor = TodoTemplate {
        id: Uuid::now_v7(),
        title: changes.title.clone().unwrap_or_else(|| template.title.clone()),
        description: match &changes.description {
            Some(value) => value.clone(),
            None => template.description.clone(),
        },
        priority: changes.priority.unwrap_or(template.priority),
        category: match &changes.category {
            Some(value) => value.clone(),
            None => template.category.clone(),
        },
        anchor_date: split_date,
        base_time: template.base_time,
        rule: Some(successor_rule),
        active: true,
        split_from: Some(template.id),
        created_at: now,
        updated_at: now,
    };

    Ok(MutationPlan::SplitSeries {
        original_id: template.id,
        truncate_until: day_before(split_date),
        split_offset: offset,
        successor,
    })
}

/// A this-and-future mutation at `date` must land within the series.
/// Rewriting the end condition past the last occurrence would not truncate
/// the series but extend it.
fn ensure_series_reaches(
    rule: &RecurrenceRule,
    base_time: NaiveTime,
    date: NaiveDate,
) -> Result<(), CoreError> {
    match rule.end_condition {
        EndCondition::Never => Ok(()),
        EndCondition::Until { date: until } => {
            if until < date {
                Err(CoreError::SeriesSplitConflict(format!(
                    "series already ends on {} before {}",
                    until, date
                )))
            } else {
                Ok(())
            }
        }
        EndCondition::Count { count } => {
            let consumed = occurrences_before(rule, base_time, date)?;
            if consumed >= u64::from(count) {
                Err(CoreError::SeriesSplitConflict(format!(
                    "series exhausts its {} occurrences before {}",
                    count, date
                )))
            } else {
                Ok(())
            }
        }
    }
}

fn occurrence_date(template: &TodoTemplate, offset: i64) -> Result<NaiveDate, CoreError> {
    date_for(template.anchor_date, offset).ok_or_else(|| {
        CoreError::InvalidInput(format!(
            "offset {} leaves the supported date range for anchor {}",
            offset, template.anchor_date
        ))
    })
}

fn day_before(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

fn template_data_from(changes: OccurrenceChanges) -> UpdateTemplateData {
    UpdateTemplateData {
        title: changes.title,
        description: changes.description,
        priority: changes.priority,
        category: changes.category,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::rule::{Frequency, RecurrenceRule};
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekly_template() -> TodoTemplate {
        let anchor = date(2025, 1, 6);
        TodoTemplate {
            title: "Water the plants".to_string(),
            anchor_date: anchor,
            base_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            rule: Some(RecurrenceRule::new(Frequency::Weekly, anchor, "UTC")),
            ..Default::default()
        }
    }

    fn title_change(title: &str) -> OccurrenceChanges {
        OccurrenceChanges {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_one_off_scopes_collapse_to_template_operations() {
        let mut template = weekly_template();
        template.rule = None;

        for scope in [
            EditScope::ThisOccurrence,
            EditScope::ThisAndFuture,
            EditScope::EntireSeries,
        ] {
            let plan = plan_edit(&template, 0, scope, title_change("Renamed")).unwrap();
            assert!(matches!(plan, MutationPlan::UpdateTemplate { .. }));

            let plan = plan_delete(&template, 0, scope).unwrap();
            assert!(matches!(plan, MutationPlan::RetireSeries { .. }));
        }
    }

    #[test]
    fn test_this_occurrence_edit_becomes_override() {
        let template = weekly_template();
        let plan = plan_edit(
            &template,
            14,
            EditScope::ThisOccurrence,
            title_change("Just this one"),
        )
        .unwrap();

        match plan {
            MutationPlan::UpsertOverride {
                template_id,
                offset,
                changes,
                completed_on,
                deleted,
            } => {
                assert_eq!(template_id, template.id);
                assert_eq!(offset, 14);
                assert_eq!(changes.title.as_deref(), Some("Just this one"));
                assert_eq!(completed_on, None);
                assert_eq!(deleted, None);
            }
            other => panic!("expected override plan, got {:?}", other),
        }
    }

    #[test]
    fn test_this_and_future_splits_the_series() {
        let template = weekly_template();
        let plan = plan_edit(
            &template,
            14,
            EditScope::ThisAndFuture,
            title_change("New era"),
        )
        .unwrap();

        match plan {
            MutationPlan::SplitSeries {
                original_id,
                truncate_until,
                split_offset,
                successor,
            } => {
                assert_eq!(original_id, template.id);
                assert_eq!(split_offset, 14);
                assert_eq!(truncate_until, date(2025, 1, 19));
                assert_eq!(successor.anchor_date, date(2025, 1, 20));
                assert_eq!(successor.title, "New era");
                assert_eq!(successor.split_from, Some(template.id));
                let rule = successor.rule.unwrap();
                assert_eq!(rule.anchor_date, date(2025, 1, 20));
            }
            other => panic!("expected split plan, got {:?}", other),
        }
    }

    #[test]
    fn test_split_adjusts_count_to_remaining_occurrences() {
        let mut template = weekly_template();
        if let Some(rule) = template.rule.as_mut() {
            rule.end_condition = EndCondition::Count { count: 10 };
        }

        // Split at the third occurrence (offset 14): two consumed, eight left
        let plan = plan_edit(&template, 14, EditScope::ThisAndFuture, title_change("x")).unwrap();
        let MutationPlan::SplitSeries { successor, .. } = plan else {
            panic!("expected split plan");
        };
        assert_eq!(
            successor.rule.unwrap().end_condition,
            EndCondition::Count { count: 8 }
        );
    }

    #[test]
    fn test_split_past_count_end_is_a_conflict() {
        // Count{2} ends on Jan 13; offset 28 lies past the last occurrence,
        // so a this-and-future edit there must not mint a successor
        let mut template = weekly_template();
        if let Some(rule) = template.rule.as_mut() {
            rule.end_condition = EndCondition::Count { count: 2 };
        }

        let result = plan_edit(&template, 28, EditScope::ThisAndFuture, title_change("x"));
        assert!(matches!(result, Err(CoreError::SeriesSplitConflict(_))));
    }

    #[test]
    fn test_future_delete_past_count_end_is_a_conflict() {
        // Truncating to Until(Jan 26) would let a Count{2} series run to
        // four occurrences instead of ending it
        let mut template = weekly_template();
        if let Some(rule) = template.rule.as_mut() {
            rule.end_condition = EndCondition::Count { count: 2 };
        }

        let result = plan_delete(&template, 28, EditScope::ThisAndFuture);
        assert!(matches!(result, Err(CoreError::SeriesSplitConflict(_))));
    }

    #[test]
    fn test_future_delete_conflicts_with_earlier_until() {
        let mut template = weekly_template();
        if let Some(rule) = template.rule.as_mut() {
            rule.end_condition = EndCondition::Until {
                date: date(2025, 1, 15),
            };
        }

        let result = plan_delete(&template, 21, EditScope::ThisAndFuture);
        assert!(matches!(result, Err(CoreError::SeriesSplitConflict(_))));
    }

    #[test]
    fn test_split_at_last_remaining_occurrence_keeps_exactly_one() {
        let mut template = weekly_template();
        if let Some(rule) = template.rule.as_mut() {
            rule.end_condition = EndCondition::Count { count: 2 };
        }

        // Offset 7 is the second and last occurrence: one consumed, one left
        let plan = plan_edit(&template, 7, EditScope::ThisAndFuture, title_change("x")).unwrap();
        let MutationPlan::SplitSeries { successor, .. } = plan else {
            panic!("expected split plan");
        };
        assert_eq!(
            successor.rule.unwrap().end_condition,
            EndCondition::Count { count: 1 }
        );
    }

    #[test]
    fn test_split_conflicts_with_earlier_until() {
        let mut template = weekly_template();
        if let Some(rule) = template.rule.as_mut() {
            rule.end_condition = EndCondition::Until {
                date: date(2025, 1, 15),
            };
        }

        let result = plan_edit(&template, 14, EditScope::ThisAndFuture, title_change("x"));
        assert!(matches!(result, Err(CoreError::SeriesSplitConflict(_))));
    }

    #[test]
    fn test_split_partitions_exception_and_additional_dates() {
        let mut template = weekly_template();
        if let Some(rule) = template.rule.as_mut() {
            rule.exception_dates = Some(vec![date(2025, 1, 13), date(2025, 1, 27)]);
            rule.additional_dates = Some(vec![date(2025, 1, 9), date(2025, 2, 5)]);
        }

        let plan = plan_edit(&template, 14, EditScope::ThisAndFuture, title_change("x")).unwrap();
        let MutationPlan::SplitSeries { successor, .. } = plan else {
            panic!("expected split plan");
        };
        let rule = successor.rule.unwrap();
        assert_eq!(rule.exception_dates, Some(vec![date(2025, 1, 27)]));
        assert_eq!(rule.additional_dates, Some(vec![date(2025, 2, 5)]));
    }

    #[test]
    fn test_completion_never_splits() {
        let template = weekly_template();
        let now = Utc::now();
        let plan = plan_completion(&template, 35, Some(now));

        match plan {
            MutationPlan::UpsertOverride {
                offset,
                changes,
                completed_on,
                deleted,
                ..
            } => {
                assert_eq!(offset, 35);
                assert!(changes.is_empty());
                assert_eq!(completed_on, Some(Some(now)));
                assert_eq!(deleted, None);
            }
            other => panic!("expected override plan, got {:?}", other),
        }
    }

    #[test]
    fn test_future_delete_truncates_without_successor() {
        let template = weekly_template();
        let plan = plan_delete(&template, 21, EditScope::ThisAndFuture).unwrap();
        assert_eq!(
            plan,
            MutationPlan::TruncateSeries {
                template_id: template.id,
                until: date(2025, 1, 26),
            }
        );
    }

    #[test]
    fn test_series_delete_retires_template() {
        let template = weekly_template();
        let plan = plan_delete(&template, 0, EditScope::EntireSeries).unwrap();
        assert_eq!(
            plan,
            MutationPlan::RetireSeries {
                template_id: template.id
            }
        );
    }

    #[test]
    fn test_entire_series_edit_updates_template() {
        let template = weekly_template();
        let changes = OccurrenceChanges {
            priority: Some(Priority::High),
            ..Default::default()
        };
        let plan = plan_edit(&template, 7, EditScope::EntireSeries, changes).unwrap();
        match plan {
            MutationPlan::UpdateTemplate { template_id, data } => {
                assert_eq!(template_id, template.id);
                assert_eq!(data.priority, Some(Priority::High));
                assert!(data.title.is_none());
            }
            other => panic!("expected template update, got {:?}", other),
        }
    }
}
