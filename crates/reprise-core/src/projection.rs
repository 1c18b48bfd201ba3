//! Occurrence projection.
//!
//! The merge rule for presenting an occurrence: start from the template's
//! fields, overlay whatever a materialized override row pins down, and hide
//! the occurrence entirely when the row is a tombstone. This is the pure
//! half of projection; the repository layer feeds it expanded instants and
//! loaded rows.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{MaterializedOccurrence, OccurrenceView, TodoTemplate};

/// Merges one occurrence into its presented form.
///
/// Returns `None` when the override row is a tombstone — the occurrence
/// exists in the pattern but has been individually deleted.
pub fn merge_occurrence(
    template: &TodoTemplate,
    tags: &[String],
    offset: i64,
    scheduled_at: DateTime<Utc>,
    scheduled_local: NaiveDateTime,
    row: Option<&MaterializedOccurrence>,
) -> Option<OccurrenceView> {
    if row.is_some_and(|r| r.deleted) {
        return None;
    }

    let title = row
        .and_then(|r| r.title.clone())
        .unwrap_or_else(|| template.title.clone());
    let description = row
        .and_then(|r| r.description.clone())
        .or_else(|| template.description.clone());
    let priority = row.and_then(|r| r.priority).unwrap_or(template.priority);
    let category = row
        .and_then(|r| r.category.clone())
        .or_else(|| template.category.clone());
    let completed_on = row.and_then(|r| r.completed_on);

    Some(OccurrenceView {
        template_id: template.id,
        offset,
        scheduled_at,
        scheduled_local,
        title,
        description,
        priority,
        category,
        tags: tags.to_vec(),
        completed: completed_on.is_some(),
        completed_on,
        overridden: row.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    fn template() -> TodoTemplate {
        TodoTemplate {
            title: "Team standup".to_string(),
            description: Some("Daily sync".to_string()),
            priority: Priority::Medium,
            category: Some("work".to_string()),
            ..Default::default()
        }
    }

    fn occurrence_at_nine() -> (DateTime<Utc>, NaiveDateTime) {
        let at = Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap();
        let local = NaiveDate::from_ymd_opt(2025, 1, 20)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        (at, local)
    }

    #[test]
    fn test_virtual_occurrence_inherits_template_fields() {
        let template = template();
        let (at, local) = occurrence_at_nine();
        let view =
            merge_occurrence(&template, &["sync".to_string()], 14, at, local, None).unwrap();

        assert_eq!(view.title, "Team standup");
        assert_eq!(view.description.as_deref(), Some("Daily sync"));
        assert_eq!(view.priority, Priority::Medium);
        assert_eq!(view.tags, vec!["sync".to_string()]);
        assert_eq!(view.offset, 14);
        assert!(!view.completed);
        assert!(!view.overridden);
    }

    #[test]
    fn test_override_fields_win_and_gaps_inherit() {
        let template = template();
        let (at, local) = occurrence_at_nine();
        let mut row = MaterializedOccurrence::blank(template.id, 14);
        row.title = Some("Standup (moved room)".to_string());
        row.priority = Some(Priority::High);

        let view = merge_occurrence(&template, &[], 14, at, local, Some(&row)).unwrap();
        assert_eq!(view.title, "Standup (moved room)");
        assert_eq!(view.priority, Priority::High);
        // Fields the row leaves unset still come from the template
        assert_eq!(view.description.as_deref(), Some("Daily sync"));
        assert_eq!(view.category.as_deref(), Some("work"));
        assert!(view.overridden);
    }

    #[test]
    fn test_tombstone_hides_occurrence() {
        let template = template();
        let (at, local) = occurrence_at_nine();
        let mut row = MaterializedOccurrence::blank(template.id, 14);
        row.deleted = true;

        assert!(merge_occurrence(&template, &[], 14, at, local, Some(&row)).is_none());
    }

    #[test]
    fn test_completion_comes_from_the_row() {
        let template = template();
        let (at, local) = occurrence_at_nine();
        let mut row = MaterializedOccurrence::blank(template.id, 14);
        row.completed_on = Some(at);

        let view = merge_occurrence(&template, &[], 14, at, local, Some(&row)).unwrap();
        assert!(view.completed);
        assert_eq!(view.completed_on, Some(at));

        let row = MaterializedOccurrence::blank(Uuid::now_v7(), 14);
        let view = merge_occurrence(&template, &[], 14, at, local, Some(&row)).unwrap();
        assert!(!view.completed);
    }
}
