use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::rule::RecurrenceRule;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    None,
    Low,
    Medium,
    High,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid priority: {0}")]
pub struct ParsePriorityError(String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Priority::None),
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::None => write!(f, "none"),
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// The template that defines a todo, one-off or recurring.
///
/// A recurring template never appears in lists itself; it is the pattern its
/// occurrences are projected from. A one-off todo is a template with
/// `rule = None` and a single occurrence at offset 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TodoTemplate {
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Option<String>,
    /// Local calendar date that day offsets are computed relative to
    pub anchor_date: NaiveDate,
    /// Wall-clock time occurrences inherit unless the rule expands times
    pub base_time: NaiveTime,
    pub rule: Option<RecurrenceRule>,
    /// Retired templates are kept for history but project no occurrences
    pub active: bool,
    /// Set on successors created by this-and-future splits, pointing at the
    /// template the series was split from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_from: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for TodoTemplate {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            title: "".to_string(),
            description: None,
            priority: Priority::None,
            category: None,
            anchor_date: Utc::now().date_naive(),
            base_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            rule: None,
            active: true,
            split_from: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// A persisted deviation from the template for one occurrence.
///
/// Rows are sparse: a `None` field means "inherit from the template", and
/// only occurrences that were completed, edited individually, or deleted
/// individually have a row at all.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MaterializedOccurrence {
    #[serde(with = "uuid::serde::compact")]
    pub template_id: Uuid,
    /// Day offset from the template anchor (column renamed because OFFSET
    /// is a SQL keyword)
    #[sqlx(rename = "occurrence_offset")]
    pub offset: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    /// Tombstone: the occurrence is hidden from all listings
    pub deleted: bool,
    pub completed_on: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaterializedOccurrence {
    /// A fresh row that overrides nothing yet.
    pub fn blank(template_id: Uuid, offset: i64) -> Self {
        Self {
            template_id,
            offset,
            title: None,
            description: None,
            priority: None,
            category: None,
            deleted: false,
            completed_on: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Scope for edit, delete, and completion operations on recurring todos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditScope {
    /// Affect only the selected occurrence
    ThisOccurrence,
    /// Split the series and apply the change from this occurrence onward
    ThisAndFuture,
    /// Modify the whole series, past occurrences included
    EntireSeries,
}

impl std::fmt::Display for EditScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditScope::ThisOccurrence => write!(f, "occurrence"),
            EditScope::ThisAndFuture => write!(f, "future"),
            EditScope::EntireSeries => write!(f, "series"),
        }
    }
}

impl FromStr for EditScope {
    type Err = ParseEditScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "occurrence" | "this" => Ok(EditScope::ThisOccurrence),
            "future" | "this_and_future" => Ok(EditScope::ThisAndFuture),
            "series" | "entire" | "all" => Ok(EditScope::EntireSeries),
            _ => Err(ParseEditScopeError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid edit scope: {0}")]
pub struct ParseEditScopeError(String);

/// Data required to create a new template
#[derive(Debug, Clone, Default)]
pub struct NewTemplateData {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub anchor_date: Option<NaiveDate>,
    pub base_time: Option<NaiveTime>,
    /// When present the template is a recurring series
    pub rule: Option<RecurrenceRule>,
}

/// Field-level template update. The double-`Option` distinguishes "leave
/// unchanged" (outer `None`) from "clear the value" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateTemplateData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub category: Option<Option<String>>,
    pub base_time: Option<NaiveTime>,
    pub rule: Option<Option<RecurrenceRule>>,
    pub add_tags: Option<Vec<String>>,
    pub remove_tags: Option<Vec<String>>,
}

/// The per-occurrence fields a scoped edit may change.
///
/// Scheduling changes (anchor, rule, time) are series-level edits and go
/// through [`UpdateTemplateData`] instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OccurrenceChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub category: Option<Option<String>>,
}

impl OccurrenceChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.category.is_none()
    }
}

/// One occurrence as presented to the user: template defaults with any
/// materialized overrides already merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceView {
    pub template_id: Uuid,
    /// Day offset from the template anchor; with `template_id` this forms
    /// the occurrence's stable composite id
    pub offset: i64,
    /// Resolved UTC instant of the occurrence
    pub scheduled_at: DateTime<Utc>,
    /// Wall-clock datetime in the series timezone
    pub scheduled_local: NaiveDateTime,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub completed: bool,
    pub completed_on: Option<DateTime<Utc>>,
    /// Whether a materialized row contributed to this view
    pub overridden: bool,
}

/// Outcome of a scoped mutation, reported so callers can tell which shape
/// the change took.
#[derive(Debug)]
pub enum MutationResult {
    /// A this-only edit or completion materialized (or updated) an override
    OccurrenceOverridden { occurrence: MaterializedOccurrence },
    /// A this-only delete materialized a tombstone
    OccurrenceTombstoned { template_id: Uuid, offset: i64 },
    /// A this-and-future edit truncated the original and created a successor
    SeriesSplit {
        original: TodoTemplate,
        successor: TodoTemplate,
    },
    /// An entire-series edit rewrote the template in place
    TemplateUpdated(TodoTemplate),
    /// A this-and-future delete ended the series before the occurrence
    SeriesTruncated(TodoTemplate),
    /// An entire-series delete retired the template
    SeriesRetired { template_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_round_trip() {
        for p in [Priority::None, Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(p.to_string().parse::<Priority>().unwrap(), p);
        }
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_edit_scope_aliases() {
        assert_eq!("this".parse::<EditScope>().unwrap(), EditScope::ThisOccurrence);
        assert_eq!(
            "this_and_future".parse::<EditScope>().unwrap(),
            EditScope::ThisAndFuture
        );
        assert_eq!("all".parse::<EditScope>().unwrap(), EditScope::EntireSeries);
        assert!("sometimes".parse::<EditScope>().is_err());
    }

    #[test]
    fn test_occurrence_changes_is_empty() {
        assert!(OccurrenceChanges::default().is_empty());
        let changes = OccurrenceChanges {
            description: Some(None),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
