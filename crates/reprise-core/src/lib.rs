//! # Reprise Core Library
//!
//! A personal task tracker library built around first-class recurring todos:
//! rules are expanded on demand instead of pre-generating rows, and only
//! occurrences the user has touched are ever persisted.
//!
//! ## Features
//!
//! - **Native Recurrence Expansion**: RFC 5545-style rules (frequencies,
//!   `byX` constraint sets, `bySetPos`, exception/additional dates) expanded
//!   with a two-phase coarse/fine algorithm
//! - **Virtual Occurrences**: listings merge the template with sparse
//!   override rows at query time; completing one occurrence touches exactly
//!   one row
//! - **Scoped Mutations**: this-occurrence, this-and-future (series split),
//!   and entire-series edit/delete semantics
//! - **Stable Identity**: occurrences addressed as `{templateId}:{dayOffset}`,
//!   immune to neighbouring cancellations
//! - **Timezone Awareness**: IANA timezone support with DST gap/fold handling
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`rule`]: The recurrence rule value object and its serde contract
//! - [`validate`]: Rule validation with accumulated, field-keyed errors
//! - [`expand`]: Windowed occurrence expansion
//! - [`identity`]: Composite occurrence ids and day-offset arithmetic
//! - [`mutation`]: Pure planning of scoped mutations
//! - [`projection`]: Template/override merge rules
//! - [`repository`]: Data access layer with the Repository pattern
//! - [`timezone`]: Timezone utilities and validation
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use reprise_core::{
//!     db,
//!     models::NewTemplateData,
//!     repository::{SqliteRepository, TemplateRepository},
//!     rule::{Frequency, RecurrenceRule},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), reprise_core::error::CoreError> {
//!     let pool = db::establish_connection("todos.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!
//!     let anchor = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
//!     let data = NewTemplateData {
//!         title: "Daily standup".to_string(),
//!         rule: Some(RecurrenceRule::new(Frequency::Daily, anchor, "America/New_York")),
//!         ..Default::default()
//!     };
//!
//!     let template = repo.add_template(data).await?;
//!     println!("Created template: {}", template.title);
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod expand;
pub mod identity;
pub mod models;
pub mod mutation;
pub mod projection;
pub mod repository;
pub mod rule;
pub mod timezone;
pub mod validate;
