//! # Cadence Core Library
//!
//! The recurrence engine behind Cadence: declarative repetition rules,
//! bounded idempotent instance materialization, and per-occurrence overrides.
//!
//! ## Features
//!
//! - **Sum-Typed Rules**: A closed set of repetition kinds (daily, weekly,
//!   monthly, yearly, workdays, weekends, custom) modeled so that malformed
//!   shapes are unrepresentable rather than merely unvalidated
//! - **Idempotent Materialization**: On-demand, pull-based expansion of a
//!   rule into concrete instances, deduplicated against prior results and
//!   bounded by a generation budget
//! - **Per-Occurrence Overrides**: Individual instances detach from the
//!   template (title, description, time, status) without touching the rule
//!   or their siblings
//! - **Three Termination Models**: Never-ending, until-date, and
//!   after-count series, evaluated consistently by calculator and walker
//! - **Storage-Level Race Guard**: A uniqueness constraint on the dedup key
//!   keeps concurrent generators from writing duplicate occurrences
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`validate`]: Structural rule validation
//! - [`recurrence`]: Pure occurrence calculation
//! - [`repository`]: Data access layer with Repository pattern
//! - [`error`]: Error types with field-level validation detail
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     models::{GenerationConfig, NewRuleData, NewTaskData, RuleKind},
//!     repository::{MaterializationRepository, RuleRepository, SqliteRepository, TaskRepository},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Initialize database
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let repo = SqliteRepository::new(pool, GenerationConfig::default());
//!
//!     // Create a task and attach an every-other-day rule
//!     let task = repo
//!         .add_task(NewTaskData {
//!             title: "Water the plants".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     let rule = repo
//!         .create_rule(
//!             task.id,
//!             NewRuleData {
//!                 kind: RuleKind::Daily,
//!                 interval: 2,
//!                 ..Default::default()
//!             },
//!         )
//!         .await?;
//!
//!     // Materialize the upcoming window
//!     let instances = repo.generate_instances(task.id).await?;
//!     println!("rule {} produced {} instances", rule.id, instances.len());
//!
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod validate;
