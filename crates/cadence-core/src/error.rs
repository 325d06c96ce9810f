use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Task {0} is not recurring")]
    NotRecurring(Uuid),

    #[error("Task {0} has no recurrence rule")]
    RuleMissing(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Structural problems with a candidate rule. Each variant names the field at
/// fault so the caller can surface form-level errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("interval must be at least 1, got {0}")]
    InvalidInterval(u32),

    #[error("weekly rules require at least one weekday")]
    MissingWeekdays,

    #[error("weekday index out of range (expected 0..=6): {0}")]
    InvalidWeekday(u8),

    #[error("monthly rules require either a day of month or an nth-weekday anchor")]
    MissingMonthlyAnchor,

    #[error("monthly rules accept only one anchor mode, not both")]
    ConflictingMonthlyAnchor,

    #[error("day of month out of range (expected 1..=31): {0}")]
    InvalidDayOfMonth(u8),

    #[error("week of month out of range (expected 1..=5): {0}")]
    InvalidWeekOfMonth(u8),

    #[error("custom rules require a unit")]
    MissingCustomUnit,

    #[error("until-date end condition requires an end date")]
    MissingEndDate,

    #[error("after-count end condition requires a count of at least 1")]
    InvalidEndCount,

    #[error("end payload does not match the end kind: {0}")]
    MismatchedEndPayload(&'static str),

    #[error("field is not applicable to this rule kind: {0}")]
    UnexpectedField(&'static str),
}
