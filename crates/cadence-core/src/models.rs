use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Minimal view of the task record the engine consumes. The full task model
/// (tags, sharing, history) belongs to the task-management layer; the engine
/// needs the series start, the recurring flag, and the fields instance
/// overrides fall back to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Series start; first candidate occurrence of any attached rule.
    pub start_at: NaiveDateTime,
    pub recurring: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTaskData {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_at: NaiveDateTime,
}

impl Default for NewTaskData {
    fn default() -> Self {
        Self {
            owner_id: Uuid::nil(),
            title: String::new(),
            description: None,
            start_at: Local::now().naive_local(),
        }
    }
}

/// Repetition model of a rule, without its per-kind payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum RuleKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Workdays,
    Weekends,
    Custom,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid rule kind: {0}")]
pub struct ParseRuleKindError(String);

impl FromStr for RuleKind {
    type Err = ParseRuleKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(RuleKind::Daily),
            "weekly" => Ok(RuleKind::Weekly),
            "monthly" => Ok(RuleKind::Monthly),
            "yearly" => Ok(RuleKind::Yearly),
            "workdays" => Ok(RuleKind::Workdays),
            "weekends" => Ok(RuleKind::Weekends),
            "custom" => Ok(RuleKind::Custom),
            _ => Err(ParseRuleKindError(s.to_string())),
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleKind::Daily => write!(f, "daily"),
            RuleKind::Weekly => write!(f, "weekly"),
            RuleKind::Monthly => write!(f, "monthly"),
            RuleKind::Yearly => write!(f, "yearly"),
            RuleKind::Workdays => write!(f, "workdays"),
            RuleKind::Weekends => write!(f, "weekends"),
            RuleKind::Custom => write!(f, "custom"),
        }
    }
}

/// Step unit for `RuleKind::Custom` rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum CustomUnit {
    Hours,
    Days,
    Weeks,
    Months,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid custom unit: {0}")]
pub struct ParseCustomUnitError(String);

impl FromStr for CustomUnit {
    type Err = ParseCustomUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hours" => Ok(CustomUnit::Hours),
            "days" => Ok(CustomUnit::Days),
            "weeks" => Ok(CustomUnit::Weeks),
            "months" => Ok(CustomUnit::Months),
            _ => Err(ParseCustomUnitError(s.to_string())),
        }
    }
}

/// Anchor for monthly rules: a fixed calendar day, or the Nth weekday of the
/// month ("2nd Tuesday"). Week 5 means the last occurrence in the month.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MonthlyAnchor {
    DayOfMonth(u8),
    NthWeekday { week: u8, weekday: Weekday },
}

/// Repetition pattern, kind plus per-kind payload. Built only through
/// validation, so a weekly pattern always carries a non-empty, sorted,
/// deduplicated weekday set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Pattern {
    Daily,
    Weekly { days: Vec<Weekday> },
    Monthly { anchor: MonthlyAnchor },
    Yearly,
    Workdays,
    Weekends,
    Custom { unit: CustomUnit },
}

impl Pattern {
    pub fn kind(&self) -> RuleKind {
        match self {
            Pattern::Daily => RuleKind::Daily,
            Pattern::Weekly { .. } => RuleKind::Weekly,
            Pattern::Monthly { .. } => RuleKind::Monthly,
            Pattern::Yearly => RuleKind::Yearly,
            Pattern::Workdays => RuleKind::Workdays,
            Pattern::Weekends => RuleKind::Weekends,
            Pattern::Custom { .. } => RuleKind::Custom,
        }
    }
}

/// Discriminant of the end condition, used in input DTOs and storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum EndKind {
    Never,
    UntilDate,
    AfterCount,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid end kind: {0}")]
pub struct ParseEndKindError(String);

impl FromStr for EndKind {
    type Err = ParseEndKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "never" => Ok(EndKind::Never),
            "until_date" => Ok(EndKind::UntilDate),
            "after_count" => Ok(EndKind::AfterCount),
            _ => Err(ParseEndKindError(s.to_string())),
        }
    }
}

/// Termination condition of a series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EndCondition {
    Never,
    UntilDate(NaiveDateTime),
    AfterCount(u32),
}

impl EndCondition {
    pub fn kind(&self) -> EndKind {
        match self {
            EndCondition::Never => EndKind::Never,
            EndCondition::UntilDate(_) => EndKind::UntilDate,
            EndCondition::AfterCount(_) => EndKind::AfterCount,
        }
    }
}

/// The repetition contract attached to exactly one task.
///
/// The pattern and end condition are sum types built through validation: a
/// weekly rule with no weekdays or a monthly rule with two anchors is
/// unrepresentable here, not merely invalid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub id: Uuid,
    /// Back-reference to the owning task; at most one rule per task.
    pub task_id: Uuid,
    pub pattern: Pattern,
    /// "Every N units"; the unit depends on the pattern.
    pub interval: u32,
    pub end: EndCondition,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrenceRule {
    pub fn kind(&self) -> RuleKind {
        self.pattern.kind()
    }

    /// Flattens the rule back into the raw input shape, used as the base for
    /// merging partial updates before re-validation.
    pub fn as_input(&self) -> NewRuleData {
        let mut data = NewRuleData {
            kind: self.kind(),
            interval: self.interval,
            end_kind: self.end.kind(),
            ..Default::default()
        };
        match &self.pattern {
            Pattern::Weekly { days } => {
                data.days_of_week = days.iter().map(weekday_index).collect();
            }
            Pattern::Monthly { anchor: MonthlyAnchor::DayOfMonth(day) } => {
                data.day_of_month = Some(*day);
            }
            Pattern::Monthly { anchor: MonthlyAnchor::NthWeekday { week, weekday } } => {
                data.week_of_month = Some(*week);
                data.weekday_of_month = Some(weekday_index(weekday));
            }
            Pattern::Custom { unit } => {
                data.custom_unit = Some(*unit);
            }
            Pattern::Daily | Pattern::Yearly | Pattern::Workdays | Pattern::Weekends => {}
        }
        match self.end {
            EndCondition::Never => {}
            EndCondition::UntilDate(date) => data.end_date = Some(date),
            EndCondition::AfterCount(count) => data.end_count = Some(count),
        }
        data
    }
}

/// Weekday index used on the wire and in storage: 0 = Monday .. 6 = Sunday.
pub fn weekday_index(day: &Weekday) -> u8 {
    day.num_days_from_monday() as u8
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    Some(match index {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        6 => Weekday::Sun,
        _ => return None,
    })
}

/// Raw optional-field rule input, as the outer layer submits it. Validation
/// turns this into a `Pattern` and `EndCondition` or rejects it.
#[derive(Debug, Clone)]
pub struct NewRuleData {
    pub kind: RuleKind,
    pub interval: u32,
    /// Weekday indices 0..=6 (0 = Monday); only meaningful for weekly rules.
    pub days_of_week: Vec<u8>,
    pub day_of_month: Option<u8>,
    pub week_of_month: Option<u8>,
    pub weekday_of_month: Option<u8>,
    pub custom_unit: Option<CustomUnit>,
    pub end_kind: EndKind,
    pub end_date: Option<NaiveDateTime>,
    pub end_count: Option<u32>,
}

impl Default for NewRuleData {
    fn default() -> Self {
        Self {
            kind: RuleKind::Daily,
            interval: 1,
            days_of_week: Vec::new(),
            day_of_month: None,
            week_of_month: None,
            weekday_of_month: None,
            custom_unit: None,
            end_kind: EndKind::Never,
            end_date: None,
            end_count: None,
        }
    }
}

/// Partial rule update. `Option<Option<T>>` fields distinguish "leave as is"
/// from "clear"; clearing matters when switching between monthly anchor modes
/// or end kinds.
#[derive(Debug, Clone, Default)]
pub struct UpdateRuleData {
    pub kind: Option<RuleKind>,
    pub interval: Option<u32>,
    pub days_of_week: Option<Vec<u8>>,
    pub day_of_month: Option<Option<u8>>,
    pub week_of_month: Option<Option<u8>>,
    pub weekday_of_month: Option<Option<u8>>,
    pub custom_unit: Option<Option<CustomUnit>>,
    pub end_kind: Option<EndKind>,
    pub end_date: Option<Option<NaiveDateTime>>,
    pub end_count: Option<Option<u32>>,
}

impl UpdateRuleData {
    /// Overlays the provided fields onto `base`; the merged candidate is
    /// re-validated as a whole before it is persisted.
    pub fn apply_to(&self, mut base: NewRuleData) -> NewRuleData {
        if let Some(kind) = self.kind {
            base.kind = kind;
        }
        if let Some(interval) = self.interval {
            base.interval = interval;
        }
        if let Some(days) = &self.days_of_week {
            base.days_of_week = days.clone();
        }
        if let Some(day) = self.day_of_month {
            base.day_of_month = day;
        }
        if let Some(week) = self.week_of_month {
            base.week_of_month = week;
        }
        if let Some(weekday) = self.weekday_of_month {
            base.weekday_of_month = weekday;
        }
        if let Some(unit) = self.custom_unit {
            base.custom_unit = unit;
        }
        if let Some(end_kind) = self.end_kind {
            base.end_kind = end_kind;
        }
        if let Some(date) = self.end_date {
            base.end_date = date;
        }
        if let Some(count) = self.end_count {
            base.end_count = count;
        }
        base
    }
}

/// Same status vocabulary as a task; each instance moves through it
/// independently of its siblings and of the parent task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum InstanceStatus {
    Planned,
    InProgress,
    Done,
    Skipped,
    Canceled,
}

impl Default for InstanceStatus {
    fn default() -> Self {
        InstanceStatus::Planned
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid instance status: {0}")]
pub struct ParseInstanceStatusError(String);

impl FromStr for InstanceStatus {
    type Err = ParseInstanceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planned" => Ok(InstanceStatus::Planned),
            "in_progress" => Ok(InstanceStatus::InProgress),
            "done" => Ok(InstanceStatus::Done),
            "skipped" => Ok(InstanceStatus::Skipped),
            "canceled" => Ok(InstanceStatus::Canceled),
            _ => Err(ParseInstanceStatusError(s.to_string())),
        }
    }
}

/// One materialized occurrence of a recurring task: a cached expansion of the
/// rule, never a mutation of it. Once created it is never re-dated by the
/// materializer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct TaskInstance {
    pub id: Uuid,
    pub parent_task_id: Uuid,
    pub scheduled_at: NaiveDateTime,
    /// `scheduled_at` truncated to the day; the deduplication key.
    pub scheduled_on: NaiveDate,
    pub status: InstanceStatus,
    /// Latched true by the first override; never reset automatically.
    pub is_modified: bool,
    pub modified_title: Option<String>,
    pub modified_description: Option<String>,
    pub modified_time: Option<NaiveDateTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskInstance {
    /// Title the instance presents: its override, or the parent task's.
    pub fn effective_title<'a>(&'a self, task: &'a Task) -> &'a str {
        self.modified_title.as_deref().unwrap_or(&task.title)
    }

    pub fn effective_description<'a>(&'a self, task: &'a Task) -> Option<&'a str> {
        self.modified_description
            .as_deref()
            .or(task.description.as_deref())
    }

    /// Time the instance is effectively scheduled for (override or original).
    pub fn effective_at(&self) -> NaiveDateTime {
        self.modified_time.unwrap_or(self.scheduled_at)
    }
}

/// Per-occurrence overrides. Status may change without marking the instance
/// modified; setting any of the other three latches `is_modified`.
#[derive(Debug, Clone, Default)]
pub struct UpdateInstanceData {
    pub status: Option<InstanceStatus>,
    pub title: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub time: Option<Option<NaiveDateTime>>,
}

impl UpdateInstanceData {
    pub fn touches_overrides(&self) -> bool {
        self.title.is_some() || self.description.is_some() || self.time.is_some()
    }
}

/// Generation budget for one materialization call.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Maximum newly created instances per call.
    pub max_instances: u32,
    /// Hard date ceiling: now + this many days.
    pub days_ahead: u32,
}

pub const DEFAULT_MAX_INSTANCES: u32 = 30;
pub const DEFAULT_DAYS_AHEAD: u32 = 90;

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            days_ahead: DEFAULT_DAYS_AHEAD,
        }
    }
}

/// Flat storage shape of a rule row. Conversion back to `RecurrenceRule` runs
/// through the same validation path as user input.
#[derive(Debug, FromRow)]
pub(crate) struct RuleRow {
    pub id: Uuid,
    pub task_id: Uuid,
    pub kind: RuleKind,
    pub interval: i64,
    pub days_of_week: Option<String>,
    pub day_of_month: Option<i64>,
    pub week_of_month: Option<i64>,
    pub weekday_of_month: Option<i64>,
    pub custom_unit: Option<CustomUnit>,
    pub end_kind: EndKind,
    pub end_date: Option<NaiveDateTime>,
    pub end_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn narrow<T: TryFrom<i64>>(value: i64, field: &str) -> Result<T, crate::error::CoreError> {
    T::try_from(value).map_err(|_| {
        crate::error::CoreError::InvalidInput(format!("stored {field} out of range: {value}"))
    })
}

impl TryFrom<RuleRow> for RecurrenceRule {
    type Error = crate::error::CoreError;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        let days_of_week: Vec<u8> = match &row.days_of_week {
            Some(encoded) => serde_json::from_str(encoded)?,
            None => Vec::new(),
        };
        let data = NewRuleData {
            kind: row.kind,
            interval: narrow(row.interval, "interval")?,
            days_of_week,
            day_of_month: row.day_of_month.map(|d| narrow(d, "day_of_month")).transpose()?,
            week_of_month: row.week_of_month.map(|w| narrow(w, "week_of_month")).transpose()?,
            weekday_of_month: row
                .weekday_of_month
                .map(|w| narrow(w, "weekday_of_month"))
                .transpose()?,
            custom_unit: row.custom_unit,
            end_kind: row.end_kind,
            end_date: row.end_date,
            end_count: row.end_count.map(|c| narrow(c, "end_count")).transpose()?,
        };
        let pattern = crate::validate::build_pattern(&data)?;
        let end = crate::validate::build_end(&data)?;
        Ok(RecurrenceRule {
            id: row.id,
            task_id: row.task_id,
            pattern,
            interval: data.interval,
            end,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
