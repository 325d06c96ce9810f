use crate::error::CoreError;
use crate::models::{
    weekday_index, MonthlyAnchor, NewRuleData, Pattern, RecurrenceRule, RuleRow, UpdateRuleData,
};
use crate::repository::SqliteRepository;
use crate::validate;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::info;
use uuid::Uuid;

#[async_trait]
impl super::RuleRepository for SqliteRepository {
    async fn create_rule(
        &self,
        task_id: Uuid,
        data: NewRuleData,
    ) -> Result<RecurrenceRule, CoreError> {
        // Reject structurally invalid rules before touching storage.
        let pattern = validate::build_pattern(&data)?;
        let end = validate::build_end(&data)?;

        let mut tx = self.pool().begin().await?;

        let task: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;
        if task.is_none() {
            return Err(CoreError::TaskNotFound(task_id));
        }

        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM recurrence_rules WHERE task_id = $1")
                .bind(task_id)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(CoreError::InvalidInput(
                "task already has a recurrence rule".to_string(),
            ));
        }

        let rule = RecurrenceRule {
            id: Uuid::now_v7(),
            task_id,
            pattern,
            interval: data.interval,
            end,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        Self::insert_rule_in_transaction(&mut tx, &rule).await?;

        sqlx::query("UPDATE tasks SET recurring = 1, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(rule_id = %rule.id, task_id = %task_id, kind = %rule.kind(), "created recurrence rule");
        Ok(rule)
    }

    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let row: Option<RuleRow> = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(RecurrenceRule::try_from).transpose()
    }

    async fn find_rule_by_task(&self, task_id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let row: Option<RuleRow> =
            sqlx::query_as("SELECT * FROM recurrence_rules WHERE task_id = $1")
                .bind(task_id)
                .fetch_optional(self.pool())
                .await?;
        row.map(RecurrenceRule::try_from).transpose()
    }

    async fn update_rule(
        &self,
        rule_id: Uuid,
        data: UpdateRuleData,
    ) -> Result<RecurrenceRule, CoreError> {
        let mut tx = self.pool().begin().await?;

        let row: Option<RuleRow> = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(rule_id)
            .fetch_optional(&mut *tx)
            .await?;
        let current = row
            .map(RecurrenceRule::try_from)
            .transpose()?
            .ok_or_else(|| CoreError::NotFound(format!("Rule with id {rule_id} not found")))?;

        // Merge the partial onto the stored rule and validate the whole
        // candidate; a partial update can never leave an invalid rule behind.
        let merged = data.apply_to(current.as_input());
        let pattern = validate::build_pattern(&merged)?;
        let end = validate::build_end(&merged)?;

        let updated = RecurrenceRule {
            id: current.id,
            task_id: current.task_id,
            pattern,
            interval: merged.interval,
            end,
            created_at: current.created_at,
            updated_at: Utc::now(),
        };

        Self::write_rule_columns_in_transaction(&mut tx, &updated).await?;

        tx.commit().await?;
        info!(rule_id = %rule_id, kind = %updated.kind(), "updated recurrence rule");
        Ok(updated)
    }

    async fn delete_rule(&self, rule_id: Uuid, task_id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;

        let owning_task: Option<(Uuid,)> =
            sqlx::query_as("SELECT task_id FROM recurrence_rules WHERE id = $1")
                .bind(rule_id)
                .fetch_optional(&mut *tx)
                .await?;
        match owning_task {
            Some((owner,)) if owner == task_id => {}
            _ => {
                return Err(CoreError::NotFound(format!(
                    "Rule with id {rule_id} not found for task {task_id}"
                )))
            }
        }

        sqlx::query("DELETE FROM recurrence_rules WHERE id = $1")
            .bind(rule_id)
            .execute(&mut *tx)
            .await?;

        // The task stops recurring; existing instances stay untouched.
        sqlx::query("UPDATE tasks SET recurring = 0, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(rule_id = %rule_id, task_id = %task_id, "deleted recurrence rule");
        Ok(())
    }
}

/// Nullable-column encoding of a rule's pattern and end payloads.
struct RuleColumns {
    days_of_week: Option<String>,
    day_of_month: Option<u8>,
    week_of_month: Option<u8>,
    weekday_of_month: Option<u8>,
    custom_unit: Option<crate::models::CustomUnit>,
    end_date: Option<chrono::NaiveDateTime>,
    end_count: Option<u32>,
}

impl RuleColumns {
    fn from_rule(rule: &RecurrenceRule) -> Result<Self, CoreError> {
        let mut columns = RuleColumns {
            days_of_week: None,
            day_of_month: None,
            week_of_month: None,
            weekday_of_month: None,
            custom_unit: None,
            end_date: None,
            end_count: None,
        };
        match &rule.pattern {
            Pattern::Weekly { days } => {
                let indices: Vec<u8> = days.iter().map(weekday_index).collect();
                columns.days_of_week = Some(serde_json::to_string(&indices)?);
            }
            Pattern::Monthly { anchor: MonthlyAnchor::DayOfMonth(day) } => {
                columns.day_of_month = Some(*day);
            }
            Pattern::Monthly { anchor: MonthlyAnchor::NthWeekday { week, weekday } } => {
                columns.week_of_month = Some(*week);
                columns.weekday_of_month = Some(weekday_index(weekday));
            }
            Pattern::Custom { unit } => {
                columns.custom_unit = Some(*unit);
            }
            Pattern::Daily | Pattern::Yearly | Pattern::Workdays | Pattern::Weekends => {}
        }
        match rule.end {
            crate::models::EndCondition::Never => {}
            crate::models::EndCondition::UntilDate(date) => columns.end_date = Some(date),
            crate::models::EndCondition::AfterCount(count) => columns.end_count = Some(count),
        }
        Ok(columns)
    }
}

impl SqliteRepository {
    pub(crate) async fn insert_rule_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        rule: &RecurrenceRule,
    ) -> Result<(), CoreError> {
        let columns = RuleColumns::from_rule(rule)?;
        sqlx::query(
            r#"INSERT INTO recurrence_rules
            (id, task_id, kind, interval, days_of_week, day_of_month, week_of_month, weekday_of_month, custom_unit, end_kind, end_date, end_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
        )
        .bind(rule.id)
        .bind(rule.task_id)
        .bind(rule.kind())
        .bind(rule.interval)
        .bind(&columns.days_of_week)
        .bind(columns.day_of_month)
        .bind(columns.week_of_month)
        .bind(columns.weekday_of_month)
        .bind(columns.custom_unit)
        .bind(rule.end.kind())
        .bind(columns.end_date)
        .bind(columns.end_count)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn write_rule_columns_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        rule: &RecurrenceRule,
    ) -> Result<(), CoreError> {
        let columns = RuleColumns::from_rule(rule)?;
        sqlx::query(
            r#"UPDATE recurrence_rules SET
            kind = $1, interval = $2, days_of_week = $3, day_of_month = $4, week_of_month = $5,
            weekday_of_month = $6, custom_unit = $7, end_kind = $8, end_date = $9, end_count = $10,
            updated_at = $11
            WHERE id = $12"#,
        )
        .bind(rule.kind())
        .bind(rule.interval)
        .bind(&columns.days_of_week)
        .bind(columns.day_of_month)
        .bind(columns.week_of_month)
        .bind(columns.weekday_of_month)
        .bind(columns.custom_unit)
        .bind(rule.end.kind())
        .bind(columns.end_date)
        .bind(columns.end_count)
        .bind(rule.updated_at)
        .bind(rule.id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
