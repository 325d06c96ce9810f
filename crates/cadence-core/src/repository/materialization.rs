use crate::error::CoreError;
use crate::models::{InstanceStatus, Task, TaskInstance};
use crate::recurrence;
use crate::repository::{RuleRepository, SqliteRepository, TaskRepository};
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
impl super::MaterializationRepository for SqliteRepository {
    async fn generate_instances(&self, task_id: Uuid) -> Result<Vec<TaskInstance>, CoreError> {
        let config = self.config().clone();
        self.generate_instances_with(task_id, config.max_instances, config.days_ahead)
            .await
    }

    async fn generate_instances_with(
        &self,
        task_id: Uuid,
        max_instances: u32,
        days_ahead: u32,
    ) -> Result<Vec<TaskInstance>, CoreError> {
        let (task, rule) = self.load_recurring_task(task_id).await?;

        let mut tx = self.pool().begin().await?;

        // Snapshot of what is already materialized, truncated to day
        // granularity. Re-running generation only fills the gaps relative to
        // this snapshot; existing instances are never re-dated.
        let existing: Vec<TaskInstance> =
            sqlx::query_as("SELECT * FROM task_instances WHERE parent_task_id = $1")
                .bind(task_id)
                .fetch_all(&mut *tx)
                .await?;
        let mut seen: HashSet<NaiveDate> = existing.iter().map(|i| i.scheduled_on).collect();

        let ceiling = Local::now().naive_local() + Duration::days(i64::from(days_ahead));

        let mut created: Vec<TaskInstance> = Vec::new();
        let mut current = task.start_at;
        let mut considered: u32 = 0;

        loop {
            // Budget first, so a zero budget creates nothing.
            if created.len() as u32 >= max_instances {
                break;
            }
            // The end-condition budget counts occurrences considered, not
            // instances created.
            if !recurrence::should_continue(&rule, considered, current) {
                break;
            }
            if current > ceiling {
                break;
            }
            considered = considered.saturating_add(1);

            if seen.insert(current.date()) {
                let instance = TaskInstance {
                    id: Uuid::now_v7(),
                    parent_task_id: task.id,
                    scheduled_at: current,
                    scheduled_on: current.date(),
                    status: InstanceStatus::Planned,
                    is_modified: false,
                    modified_title: None,
                    modified_description: None,
                    modified_time: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                };

                // The unique constraint on (parent_task_id, scheduled_on) is
                // the backstop against a concurrent generator racing this
                // one: a lost insert is dropped from the returned batch so
                // the return value matches what was committed.
                let result = sqlx::query(
                    r#"INSERT INTO task_instances
                    (id, parent_task_id, scheduled_at, scheduled_on, status, is_modified, modified_title, modified_description, modified_time, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    ON CONFLICT(parent_task_id, scheduled_on) DO NOTHING"#,
                )
                .bind(instance.id)
                .bind(instance.parent_task_id)
                .bind(instance.scheduled_at)
                .bind(instance.scheduled_on)
                .bind(instance.status)
                .bind(instance.is_modified)
                .bind(&instance.modified_title)
                .bind(&instance.modified_description)
                .bind(instance.modified_time)
                .bind(instance.created_at)
                .bind(instance.updated_at)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() > 0 {
                    created.push(instance);
                }
            }

            match recurrence::next_occurrence(&rule, current, task.start_at) {
                Some(next) => current = next,
                None => break,
            }
        }

        // All-or-nothing: dropping the transaction before this point rolls
        // every insert back, so a canceled generation writes nothing.
        tx.commit().await?;

        info!(
            task_id = %task_id,
            created = created.len(),
            considered = considered,
            "materialized instances"
        );
        Ok(created)
    }

    async fn preview_occurrences(
        &self,
        task_id: Uuid,
        count: usize,
    ) -> Result<Vec<NaiveDateTime>, CoreError> {
        let (task, rule) = self.load_recurring_task(task_id).await?;
        debug!(task_id = %task_id, count = count, "previewing occurrences");
        Ok(recurrence::upcoming(&rule, task.start_at, count))
    }
}

impl SqliteRepository {
    /// Loads the task and its rule, distinguishing the three failure modes
    /// the caller reacts to differently: missing task, non-recurring task,
    /// and recurring task whose rule is gone.
    async fn load_recurring_task(
        &self,
        task_id: Uuid,
    ) -> Result<(Task, crate::models::RecurrenceRule), CoreError> {
        let task = self
            .find_task_by_id(task_id)
            .await?
            .ok_or(CoreError::TaskNotFound(task_id))?;
        if !task.recurring {
            return Err(CoreError::NotRecurring(task_id));
        }
        let rule = self
            .find_rule_by_task(task_id)
            .await?
            .ok_or(CoreError::RuleMissing(task_id))?;
        Ok((task, rule))
    }
}
