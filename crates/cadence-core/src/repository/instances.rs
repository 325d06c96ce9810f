use crate::error::CoreError;
use crate::models::{TaskInstance, UpdateInstanceData};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::InstanceRepository for SqliteRepository {
    async fn find_instances(&self, task_id: Uuid) -> Result<Vec<TaskInstance>, CoreError> {
        let instances = sqlx::query_as(
            "SELECT * FROM task_instances WHERE parent_task_id = $1 ORDER BY scheduled_at",
        )
        .bind(task_id)
        .fetch_all(self.pool())
        .await?;
        Ok(instances)
    }

    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError> {
        let instance = sqlx::query_as("SELECT * FROM task_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(instance)
    }

    async fn update_instance(
        &self,
        id: Uuid,
        caller_id: Uuid,
        data: UpdateInstanceData,
    ) -> Result<TaskInstance, CoreError> {
        let mut tx = self.pool().begin().await?;

        let instance: TaskInstance = sqlx::query_as("SELECT * FROM task_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Instance with id {id} not found")))?;

        Self::ensure_task_access(&mut tx, instance.parent_task_id, caller_id).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE task_instances SET ");
        let mut updated = false;

        if let Some(status) = data.status {
            qb.push("status = ");
            qb.push_bind(status);
            updated = true;
        }

        if let Some(title) = &data.title {
            if updated {
                qb.push(", ");
            }
            qb.push("modified_title = ");
            qb.push_bind(title.clone());
            updated = true;
        }

        if let Some(description) = &data.description {
            if updated {
                qb.push(", ");
            }
            qb.push("modified_description = ");
            qb.push_bind(description.clone());
            updated = true;
        }

        if let Some(time) = data.time {
            if updated {
                qb.push(", ");
            }
            qb.push("modified_time = ");
            qb.push_bind(time);
            updated = true;
        }

        // Any override touch latches is_modified; a status change alone never
        // does, and nothing ever resets it.
        if data.touches_overrides() {
            if updated {
                qb.push(", ");
            }
            qb.push("is_modified = 1");
            updated = true;
        }

        if updated {
            qb.push(", updated_at = ");
            qb.push_bind(Utc::now());
            qb.push(" WHERE id = ");
            qb.push_bind(id);

            qb.build().execute(&mut *tx).await?;
        }

        let refreshed: TaskInstance = sqlx::query_as("SELECT * FROM task_instances WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(instance_id = %id, modified = refreshed.is_modified, "updated instance");
        Ok(refreshed)
    }

    async fn delete_instance(&self, id: Uuid, caller_id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;

        let instance: TaskInstance = sqlx::query_as("SELECT * FROM task_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Instance with id {id} not found")))?;

        Self::ensure_task_access(&mut tx, instance.parent_task_id, caller_id).await?;

        sqlx::query("DELETE FROM task_instances WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(instance_id = %id, "deleted instance");
        Ok(())
    }

    async fn delete_instances_for_task(&self, task_id: Uuid) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM task_instances WHERE parent_task_id = $1")
            .bind(task_id)
            .execute(self.pool())
            .await?;
        debug!(task_id = %task_id, deleted = result.rows_affected(), "deleted instances for task");
        Ok(result.rows_affected())
    }
}
