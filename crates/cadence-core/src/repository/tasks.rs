use crate::error::CoreError;
use crate::models::{NewTaskData, Task};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let task = Task {
            id: Uuid::now_v7(),
            owner_id: data.owner_id,
            title: data.title,
            description: data.description,
            start_at: data.start_at,
            recurring: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO tasks (id, owner_id, title, description, start_at, recurring, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(task.id)
        .bind(task.owner_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.start_at)
        .bind(task.recurring)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(self.pool())
        .await?;

        debug!(task_id = %task.id, "added task");
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn task_exists(&self, id: Uuid) -> Result<bool, CoreError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        // Rule and instances go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::TaskNotFound(id));
        }
        debug!(task_id = %id, "deleted task");
        Ok(())
    }
}

impl SqliteRepository {
    /// Verifies the caller owns the parent task of whatever is being touched.
    /// The access decision is delegated to the task record's owner.
    pub(crate) async fn ensure_task_access(
        tx: &mut Transaction<'_, Sqlite>,
        task_id: Uuid,
        caller_id: Uuid,
    ) -> Result<(), CoreError> {
        let owner: Option<(Uuid,)> = sqlx::query_as("SELECT owner_id FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&mut **tx)
            .await?;

        let (owner_id,) = owner.ok_or(CoreError::TaskNotFound(task_id))?;
        if owner_id != caller_id {
            return Err(CoreError::PermissionDenied(format!(
                "caller {caller_id} does not own task {task_id}"
            )));
        }
        Ok(())
    }
}
