use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    GenerationConfig, NewRuleData, NewTaskData, RecurrenceRule, Task, TaskInstance,
    UpdateInstanceData, UpdateRuleData,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

// Re-export domain modules
pub mod instances;
pub mod materialization;
pub mod rules;
pub mod tasks;

// Traits are defined in this module and implemented in respective domain modules

/// Domain-specific trait for the task collaborator view
#[async_trait]
pub trait TaskRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn task_exists(&self, id: Uuid) -> Result<bool, CoreError>;
    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for recurrence rule storage
#[async_trait]
pub trait RuleRepository {
    async fn create_rule(&self, task_id: Uuid, data: NewRuleData) -> Result<RecurrenceRule, CoreError>;
    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    async fn find_rule_by_task(&self, task_id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    async fn update_rule(&self, rule_id: Uuid, data: UpdateRuleData) -> Result<RecurrenceRule, CoreError>;
    async fn delete_rule(&self, rule_id: Uuid, task_id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for instance access and per-occurrence overrides
#[async_trait]
pub trait InstanceRepository {
    async fn find_instances(&self, task_id: Uuid) -> Result<Vec<TaskInstance>, CoreError>;
    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<TaskInstance>, CoreError>;
    async fn update_instance(
        &self,
        id: Uuid,
        caller_id: Uuid,
        data: UpdateInstanceData,
    ) -> Result<TaskInstance, CoreError>;
    async fn delete_instance(&self, id: Uuid, caller_id: Uuid) -> Result<(), CoreError>;
    async fn delete_instances_for_task(&self, task_id: Uuid) -> Result<u64, CoreError>;
}

/// Domain-specific trait for instance materialization
#[async_trait]
pub trait MaterializationRepository {
    /// Generates instances with the repository's configured budget.
    async fn generate_instances(&self, task_id: Uuid) -> Result<Vec<TaskInstance>, CoreError>;
    /// Generates instances with an explicit budget.
    async fn generate_instances_with(
        &self,
        task_id: Uuid,
        max_instances: u32,
        days_ahead: u32,
    ) -> Result<Vec<TaskInstance>, CoreError>;
    /// Previews upcoming occurrence dates without persisting anything.
    async fn preview_occurrences(
        &self,
        task_id: Uuid,
        count: usize,
    ) -> Result<Vec<NaiveDateTime>, CoreError>;
}

/// Main repository trait that composes all domain traits
#[async_trait]
pub trait Repository:
    TaskRepository + RuleRepository + InstanceRepository + MaterializationRepository
{
    // This trait automatically composes all domain-specific repositories
    // Individual domain operations are defined in their respective traits
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    config: GenerationConfig,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, config: GenerationConfig) -> Self {
        Self { pool, config }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get the configured generation budget
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }
}

// The main Repository trait implementation will automatically be available
// when all domain trait implementations are defined
impl Repository for SqliteRepository {}
