use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{WorkoutLog, WorkoutLogInput};
use crate::error::{AppError, StorageError};
use crate::repository::WorkoutRepository;
use crate::services::page_bounds;

const DEFAULT_PAGE_SIZE: i64 = 20;

fn not_found() -> AppError {
    AppError::Storage(StorageError::NotFound("Workout not found".to_string()))
}

/// Workout logs scoped to their owner. Another user's workout is reported
/// as not found, never as forbidden.
#[derive(Clone)]
pub struct WorkoutService {
    workouts: Arc<dyn WorkoutRepository>,
}

impl WorkoutService {
    pub fn new(workouts: Arc<dyn WorkoutRepository>) -> Self {
        Self { workouts }
    }

    pub async fn create(&self, user_id: Uuid, input: WorkoutLogInput) -> Result<WorkoutLog, AppError> {
        input.validate()?;
        let log = input.into_log(Uuid::new_v4(), user_id);
        self.workouts.create(&log).await?;

        tracing::info!(user_id = %user_id, workout_id = %log.id, "Workout logged");
        Ok(log)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<WorkoutLog, AppError> {
        self.workouts
            .find_by_id(id)
            .await?
            .filter(|log| log.user_id == user_id)
            .ok_or_else(not_found)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<WorkoutLog>, AppError> {
        let (limit, offset) = page_bounds(limit, offset, DEFAULT_PAGE_SIZE);
        Ok(self.workouts.list_by_user(user_id, limit, offset).await?)
    }

    /// Replace the workout's contents; the id and owner are kept.
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: WorkoutLogInput,
    ) -> Result<WorkoutLog, AppError> {
        input.validate()?;
        let log = input.into_log(id, user_id);
        if !self.workouts.update(&log).await? {
            return Err(not_found());
        }

        tracing::info!(user_id = %user_id, workout_id = %id, "Workout updated");
        Ok(log)
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        if !self.workouts.delete(id, user_id).await? {
            return Err(not_found());
        }

        tracing::info!(user_id = %user_id, workout_id = %id, "Workout deleted");
        Ok(())
    }
}
