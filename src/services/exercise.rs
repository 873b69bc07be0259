use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{NewExercise, UniqueExercise};
use crate::error::{AppError, StorageError, ValidationError};
use crate::repository::ExerciseRepository;
use crate::services::page_bounds;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_NAME_LENGTH: usize = 100;

/// The exercise catalog: shared system exercises plus each user's own
#[derive(Clone)]
pub struct ExerciseService {
    exercises: Arc<dyn ExerciseRepository>,
}

impl ExerciseService {
    pub fn new(exercises: Arc<dyn ExerciseRepository>) -> Self {
        Self { exercises }
    }

    pub async fn create(&self, user_id: Uuid, new: NewExercise) -> Result<UniqueExercise, AppError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("name".to_string()).into());
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(ValidationError::TooLong("name".to_string(), MAX_NAME_LENGTH).into());
        }

        let exercise = UniqueExercise {
            id: Uuid::new_v4(),
            name: name.to_string(),
            user_id: Some(user_id),
            description: new.description.filter(|d| !d.trim().is_empty()),
            category: None,
        };
        self.exercises.create(&exercise).await?;

        tracing::info!(user_id = %user_id, exercise_id = %exercise.id, "Custom exercise created");
        Ok(exercise)
    }

    pub async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<UniqueExercise>, AppError> {
        let (limit, offset) = page_bounds(limit, offset, DEFAULT_PAGE_SIZE);
        Ok(self
            .exercises
            .search(user_id, query.trim(), limit, offset)
            .await?)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<UniqueExercise, AppError> {
        self.exercises
            .find_by_id(id)
            .await?
            .filter(|exercise| exercise.is_visible_to(user_id))
            .ok_or_else(|| AppError::Storage(StorageError::NotFound("Exercise not found".to_string())))
    }
}
