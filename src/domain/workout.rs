use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

const MAX_NAME_LENGTH: usize = 200;
const MAX_NOTES_LENGTH: usize = 2000;

/// One performed set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub reps: i32,
    pub weight: f64,
    #[serde(default)]
    pub rpe: Option<i32>,
    #[serde(default)]
    pub to_failure: Option<bool>,
    pub order: i32,
}

/// Sets performed for one catalog exercise within a workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseLog {
    pub unique_exercise_id: Uuid,
    #[serde(default)]
    pub sets: Vec<SetEntry>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A logged training session, owned by exactly one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exercise_logs: Vec<ExerciseLog>,
    pub location_name: Option<String>,
    pub general_notes: Option<String>,
}

/// Client-supplied body for creating or replacing a workout
#[derive(Debug, Clone, Deserialize)]
pub struct WorkoutLogInput {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub exercise_logs: Vec<ExerciseLog>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub general_notes: Option<String>,
}

fn check_notes(field: &str, notes: Option<&str>) -> Result<(), ValidationError> {
    match notes {
        Some(text) if text.len() > MAX_NOTES_LENGTH => {
            Err(ValidationError::TooLong(field.to_string(), MAX_NOTES_LENGTH))
        }
        _ => Ok(()),
    }
}

impl WorkoutLogInput {
    /// Rejects an empty name, an end before the start, and sets with
    /// negative reps or weight or an RPE outside 1..=10.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("name".to_string()));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(ValidationError::TooLong("name".to_string(), MAX_NAME_LENGTH));
        }
        if self.end_time < self.start_time {
            return Err(ValidationError::InvalidFormat("end_time".to_string()));
        }
        check_notes("general_notes", self.general_notes.as_deref())?;

        for log in &self.exercise_logs {
            check_notes("notes", log.notes.as_deref())?;
            for set in &log.sets {
                if set.reps < 0 || set.weight < 0.0 || !set.weight.is_finite() {
                    return Err(ValidationError::InvalidFormat("sets".to_string()));
                }
                if matches!(set.rpe, Some(rpe) if !(1..=10).contains(&rpe)) {
                    return Err(ValidationError::InvalidFormat("rpe".to_string()));
                }
            }
        }

        Ok(())
    }

    /// Build the stored record under `id` for `user_id`.
    pub fn into_log(self, id: Uuid, user_id: Uuid) -> WorkoutLog {
        WorkoutLog {
            id,
            user_id,
            name: self.name.trim().to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
            exercise_logs: self.exercise_logs,
            location_name: self.location_name,
            general_notes: self.general_notes,
        }
    }
}
