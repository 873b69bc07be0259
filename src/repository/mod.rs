//! Storage seam for users, refresh tokens, workouts and the exercise catalog
//!
//! Services hold these as `Arc<dyn ...>` so the backing store is chosen once
//! at startup and injected, never reached through global state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{RefreshToken, UniqueExercise, User, WorkoutLog};
use crate::error::StorageError;

pub mod memory;
pub mod postgres;

pub use memory::{
    InMemoryExerciseRepository, InMemoryRefreshTokenRepository, InMemoryUserRepository,
    InMemoryWorkoutRepository,
};
pub use postgres::{
    PgExerciseRepository, PgRefreshTokenRepository, PgUserRepository, PgWorkoutRepository,
};

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, token: &RefreshToken) -> Result<(), StorageError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<RefreshToken>, StorageError>;
    /// Atomically removes the record and returns it. Of two concurrent
    /// callers at most one gets `Some`.
    async fn take(&self, id: &str) -> Result<Option<RefreshToken>, StorageError>;
    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, StorageError>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `UniqueConstraintViolation` when the email is taken.
    async fn create(&self, user: &User) -> Result<(), StorageError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError>;
    async fn update(&self, user: &User) -> Result<(), StorageError>;
}

#[async_trait]
pub trait WorkoutRepository: Send + Sync {
    async fn create(&self, log: &WorkoutLog) -> Result<(), StorageError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkoutLog>, StorageError>;
    /// Newest first by `start_time`.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkoutLog>, StorageError>;
    /// Replaces the record matching both `log.id` and `log.user_id`.
    /// Returns `false` when there is none.
    async fn update(&self, log: &WorkoutLog) -> Result<bool, StorageError>;
    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait ExerciseRepository: Send + Sync {
    async fn create(&self, exercise: &UniqueExercise) -> Result<(), StorageError>;
    /// Case-insensitive substring match on the name over system exercises
    /// and those owned by `user_id`, ordered by name.
    async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UniqueExercise>, StorageError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UniqueExercise>, StorageError>;
    /// Inserts the system exercise or refreshes the one with the same name.
    async fn upsert_system(
        &self,
        name: &str,
        description: Option<&str>,
        category: Option<&str>,
    ) -> Result<(), StorageError>;
    /// Version of the bundled catalog last seeded; 0 when never seeded.
    async fn catalog_version(&self) -> Result<i32, StorageError>;
    async fn set_catalog_version(&self, version: i32) -> Result<(), StorageError>;
}
