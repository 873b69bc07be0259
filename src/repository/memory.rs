//! In-process repositories with the same semantics as the Postgres ones.
//! Used by the test suites and by `application.storage = "memory"`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{RefreshToken, UniqueExercise, User, WorkoutLog};
use crate::error::StorageError;
use crate::repository::{
    ExerciseRepository, RefreshTokenRepository, UserRepository, WorkoutRepository,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|_| StorageError::UnexpectedError("storage lock poisoned".to_string()))
}

#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    tokens: Mutex<HashMap<String, RefreshToken>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.tokens.lock().map(|tokens| tokens.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn create(&self, token: &RefreshToken) -> Result<(), StorageError> {
        let mut tokens = lock(&self.tokens)?;
        if tokens.contains_key(&token.id) {
            return Err(StorageError::UniqueConstraintViolation(
                "refresh token id already exists".to_string(),
            ));
        }
        tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<RefreshToken>, StorageError> {
        Ok(lock(&self.tokens)?.get(id).cloned())
    }

    async fn take(&self, id: &str) -> Result<Option<RefreshToken>, StorageError> {
        Ok(lock(&self.tokens)?.remove(id))
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(lock(&self.tokens)?.remove(id).is_some())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, StorageError> {
        let mut tokens = lock(&self.tokens)?;
        let before = tokens.len();
        tokens.retain(|_, token| token.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut tokens = lock(&self.tokens)?;
        let before = tokens.len();
        tokens.retain(|_, token| !token.is_expired_at(now));
        Ok((before - tokens.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> Result<(), StorageError> {
        let mut users = lock(&self.users)?;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(StorageError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        Ok(lock(&self.users)?
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        Ok(lock(&self.users)?.get(&id).cloned())
    }

    async fn update(&self, user: &User) -> Result<(), StorageError> {
        let mut users = lock(&self.users)?;
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound("User not found".to_string())),
        }
    }
}

#[derive(Default)]
pub struct InMemoryWorkoutRepository {
    logs: Mutex<HashMap<Uuid, WorkoutLog>>,
}

impl InMemoryWorkoutRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl WorkoutRepository for InMemoryWorkoutRepository {
    async fn create(&self, log: &WorkoutLog) -> Result<(), StorageError> {
        let mut logs = lock(&self.logs)?;
        if logs.contains_key(&log.id) {
            return Err(StorageError::UniqueConstraintViolation("Duplicate key".to_string()));
        }
        logs.insert(log.id, log.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkoutLog>, StorageError> {
        Ok(lock(&self.logs)?.get(&id).cloned())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkoutLog>, StorageError> {
        let mut owned: Vec<WorkoutLog> = lock(&self.logs)?
            .values()
            .filter(|log| log.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(page(owned, limit, offset))
    }

    async fn update(&self, log: &WorkoutLog) -> Result<bool, StorageError> {
        let mut logs = lock(&self.logs)?;
        match logs.get_mut(&log.id) {
            Some(existing) if existing.user_id == log.user_id => {
                *existing = log.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, StorageError> {
        let mut logs = lock(&self.logs)?;
        if logs.get(&id).map_or(false, |log| log.user_id == user_id) {
            logs.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[derive(Default)]
pub struct InMemoryExerciseRepository {
    exercises: Mutex<HashMap<Uuid, UniqueExercise>>,
    catalog_version: Mutex<i32>,
}

impl InMemoryExerciseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExerciseRepository for InMemoryExerciseRepository {
    async fn create(&self, exercise: &UniqueExercise) -> Result<(), StorageError> {
        let mut exercises = lock(&self.exercises)?;
        let system_name_taken = exercise.is_system()
            && exercises
                .values()
                .any(|existing| existing.is_system() && existing.name == exercise.name);
        if system_name_taken || exercises.contains_key(&exercise.id) {
            return Err(StorageError::UniqueConstraintViolation(
                "Exercise already exists".to_string(),
            ));
        }
        exercises.insert(exercise.id, exercise.clone());
        Ok(())
    }

    async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UniqueExercise>, StorageError> {
        let needle = query.to_lowercase();
        let mut matches: Vec<UniqueExercise> = lock(&self.exercises)?
            .values()
            .filter(|exercise| exercise.is_visible_to(user_id))
            .filter(|exercise| exercise.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(page(matches, limit, offset))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UniqueExercise>, StorageError> {
        Ok(lock(&self.exercises)?.get(&id).cloned())
    }

    async fn upsert_system(
        &self,
        name: &str,
        description: Option<&str>,
        category: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut exercises = lock(&self.exercises)?;
        let existing = exercises
            .values_mut()
            .find(|exercise| exercise.is_system() && exercise.name == name);

        match existing {
            Some(exercise) => {
                exercise.description = description.map(str::to_string);
                exercise.category = category.map(str::to_string);
            }
            None => {
                let exercise = UniqueExercise {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    user_id: None,
                    description: description.map(str::to_string),
                    category: category.map(str::to_string),
                };
                exercises.insert(exercise.id, exercise);
            }
        }
        Ok(())
    }

    async fn catalog_version(&self) -> Result<i32, StorageError> {
        Ok(*lock(&self.catalog_version)?)
    }

    async fn set_catalog_version(&self, version: i32) -> Result<(), StorageError> {
        *lock(&self.catalog_version)? = version;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token_for(user_id: Uuid, expires_in: Duration) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: RefreshToken::new_id(),
            user_id,
            token_hash: "hash".to_string(),
            expires_at: now + expires_in,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_take_returns_record_once() {
        let repo = InMemoryRefreshTokenRepository::new();
        let token = token_for(Uuid::new_v4(), Duration::days(7));
        repo.create(&token).await.unwrap();

        assert_eq!(repo.take(&token.id).await.unwrap(), Some(token.clone()));
        assert_eq!(repo.take(&token.id).await.unwrap(), None);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let repo = InMemoryRefreshTokenRepository::new();
        let token = token_for(Uuid::new_v4(), Duration::days(7));
        repo.create(&token).await.unwrap();

        assert!(repo.delete(&token.id).await.unwrap());
        assert!(!repo.delete(&token.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_for_user_leaves_other_users() {
        let repo = InMemoryRefreshTokenRepository::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for user in [alice, alice, bob] {
            repo.create(&token_for(user, Duration::days(7))).await.unwrap();
        }

        assert_eq!(repo.delete_all_for_user(alice).await.unwrap(), 2);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_expired_sweeps_only_stale_records() {
        let repo = InMemoryRefreshTokenRepository::new();
        let user = Uuid::new_v4();
        repo.create(&token_for(user, Duration::seconds(-10))).await.unwrap();
        repo.create(&token_for(user, Duration::days(1))).await.unwrap();

        assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let repo = InMemoryUserRepository::new();
        let first = User::new("lifter@example.com".to_string(), "h".to_string());
        let second = User::new("lifter@example.com".to_string(), "h".to_string());

        repo.create(&first).await.unwrap();
        let result = repo.create(&second).await;

        assert!(matches!(
            result,
            Err(StorageError::UniqueConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_unknown_user_fails() {
        let repo = InMemoryUserRepository::new();
        let ghost = User::new("ghost@example.com".to_string(), "h".to_string());

        assert!(matches!(
            repo.update(&ghost).await,
            Err(StorageError::NotFound(_))
        ));
    }

    fn workout_for(user_id: Uuid, started_hours_ago: i64) -> WorkoutLog {
        let start = Utc::now() - Duration::hours(started_hours_ago);
        WorkoutLog {
            id: Uuid::new_v4(),
            user_id,
            name: format!("Session {}", started_hours_ago),
            start_time: start,
            end_time: start + Duration::hours(1),
            exercise_logs: Vec::new(),
            location_name: None,
            general_notes: None,
        }
    }

    #[tokio::test]
    async fn test_workouts_list_newest_first_and_page() {
        let repo = InMemoryWorkoutRepository::new();
        let user = Uuid::new_v4();
        for hours_ago in [48, 2, 24] {
            repo.create(&workout_for(user, hours_ago)).await.unwrap();
        }
        repo.create(&workout_for(Uuid::new_v4(), 1)).await.unwrap();

        let all = repo.list_by_user(user, 10, 0).await.unwrap();
        let names: Vec<_> = all.iter().map(|log| log.name.as_str()).collect();
        assert_eq!(names, ["Session 2", "Session 24", "Session 48"]);

        let second_page = repo.list_by_user(user, 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].name, "Session 48");
    }

    #[tokio::test]
    async fn test_workout_update_and_delete_are_owner_scoped() {
        let repo = InMemoryWorkoutRepository::new();
        let owner = Uuid::new_v4();
        let log = workout_for(owner, 1);
        repo.create(&log).await.unwrap();

        let mut hijack = log.clone();
        hijack.user_id = Uuid::new_v4();
        hijack.name = "Stolen".to_string();
        assert!(!repo.update(&hijack).await.unwrap());
        assert!(!repo.delete(log.id, hijack.user_id).await.unwrap());

        let mut renamed = log.clone();
        renamed.name = "Renamed".to_string();
        assert!(repo.update(&renamed).await.unwrap());
        assert_eq!(repo.find_by_id(log.id).await.unwrap().unwrap().name, "Renamed");

        assert!(repo.delete(log.id, owner).await.unwrap());
        assert!(repo.find_by_id(log.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exercise_search_sees_system_and_own_only() {
        let repo = InMemoryExerciseRepository::new();
        let me = Uuid::new_v4();
        let someone_else = Uuid::new_v4();
        repo.upsert_system("Bench Press", None, Some("chest")).await.unwrap();
        repo.upsert_system("Squat", None, Some("legs")).await.unwrap();
        for (owner, name) in [(me, "Incline Press"), (someone_else, "Floor Press")] {
            repo.create(&UniqueExercise {
                id: Uuid::new_v4(),
                name: name.to_string(),
                user_id: Some(owner),
                description: None,
                category: None,
            })
            .await
            .unwrap();
        }

        let found = repo.search(me, "PRESS", 50, 0).await.unwrap();
        let names: Vec<_> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Bench Press", "Incline Press"]);
    }

    #[tokio::test]
    async fn test_upsert_system_refreshes_existing_entry() {
        let repo = InMemoryExerciseRepository::new();
        repo.upsert_system("Deadlift", Some("old"), None).await.unwrap();
        repo.upsert_system("Deadlift", Some("new"), Some("back")).await.unwrap();

        let found = repo.search(Uuid::new_v4(), "deadlift", 50, 0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].description.as_deref(), Some("new"));
        assert_eq!(found[0].category.as_deref(), Some("back"));

        assert_eq!(repo.catalog_version().await.unwrap(), 0);
        repo.set_catalog_version(3).await.unwrap();
        assert_eq!(repo.catalog_version().await.unwrap(), 3);
    }
}
