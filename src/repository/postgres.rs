use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{ExerciseLog, RefreshToken, UniqueExercise, User, WeightUnit, WorkoutLog};
use crate::error::StorageError;
use crate::repository::{
    ExerciseRepository, RefreshTokenRepository, UserRepository, WorkoutRepository,
};

pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn create(&self, token: &RefreshToken) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<RefreshToken>, StorageError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, created_at
            FROM refresh_tokens
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn take(&self, id: &str) -> Result<Option<RefreshToken>, StorageError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            DELETE FROM refresh_tokens
            WHERE id = $1
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type UserRow = (Uuid, String, String, String, DateTime<Utc>, DateTime<Utc>);

fn user_from_row(row: UserRow) -> Result<User, StorageError> {
    let (id, email, password_hash, preferred_unit, created_at, updated_at) = row;
    let preferred_unit = preferred_unit
        .parse::<WeightUnit>()
        .map_err(StorageError::UnexpectedError)?;

    Ok(User {
        id,
        email,
        password_hash,
        preferred_unit,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, preferred_unit, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.preferred_unit.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, preferred_unit, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(user_from_row)
        .transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorageError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, preferred_unit, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(user_from_row)
        .transpose()
    }

    async fn update(&self, user: &User) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, preferred_unit = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(&user.password_hash)
        .bind(user.preferred_unit.as_str())
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}

pub struct PgWorkoutRepository {
    pool: PgPool,
}

impl PgWorkoutRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WorkoutRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    exercise_logs: Json<Vec<ExerciseLog>>,
    location_name: Option<String>,
    general_notes: Option<String>,
}

impl From<WorkoutRow> for WorkoutLog {
    fn from(row: WorkoutRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            start_time: row.start_time,
            end_time: row.end_time,
            exercise_logs: row.exercise_logs.0,
            location_name: row.location_name,
            general_notes: row.general_notes,
        }
    }
}

#[async_trait]
impl WorkoutRepository for PgWorkoutRepository {
    async fn create(&self, log: &WorkoutLog) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO workout_logs
                (id, user_id, name, start_time, end_time, exercise_logs, location_name, general_notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(&log.name)
        .bind(log.start_time)
        .bind(log.end_time)
        .bind(Json(&log.exercise_logs))
        .bind(&log.location_name)
        .bind(&log.general_notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<WorkoutLog>, StorageError> {
        let row = sqlx::query_as::<_, WorkoutRow>(
            r#"
            SELECT id, user_id, name, start_time, end_time, exercise_logs, location_name, general_notes
            FROM workout_logs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(WorkoutLog::from))
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkoutLog>, StorageError> {
        let rows = sqlx::query_as::<_, WorkoutRow>(
            r#"
            SELECT id, user_id, name, start_time, end_time, exercise_logs, location_name, general_notes
            FROM workout_logs
            WHERE user_id = $1
            ORDER BY start_time DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WorkoutLog::from).collect())
    }

    async fn update(&self, log: &WorkoutLog) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE workout_logs
            SET name = $1, start_time = $2, end_time = $3, exercise_logs = $4,
                location_name = $5, general_notes = $6
            WHERE id = $7 AND user_id = $8
            "#,
        )
        .bind(&log.name)
        .bind(log.start_time)
        .bind(log.end_time)
        .bind(Json(&log.exercise_logs))
        .bind(&log.location_name)
        .bind(&log.general_notes)
        .bind(log.id)
        .bind(log.user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM workout_logs WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct PgExerciseRepository {
    pool: PgPool,
}

impl PgExerciseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type ExerciseRow = (Uuid, String, Option<Uuid>, Option<String>, Option<String>);

fn exercise_from_row(row: ExerciseRow) -> UniqueExercise {
    let (id, name, user_id, description, category) = row;
    UniqueExercise {
        id,
        name,
        user_id,
        description,
        category,
    }
}

/// Escape `%`, `_` and the escape character so user input matches literally
/// inside an `ILIKE` pattern.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

const SYSTEM_CATALOG_KEY: &str = "system_exercises_version";

#[async_trait]
impl ExerciseRepository for PgExerciseRepository {
    async fn create(&self, exercise: &UniqueExercise) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO exercises (id, name, user_id, description, category)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(exercise.id)
        .bind(&exercise.name)
        .bind(exercise.user_id)
        .bind(&exercise.description)
        .bind(&exercise.category)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search(
        &self,
        user_id: Uuid,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UniqueExercise>, StorageError> {
        let rows = sqlx::query_as::<_, ExerciseRow>(
            r#"
            SELECT id, name, user_id, description, category
            FROM exercises
            WHERE (user_id IS NULL OR user_id = $1) AND name ILIKE $2
            ORDER BY name, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(like_pattern(query))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(exercise_from_row).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UniqueExercise>, StorageError> {
        let row = sqlx::query_as::<_, ExerciseRow>(
            "SELECT id, name, user_id, description, category FROM exercises WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(exercise_from_row))
    }

    async fn upsert_system(
        &self,
        name: &str,
        description: Option<&str>,
        category: Option<&str>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO exercises (id, name, user_id, description, category)
            VALUES ($1, $2, NULL, $3, $4)
            ON CONFLICT (name) WHERE user_id IS NULL
            DO UPDATE SET description = EXCLUDED.description, category = EXCLUDED.category
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(category)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn catalog_version(&self) -> Result<i32, StorageError> {
        let version = sqlx::query_scalar::<_, i32>(
            "SELECT version FROM system_metadata WHERE key = $1",
        )
        .bind(SYSTEM_CATALOG_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(version.unwrap_or(0))
    }

    async fn set_catalog_version(&self, version: i32) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO system_metadata (key, version)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET version = EXCLUDED.version
            "#,
        )
        .bind(SYSTEM_CATALOG_KEY)
        .bind(version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
