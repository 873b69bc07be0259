use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::NewExercise;
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::services::ExerciseService;

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/exercises?query=&limit=&offset=
///
/// System exercises and the caller's own, matched case-insensitively on
/// the name. An empty query lists everything visible.
pub async fn search_exercises(
    user: AuthenticatedUser,
    params: web::Query<SearchQuery>,
    exercises: web::Data<ExerciseService>,
) -> Result<HttpResponse, AppError> {
    let found = exercises
        .search(user.user_id, &params.query, params.limit, params.offset)
        .await?;
    Ok(HttpResponse::Ok().json(found))
}

/// POST /api/exercises
pub async fn create_exercise(
    user: AuthenticatedUser,
    form: web::Json<NewExercise>,
    exercises: web::Data<ExerciseService>,
) -> Result<HttpResponse, AppError> {
    let exercise = exercises.create(user.user_id, form.into_inner()).await?;
    Ok(HttpResponse::Created().json(exercise))
}

/// GET /api/exercises/{id}
pub async fn get_exercise(
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    exercises: web::Data<ExerciseService>,
) -> Result<HttpResponse, AppError> {
    let exercise = exercises.get(user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(exercise))
}
