use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::WorkoutLogInput;
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::services::WorkoutService;

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/workouts
///
/// The caller's workouts, newest first.
pub async fn list_workouts(
    user: AuthenticatedUser,
    query: web::Query<PageQuery>,
    workouts: web::Data<WorkoutService>,
) -> Result<HttpResponse, AppError> {
    let logs = workouts.list(user.user_id, query.limit, query.offset).await?;
    Ok(HttpResponse::Ok().json(logs))
}

/// POST /api/workouts
pub async fn create_workout(
    user: AuthenticatedUser,
    form: web::Json<WorkoutLogInput>,
    workouts: web::Data<WorkoutService>,
) -> Result<HttpResponse, AppError> {
    let log = workouts.create(user.user_id, form.into_inner()).await?;
    Ok(HttpResponse::Created().json(log))
}

/// GET /api/workouts/{id}
pub async fn get_workout(
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    workouts: web::Data<WorkoutService>,
) -> Result<HttpResponse, AppError> {
    let log = workouts.get(user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(log))
}

/// PUT /api/workouts/{id}
pub async fn update_workout(
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    form: web::Json<WorkoutLogInput>,
    workouts: web::Data<WorkoutService>,
) -> Result<HttpResponse, AppError> {
    let log = workouts
        .update(user.user_id, path.into_inner(), form.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(log))
}

/// DELETE /api/workouts/{id}
pub async fn delete_workout(
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    workouts: web::Data<WorkoutService>,
) -> Result<HttpResponse, AppError> {
    workouts.delete(user.user_id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
