mod exercise;
mod user;
mod workout;

pub use exercise::ExerciseService;
pub use user::UserService;
pub use workout::WorkoutService;

const MAX_PAGE_SIZE: i64 = 100;

/// Clamp a requested page to `1..=MAX_PAGE_SIZE` items and a non-negative
/// offset.
fn page_bounds(limit: Option<i64>, offset: Option<i64>, default_limit: i64) -> (i64, i64) {
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}
