mod auth;
mod exercises;
mod health_check;
mod users;
mod workouts;

pub use auth::{login, logout, logout_all, refresh, register, AuthResponse, CredentialsRequest};
pub use exercises::{create_exercise, get_exercise, search_exercises};
pub use health_check::health_check;
pub use users::{get_current_user, update_current_user};
pub use workouts::{create_workout, delete_workout, get_workout, list_workouts, update_workout};
