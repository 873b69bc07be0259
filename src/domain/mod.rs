mod exercise;
mod refresh_token;
mod user;
mod workout;

pub use exercise::{NewExercise, UniqueExercise};
pub use refresh_token::{CompositeToken, RefreshToken};
pub use user::{User, UserResponse, UserUpdate, WeightUnit};
pub use workout::{ExerciseLog, SetEntry, WorkoutLog, WorkoutLogInput};
