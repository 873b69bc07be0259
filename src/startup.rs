use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::auth::RefreshTokenStore;
use crate::configuration::{CookieSettings, DatabaseSettings, JwtSettings, Settings, StorageBackend};
use crate::error::{AppError, StorageError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{Authentication, Recovery};
use crate::repository::{
    ExerciseRepository, InMemoryExerciseRepository, InMemoryRefreshTokenRepository,
    InMemoryUserRepository, InMemoryWorkoutRepository, PgExerciseRepository,
    PgRefreshTokenRepository, PgUserRepository, PgWorkoutRepository, RefreshTokenRepository,
    UserRepository, WorkoutRepository,
};
use crate::routes::{
    create_exercise, create_workout, delete_workout, get_current_user, get_exercise, get_workout,
    health_check, list_workouts, login, logout, logout_all, refresh, register, search_exercises,
    update_current_user, update_workout,
};
use crate::seeder::{seed_system_exercises, SystemCatalog};
use crate::services::{ExerciseService, UserService, WorkoutService};

/// One handle per storage concern, all backed by the same store
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<dyn RefreshTokenRepository>,
    pub workouts: Arc<dyn WorkoutRepository>,
    pub exercises: Arc<dyn ExerciseRepository>,
}

impl Repositories {
    /// Kept in process memory. Nothing survives a restart.
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            tokens: Arc::new(InMemoryRefreshTokenRepository::new()),
            workouts: Arc::new(InMemoryWorkoutRepository::new()),
            exercises: Arc::new(InMemoryExerciseRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            tokens: Arc::new(PgRefreshTokenRepository::new(pool.clone())),
            workouts: Arc::new(PgWorkoutRepository::new(pool.clone())),
            exercises: Arc::new(PgExerciseRepository::new(pool)),
        }
    }
}

/// Everything the handlers need, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub tokens: RefreshTokenStore,
    pub workouts: WorkoutService,
    pub exercises: ExerciseService,
    pub jwt: JwtSettings,
    pub cookies: CookieSettings,
}

impl AppState {
    pub fn new(repositories: Repositories, settings: &Settings) -> Self {
        let tokens = RefreshTokenStore::new(
            repositories.tokens,
            chrono::Duration::seconds(settings.jwt.refresh_token_expiry),
            settings.database.timeout(),
        );

        Self {
            users: UserService::new(repositories.users),
            tokens,
            workouts: WorkoutService::new(repositories.workouts),
            exercises: ExerciseService::new(repositories.exercises),
            jwt: settings.jwt.clone(),
            cookies: settings.cookie_settings(),
        }
    }

    pub fn in_memory(settings: &Settings) -> Self {
        Self::new(Repositories::in_memory(), settings)
    }

    /// Connect, migrate, seed the exercise catalog and build the state for
    /// the configured backend.
    pub async fn build(settings: &Settings) -> Result<Self, AppError> {
        let repositories = match settings.application.storage {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Repositories::in_memory()
            }
            StorageBackend::Postgres => {
                let pool = connect_database(&settings.database).await?;
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .map_err(|e| AppError::Storage(StorageError::QueryExecution(e.to_string())))?;
                tracing::info!("Database migrations applied");
                Repositories::postgres(pool)
            }
        };

        seed_system_exercises(repositories.exercises.as_ref(), &SystemCatalog::bundled()?).await?;

        Ok(Self::new(repositories, settings))
    }
}

/// Periodically delete refresh tokens that expired without being presented
/// again. The first sweep runs immediately. Failures are logged and the
/// sweeper keeps going.
pub fn spawn_expired_token_sweeper(tokens: RefreshTokenStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = tokens.purge_expired().await {
                tracing::warn!(error = %e, "Failed to purge expired refresh tokens");
            }
        }
    })
}

pub async fn connect_database(settings: &DatabaseSettings) -> Result<PgPool, AppError> {
    tracing::info!(host = %settings.host, database = %settings.database_name, "Connecting to database");

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.timeout())
        .connect(&settings.connection_string())
        .await?;

    Ok(pool)
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let users = web::Data::new(state.users);
    let tokens = web::Data::new(state.tokens);
    let workouts = web::Data::new(state.workouts);
    let exercises = web::Data::new(state.exercises);
    let cookies = web::Data::new(state.cookies);
    let jwt_config = state.jwt;
    let jwt_config_data = web::Data::new(jwt_config.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Authentication::new(jwt_config.clone()))
            .wrap(Recovery)
            .wrap(LoggerMiddleware)
            .app_data(users.clone())
            .app_data(tokens.clone())
            .app_data(workouts.clone())
            .app_data(exercises.clone())
            .app_data(cookies.clone())
            .app_data(jwt_config_data.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    .route("/logout-all", web::post().to(logout_all)),
            )
            .service(
                web::scope("/api")
                    .route("/me", web::get().to(get_current_user))
                    .route("/me", web::patch().to(update_current_user))
                    .route("/workouts", web::get().to(list_workouts))
                    .route("/workouts", web::post().to(create_workout))
                    .route("/workouts/{id}", web::get().to(get_workout))
                    .route("/workouts/{id}", web::put().to(update_workout))
                    .route("/workouts/{id}", web::delete().to(delete_workout))
                    .route("/exercises", web::get().to(search_exercises))
                    .route("/exercises", web::post().to(create_exercise))
                    .route("/exercises/{id}", web::get().to(get_exercise)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
