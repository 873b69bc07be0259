//! System exercise catalog seeding
//!
//! The catalog ships inside the binary. It is written to storage only when
//! its version is newer than the one recorded there; every entry is an
//! upsert keyed on the name, so a repeated or concurrent run is harmless.

use serde::Deserialize;

use crate::error::AppError;
use crate::repository::ExerciseRepository;

const BUNDLED_CATALOG: &str = include_str!("../data/system_exercises.json");

#[derive(Debug, Deserialize)]
pub struct SystemExercise {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SystemCatalog {
    pub version: i32,
    pub exercises: Vec<SystemExercise>,
}

impl SystemCatalog {
    pub fn bundled() -> Result<Self, AppError> {
        Self::parse(BUNDLED_CATALOG)
    }

    pub fn parse(json: &str) -> Result<Self, AppError> {
        serde_json::from_str(json)
            .map_err(|e| AppError::Internal(format!("Invalid system exercise catalog: {}", e)))
    }
}

/// Returns whether anything was written.
pub async fn seed_system_exercises(
    repo: &dyn ExerciseRepository,
    catalog: &SystemCatalog,
) -> Result<bool, AppError> {
    let stored = repo.catalog_version().await?;
    if catalog.version <= stored {
        tracing::debug!(stored, bundled = catalog.version, "System exercises up to date");
        return Ok(false);
    }

    tracing::info!(from = stored, to = catalog.version, "Seeding system exercises");
    for exercise in &catalog.exercises {
        repo.upsert_system(
            exercise.name.trim(),
            exercise.description.as_deref(),
            exercise.category.as_deref(),
        )
        .await?;
    }
    repo.set_catalog_version(catalog.version).await?;

    tracing::info!(count = catalog.exercises.len(), version = catalog.version, "System exercises seeded");
    Ok(true)
}
