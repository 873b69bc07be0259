use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::{hash_password, verify_credentials, verify_password};
use crate::domain::{User, UserUpdate};
use crate::error::{AppError, AuthError, StorageError, ValidationError};
use crate::repository::UserRepository;
use crate::validators::normalize_email;

async fn hash_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

/// Account operations on top of the user repository
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Create an account.
    ///
    /// # Errors
    /// - Validation error for a malformed email or unacceptable password
    /// - `UniqueConstraintViolation` when the email is already registered
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email)?;
        let password_hash = hash_blocking(password.to_string()).await?;

        let user = User::new(email, password_hash);
        self.users.create(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = verify_credentials(self.users.as_ref(), email, password).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Storage(StorageError::NotFound("User not found".to_string())))
    }

    /// Check the current password and apply `update` to a copy of the
    /// stored user. Nothing is persisted; see [`UserService::save`].
    ///
    /// Returns the changed user and whether the password changed, so the
    /// caller can revoke outstanding sessions before saving.
    pub async fn prepare_update(&self, id: Uuid, update: UserUpdate) -> Result<(User, bool), AppError> {
        let mut user = self.get_user(id).await?;

        let current_password = update
            .current_password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ValidationError::MissingField("current_password".to_string()))?;

        let stored_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&current_password, &stored_hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?;
        if !valid {
            tracing::warn!(user_id = %id, "Profile update rejected: wrong current password");
            return Err(AppError::Auth(AuthError::InvalidCredentials));
        }

        let password_changed = match update.new_password.filter(|p| !p.is_empty()) {
            Some(new_password) => {
                user.password_hash = hash_blocking(new_password).await?;
                true
            }
            None => false,
        };

        if let Some(unit) = update.preferred_unit {
            user.preferred_unit = unit;
        }

        user.updated_at = Utc::now();
        Ok((user, password_changed))
    }

    pub async fn save(&self, user: &User) -> Result<(), AppError> {
        self.users.update(user).await?;
        tracing::info!(user_id = %user.id, "User updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeightUnit;
    use crate::repository::InMemoryUserRepository;

    fn service() -> UserService {
        UserService::new(Arc::new(InMemoryUserRepository::new()))
    }

    async fn update_user(
        service: &UserService,
        id: Uuid,
        update: UserUpdate,
    ) -> Result<(User, bool), AppError> {
        let (user, password_changed) = service.prepare_update(id, update).await?;
        service.save(&user).await?;
        Ok((user, password_changed))
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_hashes_password() {
        let service = service();

        let user = service
            .register(" Lifter@Example.com", "password123")
            .await
            .expect("Registration failed");

        assert_eq!(user.email, "lifter@example.com");
        assert_ne!(user.password_hash, "password123");
        assert_eq!(user.preferred_unit, WeightUnit::Kilograms);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let service = service();
        service.register("lifter@example.com", "password123").await.unwrap();

        let result = service.register("LIFTER@example.com", "password456").await;
        assert!(matches!(
            result,
            Err(AppError::Storage(StorageError::UniqueConstraintViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let result = service().register("lifter@example.com", "short").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_after_register() {
        let service = service();
        let registered = service.register("lifter@example.com", "password123").await.unwrap();

        let user = service.login("lifter@example.com", "password123").await.unwrap();
        assert_eq!(user.id, registered.id);

        assert!(matches!(
            service.login("lifter@example.com", "password124").await,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        assert!(matches!(
            service().get_user(Uuid::new_v4()).await,
            Err(AppError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_preferred_unit_only() {
        let service = service();
        let user = service.register("lifter@example.com", "password123").await.unwrap();

        let (updated, password_changed) = update_user(
            &service,
            user.id,
            UserUpdate {
                current_password: Some("password123".to_string()),
                preferred_unit: Some(WeightUnit::Pounds),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(!password_changed);
        assert_eq!(updated.preferred_unit, WeightUnit::Pounds);
        assert_eq!(updated.password_hash, user.password_hash);
        assert!(updated.updated_at >= user.updated_at);
    }

    #[tokio::test]
    async fn test_update_password() {
        let service = service();
        let user = service.register("lifter@example.com", "password123").await.unwrap();

        let (_, password_changed) = update_user(
            &service,
            user.id,
            UserUpdate {
                current_password: Some("password123".to_string()),
                new_password: Some("new-password-456".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(password_changed);
        assert!(service.login("lifter@example.com", "new-password-456").await.is_ok());
        assert!(service.login("lifter@example.com", "password123").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_new_password_is_no_change() {
        let service = service();
        let user = service.register("lifter@example.com", "password123").await.unwrap();

        let (updated, password_changed) = update_user(
            &service,
            user.id,
            UserUpdate {
                current_password: Some("password123".to_string()),
                new_password: Some(String::new()),
                preferred_unit: Some(WeightUnit::Pounds),
            },
        )
        .await
        .unwrap();

        assert!(!password_changed);
        assert_eq!(updated.password_hash, user.password_hash);
        assert_eq!(updated.preferred_unit, WeightUnit::Pounds);
        assert!(service.login("lifter@example.com", "password123").await.is_ok());
    }

    #[tokio::test]
    async fn test_prepared_update_is_not_persisted_until_saved() {
        let service = service();
        let user = service.register("lifter@example.com", "password123").await.unwrap();

        let (prepared, password_changed) = service
            .prepare_update(
                user.id,
                UserUpdate {
                    current_password: Some("password123".to_string()),
                    new_password: Some("new-password-456".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(password_changed);
        assert!(service.login("lifter@example.com", "password123").await.is_ok());

        service.save(&prepared).await.unwrap();
        assert!(service.login("lifter@example.com", "password123").await.is_err());
        assert!(service.login("lifter@example.com", "new-password-456").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_requires_current_password() {
        let service = service();
        let user = service.register("lifter@example.com", "password123").await.unwrap();

        let missing = update_user(
            &service,
            user.id,
            UserUpdate {
                preferred_unit: Some(WeightUnit::Pounds),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(
            missing,
            Err(AppError::Validation(ValidationError::MissingField(_)))
        ));

        let wrong = update_user(
            &service,
            user.id,
            UserUpdate {
                current_password: Some("not-my-password".to_string()),
                preferred_unit: Some(WeightUnit::Pounds),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(wrong, Err(AppError::Auth(AuthError::InvalidCredentials))));
    }
}
