//! Credential Verifier
//!
//! Checks an email/password pair against the stored bcrypt hash. Unknown
//! email and wrong password fail identically.

use lazy_static::lazy_static;

use crate::auth::password::verify_password;
use crate::domain::User;
use crate::error::{AppError, AuthError};
use crate::repository::UserRepository;

lazy_static! {
    // Compared against when the email is unknown so both failure paths pay
    // for one bcrypt verification.
    static ref DUMMY_HASH: String =
        bcrypt::hash("fitness-app-dummy-password", bcrypt::DEFAULT_COST).unwrap_or_default();
}

/// Returns the matching user, or `InvalidCredentials`.
///
/// # Errors
/// Storage failures propagate unchanged.
pub async fn verify_credentials(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = email.trim().to_lowercase();
    let user = users.find_by_email(&email).await?;

    let password = password.to_string();
    let (user, valid) = tokio::task::spawn_blocking(move || match user {
        Some(user) => {
            let valid = verify_password(&password, &user.password_hash);
            (Some(user), valid)
        }
        None => {
            verify_password(&password, &DUMMY_HASH);
            (None, false)
        }
    })
    .await
    .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?;

    match user {
        Some(user) if valid => Ok(user),
        _ => Err(AppError::Auth(AuthError::InvalidCredentials)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::repository::InMemoryUserRepository;

    async fn repo_with_user(email: &str, password: &str) -> (InMemoryUserRepository, User) {
        let repo = InMemoryUserRepository::new();
        let user = User::new(email.to_string(), hash_password(password).unwrap());
        repo.create(&user).await.unwrap();
        (repo, user)
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let (repo, user) = repo_with_user("test@example.com", "password123").await;

        let verified = verify_credentials(&repo, "test@example.com", "password123")
            .await
            .expect("Credentials should verify");
        assert_eq!(verified.id, user.id);
    }

    #[tokio::test]
    async fn test_email_is_normalized() {
        let (repo, _) = repo_with_user("test@example.com", "password123").await;

        assert!(verify_credentials(&repo, "  Test@Example.com ", "password123")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
        let (repo, _) = repo_with_user("test@example.com", "password123").await;

        let wrong_password = verify_credentials(&repo, "test@example.com", "wrong-password").await;
        let unknown_user = verify_credentials(&repo, "nobody@example.com", "password123").await;

        assert!(matches!(
            wrong_password,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));
        assert!(matches!(
            unknown_user,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));
    }
}
