//! Refresh Token Store & Rotator
//!
//! Refresh tokens are handed to clients as `<id>.<secret>`:
//! - `id` is the storage key, so validation is a single indexed lookup
//! - `secret` is 64 random alphanumeric characters, stored only as a bcrypt hash
//! - every successful validation deletes the record and issues a replacement
//!   (rotation), so a token is accepted at most once
//!
//! Records are never marked as used; a rotated, revoked or expired token is
//! simply gone.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use uuid::Uuid;

use crate::domain::{CompositeToken, RefreshToken};
use crate::error::{AppError, AuthError, StorageError};
use crate::repository::RefreshTokenRepository;

const SECRET_LENGTH: usize = 64;
const SECRET_HASH_COST: u32 = 10;

/// Generate the secret half of a refresh token (~381 bits of entropy).
pub fn generate_refresh_secret() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

async fn hash_secret(secret: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(secret, SECRET_HASH_COST))
        .await
        .map_err(|e| AppError::Internal(format!("Token hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Token hashing failed: {}", e)))
}

async fn verify_secret(secret: String, token_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(secret, &token_hash).unwrap_or(false))
        .await
        .map_err(|e| AppError::Internal(format!("Token verification task failed: {}", e)))
}

/// Issues, validates, rotates and revokes refresh tokens.
///
/// Holds no state besides the injected repository; every decision is made
/// from the record fetched in the same call.
#[derive(Clone)]
pub struct RefreshTokenStore {
    repo: Arc<dyn RefreshTokenRepository>,
    ttl: Duration,
    storage_timeout: StdDuration,
}

impl RefreshTokenStore {
    pub fn new(
        repo: Arc<dyn RefreshTokenRepository>,
        ttl: Duration,
        storage_timeout: StdDuration,
    ) -> Self {
        Self {
            repo,
            ttl,
            storage_timeout,
        }
    }

    /// Lifetime of newly issued tokens
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        match tokio::time::timeout(self.storage_timeout, fut).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => {
                tracing::error!(operation, "Refresh token storage deadline elapsed");
                Err(AppError::Storage(StorageError::Timeout))
            }
        }
    }

    /// Persist a new token for `user_id` and return its composite form.
    pub async fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let secret = generate_refresh_secret();
        let token_hash = hash_secret(secret.clone()).await?;

        let now = Utc::now();
        let record = RefreshToken {
            id: RefreshToken::new_id(),
            user_id,
            token_hash,
            expires_at: now + self.ttl,
            created_at: now,
        };

        self.with_deadline("create", self.repo.create(&record)).await?;

        tracing::debug!(user_id = %user_id, token_id = %record.id, "Refresh token issued");
        Ok(CompositeToken::new(record.id, secret).to_string())
    }

    /// Validate `raw`, delete it and issue a replacement.
    ///
    /// Returns the new composite token and the owning user.
    ///
    /// # Errors
    /// - `MalformedToken`: not `<id>.<secret>`; storage is not touched
    /// - `TokenNotFound`: unknown id, or already rotated/revoked
    /// - `TokenExpired`: past `expires_at`; the record is deleted
    /// - `InvalidSignature`: secret does not match; the record is kept
    pub async fn validate_and_rotate(&self, raw: &str) -> Result<(String, Uuid), AppError> {
        let token = CompositeToken::parse(raw)?;

        let stored = self
            .with_deadline("find_by_id", self.repo.find_by_id(&token.id))
            .await?
            .ok_or(AppError::Auth(AuthError::TokenNotFound))?;

        if stored.is_expired_at(Utc::now()) {
            if let Err(e) = self.with_deadline("delete", self.repo.delete(&stored.id)).await {
                tracing::warn!(token_id = %stored.id, error = %e, "Failed to delete expired refresh token");
            }
            tracing::info!(user_id = %stored.user_id, "Refresh token expired");
            return Err(AppError::Auth(AuthError::TokenExpired));
        }

        if !verify_secret(token.secret, stored.token_hash.clone()).await? {
            tracing::warn!(user_id = %stored.user_id, token_id = %stored.id, "Refresh token secret mismatch");
            return Err(AppError::Auth(AuthError::InvalidSignature));
        }

        // A concurrent rotation of the same token may have removed it since
        // the lookup; only the caller whose delete returns the record wins.
        let taken = self
            .with_deadline("take", self.repo.take(&stored.id))
            .await?;
        if taken.is_none() {
            tracing::warn!(user_id = %stored.user_id, token_id = %stored.id, "Refresh token already rotated");
            return Err(AppError::Auth(AuthError::TokenNotFound));
        }

        let replacement = self.issue(stored.user_id).await?;

        tracing::info!(user_id = %stored.user_id, "Refresh token rotated");
        Ok((replacement, stored.user_id))
    }

    /// Delete the token if it exists. Malformed or unknown tokens are ignored.
    pub async fn revoke(&self, raw: &str) -> Result<(), AppError> {
        let token = match CompositeToken::parse(raw) {
            Ok(token) => token,
            Err(_) => return Ok(()),
        };

        let removed = self
            .with_deadline("delete", self.repo.delete(&token.id))
            .await?;
        tracing::debug!(token_id = %token.id, removed, "Refresh token revoked");
        Ok(())
    }

    /// Delete every token belonging to `user_id`.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let count = self
            .with_deadline("delete_all_for_user", self.repo.delete_all_for_user(user_id))
            .await?;
        tracing::info!(user_id = %user_id, count, "All refresh tokens revoked for user");
        Ok(count)
    }

    /// Sweep records that expired without ever being presented again.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let count = self
            .with_deadline("delete_expired", self.repo.delete_expired(Utc::now()))
            .await?;
        if count > 0 {
            tracing::info!(count, "Purged expired refresh tokens");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRefreshTokenRepository;
    use async_trait::async_trait;
    use chrono::DateTime;

    fn store_with(ttl: Duration) -> (RefreshTokenStore, Arc<InMemoryRefreshTokenRepository>) {
        let repo = Arc::new(InMemoryRefreshTokenRepository::new());
        let store = RefreshTokenStore::new(repo.clone(), ttl, StdDuration::from_secs(5));
        (store, repo)
    }

    fn id_of(raw: &str) -> String {
        CompositeToken::parse(raw).unwrap().id
    }

    #[test]
    fn test_generate_refresh_secret() {
        let secret = generate_refresh_secret();

        assert_eq!(secret.len(), SECRET_LENGTH);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(secret, generate_refresh_secret());
    }

    #[tokio::test]
    async fn test_issue_stores_only_the_hash() {
        let (store, repo) = store_with(Duration::days(7));
        let user_id = Uuid::new_v4();

        let raw = store.issue(user_id).await.expect("Failed to issue token");
        let token = CompositeToken::parse(&raw).unwrap();
        let stored = repo.find_by_id(&token.id).await.unwrap().expect("Token not stored");

        assert_eq!(stored.user_id, user_id);
        assert!(stored.token_hash.starts_with("$2"));
        assert!(!stored.token_hash.contains(&token.secret));
        assert!(stored.expires_at > stored.created_at + Duration::days(6));
    }

    #[tokio::test]
    async fn test_issue_then_rotate_returns_same_user_and_new_id() {
        let (store, _) = store_with(Duration::days(7));
        let user_id = Uuid::new_v4();

        let original = store.issue(user_id).await.unwrap();
        let (rotated, owner) = store
            .validate_and_rotate(&original)
            .await
            .expect("Rotation should succeed");

        assert_eq!(owner, user_id);
        assert_ne!(id_of(&rotated), id_of(&original));
    }

    #[tokio::test]
    async fn test_rotation_chain() {
        let (store, repo) = store_with(Duration::days(7));
        let user_id = Uuid::new_v4();

        let first = store.issue(user_id).await.unwrap();
        let (second, _) = store.validate_and_rotate(&first).await.unwrap();

        let replay = store.validate_and_rotate(&first).await;
        assert!(matches!(replay, Err(AppError::Auth(AuthError::TokenNotFound))));

        let (third, owner) = store.validate_and_rotate(&second).await.unwrap();
        assert_eq!(owner, user_id);
        assert_ne!(id_of(&third), id_of(&second));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected_and_deleted() {
        let (store, repo) = store_with(Duration::seconds(-1));

        let raw = store.issue(Uuid::new_v4()).await.unwrap();
        let result = store.validate_and_rotate(&raw).await;

        assert!(matches!(result, Err(AppError::Auth(AuthError::TokenExpired))));
        assert!(repo.find_by_id(&id_of(&raw)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_secret_keeps_the_record() {
        let (store, repo) = store_with(Duration::days(7));

        let raw = store.issue(Uuid::new_v4()).await.unwrap();
        let forged = format!("{}.{}", id_of(&raw), generate_refresh_secret());
        let result = store.validate_and_rotate(&forged).await;

        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidSignature))));
        assert!(repo.find_by_id(&id_of(&raw)).await.unwrap().is_some());

        // The genuine token still works afterwards
        assert!(store.validate_and_rotate(&raw).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_token_does_not_touch_storage() {
        let store = RefreshTokenStore::new(
            Arc::new(FailingRepository),
            Duration::days(7),
            StdDuration::from_secs(5),
        );

        let result = store.validate_and_rotate("not-a-valid-token").await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::MalformedToken))));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (store, _) = store_with(Duration::days(7));

        let result = store
            .validate_and_rotate(&format!("{}.{}", RefreshToken::new_id(), generate_refresh_secret()))
            .await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::TokenNotFound))));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (store, repo) = store_with(Duration::days(7));

        let raw = store.issue(Uuid::new_v4()).await.unwrap();
        store.revoke(&raw).await.expect("First revoke failed");
        store.revoke(&raw).await.expect("Second revoke failed");
        store.revoke("garbage").await.expect("Malformed revoke failed");

        assert!(repo.is_empty());
        assert!(matches!(
            store.validate_and_rotate(&raw).await,
            Err(AppError::Auth(AuthError::TokenNotFound))
        ));
    }

    #[tokio::test]
    async fn test_revoke_all_for_user() {
        let (store, repo) = store_with(Duration::days(7));
        let user_id = Uuid::new_v4();
        let other_user = Uuid::new_v4();

        let first = store.issue(user_id).await.unwrap();
        let second = store.issue(user_id).await.unwrap();
        let unrelated = store.issue(other_user).await.unwrap();

        assert_eq!(store.revoke_all_for_user(user_id).await.unwrap(), 2);

        for raw in [first, second] {
            assert!(matches!(
                store.validate_and_rotate(&raw).await,
                Err(AppError::Auth(AuthError::TokenNotFound))
            ));
        }
        assert!(store.validate_and_rotate(&unrelated).await.is_ok());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_rotation_has_a_single_winner() {
        let (store, repo) = store_with(Duration::days(7));
        let raw = store.issue(Uuid::new_v4()).await.unwrap();

        let (a, b) = tokio::join!(store.validate_and_rotate(&raw), store.validate_and_rotate(&raw));

        let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(winners, 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (expired_store, repo) = store_with(Duration::seconds(-1));
        let live_store =
            RefreshTokenStore::new(repo.clone(), Duration::days(7), StdDuration::from_secs(5));

        expired_store.issue(Uuid::new_v4()).await.unwrap();
        live_store.issue(Uuid::new_v4()).await.unwrap();

        assert_eq!(live_store.purge_expired().await.unwrap(), 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_deadline_surfaces_as_timeout() {
        let store = RefreshTokenStore::new(
            Arc::new(StalledRepository),
            Duration::days(7),
            StdDuration::from_millis(20),
        );

        let result = store.issue(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::Storage(StorageError::Timeout))));
    }

    /// Fails every call, to prove a code path never reaches storage.
    struct FailingRepository;

    #[async_trait]
    impl RefreshTokenRepository for FailingRepository {
        async fn create(&self, _: &RefreshToken) -> Result<(), StorageError> {
            panic!("storage must not be touched")
        }
        async fn find_by_id(&self, _: &str) -> Result<Option<RefreshToken>, StorageError> {
            panic!("storage must not be touched")
        }
        async fn take(&self, _: &str) -> Result<Option<RefreshToken>, StorageError> {
            panic!("storage must not be touched")
        }
        async fn delete(&self, _: &str) -> Result<bool, StorageError> {
            panic!("storage must not be touched")
        }
        async fn delete_all_for_user(&self, _: Uuid) -> Result<u64, StorageError> {
            panic!("storage must not be touched")
        }
        async fn delete_expired(&self, _: DateTime<Utc>) -> Result<u64, StorageError> {
            panic!("storage must not be touched")
        }
    }

    /// Never answers within any reasonable deadline.
    struct StalledRepository;

    impl StalledRepository {
        async fn stall<T>() -> Result<T, StorageError> {
            tokio::time::sleep(StdDuration::from_secs(60)).await;
            Err(StorageError::UnexpectedError("unreachable".to_string()))
        }
    }

    #[async_trait]
    impl RefreshTokenRepository for StalledRepository {
        async fn create(&self, _: &RefreshToken) -> Result<(), StorageError> {
            Self::stall().await
        }
        async fn find_by_id(&self, _: &str) -> Result<Option<RefreshToken>, StorageError> {
            Self::stall().await
        }
        async fn take(&self, _: &str) -> Result<Option<RefreshToken>, StorageError> {
            Self::stall().await
        }
        async fn delete(&self, _: &str) -> Result<bool, StorageError> {
            Self::stall().await
        }
        async fn delete_all_for_user(&self, _: Uuid) -> Result<u64, StorageError> {
            Self::stall().await
        }
        async fn delete_expired(&self, _: DateTime<Utc>) -> Result<u64, StorageError> {
            Self::stall().await
        }
    }
}
