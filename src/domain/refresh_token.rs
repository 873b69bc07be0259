use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AuthError;

/// A stored refresh token grant.
///
/// Only the bcrypt hash of the secret half is kept; the secret itself is
/// handed to the client once and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Client-facing `<id>.<secret>` form of a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeToken {
    pub id: String,
    pub secret: String,
}

impl CompositeToken {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let mut parts = raw.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(secret), None) if !id.is_empty() && !secret.is_empty() => {
                Ok(Self::new(id, secret))
            }
            _ => Err(AuthError::MalformedToken),
        }
    }
}

impl fmt::Display for CompositeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_composite_token() {
        let token = CompositeToken::parse("abc123.XYZsecret").expect("Failed to parse");
        assert_eq!(token.id, "abc123");
        assert_eq!(token.secret, "XYZsecret");
        assert_eq!(token.to_string(), "abc123.XYZsecret");
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        let cases = vec![
            "not-a-valid-token",
            "a.b.c",
            ".secret",
            "id.",
            ".",
            "",
        ];

        for raw in cases {
            assert_eq!(
                CompositeToken::parse(raw),
                Err(AuthError::MalformedToken),
                "Should reject {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_generated_ids_never_contain_separator() {
        let id = RefreshToken::new_id();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('.'));
        assert_ne!(id, RefreshToken::new_id());
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let token = RefreshToken {
            id: RefreshToken::new_id(),
            user_id: Uuid::new_v4(),
            token_hash: "hash".to_string(),
            expires_at: now,
            created_at: now - Duration::days(7),
        };

        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::seconds(1)));
    }
}
