use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Unit a user logs weights in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum WeightUnit {
    #[default]
    Kilograms,
    Pounds,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Kilograms => "KILOGRAMS",
            WeightUnit::Pounds => "POUNDS",
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KILOGRAMS" => Ok(WeightUnit::Kilograms),
            "POUNDS" => Ok(WeightUnit::Pounds),
            other => Err(format!("unknown weight unit: {}", other)),
        }
    }
}

/// Stored user record. Holds the password hash, so it never leaves the
/// service; see [`UserResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub preferred_unit: WeightUnit,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            preferred_unit: WeightUnit::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub preferred_unit: WeightUnit,
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            preferred_unit: user.preferred_unit,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Requested profile changes. The current password is always required;
/// an empty `new_password` or `preferred_unit` means "leave unchanged".
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserUpdate {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    #[serde(default, deserialize_with = "blank_unit_as_none")]
    pub preferred_unit: Option<WeightUnit>,
}

fn blank_unit_as_none<'de, D>(deserializer: D) -> Result<Option<WeightUnit>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(unit) if !unit.is_empty() => unit.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
