use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog entry. System exercises have no owner and are visible to
/// everyone; user exercises are visible to their owner only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueExercise {
    pub id: Uuid,
    pub name: String,
    pub user_id: Option<Uuid>,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl UniqueExercise {
    pub fn is_system(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.user_id.map_or(true, |owner| owner == user_id)
    }
}

/// Body of a user-defined exercise
#[derive(Debug, Clone, Deserialize)]
pub struct NewExercise {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility() {
        let owner = Uuid::new_v4();
        let mut exercise = UniqueExercise {
            id: Uuid::new_v4(),
            name: "Bench Press".to_string(),
            user_id: None,
            description: None,
            category: None,
        };
        assert!(exercise.is_system());
        assert!(exercise.is_visible_to(owner));

        exercise.user_id = Some(owner);
        assert!(exercise.is_visible_to(owner));
        assert!(!exercise.is_visible_to(Uuid::new_v4()));
    }
}
