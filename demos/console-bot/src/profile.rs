//! In-memory profile records, standing in for the community record store.

use std::{collections::HashMap, fmt};

use steptree_core::{StepError, TopicId, UserId};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("No community selected for user {0}")]
    MissingTopic(UserId),
}

impl From<ProfileError> for StepError {
    fn from(err: ProfileError) -> Self {
        Self::RecordStore(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    DisplayName,
    Twitter,
    Wallet,
    Discourse,
}

/// A participant's profile within one community.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub display_name: Option<String>,
    pub twitter: Option<String>,
    pub wallet: Option<String>,
    pub discourse: Option<String>,
}

impl Profile {
    fn set(&mut self, field: ProfileField, value: String) {
        let slot = match field {
            ProfileField::DisplayName => &mut self.display_name,
            ProfileField::Twitter => &mut self.twitter,
            ProfileField::Wallet => &mut self.wallet,
            ProfileField::Discourse => &mut self.discourse,
        };
        *slot = Some(value);
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("name", &self.display_name),
            ("twitter", &self.twitter),
            ("wallet", &self.wallet),
            ("discourse", &self.discourse),
        ];
        for (i, (label, value)) in fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{label}={}", value.as_deref().unwrap_or("-"))?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct ProfileStore {
    profiles: RwLock<HashMap<(UserId, TopicId), Profile>>,
}

impl ProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one field of the participant's profile in `topic_id`.
    ///
    /// # Errors
    /// Returns error if no topic is given.
    pub async fn update(
        &self,
        user_id: UserId,
        topic_id: Option<TopicId>,
        field: ProfileField,
        value: String,
    ) -> Result<(), ProfileError> {
        let topic_id = topic_id.ok_or(ProfileError::MissingTopic(user_id))?;
        tracing::debug!(user_id, topic_id, ?field, %value, "Updating profile");
        self.profiles
            .write()
            .await
            .entry((user_id, topic_id))
            .or_default()
            .set(field, value);
        Ok(())
    }

    pub async fn get(&self, user_id: UserId, topic_id: TopicId) -> Option<Profile> {
        self.profiles
            .read()
            .await
            .get(&(user_id, topic_id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_requires_topic() {
        let store = ProfileStore::new();
        let err = store
            .update(5, None, ProfileField::Twitter, "alice".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::MissingTopic(5)));
    }

    #[tokio::test]
    async fn test_profiles_are_per_topic() {
        let store = ProfileStore::new();
        store
            .update(5, Some(1), ProfileField::Wallet, "0xabc".into())
            .await
            .unwrap();

        assert_eq!(
            store.get(5, 1).await.unwrap().wallet.as_deref(),
            Some("0xabc")
        );
        assert_eq!(store.get(5, 2).await, None);
    }

    #[test]
    fn test_display_marks_missing_fields() {
        let profile = Profile {
            twitter: Some("alice".into()),
            ..Profile::default()
        };
        assert_eq!(
            profile.to_string(),
            "name=-, twitter=alice, wallet=-, discourse=-"
        );
    }
}
