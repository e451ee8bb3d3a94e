//! Persisted resumption record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    address::Address,
    context::Metadata,
    traits::{MessageId, TopicId},
};

/// State serialization error.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid conversation state: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where a participant's conversation stands between turns.
///
/// Serialized as a flat JSON object with the keys `thread`, `step`,
/// `guild_id`, `message_id` and `metadata`. This is the only format the
/// engine owns and it must stay stable across releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Conversation type id.
    #[serde(rename = "thread")]
    pub conversation: String,

    /// Address of the node that handles the next event.
    #[serde(rename = "step")]
    pub address: Address,

    /// Topic the conversation applies to.
    #[serde(rename = "guild_id", default)]
    pub topic_id: Option<TopicId>,

    /// Last message sent to the participant.
    #[serde(default)]
    pub message_id: Option<MessageId>,

    /// Metadata carried across turns.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl ConversationState {
    /// Create a state pointing at `address`.
    #[must_use]
    pub fn new(conversation: impl Into<String>, address: Address, topic_id: Option<TopicId>) -> Self {
        Self {
            conversation: conversation.into(),
            address,
            topic_id,
            message_id: None,
            metadata: None,
        }
    }

    /// Set the last outbound message id.
    #[must_use]
    pub const fn with_message_id(mut self, message_id: Option<MessageId>) -> Self {
        self.message_id = message_id;
        self
    }

    /// Set the carried metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Serialize to the cache format.
    ///
    /// # Errors
    /// Returns error if metadata cannot be serialized.
    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the cache format.
    ///
    /// # Errors
    /// Returns error if `raw` is not a valid state record.
    pub fn from_json(raw: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_uses_stable_keys() {
        let state = ConversationState::new("onboarding", Address::root(), Some(7))
            .with_message_id(Some(42));
        let value: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
        assert_eq!(value["thread"], "onboarding");
        assert_eq!(value["step"], Address::root().as_str());
        assert_eq!(value["guild_id"], 7);
        assert_eq!(value["message_id"], 42);
        assert!(value["metadata"].is_null());
    }

    #[test]
    fn test_parses_record_without_optional_fields() {
        let raw = json!({
            "thread": "report",
            "step": Address::root().child("report").as_str(),
        })
        .to_string();
        let state = ConversationState::from_json(&raw).unwrap();
        assert_eq!(state.conversation, "report");
        assert_eq!(state.topic_id, None);
        assert_eq!(state.message_id, None);
        assert_eq!(state.metadata, None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(ConversationState::from_json("not json").is_err());
    }

    #[test]
    fn test_carries_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("thread_name".into(), json!("report"));
        let state = ConversationState::new("guild_select", Address::root(), None)
            .with_metadata(Some(metadata.clone()));
        let parsed = ConversationState::from_json(&state.to_json().unwrap()).unwrap();
        assert_eq!(parsed.metadata, Some(metadata));
    }
}
