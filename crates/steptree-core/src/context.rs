//! Context handed to every step capability.

use std::collections::HashMap;

use serde_json::Value;

use crate::traits::{ChannelId, Message, Messaging, MessagingError, TopicId, UserId};

/// Opaque key/value bag carried across turns.
pub type Metadata = HashMap<String, Value>;

/// Per-call context for step capabilities.
///
/// Steps receive their collaborators through this context instead of
/// reaching for process-wide singletons. Record-store handles are captured
/// by the step itself at tree-construction time.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Participant the conversation is with.
    pub user_id: UserId,

    /// Topic the conversation applies to, if any.
    pub topic_id: Option<TopicId>,

    /// Metadata carried from the previous turn.
    pub metadata: Option<&'a Metadata>,

    /// Messaging platform client.
    pub messaging: &'a dyn Messaging,
}

impl<'a> StepContext<'a> {
    /// Create a context without carried metadata.
    #[must_use]
    pub fn new(user_id: UserId, topic_id: Option<TopicId>, messaging: &'a dyn Messaging) -> Self {
        Self {
            user_id,
            topic_id,
            metadata: None,
            messaging,
        }
    }

    /// Attach carried metadata.
    #[must_use]
    pub const fn with_metadata(mut self, metadata: Option<&'a Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Get a carried metadata value by key.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&'a Value> {
        self.metadata.and_then(|m| m.get(key))
    }

    /// Send `content` to `channel_id`.
    ///
    /// # Errors
    /// Returns error if the platform rejects the message.
    pub async fn say(&self, channel_id: ChannelId, content: &str) -> Result<Message, MessagingError> {
        self.messaging.send_message(channel_id, content).await
    }

    /// Send `content` to `channel_id` and seed it with reaction choices.
    ///
    /// # Errors
    /// Returns error if sending or reacting fails.
    pub async fn ask_with_reactions(
        &self,
        channel_id: ChannelId,
        content: &str,
        emojis: &[&str],
    ) -> Result<Message, MessagingError> {
        let sent = self.messaging.send_message(channel_id, content).await?;
        for emoji in emojis {
            self.messaging.add_reaction(&sent, emoji).await?;
        }
        Ok(sent)
    }
}
