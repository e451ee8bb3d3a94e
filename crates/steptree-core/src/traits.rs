//! Collaborator contracts: the persistence cache and the messaging platform.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Participant identifier on the messaging platform.
pub type UserId = u64;

/// Channel identifier.
pub type ChannelId = u64;

/// Message identifier.
pub type MessageId = u64;

/// Topic (guild/community) a conversation applies to.
pub type TopicId = u64;

/// A chat message, either received from a participant or sent by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Platform message id.
    pub id: MessageId,
    /// Channel the message lives in.
    pub channel_id: ChannelId,
    /// Author of the message.
    pub author_id: UserId,
    /// Text content.
    pub content: String,
}

/// A channel as returned by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: Option<String>,
}

/// A reaction event: `user_id` reacted with `emoji` on `message_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
}

impl Reaction {
    /// Create a reaction event.
    #[must_use]
    pub fn new(
        emoji: impl Into<String>,
        message_id: MessageId,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Self {
        Self {
            emoji: emoji.into(),
            message_id,
            channel_id,
            user_id,
        }
    }
}

/// Cache error.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),
    #[error("Cache error: {0}")]
    Internal(String),
}

/// Key/value cache holding serialized conversation state.
///
/// Implementations must make `get`, `set` and `delete` atomic per key.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[async_trait]
impl<T: Cache + ?Sized> Cache for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        (**self).delete(key).await
    }
}

/// Messaging platform error.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),
    #[error("Messaging platform error: {0}")]
    Platform(String),
}

/// Chat platform client.
#[async_trait]
pub trait Messaging: Send + Sync {
    /// Send `content` to a channel, returning the sent message.
    async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
    ) -> Result<Message, MessagingError>;

    /// Fetch a channel.
    async fn fetch_channel(&self, channel_id: ChannelId) -> Result<Channel, MessagingError>;

    /// Fetch a message from a channel.
    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Message, MessagingError>;

    /// Add a reaction to a message.
    async fn add_reaction(&self, message: &Message, emoji: &str) -> Result<(), MessagingError>;
}

#[async_trait]
impl<T: Messaging + ?Sized> Messaging for Arc<T> {
    async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
    ) -> Result<Message, MessagingError> {
        (**self).send_message(channel_id, content).await
    }

    async fn fetch_channel(&self, channel_id: ChannelId) -> Result<Channel, MessagingError> {
        (**self).fetch_channel(channel_id).await
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Message, MessagingError> {
        (**self).fetch_message(channel_id, message_id).await
    }

    async fn add_reaction(&self, message: &Message, emoji: &str) -> Result<(), MessagingError> {
        (**self).add_reaction(message, emoji).await
    }
}
