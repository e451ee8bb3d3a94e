//! Messaging adapter that renders the conversation on stdout.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use steptree_core::{Channel, ChannelId, Message, MessageId, Messaging, MessagingError, UserId};
use tokio::sync::Mutex;

/// Author id used for messages sent by the bot.
pub const BOT_ID: UserId = 1;

/// Console "chat platform": prints outbound messages and remembers them so
/// reactions can be resolved.
pub struct ConsoleMessaging {
    next_id: AtomicU64,
    messages: Mutex<HashMap<MessageId, Message>>,
    last_sent: Mutex<Option<Message>>,
    quiet: bool,
}

impl ConsoleMessaging {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            messages: Mutex::new(HashMap::new()),
            last_sent: Mutex::new(None),
            quiet: false,
        }
    }

    /// Messaging that records without printing.
    #[cfg(test)]
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::new()
        }
    }

    /// Allocate an id for an inbound message and remember it.
    pub async fn receive(&self, channel_id: ChannelId, author_id: UserId, content: &str) -> Message {
        let message = Message {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            channel_id,
            author_id,
            content: content.to_string(),
        };
        self.messages
            .lock()
            .await
            .insert(message.id, message.clone());
        message
    }

    /// Most recent message sent by the bot.
    pub async fn last_sent(&self) -> Option<Message> {
        self.last_sent.lock().await.clone()
    }
}

impl Default for ConsoleMessaging {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messaging for ConsoleMessaging {
    async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
    ) -> Result<Message, MessagingError> {
        let message = Message {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            channel_id,
            author_id: BOT_ID,
            content: content.to_string(),
        };
        if !self.quiet {
            println!("[bot #{}] {content}", message.id);
        }
        self.messages
            .lock()
            .await
            .insert(message.id, message.clone());
        *self.last_sent.lock().await = Some(message.clone());
        Ok(message)
    }

    async fn fetch_channel(&self, channel_id: ChannelId) -> Result<Channel, MessagingError> {
        Ok(Channel {
            id: channel_id,
            name: Some("console".to_string()),
        })
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Message, MessagingError> {
        self.messages
            .lock()
            .await
            .get(&message_id)
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .ok_or(MessagingError::MessageNotFound(message_id))
    }

    async fn add_reaction(&self, message: &Message, emoji: &str) -> Result<(), MessagingError> {
        if !self.quiet {
            println!("          (#{} react with {emoji})", message.id);
        }
        Ok(())
    }
}
