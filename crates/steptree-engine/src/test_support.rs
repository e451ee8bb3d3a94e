//! Test doubles for engine tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use steptree_core::{
    Channel, ChannelId, HookOutcome, Message, MessageId, Messaging, MessagingError, Metadata,
    Reaction, ReactionOutcome, StepContext, StepDefinition, StepError, StepReply, UserId,
};

pub const BOT: UserId = 1;
pub const USER: UserId = 500;
pub const CHANNEL: ChannelId = 77;

/// Message from the test participant.
pub fn user_message(id: MessageId, content: &str) -> Message {
    Message {
        id,
        channel_id: CHANNEL,
        author_id: USER,
        content: content.to_string(),
    }
}

/// Shared, ordered record of step invocations.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Messaging double that records everything it is asked to do.
#[derive(Default)]
pub struct RecordingMessaging {
    next_id: AtomicU64,
    messages: Mutex<Vec<Message>>,
    reactions: Mutex<Vec<(MessageId, String)>>,
}

impl RecordingMessaging {
    /// Make a message fetchable without sending it.
    pub fn insert(&self, message: Message) {
        self.messages.lock().unwrap().push(message);
    }

    /// Contents of every message the bot sent, in order.
    pub fn sent(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.author_id == BOT)
            .map(|m| m.content.clone())
            .collect()
    }

    pub fn last_sent(&self) -> Option<Message> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.author_id == BOT)
            .cloned()
    }

    pub fn reactions(&self) -> Vec<(MessageId, String)> {
        self.reactions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messaging for RecordingMessaging {
    async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
    ) -> Result<Message, MessagingError> {
        let message = Message {
            id: 1000 + self.next_id.fetch_add(1, Ordering::SeqCst),
            channel_id,
            author_id: BOT,
            content: content.to_string(),
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn fetch_channel(&self, channel_id: ChannelId) -> Result<Channel, MessagingError> {
        Ok(Channel {
            id: channel_id,
            name: None,
        })
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Message, MessagingError> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == message_id && m.channel_id == channel_id)
            .cloned()
            .ok_or(MessagingError::MessageNotFound(message_id))
    }

    async fn add_reaction(&self, message: &Message, emoji: &str) -> Result<(), MessagingError> {
        self.reactions
            .lock()
            .unwrap()
            .push((message.id, emoji.to_string()));
        Ok(())
    }
}

/// Step whose behavior is fixed at construction and which logs every call.
pub struct ScriptedStep {
    name: &'static str,
    log: Log,
    prompt: Option<&'static str>,
    choices: Vec<&'static str>,
    reaction_only: bool,
    auto_advance: bool,
    reactions: Vec<(&'static str, ReactionOutcome)>,
    hook: HookOutcome,
    metadata: Option<Metadata>,
}

impl ScriptedStep {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
            prompt: None,
            choices: Vec::new(),
            reaction_only: false,
            auto_advance: false,
            reactions: Vec::new(),
            hook: HookOutcome::Proceed,
            metadata: None,
        }
    }

    pub const fn prompt(mut self, prompt: &'static str) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub const fn needs_reaction(mut self) -> Self {
        self.reaction_only = true;
        self
    }

    pub const fn auto(mut self) -> Self {
        self.auto_advance = true;
        self
    }

    /// Seed the prompt with reaction choices.
    pub fn choices(mut self, emojis: &[&'static str]) -> Self {
        self.choices = emojis.to_vec();
        self
    }

    pub fn on(mut self, emoji: &'static str, outcome: ReactionOutcome) -> Self {
        self.reactions.push((emoji, outcome));
        self
    }

    pub fn hook(mut self, hook: HookOutcome) -> Self {
        self.hook = hook;
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn arc(self) -> Arc<dyn StepDefinition> {
        Arc::new(self)
    }
}

#[async_trait]
impl StepDefinition for ScriptedStep {
    fn name(&self) -> &str {
        self.name
    }

    fn reaction_only(&self) -> bool {
        self.reaction_only
    }

    fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        self.log.push(format!("send:{}", self.name));
        let mut reply = match self.prompt {
            Some(prompt) => StepReply::sent(
                ctx.ask_with_reactions(message.channel_id, prompt, &self.choices)
                    .await?,
            ),
            None => StepReply::silent(),
        };
        reply.metadata.clone_from(&self.metadata);
        Ok(reply)
    }

    async fn save(&self, _ctx: &StepContext<'_>, message: &Message) -> Result<(), StepError> {
        self.log
            .push(format!("save:{}:{}", self.name, message.content));
        Ok(())
    }

    async fn on_reaction(
        &self,
        _ctx: &StepContext<'_>,
        reaction: &Reaction,
    ) -> Result<ReactionOutcome, StepError> {
        self.reactions
            .iter()
            .find(|(emoji, _)| *emoji == reaction.emoji)
            .map(|(_, outcome)| outcome.clone())
            .ok_or_else(|| StepError::InvalidReaction(reaction.emoji.clone()))
    }

    async fn control_hook(
        &self,
        _ctx: &StepContext<'_>,
        _message: &Message,
    ) -> Result<HookOutcome, StepError> {
        Ok(self.hook.clone())
    }
}
