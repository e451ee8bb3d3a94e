//! Step behavior: the capability set every conversational step exposes.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    address::Address,
    context::{Metadata, StepContext},
    traits::{Message, MessagingError, Reaction, TopicId},
};

/// Result of a step's `send`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReply {
    /// Message sent to the participant, if any.
    pub message: Option<Message>,
    /// Metadata to carry into the next turn. `None` keeps the previous bag.
    pub metadata: Option<Metadata>,
}

impl StepReply {
    /// Reply that sent `message`.
    #[must_use]
    pub const fn sent(message: Message) -> Self {
        Self {
            message: Some(message),
            metadata: None,
        }
    }

    /// Reply that sent nothing.
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            message: None,
            metadata: None,
        }
    }

    /// Attach metadata to carry forward.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// What a reaction on the active step means for the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Continue to the first child.
    Advance,
    /// Continue to the named child.
    Branch(String),
    /// Stay on the active step and fire its `send` again without saving the
    /// previous step's answer.
    Skip,
}

/// Target of a conversation switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Conversation type to continue in.
    pub conversation: String,
    /// Node to continue at; the root when absent.
    pub address: Option<Address>,
    /// Topic to continue under; the current topic when absent.
    pub topic_id: Option<TopicId>,
}

impl Redirect {
    /// Redirect to the root of `conversation`.
    #[must_use]
    pub fn to(conversation: impl Into<String>) -> Self {
        Self {
            conversation: conversation.into(),
            address: None,
            topic_id: None,
        }
    }

    /// Continue at a specific node.
    #[must_use]
    pub fn at(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Continue under a different topic.
    #[must_use]
    pub const fn with_topic(mut self, topic_id: TopicId) -> Self {
        self.topic_id = Some(topic_id);
        self
    }
}

/// Decision returned by a step's control hook after it has sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Keep the default next step.
    Proceed,
    /// Jump to the named child and run it within the same turn.
    GoTo(String),
    /// Continue in another conversation type within the same turn.
    Switch(Redirect),
    /// End the conversation.
    End,
}

/// Step error.
#[derive(Debug, Error)]
pub enum StepError {
    /// The reaction is not one this step understands.
    #[error("Invalid reaction: {0}")]
    InvalidReaction(String),
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
    /// A record-store call made by the step failed.
    #[error("Record store error: {0}")]
    RecordStore(String),
}

/// One unit of conversational behavior.
///
/// Every capability is optional. A step that does not override
/// [`on_reaction`](Self::on_reaction) rejects every reaction.
#[async_trait]
pub trait StepDefinition: Send + Sync {
    /// Name of the step, unique among its siblings.
    fn name(&self) -> &str;

    /// Whether this step can only be advanced by a reaction.
    fn reaction_only(&self) -> bool {
        false
    }

    /// Whether to cascade into the next step without waiting for an event.
    fn auto_advance(&self) -> bool {
        false
    }

    /// Send this step's prompt in response to `message`.
    async fn send(
        &self,
        _ctx: &StepContext<'_>,
        _message: &Message,
    ) -> Result<StepReply, StepError> {
        Ok(StepReply::silent())
    }

    /// Commit the participant's answer to this step.
    ///
    /// Runs on the turn after this step sent, once the following step is
    /// about to send.
    async fn save(&self, _ctx: &StepContext<'_>, _message: &Message) -> Result<(), StepError> {
        Ok(())
    }

    /// Interpret a reaction on this step's message.
    async fn on_reaction(
        &self,
        _ctx: &StepContext<'_>,
        reaction: &Reaction,
    ) -> Result<ReactionOutcome, StepError> {
        Err(StepError::InvalidReaction(format!(
            "step '{}' does not accept reactions (got {})",
            self.name(),
            reaction.emoji
        )))
    }

    /// Decide where to go after `send` has run.
    async fn control_hook(
        &self,
        _ctx: &StepContext<'_>,
        _message: &Message,
    ) -> Result<HookOutcome, StepError> {
        Ok(HookOutcome::Proceed)
    }
}
