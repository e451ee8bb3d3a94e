//! Conversation engine: advances a participant's conversation one turn at a
//! time, persisting where it stopped so the next event can resume it.

use std::sync::Arc;

use steptree_core::{
    Address, Cache, CacheError, ConversationState, HookOutcome, Message, Messaging,
    MessagingError, Metadata, NodeId, Reaction, ReactionOutcome, Redirect, StateError,
    StepContext, StepError, StepTree, TopicId, TreeError, UserId,
};

use crate::{config::EngineConfig, registry::ConversationRegistry};

/// Engine error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
    #[error("Step error: {0}")]
    Step(#[from] StepError),
    #[error("State error: {0}")]
    State(#[from] StateError),
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("Unknown conversation type: {0}")]
    UnknownConversation(String),
    #[error("Turn did not settle within {0} hops")]
    HopLimit(usize),
}

impl EngineError {
    /// Whether the error means the tree and the step logic disagree.
    ///
    /// Persisted state is discarded when a turn fails this way.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Tree(_) | Self::UnknownConversation(_) | Self::HopLimit(_)
        )
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// State persisted; the conversation waits at `address`.
    Waiting {
        conversation: String,
        address: Address,
    },
    /// The conversation reached its end and its state was deleted.
    Finished,
    /// A text message arrived while the active step expects a reaction.
    AwaitingReaction,
    /// The reaction targeted a superseded message.
    StaleReaction,
    /// The active step rejected the reaction.
    InvalidReaction,
    /// No conversation is in progress for the participant.
    Idle,
}

/// Position of a turn in the registered trees.
struct Cursor {
    conversation: String,
    tree: Arc<StepTree>,
    node: NodeId,
    topic_id: Option<TopicId>,
}

struct Turn {
    user_id: UserId,
    cursor: Cursor,
    /// Metadata of the state the turn resumed from.
    carried: Option<Metadata>,
    /// Suppresses the predecessor's `save` for the whole turn.
    skip: bool,
}

/// Drives conversations against a cache and a messaging platform.
///
/// The engine holds no per-participant locks. Callers must serialize events
/// for the same participant.
pub struct ConversationEngine<C, M>
where
    C: Cache,
    M: Messaging,
{
    cache: C,
    messaging: M,
    registry: ConversationRegistry,
    config: EngineConfig,
}

impl<C, M> ConversationEngine<C, M>
where
    C: Cache,
    M: Messaging,
{
    /// Create an engine with default configuration.
    #[must_use]
    pub fn new(cache: C, messaging: M, registry: ConversationRegistry) -> Self {
        Self {
            cache,
            messaging,
            registry,
            config: EngineConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &C {
        &self.cache
    }

    #[must_use]
    pub const fn messaging(&self) -> &M {
        &self.messaging
    }

    #[must_use]
    pub const fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current state of a participant's conversation.
    ///
    /// A record that no longer parses is deleted and reported as absent.
    ///
    /// # Errors
    /// Returns error if the cache fails.
    pub async fn state(&self, user_id: UserId) -> Result<Option<ConversationState>, EngineError> {
        let key = self.config.state_key(user_id);
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };
        match ConversationState::from_json(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                tracing::warn!(user_id, error = %err, "Discarding unreadable conversation state");
                self.cache.delete(&key).await?;
                Ok(None)
            }
        }
    }

    /// End a participant's conversation.
    ///
    /// # Errors
    /// Returns error if the cache fails.
    pub async fn end(&self, user_id: UserId) -> Result<(), EngineError> {
        tracing::info!(user_id, "Ending conversation");
        self.clear(user_id).await
    }

    /// Start `conversation` at its root for the author of `message`.
    ///
    /// Metadata of any conversation already stored for the participant is
    /// carried as the fallback bag.
    ///
    /// # Errors
    /// Returns error if the conversation type is unknown, a collaborator
    /// fails, or the tree and its steps disagree.
    pub async fn start(
        &self,
        conversation: &str,
        topic_id: Option<TopicId>,
        message: &Message,
    ) -> Result<TurnOutcome, EngineError> {
        let user_id = message.author_id;
        let tree = self.tree(conversation)?;
        let carried = self.state(user_id).await?.and_then(|s| s.metadata);
        tracing::info!(user_id, conversation, "Starting conversation");

        let turn = Turn {
            user_id,
            cursor: Cursor {
                conversation: conversation.to_string(),
                node: tree.root(),
                tree,
                topic_id,
            },
            carried,
            skip: false,
        };
        let result = self.run_turn(turn, message.clone()).await;
        self.guard(user_id, result).await
    }

    /// Advance the author's conversation with a text message.
    ///
    /// # Errors
    /// Returns error if a collaborator fails or the persisted state no
    /// longer matches its tree. In the latter case the state is deleted.
    pub async fn handle_message(&self, message: &Message) -> Result<TurnOutcome, EngineError> {
        let user_id = message.author_id;
        let Some(state) = self.state(user_id).await? else {
            return Ok(TurnOutcome::Idle);
        };

        let result = match self.resume(&state) {
            Ok(cursor) => {
                let turn = Turn {
                    user_id,
                    cursor,
                    carried: state.metadata,
                    skip: false,
                };
                self.run_turn(turn, message.clone()).await
            }
            Err(err) => Err(err),
        };
        self.guard(user_id, result).await
    }

    /// Advance the reacting participant's conversation with a reaction.
    ///
    /// Stale and unrecognized reactions are answered with a notice and leave
    /// the state untouched.
    ///
    /// # Errors
    /// Returns error if a collaborator fails or the persisted state no
    /// longer matches its tree. In the latter case the state is deleted.
    pub async fn handle_reaction(&self, reaction: &Reaction) -> Result<TurnOutcome, EngineError> {
        let user_id = reaction.user_id;
        let Some(state) = self.state(user_id).await? else {
            return Ok(TurnOutcome::Idle);
        };
        let result = self.react(state, reaction).await;
        self.guard(user_id, result).await
    }

    async fn react(
        &self,
        state: ConversationState,
        reaction: &Reaction,
    ) -> Result<TurnOutcome, EngineError> {
        let user_id = reaction.user_id;
        let cursor = self.resume(&state)?;

        let channel = self.messaging.fetch_channel(reaction.channel_id).await?;
        let message = self
            .messaging
            .fetch_message(channel.id, reaction.message_id)
            .await?;

        if state.message_id != Some(reaction.message_id) {
            tracing::info!(
                user_id,
                message_id = reaction.message_id,
                expected = ?state.message_id,
                "Reaction on a superseded message"
            );
            self.messaging
                .send_message(channel.id, &self.config.prompts.stale_reaction)
                .await?;
            return Ok(TurnOutcome::StaleReaction);
        }

        let tree = Arc::clone(&cursor.tree);
        let active = cursor.node;
        let ctx = StepContext::new(user_id, cursor.topic_id, &self.messaging)
            .with_metadata(state.metadata.as_ref());

        tracing::info!(user_id, step = tree.name(active), emoji = %reaction.emoji, "Reaction");
        let outcome = match tree.step(active).on_reaction(&ctx, reaction).await {
            Ok(outcome) => outcome,
            Err(StepError::InvalidReaction(reason)) => {
                tracing::warn!(user_id, step = tree.name(active), %reason, "Rejected reaction");
                self.messaging
                    .send_message(channel.id, &self.config.prompts.invalid_reaction)
                    .await?;
                return Ok(TurnOutcome::InvalidReaction);
            }
            Err(err) => return Err(err.into()),
        };

        let (node, skip) = match outcome {
            ReactionOutcome::Skip => (active, true),
            ReactionOutcome::Branch(name) => (tree.child(active, &name)?, false),
            ReactionOutcome::Advance => match tree.first_child(active) {
                Some(next) => (next, false),
                None => {
                    if let Some(previous) = tree.parent(active) {
                        tree.step(previous).save(&ctx, &message).await?;
                    }
                    self.clear(user_id).await?;
                    tracing::info!(user_id, conversation = %cursor.conversation, "Conversation finished");
                    return Ok(TurnOutcome::Finished);
                }
            },
        };

        let turn = Turn {
            user_id,
            cursor: Cursor { node, ..cursor },
            carried: state.metadata.clone(),
            skip,
        };
        self.run_turn(turn, message).await
    }

    /// Run the active step and follow redirects and auto-advances until the
    /// conversation either waits for the next event or ends.
    async fn run_turn(&self, mut turn: Turn, mut inbound: Message) -> Result<TurnOutcome, EngineError> {
        let user_id = turn.user_id;

        for _ in 0..self.config.max_hops {
            let tree = Arc::clone(&turn.cursor.tree);
            let node = turn.cursor.node;
            let step = Arc::clone(tree.step(node));
            let ctx = StepContext::new(user_id, turn.cursor.topic_id, &self.messaging)
                .with_metadata(turn.carried.as_ref());

            tracing::info!(
                user_id,
                conversation = %turn.cursor.conversation,
                step = step.name(),
                address = %tree.address(node),
                "Send"
            );

            if step.reaction_only() {
                self.messaging
                    .send_message(inbound.channel_id, &self.config.prompts.react_to_continue)
                    .await?;
                return Ok(TurnOutcome::AwaitingReaction);
            }

            if !turn.skip {
                if let Some(previous) = tree.parent(node) {
                    tree.step(previous).save(&ctx, &inbound).await?;
                }
            }

            let reply = step.send(&ctx, &inbound).await?;
            let metadata = reply.metadata.or_else(|| turn.carried.clone());

            let Some(next) = tree.first_child(node) else {
                self.clear(user_id).await?;
                tracing::info!(user_id, conversation = %turn.cursor.conversation, "Conversation finished");
                return Ok(TurnOutcome::Finished);
            };

            match step.control_hook(&ctx, &inbound).await? {
                HookOutcome::Proceed => {}
                HookOutcome::End => {
                    self.clear(user_id).await?;
                    tracing::info!(user_id, step = step.name(), "Conversation ended by step");
                    return Ok(TurnOutcome::Finished);
                }
                HookOutcome::GoTo(name) => {
                    turn.cursor.node = tree.child(node, &name)?;
                    tracing::debug!(user_id, from = step.name(), to = %name, "Redirect");
                    continue;
                }
                HookOutcome::Switch(redirect) => {
                    tracing::debug!(user_id, from = step.name(), to = %redirect.conversation, "Switch conversation");
                    turn.cursor = self.redirect(&turn.cursor, redirect)?;
                    continue;
                }
            }

            if step.auto_advance() {
                turn.cursor.node = next;
                if let Some(sent) = reply.message {
                    inbound = sent;
                }
                continue;
            }

            let address = tree.address(next).clone();
            let state = ConversationState::new(
                turn.cursor.conversation.as_str(),
                address.clone(),
                turn.cursor.topic_id,
            )
            .with_message_id(reply.message.as_ref().map(|m| m.id))
            .with_metadata(metadata);
            self.persist(user_id, &state).await?;

            return Ok(TurnOutcome::Waiting {
                conversation: state.conversation,
                address,
            });
        }

        Err(EngineError::HopLimit(self.config.max_hops))
    }

    fn tree(&self, conversation: &str) -> Result<Arc<StepTree>, EngineError> {
        self.registry
            .get(conversation)
            .ok_or_else(|| EngineError::UnknownConversation(conversation.to_string()))
    }

    fn resume(&self, state: &ConversationState) -> Result<Cursor, EngineError> {
        let tree = self.tree(&state.conversation)?;
        let node = tree
            .find(&state.address)
            .ok_or_else(|| TreeError::UnknownAddress(state.address.clone()))?;
        Ok(Cursor {
            conversation: state.conversation.clone(),
            tree,
            node,
            topic_id: state.topic_id,
        })
    }

    fn redirect(&self, from: &Cursor, redirect: Redirect) -> Result<Cursor, EngineError> {
        let tree = self.tree(&redirect.conversation)?;
        let node = match &redirect.address {
            Some(address) => tree
                .find(address)
                .ok_or_else(|| TreeError::UnknownAddress(address.clone()))?,
            None => tree.root(),
        };
        Ok(Cursor {
            conversation: redirect.conversation,
            tree,
            node,
            topic_id: redirect.topic_id.or(from.topic_id),
        })
    }

    async fn persist(&self, user_id: UserId, state: &ConversationState) -> Result<(), EngineError> {
        tracing::debug!(user_id, conversation = %state.conversation, address = %state.address, "Persisting state");
        self.cache
            .set(
                &self.config.state_key(user_id),
                state.to_json()?,
                self.config.state_ttl(),
            )
            .await?;
        Ok(())
    }

    async fn clear(&self, user_id: UserId) -> Result<(), EngineError> {
        self.cache.delete(&self.config.state_key(user_id)).await?;
        Ok(())
    }

    /// Discard state after a structural failure so no dangling address stays
    /// behind.
    async fn guard(
        &self,
        user_id: UserId,
        result: Result<TurnOutcome, EngineError>,
    ) -> Result<TurnOutcome, EngineError> {
        match result {
            Err(err) if err.is_structural() => {
                tracing::error!(user_id, error = %err, "Conversation no longer matches its tree, discarding state");
                if let Err(clear_err) = self.clear(user_id).await {
                    tracing::warn!(user_id, error = %clear_err, "Failed to discard conversation state");
                }
                Err(err)
            }
            other => other,
        }
    }
}
