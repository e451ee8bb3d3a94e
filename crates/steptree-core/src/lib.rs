//! Core building blocks for resumable, tree-structured conversations.
//!
//! This crate provides:
//! - `StepDefinition` - The capability set of a conversational step
//! - `StepTree` - Arena tree of steps with deterministic addresses
//! - `ConversationState` - The persisted resumption record
//! - `Cache` and `Messaging` - Collaborator contracts

pub mod address;
pub mod context;
pub mod state;
pub mod step;
pub mod traits;
pub mod tree;

pub use address::Address;
pub use context::{Metadata, StepContext};
pub use state::{ConversationState, StateError};
pub use step::{HookOutcome, ReactionOutcome, Redirect, StepDefinition, StepError, StepReply};
pub use traits::{
    Cache, CacheError, Channel, ChannelId, Message, MessageId, Messaging, MessagingError,
    Reaction, TopicId, UserId,
};
pub use tree::{Branch, NodeId, StepTree, TreeError};
