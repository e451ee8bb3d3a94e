//! Conversation-type registry.

use std::{collections::HashMap, sync::Arc};

use steptree_core::StepTree;

/// Maps conversation type ids to their step trees.
///
/// Trees are built once at registration and shared read-only by every turn.
#[derive(Debug, Clone, Default)]
pub struct ConversationRegistry {
    trees: HashMap<String, Arc<StepTree>>,
}

impl ConversationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tree` under `conversation`, replacing any previous tree.
    pub fn register(&mut self, conversation: impl Into<String>, tree: StepTree) {
        let conversation = conversation.into();
        tracing::debug!(%conversation, nodes = tree.len(), "Registered conversation type");
        self.trees.insert(conversation, Arc::new(tree));
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, conversation: impl Into<String>, tree: StepTree) -> Self {
        self.register(conversation, tree);
        self
    }

    /// Tree registered under `conversation`.
    #[must_use]
    pub fn get(&self, conversation: &str) -> Option<Arc<StepTree>> {
        self.trees.get(conversation).map(Arc::clone)
    }

    /// Whether `conversation` is registered.
    #[must_use]
    pub fn contains(&self, conversation: &str) -> bool {
        self.trees.contains_key(conversation)
    }

    /// Registered conversation type ids.
    pub fn conversations(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }
}
