//! Turn orchestration and state caches for resumable conversations.
//!
//! Provides:
//! - `ConversationEngine` - Advance conversations one event at a time
//! - `ConversationRegistry` - Conversation types and their step trees
//! - Cache implementations (memory, Redis)
//! - `EngineConfig` - Environment-driven configuration

pub mod config;
pub mod engine;
pub mod registry;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, EngineConfig, Prompts, RedisConfig, ValidationError};
pub use engine::{ConversationEngine, EngineError, TurnOutcome};
pub use registry::ConversationRegistry;
