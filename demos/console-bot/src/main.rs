//! Console chat bot driven by the conversation engine.
//!
//! Run with: cargo run -p console-bot
//!
//! Type `/onboard` or `/report` to start a conversation, plain text to
//! answer, `/react <emoji>` to react to the bot's last message, `/end` to
//! abandon the conversation and `/quit` to exit. Set `STEPTREE__REDIS__URL`
//! to keep conversation state in Redis instead of memory.

mod console;
mod profile;
mod steps;

use std::sync::Arc;

use anyhow::Context as _;
use steptree_core::{Cache, ChannelId, Reaction, TopicId, UserId};
use steptree_engine::{
    ConversationEngine, ConversationRegistry, EngineConfig, TurnOutcome,
    storage::{MemoryCache, RedisCache},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{console::ConsoleMessaging, profile::ProfileStore};

const USER: UserId = 500;
const CHANNEL: ChannelId = 10;
const TOPIC: TopicId = 42;
const HOME_TOPIC: TopicId = 1;

type Engine = ConversationEngine<Arc<dyn Cache>, ConsoleMessaging>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let config = EngineConfig::load().context("loading engine configuration")?;

    let cache: Arc<dyn Cache> = match &config.redis {
        Some(redis) => {
            tracing::info!(url = %redis.url, "Using Redis conversation cache");
            Arc::new(RedisCache::from_config(redis)?)
        }
        None => Arc::new(MemoryCache::new()),
    };

    let store = Arc::new(ProfileStore::new());
    let registry = ConversationRegistry::new()
        .with(steps::ONBOARDING, steps::onboarding(&store, HOME_TOPIC)?)
        .with(steps::REPORT, steps::report());

    let engine = ConversationEngine::new(cache, ConsoleMessaging::new(), registry)
        .with_config(config);

    println!("Commands: /onboard, /report, /react <emoji>, /end, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        match dispatch(&engine, line).await {
            Ok(outcome) => tracing::debug!(?outcome, "Turn complete"),
            Err(err) => eprintln!("error: {err:#}"),
        }
    }

    if let Some(profile) = store.get(USER, TOPIC).await {
        println!("Profile in community {TOPIC}: {profile}");
    }
    if let Some(profile) = store.get(USER, HOME_TOPIC).await {
        println!("Profile in community {HOME_TOPIC}: {profile}");
    }
    Ok(())
}

async fn dispatch(engine: &Engine, line: &str) -> anyhow::Result<TurnOutcome> {
    let messaging = engine.messaging();
    let outcome = match line.split_once(' ').unwrap_or((line, "")) {
        ("/onboard", _) => {
            let message = messaging.receive(CHANNEL, USER, line).await;
            engine.start(steps::ONBOARDING, Some(TOPIC), &message).await?
        }
        ("/report", _) => {
            let message = messaging.receive(CHANNEL, USER, line).await;
            engine.start(steps::REPORT, Some(TOPIC), &message).await?
        }
        ("/react", emoji) => {
            let target = messaging
                .last_sent()
                .await
                .context("nothing to react to yet")?;
            let reaction = Reaction::new(emoji.trim(), target.id, CHANNEL, USER);
            engine.handle_reaction(&reaction).await?
        }
        ("/end", _) => {
            engine.end(USER).await?;
            println!("(conversation ended)");
            TurnOutcome::Idle
        }
        _ => {
            let message = messaging.receive(CHANNEL, USER, line).await;
            engine.handle_message(&message).await?
        }
    };

    if outcome == TurnOutcome::Idle && !line.starts_with("/end") {
        println!("(no conversation in progress, try /onboard)");
    }
    Ok(outcome)
}
