//! Onboarding and report conversations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use steptree_core::{
    Address, Branch, HookOutcome, Message, Metadata, Reaction, ReactionOutcome, Redirect, StepContext,
    StepDefinition, StepError, StepReply, StepTree, TopicId, TreeError,
};

use crate::profile::{ProfileField, ProfileStore};

pub const ONBOARDING: &str = "onboarding";
pub const REPORT: &str = "report";

pub const YES_EMOJI: &str = "👍";
pub const NO_EMOJI: &str = "👎";
pub const SKIP_EMOJI: &str = "⏭️";

const DISPLAY_CONFIRM: &str = "user_display_confirm";
const DISPLAY_CONFIRM_EMOJI: &str = "user_display_confirm_emoji";
const DISPLAY_SUBMIT: &str = "user_display_submit";
const ADD_TWITTER: &str = "add_user_twitter";
const ADD_WALLET: &str = "add_user_wallet_address";
const ADD_DISCOURSE: &str = "add_discourse";
const CONGRATS: &str = "congrats";
const HOME_PROMPT: &str = "home_profile_prompt";
const HOME_PROMPT_EMOJI: &str = "home_profile_prompt_emoji";
const HOME_ACCEPT: &str = "home_profile_accept";
const HOME_REJECT: &str = "home_profile_reject";

/// Address of the display-name prompt in the onboarding tree.
#[must_use]
pub fn display_confirm_address() -> Address {
    Address::root().child(DISPLAY_CONFIRM)
}

fn default_display_name(ctx: &StepContext<'_>) -> String {
    format!("user-{}", ctx.user_id)
}

struct Intro;

#[async_trait]
impl StepDefinition for Intro {
    fn name(&self) -> &str {
        "intro"
    }

    fn auto_advance(&self) -> bool {
        true
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        let topic = ctx.topic_id.map_or_else(|| "?".to_string(), |t| t.to_string());
        let sent = ctx
            .say(
                message.channel_id,
                &format!("Welcome! Let's set up your profile for community {topic}."),
            )
            .await?;
        Ok(StepReply::sent(sent))
    }
}

struct DisplayNameConfirm;

#[async_trait]
impl StepDefinition for DisplayNameConfirm {
    fn name(&self) -> &str {
        DISPLAY_CONFIRM
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        let prompt = format!(
            "Would you like your display name to be `{}`?",
            default_display_name(ctx)
        );
        let sent = ctx
            .ask_with_reactions(message.channel_id, &prompt, &[YES_EMOJI, NO_EMOJI])
            .await?;
        Ok(StepReply::sent(sent))
    }
}

struct DisplayNameConfirmEmoji {
    store: Arc<ProfileStore>,
}

#[async_trait]
impl StepDefinition for DisplayNameConfirmEmoji {
    fn name(&self) -> &str {
        DISPLAY_CONFIRM_EMOJI
    }

    fn reaction_only(&self) -> bool {
        true
    }

    async fn on_reaction(
        &self,
        _ctx: &StepContext<'_>,
        reaction: &Reaction,
    ) -> Result<ReactionOutcome, StepError> {
        match reaction.emoji.as_str() {
            YES_EMOJI => Ok(ReactionOutcome::Branch(ADD_TWITTER.to_string())),
            NO_EMOJI => Ok(ReactionOutcome::Branch(DISPLAY_SUBMIT.to_string())),
            other => Err(StepError::InvalidReaction(other.to_string())),
        }
    }

    // Runs when the next step fires; the submit step overwrites it later.
    async fn save(&self, ctx: &StepContext<'_>, _message: &Message) -> Result<(), StepError> {
        self.store
            .update(
                ctx.user_id,
                ctx.topic_id,
                ProfileField::DisplayName,
                default_display_name(ctx),
            )
            .await?;
        Ok(())
    }
}

struct DisplayNameSubmit {
    store: Arc<ProfileStore>,
}

#[async_trait]
impl StepDefinition for DisplayNameSubmit {
    fn name(&self) -> &str {
        DISPLAY_SUBMIT
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        let sent = ctx
            .say(message.channel_id, "What would you like your display name to be?")
            .await?;
        Ok(StepReply::sent(sent))
    }

    async fn save(&self, ctx: &StepContext<'_>, message: &Message) -> Result<(), StepError> {
        self.store
            .update(
                ctx.user_id,
                ctx.topic_id,
                ProfileField::DisplayName,
                message.content.trim().to_string(),
            )
            .await?;
        Ok(())
    }
}

/// Prompt for one optional profile field, skippable by reaction.
struct AddField {
    name: &'static str,
    prompt: &'static str,
    field: ProfileField,
    store: Arc<ProfileStore>,
}

impl AddField {
    fn twitter(store: &Arc<ProfileStore>) -> Self {
        Self {
            name: ADD_TWITTER,
            prompt: "What's your twitter handle?",
            field: ProfileField::Twitter,
            store: Arc::clone(store),
        }
    }

    fn wallet(store: &Arc<ProfileStore>) -> Self {
        Self {
            name: ADD_WALLET,
            prompt: "What's your Ethereum wallet address?",
            field: ProfileField::Wallet,
            store: Arc::clone(store),
        }
    }

    fn discourse(store: &Arc<ProfileStore>) -> Self {
        Self {
            name: ADD_DISCOURSE,
            prompt: "What's your discourse handle?",
            field: ProfileField::Discourse,
            store: Arc::clone(store),
        }
    }
}

#[async_trait]
impl StepDefinition for AddField {
    fn name(&self) -> &str {
        self.name
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        let prompt = format!(
            "{} Press {SKIP_EMOJI} to skip this step.",
            self.prompt
        );
        let sent = ctx
            .ask_with_reactions(message.channel_id, &prompt, &[SKIP_EMOJI])
            .await?;
        Ok(StepReply::sent(sent))
    }

    async fn save(&self, ctx: &StepContext<'_>, message: &Message) -> Result<(), StepError> {
        let value = match self.field {
            ProfileField::Twitter => message.content.trim().trim_start_matches('@'),
            _ => message.content.trim(),
        };
        self.store
            .update(ctx.user_id, ctx.topic_id, self.field, value.to_string())
            .await?;
        Ok(())
    }

    async fn on_reaction(
        &self,
        _ctx: &StepContext<'_>,
        reaction: &Reaction,
    ) -> Result<ReactionOutcome, StepError> {
        if reaction.emoji == SKIP_EMOJI {
            Ok(ReactionOutcome::Skip)
        } else {
            Err(StepError::InvalidReaction(reaction.emoji.clone()))
        }
    }
}

struct Congrats {
    home_topic: TopicId,
}

#[async_trait]
impl StepDefinition for Congrats {
    fn name(&self) -> &str {
        CONGRATS
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        let sent = ctx
            .say(message.channel_id, "Nice! You're all set up.")
            .await?;
        Ok(StepReply::sent(sent))
    }

    // Reached by skipping the discourse prompt.
    async fn on_reaction(
        &self,
        _ctx: &StepContext<'_>,
        reaction: &Reaction,
    ) -> Result<ReactionOutcome, StepError> {
        if reaction.emoji == SKIP_EMOJI {
            Ok(ReactionOutcome::Skip)
        } else {
            Err(StepError::InvalidReaction(reaction.emoji.clone()))
        }
    }

    async fn control_hook(
        &self,
        ctx: &StepContext<'_>,
        _message: &Message,
    ) -> Result<HookOutcome, StepError> {
        if ctx.topic_id == Some(self.home_topic) {
            Ok(HookOutcome::End)
        } else {
            Ok(HookOutcome::GoTo(HOME_PROMPT.to_string()))
        }
    }
}

struct HomePrompt;

#[async_trait]
impl StepDefinition for HomePrompt {
    fn name(&self) -> &str {
        HOME_PROMPT
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        let sent = ctx
            .ask_with_reactions(
                message.channel_id,
                "Would you like to set up a profile in the home community too?",
                &[YES_EMOJI, NO_EMOJI],
            )
            .await?;
        Ok(StepReply::sent(sent))
    }
}

struct HomePromptEmoji;

#[async_trait]
impl StepDefinition for HomePromptEmoji {
    fn name(&self) -> &str {
        HOME_PROMPT_EMOJI
    }

    fn reaction_only(&self) -> bool {
        true
    }

    async fn on_reaction(
        &self,
        _ctx: &StepContext<'_>,
        reaction: &Reaction,
    ) -> Result<ReactionOutcome, StepError> {
        match reaction.emoji.as_str() {
            YES_EMOJI => Ok(ReactionOutcome::Advance),
            NO_EMOJI => Ok(ReactionOutcome::Branch(HOME_REJECT.to_string())),
            other => Err(StepError::InvalidReaction(other.to_string())),
        }
    }
}

/// Hands the participant over to onboarding in the home community.
struct HomeAccept {
    home_topic: TopicId,
}

#[async_trait]
impl StepDefinition for HomeAccept {
    fn name(&self) -> &str {
        HOME_ACCEPT
    }

    fn auto_advance(&self) -> bool {
        true
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        let sent = ctx
            .say(message.channel_id, "Great, let's do that now.")
            .await?;
        Ok(StepReply::sent(sent))
    }

    async fn control_hook(
        &self,
        ctx: &StepContext<'_>,
        _message: &Message,
    ) -> Result<HookOutcome, StepError> {
        if ctx.topic_id == Some(self.home_topic) {
            return Ok(HookOutcome::Proceed);
        }
        Ok(HookOutcome::Switch(
            Redirect::to(ONBOARDING)
                .at(display_confirm_address())
                .with_topic(self.home_topic),
        ))
    }
}

/// Closing message, also reached when the hand-over is not possible.
struct Farewell {
    name: &'static str,
}

#[async_trait]
impl StepDefinition for Farewell {
    fn name(&self) -> &str {
        self.name
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        let sent = ctx
            .say(message.channel_id, "No problem. See you around!")
            .await?;
        Ok(StepReply::sent(sent))
    }
}

/// Twitter, wallet, and discourse prompts followed by the wrap-up.
fn data_retrieval_chain(
    store: &Arc<ProfileStore>,
    home_topic: TopicId,
) -> Result<StepTree, TreeError> {
    let mut tree = StepTree::from_step(AddField::twitter(store));
    let wallet = tree.append_child(tree.root(), Arc::new(AddField::wallet(store)))?;
    let discourse = tree.append_child(wallet, Arc::new(AddField::discourse(store)))?;
    let congrats = tree.append_child(discourse, Arc::new(Congrats { home_topic }))?;
    let prompt = tree.append_child(congrats, Arc::new(HomePrompt))?;
    let emoji = tree.append_child(prompt, Arc::new(HomePromptEmoji))?;

    let mut accept = StepTree::from_step(HomeAccept { home_topic });
    accept.append_child(accept.root(), Arc::new(Farewell { name: "farewell" }))?;
    let reject: Arc<dyn StepDefinition> = Arc::new(Farewell { name: HOME_REJECT });
    tree.fork(emoji, [Branch::from(accept), Branch::from(reject)])?;
    Ok(tree)
}

/// Build the onboarding tree.
///
/// # Errors
/// Returns error if two sibling steps share a name.
pub fn onboarding(store: &Arc<ProfileStore>, home_topic: TopicId) -> Result<StepTree, TreeError> {
    let chain = data_retrieval_chain(store, home_topic)?;

    let mut submit = StepTree::from_step(DisplayNameSubmit {
        store: Arc::clone(store),
    });
    submit.append_subtree(submit.root(), &chain)?;

    let mut tree = StepTree::from_step(Intro);
    let confirm = tree.append_child(tree.root(), Arc::new(DisplayNameConfirm))?;
    let emoji = tree.append_child(
        confirm,
        Arc::new(DisplayNameConfirmEmoji {
            store: Arc::clone(store),
        }),
    )?;
    tree.fork(emoji, [submit, chain])?;
    Ok(tree)
}

/// Single-step conversation that hands out a report link.
struct ReportLink;

#[async_trait]
impl StepDefinition for ReportLink {
    fn name(&self) -> &str {
        "report_link"
    }

    async fn send(&self, ctx: &StepContext<'_>, message: &Message) -> Result<StepReply, StepError> {
        let topic = ctx.topic_id.unwrap_or_default();
        let link = format!("https://reports.example/{topic}/{}", ctx.user_id);
        let sent = ctx
            .say(message.channel_id, &format!("Your contribution report: {link}"))
            .await?;
        let mut metadata = Metadata::new();
        metadata.insert("report_link".to_string(), Value::String(link));
        Ok(StepReply::sent(sent).with_metadata(metadata))
    }
}

#[must_use]
pub fn report() -> StepTree {
    StepTree::from_step(ReportLink)
}

#[cfg(test)]
mod tests {
    use steptree_core::{Reaction, UserId};
    use steptree_engine::{
        ConversationEngine, ConversationRegistry, TurnOutcome, storage::MemoryCache,
    };

    use super::*;
    use crate::console::ConsoleMessaging;

    const USER: UserId = 500;
    const CHANNEL: u64 = 10;
    const TOPIC: TopicId = 42;
    const HOME: TopicId = 1;

    type Engine = ConversationEngine<MemoryCache, ConsoleMessaging>;

    fn engine(store: &Arc<ProfileStore>) -> Engine {
        let registry = ConversationRegistry::new()
            .with(ONBOARDING, onboarding(store, HOME).unwrap())
            .with(REPORT, report());
        ConversationEngine::new(MemoryCache::new(), ConsoleMessaging::quiet(), registry)
    }

    async fn say(engine: &Engine, content: &str) -> TurnOutcome {
        let message = engine.messaging().receive(CHANNEL, USER, content).await;
        engine.handle_message(&message).await.unwrap()
    }

    async fn react(engine: &Engine, emoji: &str) -> TurnOutcome {
        let last = engine.messaging().last_sent().await.unwrap();
        let reaction = Reaction::new(emoji, last.id, CHANNEL, USER);
        engine.handle_reaction(&reaction).await.unwrap()
    }

    fn waiting_at(outcome: &TurnOutcome) -> &Address {
        match outcome {
            TurnOutcome::Waiting { address, .. } => address,
            other => panic!("expected waiting, got {other:?}"),
        }
    }

    #[test]
    fn test_onboarding_tree_addresses_resolve() {
        let store = Arc::new(ProfileStore::new());
        let tree = onboarding(&store, HOME).unwrap();

        for node in tree.node_ids() {
            assert_eq!(tree.find(tree.address(node)), Some(node));
        }
        let confirm = tree.find(&display_confirm_address()).unwrap();
        assert_eq!(tree.name(confirm), DISPLAY_CONFIRM);
    }

    #[tokio::test]
    async fn test_full_onboarding_switches_to_home() {
        let store = Arc::new(ProfileStore::new());
        let engine = engine(&store);

        let start = engine.messaging().receive(CHANNEL, USER, "/onboard").await;
        let outcome = engine.start(ONBOARDING, Some(TOPIC), &start).await.unwrap();
        assert_eq!(
            waiting_at(&outcome),
            &display_confirm_address().child(DISPLAY_CONFIRM_EMOJI)
        );

        react(&engine, YES_EMOJI).await;
        say(&engine, "@alice").await;
        // Skipping the wallet prompt sends the discourse prompt without saving a wallet.
        react(&engine, SKIP_EMOJI).await;
        say(&engine, "alice.d").await;

        let outcome = react(&engine, YES_EMOJI).await;
        let state = engine.state(USER).await.unwrap().unwrap();
        assert_eq!(state.conversation, ONBOARDING);
        assert_eq!(state.topic_id, Some(HOME));
        assert_eq!(
            waiting_at(&outcome),
            &display_confirm_address().child(DISPLAY_CONFIRM_EMOJI)
        );

        let profile = store.get(USER, TOPIC).await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("user-500"));
        assert_eq!(profile.twitter.as_deref(), Some("alice"));
        assert_eq!(profile.wallet, None);
        assert_eq!(profile.discourse.as_deref(), Some("alice.d"));
    }

    #[tokio::test]
    async fn test_skipping_discourse_reaches_congrats() {
        let store = Arc::new(ProfileStore::new());
        let engine = engine(&store);

        let start = engine.messaging().receive(CHANNEL, USER, "/onboard").await;
        engine.start(ONBOARDING, Some(TOPIC), &start).await.unwrap();
        react(&engine, YES_EMOJI).await;
        say(&engine, "alice").await;
        say(&engine, "0xabc").await;

        let outcome = react(&engine, SKIP_EMOJI).await;

        assert!(matches!(outcome, TurnOutcome::Waiting { .. }));
        assert_eq!(
            engine.messaging().last_sent().await.unwrap().content,
            "Would you like to set up a profile in the home community too?"
        );

        let profile = store.get(USER, TOPIC).await.unwrap();
        assert_eq!(profile.wallet.as_deref(), Some("0xabc"));
        assert_eq!(profile.discourse, None);
    }

    #[tokio::test]
    async fn test_skipping_discourse_at_home_finishes() {
        let store = Arc::new(ProfileStore::new());
        let engine = engine(&store);

        let start = engine.messaging().receive(CHANNEL, USER, "/onboard").await;
        engine.start(ONBOARDING, Some(HOME), &start).await.unwrap();
        react(&engine, YES_EMOJI).await;
        say(&engine, "alice").await;
        say(&engine, "0xabc").await;

        assert_eq!(react(&engine, SKIP_EMOJI).await, TurnOutcome::Finished);
        assert_eq!(
            engine.messaging().last_sent().await.unwrap().content,
            "Nice! You're all set up."
        );
        assert_eq!(engine.state(USER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_custom_display_name() {
        let store = Arc::new(ProfileStore::new());
        let engine = engine(&store);

        let start = engine.messaging().receive(CHANNEL, USER, "/onboard").await;
        engine.start(ONBOARDING, Some(HOME), &start).await.unwrap();
        react(&engine, NO_EMOJI).await;
        say(&engine, "Alice").await;

        let profile = store.get(USER, HOME).await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_home_onboarding_ends_at_congrats() {
        let store = Arc::new(ProfileStore::new());
        let engine = engine(&store);

        let start = engine.messaging().receive(CHANNEL, USER, "/onboard").await;
        engine.start(ONBOARDING, Some(HOME), &start).await.unwrap();
        react(&engine, YES_EMOJI).await;
        say(&engine, "alice").await;
        say(&engine, "0xabc").await;
        let outcome = say(&engine, "alice.d").await;

        assert_eq!(outcome, TurnOutcome::Finished);
        assert_eq!(engine.state(USER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_declining_home_profile_finishes() {
        let store = Arc::new(ProfileStore::new());
        let engine = engine(&store);

        let start = engine.messaging().receive(CHANNEL, USER, "/onboard").await;
        engine.start(ONBOARDING, Some(TOPIC), &start).await.unwrap();
        react(&engine, YES_EMOJI).await;
        say(&engine, "alice").await;
        say(&engine, "0xabc").await;
        say(&engine, "alice.d").await;

        assert_eq!(react(&engine, NO_EMOJI).await, TurnOutcome::Finished);
        assert_eq!(
            engine.messaging().last_sent().await.unwrap().content,
            "No problem. See you around!"
        );
    }

    #[tokio::test]
    async fn test_report_is_single_turn() {
        let store = Arc::new(ProfileStore::new());
        let engine = engine(&store);

        let start = engine.messaging().receive(CHANNEL, USER, "/report").await;
        let outcome = engine.start(REPORT, Some(TOPIC), &start).await.unwrap();

        assert_eq!(outcome, TurnOutcome::Finished);
        assert!(
            engine
                .messaging()
                .last_sent()
                .await
                .unwrap()
                .content
                .ends_with("/42/500")
        );
    }
}
