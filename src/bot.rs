//! Conversation host: restores each conversation's dialog stack, feeds it
//! the incoming message and persists what is left.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use uuid::Uuid;

use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse};
use crate::commands::{Command, CommandParser, HELP_TEXT};
use crate::config::RetrievalConfig;
use crate::dialogs::{
    ActivitySender, DialogSet, DialogStack, DialogTurnStatus, EmailComposerDialog,
    EmailIntakeDialog, LlmEmailRewriter, MAIN_MENU, MainMenuDialog, TurnContext, WebQaDialog,
};
use crate::error::{ChannelError, DatabaseError, Error};
use crate::llm::{EmbeddingProvider, LlmProvider};
use crate::retrieval::{
    ProviderEmbedder, RecursiveCharacterSplitter, StuffDocumentsAnswerer, WebPageLoader,
};
use crate::store::Database;

/// Settings key holding a conversation's serialized `DialogStack`.
const DIALOG_STATE_KEY: &str = "dialog_state";

const RESET_NOTICE: &str = "Sorry, something went wrong. Let's start over.";
const GOODBYE: &str = "Goodbye!";
const QUIT_CHANNEL: &str = "cli";

/// What a single turn produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Every message sent during the turn, in order.
    pub replies: Vec<String>,
    /// The user asked the bot to stop.
    pub quit: bool,
}

/// Register every dialog the bot offers. Web Q&A is added, and offered in
/// the menu, only when an embedding provider is available.
pub fn build_dialogs(
    llm: Arc<dyn LlmProvider>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    retrieval: &RetrievalConfig,
) -> DialogSet {
    let mut dialogs = DialogSet::new();
    dialogs
        .add(Arc::new(MainMenuDialog::new(embeddings.is_some())))
        .add(Arc::new(EmailIntakeDialog))
        .add(Arc::new(EmailComposerDialog::new(Arc::new(
            LlmEmailRewriter::new(Arc::clone(&llm)),
        ))));

    if let Some(embeddings) = embeddings {
        let web_qa = WebQaDialog::new(
            Arc::new(WebPageLoader::new(retrieval.fetch_timeout)),
            Arc::new(RecursiveCharacterSplitter::new(
                retrieval.chunk_size,
                retrieval.chunk_overlap,
            )),
            Arc::new(ProviderEmbedder::new(embeddings)),
            Arc::new(StuffDocumentsAnswerer::new(llm)),
        )
        .with_top_k(retrieval.top_k);
        dialogs.add(Arc::new(web_qa));
    }

    dialogs
}

/// Delivers dialog output on the channel the message arrived on, as soon as
/// a step sends it.
struct ChannelReply {
    channels: Arc<ChannelManager>,
    message: IncomingMessage,
}

#[async_trait]
impl ActivitySender for ChannelReply {
    async fn send_activity(&self, text: &str) -> Result<(), ChannelError> {
        self.channels
            .respond(&self.message, OutgoingResponse::text(text))
            .await
    }
}

pub struct Bot {
    dialogs: DialogSet,
    store: Arc<dyn Database>,
    transcripts: bool,
}

impl Bot {
    pub fn new(dialogs: DialogSet, store: Arc<dyn Database>) -> Self {
        Self {
            dialogs,
            store,
            transcripts: true,
        }
    }

    pub fn with_transcripts(mut self, enabled: bool) -> Self {
        self.transcripts = enabled;
        self
    }

    /// Stable transcript id for a conversation key.
    pub fn conversation_id(conversation_key: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, conversation_key.as_bytes())
    }

    /// Run one turn for `msg`. With a sender attached, replies are delivered
    /// while the turn runs; they are also returned in the outcome.
    pub async fn handle_message(
        &self,
        msg: &IncomingMessage,
        sender: Option<Arc<dyn ActivitySender>>,
    ) -> Result<TurnOutcome, Error> {
        let key = msg.conversation_key();
        tracing::info!(conversation = %key, channel = %msg.channel, "Handling message");

        let mut turn = TurnContext::new(key.clone());
        if let Some(sender) = sender {
            turn = turn.with_sender(sender);
        }

        let mut quit = false;
        match CommandParser::parse(&msg.content) {
            Command::Reset => {
                tracing::info!(conversation = %key, "Conversation reset");
                let mut stack = DialogStack::new();
                self.run_turn(&mut stack, &mut turn, None).await?;
                self.save_stack(&key, &stack).await?;
            }
            Command::Help => turn.send_activity(HELP_TEXT).await?,
            // Only the local console can stop the process.
            Command::Quit if msg.channel == QUIT_CHANNEL => {
                turn.send_activity(GOODBYE).await?;
                quit = true;
            }
            Command::Quit => {
                tracing::warn!(conversation = %key, channel = %msg.channel, "Ignoring /quit from remote channel");
                turn.send_activity(HELP_TEXT).await?;
            }
            Command::Message { content } => {
                let mut stack = self.load_stack(&key).await?;
                self.run_turn(&mut stack, &mut turn, Some(&content)).await?;
                self.save_stack(&key, &stack).await?;
            }
        }

        let replies = turn.into_sent();
        if self.transcripts {
            self.record_transcript(msg, &key, &replies).await?;
        }
        Ok(TurnOutcome { replies, quit })
    }

    /// Begin the menu on an empty stack, otherwise continue the active
    /// frame. Step errors are reported to the user and reset the stack.
    async fn run_turn(
        &self,
        stack: &mut DialogStack,
        turn: &mut TurnContext,
        utterance: Option<&str>,
    ) -> Result<(), Error> {
        let result = match utterance {
            Some(text) if !stack.is_empty() => self.dialogs.continue_turn(stack, turn, text).await,
            _ => self.dialogs.begin(stack, turn, MAIN_MENU, Value::Null).await,
        };

        match result {
            Ok(DialogTurnStatus::Waiting) => {
                tracing::debug!(conversation = turn.conversation(), path = %stack.path(), "Waiting for input");
            }
            Ok(DialogTurnStatus::Complete(_)) => {
                tracing::info!(conversation = turn.conversation(), "Dialog stack completed");
            }
            Err(e) => {
                tracing::error!(conversation = turn.conversation(), path = %stack.path(), "Dialog turn failed: {e}");
                stack.clear();
                turn.send_activity(RESET_NOTICE).await?;
            }
        }
        Ok(())
    }

    async fn load_stack(&self, key: &str) -> Result<DialogStack, Error> {
        let Some(value) = self.store.get_setting(key, DIALOG_STATE_KEY).await? else {
            return Ok(DialogStack::new());
        };
        match serde_json::from_value(value) {
            Ok(stack) => Ok(stack),
            Err(e) => {
                tracing::warn!(conversation = key, "Discarding unreadable dialog state: {e}");
                Ok(DialogStack::new())
            }
        }
    }

    async fn save_stack(&self, key: &str, stack: &DialogStack) -> Result<(), Error> {
        if stack.is_empty() {
            self.store.delete_setting(key, DIALOG_STATE_KEY).await?;
        } else {
            let value = serde_json::to_value(stack)
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
            self.store.set_setting(key, DIALOG_STATE_KEY, &value).await?;
        }
        Ok(())
    }

    async fn record_transcript(
        &self,
        msg: &IncomingMessage,
        key: &str,
        replies: &[String],
    ) -> Result<(), Error> {
        let id = Self::conversation_id(key);
        self.store
            .ensure_conversation(id, &msg.channel, &msg.user_id)
            .await?;
        self.store
            .add_conversation_message(id, "user", &msg.content)
            .await?;
        for reply in replies {
            self.store
                .add_conversation_message(id, "assistant", reply)
                .await?;
        }
        Ok(())
    }

    /// Serve every channel until Ctrl+C, `/quit`, or all streams end.
    pub async fn run(self, channels: Arc<ChannelManager>) -> Result<(), Error> {
        let mut message_stream = channels.start_all().await?;
        for (name, health) in channels.health_check_all().await {
            if let Err(e) = health {
                tracing::warn!(channel = %name, "Channel health check failed: {e}");
            }
        }
        tracing::info!(channels = ?channels.names(), "Bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            let sender = Arc::new(ChannelReply {
                channels: Arc::clone(&channels),
                message: message.clone(),
            });
            match self.handle_message(&message, Some(sender)).await {
                Ok(outcome) if outcome.quit => {
                    tracing::info!("Shutdown command received, exiting...");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Error handling message: {e}");
                    let _ = channels
                        .respond(&message, OutgoingResponse::text(RESET_NOTICE))
                        .await;
                }
            }
        }

        channels.shutdown_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse};
    use crate::store::LibSqlBackend;

    /// Returns the user part of the request, so the rewrite is visible.
    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: request.conversation_prompt(),
            })
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmProvider for FailingLlm {
        fn model_name(&self) -> &str {
            "down"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "down".into(),
                reason: "offline".into(),
            })
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    #[async_trait]
    impl ActivitySender for Collect {
        async fn send_activity(&self, text: &str) -> Result<(), ChannelError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    async fn bot(llm: Arc<dyn LlmProvider>) -> (Bot, Arc<LibSqlBackend>) {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let dialogs = build_dialogs(llm, None, &RetrievalConfig::default());
        (Bot::new(dialogs, store.clone()), store)
    }

    async fn say(bot: &Bot, text: &str) -> TurnOutcome {
        let msg = IncomingMessage::new("cli", "u1", text);
        bot.handle_message(&msg, None).await.unwrap()
    }

    #[tokio::test]
    async fn first_message_shows_menu() {
        let (bot, store) = bot(Arc::new(EchoLlm)).await;
        let outcome = say(&bot, "hello").await;
        assert_eq!(outcome.replies, vec!["What do you want to do?\n1. email helper"]);
        assert!(!outcome.quit);

        let saved = store.get_setting("cli:u1", DIALOG_STATE_KEY).await.unwrap();
        assert!(saved.is_some());
    }

    #[tokio::test]
    async fn unmatched_menu_choice_reprompts() {
        let (bot, _) = bot(Arc::new(EchoLlm)).await;
        say(&bot, "hello").await;
        let outcome = say(&bot, "pizza").await;
        assert_eq!(
            outcome.replies,
            vec!["That was not a valid choice, try again\n1. email helper"]
        );
    }

    #[tokio::test]
    async fn email_flow_ends_with_empty_stack() {
        let (bot, store) = bot(Arc::new(EchoLlm)).await;
        say(&bot, "hi").await;
        assert_eq!(say(&bot, "email").await.replies, vec!["Please enter your email idea."]);

        let outcome = say(&bot, "send report tmrw").await;
        assert_eq!(outcome.replies.len(), 2);
        assert_eq!(outcome.replies[0], "Formality: neutral, email: send report tmrw");

        let outcome = say(&bot, "formal").await;
        assert_eq!(outcome.replies[0], "Formality: formal, email: send report tmrw");

        let outcome = say(&bot, "all good").await;
        assert_eq!(outcome.replies, vec!["Type anything to see more options."]);
        assert!(
            store
                .get_setting("cli:u1", DIALOG_STATE_KEY)
                .await
                .unwrap()
                .is_none()
        );

        // Next message starts over at the menu.
        let outcome = say(&bot, "again").await;
        assert_eq!(outcome.replies, vec!["What do you want to do?\n1. email helper"]);
    }

    #[tokio::test]
    async fn step_failure_resets_conversation() {
        let (bot, store) = bot(Arc::new(FailingLlm)).await;
        say(&bot, "hi").await;
        say(&bot, "email").await;
        let outcome = say(&bot, "draft").await;
        assert_eq!(outcome.replies, vec![RESET_NOTICE]);
        assert!(
            store
                .get_setting("cli:u1", DIALOG_STATE_KEY)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn commands_are_handled_before_dialogs() {
        let (bot, _) = bot(Arc::new(EchoLlm)).await;
        say(&bot, "hi").await;
        say(&bot, "email").await;

        let outcome = say(&bot, "/help").await;
        assert_eq!(outcome.replies, vec![HELP_TEXT]);

        let outcome = say(&bot, "/reset").await;
        assert_eq!(outcome.replies, vec!["What do you want to do?\n1. email helper"]);

        let outcome = say(&bot, "/quit").await;
        assert!(outcome.quit);
        assert_eq!(outcome.replies, vec![GOODBYE]);
    }

    #[tokio::test]
    async fn remote_quit_does_not_stop_the_bot() {
        let (bot, _) = bot(Arc::new(EchoLlm)).await;
        for channel in ["webchat", "telegram"] {
            let msg = IncomingMessage::new(channel, "stranger", "/quit");
            let outcome = bot.handle_message(&msg, None).await.unwrap();
            assert!(!outcome.quit);
            assert_eq!(outcome.replies, vec![HELP_TEXT]);
        }
    }

    #[tokio::test]
    async fn corrupt_state_starts_fresh() {
        let (bot, store) = bot(Arc::new(EchoLlm)).await;
        store
            .set_setting("cli:u1", DIALOG_STATE_KEY, &serde_json::json!({"frames": 7}))
            .await
            .unwrap();
        let outcome = say(&bot, "hi").await;
        assert_eq!(outcome.replies, vec!["What do you want to do?\n1. email helper"]);
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let (bot, _) = bot(Arc::new(EchoLlm)).await;
        say(&bot, "hi").await;
        say(&bot, "email").await;

        let other = IncomingMessage::new("cli", "u2", "email");
        let outcome = bot.handle_message(&other, None).await.unwrap();
        assert_eq!(outcome.replies, vec!["What do you want to do?\n1. email helper"]);
    }

    #[tokio::test]
    async fn transcripts_record_both_sides() {
        let (bot, store) = bot(Arc::new(EchoLlm)).await;
        say(&bot, "hi").await;

        let id = Bot::conversation_id("cli:u1");
        let lines = store.list_conversation_messages(id).await.unwrap();
        let roles: Vec<&str> = lines.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant"]);
        assert_eq!(lines[0].content, "hi");
    }

    #[tokio::test]
    async fn transcripts_can_be_disabled() {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let dialogs = build_dialogs(Arc::new(EchoLlm), None, &RetrievalConfig::default());
        let bot = Bot::new(dialogs, store.clone()).with_transcripts(false);
        say(&bot, "hi").await;

        let lines = store
            .list_conversation_messages(Bot::conversation_id("cli:u1"))
            .await
            .unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn sender_receives_replies_live() {
        let (bot, _) = bot(Arc::new(EchoLlm)).await;
        let collect = Arc::new(Collect::default());
        let msg = IncomingMessage::new("cli", "u1", "hi");
        bot.handle_message(&msg, Some(collect.clone())).await.unwrap();
        assert_eq!(collect.0.lock().unwrap().len(), 1);
    }
}
