//! Email helper: collect an email idea, then rewrite it at the requested
//! formality until the user is happy.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::dialogs::choice::{Choice, ChoiceSet};
use crate::dialogs::context::StepContext;
use crate::dialogs::waterfall::{Dialog, StepResult};
use crate::error::{DialogError, Error};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::prompts::{EMAIL_REWRITE_SYSTEM, EMAIL_REWRITE_USER};

pub const EMAIL_INTAKE: &str = "email_intake";
pub const EMAIL_COMPOSER: &str = "email_composer";

const TRY_AGAIN: &str = "tryagain";
const INVALID_CHOICE: &str = "That was not a valid choice, try again";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    #[default]
    Neutral,
    Formal,
    Friendly,
}

impl Formality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Formal => "formal",
            Self::Friendly => "friendly",
        }
    }
}

impl fmt::Display for Formality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Formality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "formal" => Ok(Self::Formal),
            "friendly" => Ok(Self::Friendly),
            other => Err(format!("unknown formality '{other}'")),
        }
    }
}

/// Entry options of the composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDetails {
    pub user_text: String,
    pub formality: Formality,
}

/// Rewrites email text at a formality level.
#[async_trait]
pub trait EmailRewriter: Send + Sync {
    async fn rewrite(&self, text: &str, formality: Formality) -> Result<String, Error>;
}

/// `EmailRewriter` that asks an LLM.
pub struct LlmEmailRewriter {
    llm: Arc<dyn LlmProvider>,
}

impl LlmEmailRewriter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl EmailRewriter for LlmEmailRewriter {
    async fn rewrite(&self, text: &str, formality: Formality) -> Result<String, Error> {
        let user = EMAIL_REWRITE_USER.render(&[("formality", formality.as_str()), ("email", text)])?;
        let request = CompletionRequest::new(vec![
            ChatMessage::system(EMAIL_REWRITE_SYSTEM.text),
            ChatMessage::user(user),
        ]);
        let response = self.llm.complete(request).await?;
        Ok(response.content.trim().to_string())
    }
}

/// Rewrites the text, shows it, and offers the next action.
pub struct EmailComposerDialog {
    rewriter: Arc<dyn EmailRewriter>,
}

impl EmailComposerDialog {
    pub fn new(rewriter: Arc<dyn EmailRewriter>) -> Self {
        Self { rewriter }
    }

    fn next_actions() -> Result<ChoiceSet, DialogError> {
        ChoiceSet::new(vec![
            Choice::new("done").with_synonyms(["All good"]),
            Choice::new("formal").with_synonyms(["make it formal"]),
            Choice::new("friendly").with_synonyms(["make it friendly"]),
            Choice::new(TRY_AGAIN).with_synonyms(["Try again"]),
        ])
    }
}

#[async_trait]
impl Dialog for EmailComposerDialog {
    fn id(&self) -> &'static str {
        EMAIL_COMPOSER
    }

    fn step_count(&self) -> usize {
        2
    }

    async fn run_step(&self, index: usize, ctx: &mut StepContext<'_>) -> Result<StepResult, Error> {
        match index {
            0 => {
                let details: EmailDetails = ctx.options_as()?;
                info!(
                    conversation = ctx.turn.conversation(),
                    formality = %details.formality,
                    "Rewriting email"
                );
                let rewritten = self
                    .rewriter
                    .rewrite(&details.user_text, details.formality)
                    .await?;
                ctx.send(rewritten).await?;
                Ok(StepResult::choice_prompt(
                    "What to do next?",
                    INVALID_CHOICE,
                    Self::next_actions()?,
                ))
            }
            _ => {
                let action = ctx.choice()?.value.clone();
                match action.as_str() {
                    TRY_AGAIN => Ok(StepResult::End(Some(Value::String(action)))),
                    "done" => Ok(StepResult::end()),
                    other => {
                        let formality: Formality =
                            other.parse().map_err(|_| DialogError::UnexpectedInput {
                                dialog: EMAIL_COMPOSER.to_string(),
                                step: index,
                                expected: "next action",
                            })?;
                        let mut details: EmailDetails = ctx.options_as()?;
                        details.formality = formality;
                        Ok(StepResult::replace(EMAIL_COMPOSER, json!(details)))
                    }
                }
            }
        }
    }
}

/// Asks for the email idea and hands it to the composer.
pub struct EmailIntakeDialog;

#[async_trait]
impl Dialog for EmailIntakeDialog {
    fn id(&self) -> &'static str {
        EMAIL_INTAKE
    }

    fn step_count(&self) -> usize {
        3
    }

    async fn run_step(&self, index: usize, ctx: &mut StepContext<'_>) -> Result<StepResult, Error> {
        match index {
            0 => Ok(StepResult::text_prompt("Please enter your email idea.")),
            1 => {
                let details = EmailDetails {
                    user_text: ctx.text()?.to_string(),
                    formality: Formality::Neutral,
                };
                Ok(StepResult::begin(EMAIL_COMPOSER, json!(details)))
            }
            _ => {
                if ctx.value().and_then(Value::as_str) == Some(TRY_AGAIN) {
                    Ok(StepResult::replace(EMAIL_INTAKE, Value::Null))
                } else {
                    Ok(StepResult::end())
                }
            }
        }
    }
}
