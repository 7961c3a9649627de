//! Waterfall engine: runs registered dialogs as ordered step lists over a
//! persisted `DialogStack`.
//!
//! A step either suspends on a prompt, advances with a value, begins a
//! child dialog, ends its own dialog, or replaces it. Everything except a
//! prompt keeps running within the same turn.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::dialogs::choice::ChoiceSet;
use crate::dialogs::context::{StepContext, StepInput, TurnContext};
use crate::dialogs::stack::{DialogFrame, DialogStack, PendingPrompt};
use crate::error::{DialogError, Error};

/// What a step wants to happen next.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// Ask the user something and suspend until they reply.
    Prompt(PendingPrompt),
    /// Run the next step right away with this value.
    Next(Option<Value>),
    /// Start a child dialog; this dialog resumes at its next step when the
    /// child ends, receiving the child's end value.
    Begin { dialog_id: String, options: Value },
    /// Finish this dialog, handing `value` to the parent.
    End(Option<Value>),
    /// Swap this dialog for a fresh instance of `dialog_id`.
    Replace { dialog_id: String, options: Value },
}

impl StepResult {
    pub fn text_prompt(text: impl Into<String>) -> Self {
        Self::Prompt(PendingPrompt::Text { text: text.into() })
    }

    pub fn choice_prompt(
        text: impl Into<String>,
        retry: impl Into<String>,
        choices: ChoiceSet,
    ) -> Self {
        Self::Prompt(PendingPrompt::Choice {
            text: text.into(),
            retry: retry.into(),
            choices,
        })
    }

    pub fn begin(dialog_id: &str, options: Value) -> Self {
        Self::Begin {
            dialog_id: dialog_id.to_string(),
            options,
        }
    }

    pub fn replace(dialog_id: &str, options: Value) -> Self {
        Self::Replace {
            dialog_id: dialog_id.to_string(),
            options,
        }
    }

    pub fn end() -> Self {
        Self::End(None)
    }
}

/// A registered unit of conversation logic.
///
/// Implementations hold only shared collaborators; anything specific to
/// one conversation lives in the frame (`StepContext::options` / `values`).
#[async_trait]
pub trait Dialog: Send + Sync {
    /// Stable id used for registration and in persisted frames.
    fn id(&self) -> &'static str;

    /// Number of steps; indices `0..step_count()` are valid.
    fn step_count(&self) -> usize;

    /// Run step `index`.
    async fn run_step(&self, index: usize, ctx: &mut StepContext<'_>) -> Result<StepResult, Error>;
}

/// Outcome of driving the stack for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogTurnStatus {
    /// A frame is suspended on a prompt.
    Waiting,
    /// The outermost dialog ended with this value; the stack is empty.
    Complete(Option<Value>),
}

/// Registry of dialogs plus the step-driving engine.
#[derive(Default, Clone)]
pub struct DialogSet {
    dialogs: HashMap<&'static str, Arc<dyn Dialog>>,
}

impl DialogSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialog. A dialog with the same id is replaced.
    pub fn add(&mut self, dialog: Arc<dyn Dialog>) -> &mut Self {
        self.dialogs.insert(dialog.id(), dialog);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dialogs.contains_key(id)
    }

    fn get(&self, id: &str) -> Result<&Arc<dyn Dialog>, DialogError> {
        self.dialogs
            .get(id)
            .ok_or_else(|| DialogError::UnknownDialog { id: id.to_string() })
    }

    /// Push a new frame for `dialog_id` and run it until it suspends or the
    /// stack empties.
    pub async fn begin(
        &self,
        stack: &mut DialogStack,
        turn: &mut TurnContext,
        dialog_id: &str,
        options: Value,
    ) -> Result<DialogTurnStatus, Error> {
        self.get(dialog_id)?;
        info!(conversation = turn.conversation(), dialog = dialog_id, "Beginning dialog");
        stack.push(DialogFrame::new(dialog_id, options));
        self.drive(stack, turn, StepInput::None).await
    }

    /// Feed a user reply to the active frame.
    ///
    /// A reply that does not satisfy the pending prompt is answered with the
    /// retry prompt and leaves the stack untouched.
    pub async fn continue_turn(
        &self,
        stack: &mut DialogStack,
        turn: &mut TurnContext,
        utterance: &str,
    ) -> Result<DialogTurnStatus, Error> {
        let Some(frame) = stack.active_mut() else {
            return Ok(DialogTurnStatus::Complete(None));
        };
        let Some(prompt) = frame.prompt.clone() else {
            return Err(DialogError::NotWaiting {
                dialog: frame.dialog_id.clone(),
            }
            .into());
        };

        let input = match &prompt {
            PendingPrompt::Text { .. } => {
                let text = utterance.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(StepInput::Text(text.to_string()))
                }
            }
            PendingPrompt::Choice { choices, .. } => {
                choices.resolve(utterance).map(StepInput::Choice)
            }
        };

        let Some(input) = input else {
            debug!(dialog = %frame.dialog_id, "Reply did not satisfy prompt, re-prompting");
            turn.send_activity(prompt.render_retry()).await?;
            return Ok(DialogTurnStatus::Waiting);
        };

        frame.prompt = None;
        self.drive(stack, turn, input).await
    }

    /// Run steps of the active frame until something suspends or the stack
    /// is empty.
    async fn drive(
        &self,
        stack: &mut DialogStack,
        turn: &mut TurnContext,
        mut input: StepInput,
    ) -> Result<DialogTurnStatus, Error> {
        loop {
            let Some(frame) = stack.active_mut() else {
                return Ok(DialogTurnStatus::Complete(step_value(input)));
            };
            let dialog = Arc::clone(self.get(&frame.dialog_id)?);
            let index = frame.step;

            let result = if index >= dialog.step_count() {
                StepResult::End(step_value(input))
            } else {
                debug!(dialog = dialog.id(), step = index, "Running step");
                let mut ctx = StepContext {
                    turn: &mut *turn,
                    dialog_id: dialog.id(),
                    index,
                    options: &frame.options,
                    values: &mut frame.values,
                    input,
                };
                dialog.run_step(index, &mut ctx).await?
            };

            match result {
                StepResult::Prompt(prompt) => {
                    frame.step = index + 1;
                    let text = prompt.render();
                    frame.prompt = Some(prompt);
                    turn.send_activity(text).await?;
                    return Ok(DialogTurnStatus::Waiting);
                }
                StepResult::Next(value) => {
                    frame.step = index + 1;
                    input = StepInput::Value(value);
                }
                StepResult::Begin { dialog_id, options } => {
                    self.get(&dialog_id)?;
                    frame.step = index + 1;
                    debug!(parent = dialog.id(), child = %dialog_id, "Beginning child dialog");
                    stack.push(DialogFrame::new(dialog_id, options));
                    input = StepInput::None;
                }
                StepResult::End(value) => {
                    stack.pop();
                    debug!(dialog = dialog.id(), remaining = stack.depth(), "Dialog ended");
                    input = StepInput::Value(value);
                }
                StepResult::Replace { dialog_id, options } => {
                    self.get(&dialog_id)?;
                    stack.pop();
                    debug!(from = dialog.id(), to = %dialog_id, "Replacing dialog");
                    stack.push(DialogFrame::new(dialog_id, options));
                    input = StepInput::None;
                }
            }
        }
    }
}

fn step_value(input: StepInput) -> Option<Value> {
    match input {
        StepInput::Value(value) => value,
        StepInput::Text(text) => Some(Value::String(text)),
        StepInput::Choice(found) => Some(Value::String(found.value)),
        StepInput::None => None,
    }
}
