//! Per-conversation dialog stack.
//!
//! The stack is the whole conversation state: it is restored before each
//! turn and persisted after it. The innermost (last) frame is the only one
//! accepting input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dialogs::choice::ChoiceSet;

/// An open question a suspended frame is waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingPrompt {
    /// Any non-empty text is accepted.
    Text { text: String },
    /// The reply must resolve against `choices`; otherwise `retry` is sent.
    Choice {
        text: String,
        retry: String,
        choices: ChoiceSet,
    },
}

impl PendingPrompt {
    /// The message that was (or will be) shown for this prompt.
    pub fn render(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Choice { text, choices, .. } => choices.render(text),
        }
    }

    /// The message shown after an unrecognized reply.
    pub fn render_retry(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Choice { retry, choices, .. } => choices.render(retry),
        }
    }
}

/// One running dialog within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogFrame {
    pub dialog_id: String,
    /// Index of the step that runs when this frame is next resumed.
    pub step: usize,
    /// Entry options supplied by whoever began the dialog.
    #[serde(default)]
    pub options: Value,
    /// Scratch state carried between steps of this frame.
    #[serde(default)]
    pub values: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PendingPrompt>,
}

impl DialogFrame {
    pub fn new(dialog_id: impl Into<String>, options: Value) -> Self {
        Self {
            dialog_id: dialog_id.into(),
            step: 0,
            options,
            values: Map::new(),
            prompt: None,
        }
    }
}

/// Ordered stack of frames, innermost last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogStack {
    frames: Vec<DialogFrame>,
}

impl DialogStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[DialogFrame] {
        &self.frames
    }

    /// The active frame.
    pub fn active(&self) -> Option<&DialogFrame> {
        self.frames.last()
    }

    pub fn active_mut(&mut self) -> Option<&mut DialogFrame> {
        self.frames.last_mut()
    }

    pub fn push(&mut self, frame: DialogFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<DialogFrame> {
        self.frames.pop()
    }

    /// Drop every frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Ids from outermost to innermost, for logging.
    pub fn path(&self) -> String {
        self.frames
            .iter()
            .map(|f| f.dialog_id.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogs::choice::Choice;

    #[test]
    fn push_pop_and_active() {
        let mut stack = DialogStack::new();
        assert!(stack.active().is_none());

        stack.push(DialogFrame::new("main_menu", Value::Null));
        stack.push(DialogFrame::new("email_intake", Value::Null));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.active().unwrap().dialog_id, "email_intake");
        assert_eq!(stack.path(), "main_menu > email_intake");

        stack.pop();
        assert_eq!(stack.active().unwrap().dialog_id, "main_menu");
    }

    #[test]
    fn persisted_form_restores_waiting_frame() {
        let mut stack = DialogStack::new();
        let mut frame = DialogFrame::new("email_composer", serde_json::json!({"user_text": "hi"}));
        frame.step = 1;
        frame.prompt = Some(PendingPrompt::Choice {
            text: "What to do next?".into(),
            retry: "That was not a valid choice, try again".into(),
            choices: ChoiceSet::new(vec![Choice::new("done")]).unwrap(),
        });
        stack.push(frame);

        let json = serde_json::to_value(&stack).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["prompt"]["kind"], "choice");

        let restored: DialogStack = serde_json::from_value(json).unwrap();
        assert_eq!(restored, stack);
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = serde_json::json!([{"dialog_id": "main_menu", "step": 0}]);
        let stack: DialogStack = serde_json::from_value(json).unwrap();
        let frame = stack.active().unwrap();
        assert!(frame.values.is_empty());
        assert!(frame.prompt.is_none());
        assert_eq!(frame.options, Value::Null);
    }

    #[test]
    fn retry_render_uses_retry_text() {
        let prompt = PendingPrompt::Choice {
            text: "Pick".into(),
            retry: "Try again".into(),
            choices: ChoiceSet::new(vec![Choice::new("a")]).unwrap(),
        };
        assert_eq!(prompt.render(), "Pick\n1. a");
        assert_eq!(prompt.render_retry(), "Try again\n1. a");
    }
}
