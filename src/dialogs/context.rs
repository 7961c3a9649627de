//! Turn and step contexts handed to dialog steps.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::dialogs::choice::FoundChoice;
use crate::error::{ChannelError, DialogError, Error};

/// Delivers outbound messages to the user while a turn is still running,
/// so progress messages arrive before slow steps finish.
#[async_trait]
pub trait ActivitySender: Send + Sync {
    async fn send_activity(&self, text: &str) -> Result<(), ChannelError>;
}

/// State for a single inbound message.
pub struct TurnContext {
    conversation: String,
    sender: Option<Arc<dyn ActivitySender>>,
    sent: Vec<String>,
}

impl TurnContext {
    pub fn new(conversation: impl Into<String>) -> Self {
        Self {
            conversation: conversation.into(),
            sender: None,
            sent: Vec::new(),
        }
    }

    pub fn with_sender(mut self, sender: Arc<dyn ActivitySender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn conversation(&self) -> &str {
        &self.conversation
    }

    /// Record an outbound message and deliver it if a sender is attached.
    pub async fn send_activity(&mut self, text: impl Into<String>) -> Result<(), ChannelError> {
        let text = text.into();
        if let Some(sender) = &self.sender {
            sender.send_activity(&text).await?;
        }
        self.sent.push(text);
        Ok(())
    }

    /// Everything sent during this turn, in order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub fn into_sent(self) -> Vec<String> {
        self.sent
    }
}

/// What a step receives as the "previous result".
#[derive(Debug, Clone, PartialEq)]
pub enum StepInput {
    /// First step of a freshly begun dialog; read `StepContext::options`.
    None,
    /// Reply to a text prompt.
    Text(String),
    /// Reply to a choice prompt.
    Choice(FoundChoice),
    /// Value from the previous step's `Next`, or a child dialog's `End`.
    Value(Option<Value>),
}

/// Everything one step may read or change.
pub struct StepContext<'a> {
    pub turn: &'a mut TurnContext,
    pub dialog_id: &'a str,
    pub index: usize,
    pub options: &'a Value,
    pub values: &'a mut Map<String, Value>,
    pub input: StepInput,
}

impl StepContext<'_> {
    /// Send a message to the user.
    pub async fn send(&mut self, text: impl Into<String>) -> Result<(), Error> {
        self.turn.send_activity(text).await?;
        Ok(())
    }

    /// The reply to a text prompt.
    pub fn text(&self) -> Result<&str, DialogError> {
        match &self.input {
            StepInput::Text(text) => Ok(text),
            _ => Err(self.unexpected("text")),
        }
    }

    /// The reply to a choice prompt.
    pub fn choice(&self) -> Result<&FoundChoice, DialogError> {
        match &self.input {
            StepInput::Choice(found) => Ok(found),
            _ => Err(self.unexpected("choice")),
        }
    }

    /// The value handed over by the previous step or an ended child.
    pub fn value(&self) -> Option<&Value> {
        match &self.input {
            StepInput::Value(value) => value.as_ref(),
            _ => None,
        }
    }

    /// Deserialize the entry options.
    pub fn options_as<T: DeserializeOwned>(&self) -> Result<T, DialogError> {
        serde_json::from_value(self.options.clone()).map_err(|e| DialogError::MalformedOptions {
            dialog: self.dialog_id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Store scratch state for later steps of this frame.
    pub fn set_value<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), DialogError> {
        let json = serde_json::to_value(value).map_err(|e| self.state_error(key, e))?;
        self.values.insert(key.to_string(), json);
        Ok(())
    }

    /// Remove and deserialize scratch state stored by an earlier step.
    pub fn take_value<T: DeserializeOwned>(&mut self, key: &str) -> Result<T, DialogError> {
        let json = self.values.remove(key).ok_or_else(|| DialogError::State {
            dialog: self.dialog_id.to_string(),
            key: key.to_string(),
            reason: "missing".to_string(),
        })?;
        serde_json::from_value(json).map_err(|e| self.state_error(key, e))
    }

    fn unexpected(&self, expected: &'static str) -> DialogError {
        DialogError::UnexpectedInput {
            dialog: self.dialog_id.to_string(),
            step: self.index,
            expected,
        }
    }

    fn state_error(&self, key: &str, e: serde_json::Error) -> DialogError {
        DialogError::State {
            dialog: self.dialog_id.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl ActivitySender for Recorder {
        async fn send_activity(&self, text: &str) -> Result<(), ChannelError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl ActivitySender for Broken {
        async fn send_activity(&self, _text: &str) -> Result<(), ChannelError> {
            Err(ChannelError::SendFailed {
                name: "test".into(),
                reason: "offline".into(),
            })
        }
    }

    #[tokio::test]
    async fn send_records_and_forwards() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut turn = TurnContext::new("c1").with_sender(recorder.clone());
        turn.send_activity("one").await.unwrap();
        turn.send_activity("two").await.unwrap();

        assert_eq!(turn.sent(), ["one", "two"]);
        assert_eq!(*recorder.0.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn failed_delivery_is_not_recorded() {
        let mut turn = TurnContext::new("c1").with_sender(Arc::new(Broken));
        assert!(turn.send_activity("lost").await.is_err());
        assert!(turn.sent().is_empty());
    }

    #[test]
    fn accessors_check_input_kind() {
        let mut turn = TurnContext::new("c1");
        let options = serde_json::json!({"n": 3});
        let mut values = Map::new();
        let ctx = StepContext {
            turn: &mut turn,
            dialog_id: "d",
            index: 2,
            options: &options,
            values: &mut values,
            input: StepInput::Text("hello".into()),
        };

        assert_eq!(ctx.text().unwrap(), "hello");
        assert!(matches!(
            ctx.choice().unwrap_err(),
            DialogError::UnexpectedInput { step: 2, expected: "choice", .. }
        ));
        assert!(ctx.value().is_none());
    }

    #[test]
    fn values_round_trip_and_are_consumed() {
        let mut turn = TurnContext::new("c1");
        let options = Value::Null;
        let mut values = Map::new();
        let mut ctx = StepContext {
            turn: &mut turn,
            dialog_id: "d",
            index: 0,
            options: &options,
            values: &mut values,
            input: StepInput::None,
        };

        ctx.set_value("count", &7u32).unwrap();
        assert_eq!(ctx.take_value::<u32>("count").unwrap(), 7);
        assert!(matches!(
            ctx.take_value::<u32>("count").unwrap_err(),
            DialogError::State { .. }
        ));
    }

    #[test]
    fn malformed_options_reported() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            user_text: String,
        }

        let mut turn = TurnContext::new("c1");
        let options = Value::Null;
        let mut values = Map::new();
        let ctx = StepContext {
            turn: &mut turn,
            dialog_id: "email_composer",
            index: 0,
            options: &options,
            values: &mut values,
            input: StepInput::None,
        };

        let err = ctx.options_as::<Needs>().unwrap_err();
        assert!(matches!(err, DialogError::MalformedOptions { dialog, .. } if dialog == "email_composer"));
    }
}
