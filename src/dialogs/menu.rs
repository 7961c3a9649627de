//! Main menu: routes the user to one of the helpers.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::dialogs::choice::{Choice, ChoiceSet};
use crate::dialogs::context::StepContext;
use crate::dialogs::email::EMAIL_INTAKE;
use crate::dialogs::waterfall::{Dialog, StepResult};
use crate::dialogs::web_qa::WEB_QA;
use crate::error::{DialogError, Error};

pub const MAIN_MENU: &str = "main_menu";

pub struct MainMenuDialog {
    web_qa_enabled: bool,
}

impl MainMenuDialog {
    pub fn new(web_qa_enabled: bool) -> Self {
        Self { web_qa_enabled }
    }

    fn options(&self) -> Result<ChoiceSet, DialogError> {
        let mut choices = vec![Choice::new("email").with_synonyms(["email helper"])];
        if self.web_qa_enabled {
            choices.push(Choice::new("web").with_synonyms(["website helper"]));
        }
        ChoiceSet::new(choices)
    }
}

#[async_trait]
impl Dialog for MainMenuDialog {
    fn id(&self) -> &'static str {
        MAIN_MENU
    }

    fn step_count(&self) -> usize {
        3
    }

    async fn run_step(&self, index: usize, ctx: &mut StepContext<'_>) -> Result<StepResult, Error> {
        match index {
            0 => Ok(StepResult::choice_prompt(
                "What do you want to do?",
                "That was not a valid choice, try again",
                self.options()?,
            )),
            1 => {
                let selection = ctx.choice()?.value.clone();
                info!(conversation = ctx.turn.conversation(), selection = %selection, "Menu selection");
                match selection.as_str() {
                    "email" => Ok(StepResult::begin(EMAIL_INTAKE, Value::Null)),
                    "web" => Ok(StepResult::begin(WEB_QA, Value::Null)),
                    _ => Ok(StepResult::end()),
                }
            }
            _ => {
                ctx.send("Type anything to see more options.").await?;
                Ok(StepResult::end())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dialogs::context::TurnContext;
    use crate::dialogs::stack::DialogStack;
    use crate::dialogs::waterfall::{DialogSet, DialogTurnStatus};

    /// Stand-in helper that ends as soon as it is begun.
    struct Instant(&'static str);

    #[async_trait]
    impl Dialog for Instant {
        fn id(&self) -> &'static str {
            self.0
        }

        fn step_count(&self) -> usize {
            1
        }

        async fn run_step(&self, _index: usize, ctx: &mut StepContext<'_>) -> Result<StepResult, Error> {
            ctx.send(format!("in {}", self.0)).await?;
            Ok(StepResult::end())
        }
    }

    fn set(web_qa_enabled: bool) -> DialogSet {
        let mut set = DialogSet::new();
        set.add(Arc::new(MainMenuDialog::new(web_qa_enabled)))
            .add(Arc::new(Instant(EMAIL_INTAKE)))
            .add(Arc::new(Instant(WEB_QA)));
        set
    }

    #[tokio::test]
    async fn lists_only_email_by_default() {
        let set = set(false);
        let mut stack = DialogStack::new();
        let mut turn = TurnContext::new("m");
        set.begin(&mut stack, &mut turn, MAIN_MENU, Value::Null).await.unwrap();
        assert_eq!(turn.sent(), ["What do you want to do?\n1. email helper"]);
    }

    #[tokio::test]
    async fn web_option_when_enabled() {
        let set = set(true);
        let mut stack = DialogStack::new();
        let mut turn = TurnContext::new("m");
        set.begin(&mut stack, &mut turn, MAIN_MENU, Value::Null).await.unwrap();
        assert_eq!(
            turn.sent(),
            ["What do you want to do?\n1. email helper\n2. website helper"]
        );

        let mut turn = TurnContext::new("m");
        set.continue_turn(&mut stack, &mut turn, "website helper").await.unwrap();
        assert_eq!(turn.sent(), ["in web_qa", "Type anything to see more options."]);
    }

    #[tokio::test]
    async fn no_match_reprompts_and_keeps_waiting() {
        let set = set(false);
        let mut stack = DialogStack::new();
        set.begin(&mut stack, &mut TurnContext::new("m"), MAIN_MENU, Value::Null)
            .await
            .unwrap();

        let mut turn = TurnContext::new("m");
        let status = set.continue_turn(&mut stack, &mut turn, "weather").await.unwrap();

        assert_eq!(status, DialogTurnStatus::Waiting);
        assert_eq!(
            turn.sent(),
            ["That was not a valid choice, try again\n1. email helper"]
        );
        assert_eq!(stack.active().unwrap().step, 1);
    }

    #[tokio::test]
    async fn web_is_not_selectable_when_disabled() {
        let set = set(false);
        let mut stack = DialogStack::new();
        set.begin(&mut stack, &mut TurnContext::new("m"), MAIN_MENU, Value::Null)
            .await
            .unwrap();

        let mut turn = TurnContext::new("m");
        set.continue_turn(&mut stack, &mut turn, "web").await.unwrap();
        assert!(turn.sent()[0].starts_with("That was not a valid choice"));
    }

    #[tokio::test]
    async fn helper_end_returns_to_menu_tail() {
        let set = set(false);
        let mut stack = DialogStack::new();
        set.begin(&mut stack, &mut TurnContext::new("m"), MAIN_MENU, Value::Null)
            .await
            .unwrap();

        let mut turn = TurnContext::new("m");
        let status = set.continue_turn(&mut stack, &mut turn, "EMAIL").await.unwrap();

        assert_eq!(turn.sent(), ["in email_intake", "Type anything to see more options."]);
        assert_eq!(status, DialogTurnStatus::Complete(None));
        assert!(stack.is_empty());
    }
}
