//! Dialog engine and the bot's dialogs.
//!
//! A conversation is a `DialogStack` of frames. The `DialogSet` runs the
//! active frame's steps until one of them prompts the user; the stack is
//! then persisted by the host until the next message arrives.

pub mod choice;
pub mod context;
pub mod email;
pub mod menu;
pub mod stack;
pub mod waterfall;
pub mod web_qa;

pub use choice::{Choice, ChoiceSet, FoundChoice};
pub use context::{ActivitySender, StepContext, StepInput, TurnContext};
pub use email::{
    EMAIL_COMPOSER, EMAIL_INTAKE, EmailComposerDialog, EmailDetails, EmailIntakeDialog,
    EmailRewriter, Formality, LlmEmailRewriter,
};
pub use menu::{MAIN_MENU, MainMenuDialog};
pub use stack::{DialogFrame, DialogStack, PendingPrompt};
pub use waterfall::{Dialog, DialogSet, DialogTurnStatus, StepResult};
pub use web_qa::{WEB_QA, WebQaDialog};
