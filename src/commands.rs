//! Slash commands recognized before input reaches the dialogs.

/// Parses user input into a `Command`.
pub struct CommandParser;

impl CommandParser {
    /// Parse message content. Anything that is not a known command is
    /// passed through untouched as `Command::Message`.
    pub fn parse(content: &str) -> Command {
        let lower = content.trim().to_lowercase();

        match lower.as_str() {
            "/reset" | "/restart" | "/cancel" => Command::Reset,
            "/help" | "/?" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Message {
                content: content.to_string(),
            },
        }
    }
}

/// What the host should do with an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Input for the active dialog.
    Message { content: String },

    /// Drop the dialog stack and show the main menu again.
    Reset,

    /// Show the command list.
    Help,

    /// Stop the bot. Honoured only on the console channel.
    Quit,
}

pub const HELP_TEXT: &str = "Commands:
/reset   start over from the main menu
/help    show this list
/quit    stop the bot (console only)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        let command = CommandParser::parse("  email helper ");
        assert_eq!(
            command,
            Command::Message {
                content: "  email helper ".to_string()
            }
        );
    }

    #[test]
    fn reset_aliases() {
        for input in ["/reset", "/RESTART", " /cancel "] {
            assert_eq!(CommandParser::parse(input), Command::Reset, "{input}");
        }
    }

    #[test]
    fn help_and_quit() {
        assert_eq!(CommandParser::parse("/help"), Command::Help);
        assert_eq!(CommandParser::parse("/?"), Command::Help);
        assert_eq!(CommandParser::parse("/quit"), Command::Quit);
        assert_eq!(CommandParser::parse(" /EXIT "), Command::Quit);
    }

    #[test]
    fn unknown_slash_command_is_a_message() {
        assert!(matches!(
            CommandParser::parse("/weather"),
            Command::Message { content } if content == "/weather"
        ));
    }
}
