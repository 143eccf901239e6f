//! REPL input parsing.

use tally_cost::TurnId;
use thiserror::Error;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a prompt to the model
    Submit(String),
    /// Send the last failed prompt again
    Retry,
    /// Replace the text of a message
    Edit { id: TurnId, text: String },
    /// Remove a message
    Delete(TurnId),
    /// Show (`None`) or switch the active model
    Model(Option<String>),
    /// List the model table
    Models,
    /// Per-message token breakdown
    Usage,
    /// Print the conversation
    History,
    /// Remove every message
    Clear,
    /// Command reference
    Help,
    /// Exit the REPL
    Quit,
    /// Blank line
    Empty,
}

/// Input that could not be turned into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '/{0}', type /help for the list")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a message number; use the #number shown in /history")]
    InvalidId(String),
}

impl Command {
    /// Parse one input line.
    ///
    /// Lines not starting with `/` are prompts, sent as typed. Message numbers
    /// must be positive and may carry a leading `#`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Command::Empty);
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Ok(Command::Submit(line.trim_end_matches(['\r', '\n']).to_string()));
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        match name {
            "edit" | "e" => {
                let (id, text) = args
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::Usage("/edit <id> <new text>"))?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(CommandError::Usage("/edit <id> <new text>"));
                }
                Ok(Command::Edit {
                    id: parse_id(id)?,
                    text: text.to_string(),
                })
            }
            "delete" | "del" | "d" => {
                if args.is_empty() || args.contains(char::is_whitespace) {
                    return Err(CommandError::Usage("/delete <id>"));
                }
                Ok(Command::Delete(parse_id(args)?))
            }
            "retry" | "r" => Ok(Command::Retry),
            "model" => Ok(Command::Model((!args.is_empty()).then(|| args.to_string()))),
            "models" => Ok(Command::Models),
            "usage" | "tokens" => Ok(Command::Usage),
            "history" | "h" => Ok(Command::History),
            "clear" => Ok(Command::Clear),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn parse_id(raw: &str) -> Result<TurnId, CommandError> {
    let digits = raw.strip_prefix('#').unwrap_or(raw);
    match digits.parse::<u64>() {
        Ok(n) if n > 0 => Ok(TurnId(n)),
        _ => Err(CommandError::InvalidId(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_prompt() {
        assert_eq!(
            Command::parse("  What is Rust?\n").unwrap(),
            Command::Submit("  What is Rust?".into())
        );
        assert_eq!(Command::parse("   ").unwrap(), Command::Empty);
    }

    #[test]
    fn test_edit() {
        assert_eq!(
            Command::parse("/edit 3 shorter question").unwrap(),
            Command::Edit {
                id: TurnId(3),
                text: "shorter question".into()
            }
        );
        assert_eq!(
            Command::parse("/edit #12   x").unwrap(),
            Command::Edit {
                id: TurnId(12),
                text: "x".into()
            }
        );
        assert!(matches!(Command::parse("/edit 3"), Err(CommandError::Usage(_))));
        assert!(matches!(Command::parse("/edit"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_delete() {
        assert_eq!(Command::parse("/delete 2").unwrap(), Command::Delete(TurnId(2)));
        assert_eq!(Command::parse("/d #2").unwrap(), Command::Delete(TurnId(2)));
        assert!(matches!(Command::parse("/delete"), Err(CommandError::Usage(_))));
        assert!(matches!(Command::parse("/delete 1 2"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_non_positive_ids_are_rejected() {
        for input in ["/delete 0", "/delete -1", "/delete two", "/edit -3 text", "/edit 0 text"] {
            assert!(
                matches!(Command::parse(input), Err(CommandError::InvalidId(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_model() {
        assert_eq!(Command::parse("/model").unwrap(), Command::Model(None));
        assert_eq!(
            Command::parse("/model gpt-4").unwrap(),
            Command::Model(Some("gpt-4".into()))
        );
        assert_eq!(Command::parse("/models").unwrap(), Command::Models);
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("/retry").unwrap(), Command::Retry);
        assert_eq!(Command::parse("/usage").unwrap(), Command::Usage);
        assert_eq!(Command::parse("/history").unwrap(), Command::History);
        assert_eq!(Command::parse("/clear").unwrap(), Command::Clear);
        assert_eq!(Command::parse("/help").unwrap(), Command::Help);
        assert_eq!(Command::parse("/quit").unwrap(), Command::Quit);
        assert_eq!(Command::parse("/exit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("/frobnicate now"),
            Err(CommandError::Unknown("frobnicate".into()))
        );
    }
}
