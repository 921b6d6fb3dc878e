//! Turning operator keyboard input into protocol lines

use iot_shared::codec::{self, CodecError};
use iot_shared::{Command, CommandKind};

/// What the server is currently waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// A menu selection
    Command,
    /// The answer to an "Enter ..." prompt
    Param,
}

impl Expect {
    /// Update the expectation from text the server just sent
    pub fn after_server_text(self, text: &str) -> Self {
        if text.contains("Select:") {
            Expect::Command
        } else if text.contains("Enter ") {
            Expect::Param
        } else {
            self
        }
    }
}

/// A line ready to be sent
#[derive(Debug, PartialEq, Eq)]
pub struct Outgoing {
    pub wire: String,
    pub is_exit: bool,
}

/// Validate an input line and render it for the wire
pub fn to_wire(line: &str, expect: Expect) -> Result<Outgoing, CodecError> {
    match expect {
        Expect::Param => Ok(Outgoing {
            wire: format!("{}\n", codec::parse_param_line(line)),
            is_exit: false,
        }),
        Expect::Command => {
            let command: Command = codec::parse_command_line(line)?;
            Ok(Outgoing {
                wire: codec::encode_command(&command),
                is_exit: command.kind == CommandKind::Exit,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_selection_is_normalized() {
        let out = to_wire(" 3 ", Expect::Command).expect("valid");
        assert_eq!(out.wire, "3 0 0\n");
        assert!(!out.is_exit);

        let out = to_wire("0", Expect::Command).expect("valid");
        assert!(out.is_exit);
    }

    #[test]
    fn test_bad_selection_is_not_sent() {
        assert!(matches!(
            to_wire("twelve", Expect::Command),
            Err(CodecError::InvalidFormat(_))
        ));
        assert_eq!(
            to_wire("12", Expect::Command),
            Err(CodecError::UnknownCommand(12))
        );
    }

    #[test]
    fn test_prompt_answer_sent_as_number() {
        let out = to_wire("15", Expect::Param).expect("valid");
        assert_eq!(out.wire, "15\n");
        let out = to_wire("loud", Expect::Param).expect("valid");
        assert_eq!(out.wire, "0\n");
    }

    #[test]
    fn test_expectation_follows_server_prompts() {
        let expect = Expect::Command.after_server_text("Enter brightness level (1-3): ");
        assert_eq!(expect, Expect::Param);
        let expect = expect.after_server_text("[SUCCESS] Brightness set to 2\n");
        assert_eq!(expect, Expect::Param);
        let expect = expect.after_server_text(codec::MENU);
        assert_eq!(expect, Expect::Command);
    }
}
