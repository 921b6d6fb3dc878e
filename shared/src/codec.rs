//! Line-oriented text codec for the operator protocol
//!
//! The operator and the server exchange plain text:
//! ```text
//! server -> operator : welcome, menu ("Select: "), prompts, "[SUCCESS] ..." / "[ERROR] ..."
//! operator -> server : "<kind> [param1] [param2]\n"
//! ```
//!
//! Input lines are split on `\n`; a trailing `\r` is stripped.

use bytes::{Buf, BytesMut};
use thiserror::Error;

use crate::limits::MAX_LINE_LENGTH;
use crate::{Command, CommandKind, CommandResponse, ResponseStatus};

pub const WELCOME: &str = "Connected to IoT Device Control Server\n";

pub const BUSY: &str = "Server busy - another client is connected\n";

pub const GOODBYE: &str = "Disconnecting...\n";

pub const MENU: &str = "\n[ Device Control Menu ]\n\
1. LED ON\n\
2. LED OFF\n\
3. Set Brightness\n\
4. BUZZER ON (play melody)\n\
5. BUZZER OFF (stop)\n\
6. SENSOR ON (start light monitoring)\n\
7. SENSOR OFF (stop light monitoring)\n\
8. SEGMENT DISPLAY (show digit and count down)\n\
9. SEGMENT STOP (abort countdown)\n\
0. Exit\n\
Select: ";

pub const INVALID_FORMAT: &str = "[ERROR] Invalid command format\n";
pub const UNKNOWN_COMMAND: &str = "[ERROR] Unknown command\n";
pub const QUEUE_FULL: &str = "[ERROR] Command queue full\n";
pub const COMMAND_TIMEOUT: &str = "[ERROR] Command timeout\n";
pub const SHUTTING_DOWN: &str = "[ERROR] Server shutting down\n";

/// Errors that can occur while decoding operator input
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid command format: {0:?}")]
    InvalidFormat(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(i32),

    #[error("Line too long: {0} bytes (max: {MAX_LINE_LENGTH})")]
    LineTooLong(usize),
}

/// Secondary prompt for a command whose first parameter was omitted
pub fn param_prompt(kind: CommandKind) -> Option<&'static str> {
    match kind {
        CommandKind::SetBrightness => Some("Enter brightness level (1-3): "),
        CommandKind::BuzzerOn => Some(
            "Enter music number (1:School Bell, 2:Twinkle Star, 3:Happy Birthday, 4:Butterfly): ",
        ),
        CommandKind::SegmentDisplay => Some("Enter countdown seconds (1-9): "),
        _ => None,
    }
}

/// Parse the leading integer of a token (`"12abc"` -> 12), like C `atoi`
fn leading_int(token: &str) -> Option<i32> {
    let token = token.trim_start();
    let digits_start = usize::from(token.starts_with(['-', '+']));
    let digits_len = token[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    token[..digits_start + digits_len].parse().ok()
}

/// Parse a command line: a kind number followed by up to two optional integers
///
/// Missing or unparsable parameters default to 0; parsing stops at the first
/// parameter that is not a number.
pub fn parse_command_line(line: &str) -> Result<Command, CodecError> {
    let mut tokens = line.split_whitespace();

    let code = tokens
        .next()
        .and_then(leading_int)
        .ok_or_else(|| CodecError::InvalidFormat(line.to_string()))?;
    let kind = CommandKind::try_from(code).map_err(CodecError::UnknownCommand)?;

    let mut params = [0i32; 2];
    for slot in params.iter_mut() {
        match tokens.next().and_then(leading_int) {
            Some(value) => *slot = value,
            None => break,
        }
    }

    Ok(Command {
        kind,
        param1: params[0],
        param2: params[1],
    })
}

/// Parse the answer to a secondary prompt; anything that is not a number is 0
pub fn parse_param_line(line: &str) -> i32 {
    leading_int(line).unwrap_or(0)
}

/// Render a response the way the operator sees it
pub fn encode_response(response: &CommandResponse) -> String {
    match response.status {
        ResponseStatus::Success => format!("[SUCCESS] {}\n", response.message),
        ResponseStatus::Failure => format!("[ERROR] {}\n", response.message),
    }
}

/// Render a command as an operator would type it
pub fn encode_command(command: &Command) -> String {
    format!(
        "{} {} {}\n",
        command.kind.code(),
        command.param1,
        command.param2
    )
}

/// Streaming decoder that splits received bytes into lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
    /// Dropping the rest of an over-long line up to its newline
    discarding: bool,
}

impl LineDecoder {
    /// Create a new line decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
            discarding: false,
        }
    }

    /// Add received data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next complete line
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete
    /// lines. An over-long line is reported once and everything up to its
    /// terminating newline is discarded.
    pub fn decode_next(&mut self) -> Result<Option<String>, CodecError> {
        loop {
            let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') else {
                if self.discarding {
                    self.buffer.clear();
                } else if self.buffer.len() > MAX_LINE_LENGTH {
                    let len = self.buffer.len();
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(CodecError::LineTooLong(len));
                }
                return Ok(None);
            };

            let raw = self.buffer.split_to(pos);
            self.buffer.advance(1);

            if self.discarding {
                self.discarding = false;
                continue;
            }

            if raw.len() > MAX_LINE_LENGTH {
                return Err(CodecError::LineTooLong(raw.len()));
            }

            let line = String::from_utf8_lossy(&raw);
            return Ok(Some(line.trim_end_matches('\r').to_string()));
        }
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command() {
        let cmd = parse_command_line("3 2 7").expect("parse failed");
        assert_eq!(cmd.kind, CommandKind::SetBrightness);
        assert_eq!(cmd.param1, 2);
        assert_eq!(cmd.param2, 7);
    }

    #[test]
    fn test_parse_defaults_missing_params() {
        let cmd = parse_command_line("  8 ").expect("parse failed");
        assert_eq!(cmd, Command::new(CommandKind::SegmentDisplay));

        let cmd = parse_command_line("4 3 abc").expect("parse failed");
        assert_eq!(cmd.param1, 3);
        assert_eq!(cmd.param2, 0);
    }

    #[test]
    fn test_parse_invalid_format() {
        assert!(matches!(
            parse_command_line("hello"),
            Err(CodecError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_command_line(""),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(parse_command_line("42"), Err(CodecError::UnknownCommand(42)));
        assert_eq!(parse_command_line("-3 1"), Err(CodecError::UnknownCommand(-3)));
    }

    #[test]
    fn test_parse_param_line_is_lenient() {
        assert_eq!(parse_param_line("2"), 2);
        assert_eq!(parse_param_line(" 9 seconds"), 9);
        assert_eq!(parse_param_line("nine"), 0);
        assert_eq!(parse_param_line(""), 0);
    }

    #[test]
    fn test_prompts_only_for_parameterised_commands() {
        assert!(param_prompt(CommandKind::BuzzerOn).is_some());
        assert!(param_prompt(CommandKind::LedOn).is_none());
        for code in 0..=9 {
            let kind = CommandKind::try_from(code).expect("valid code");
            assert_eq!(param_prompt(kind).is_some(), kind.requires_param());
        }
    }

    #[test]
    fn test_encode_response() {
        let ok = CommandResponse::success("Brightness set to 2", 2);
        assert_eq!(encode_response(&ok), "[SUCCESS] Brightness set to 2\n");

        let err = CommandResponse::failure("Countdown already in progress");
        assert_eq!(
            encode_response(&err),
            "[ERROR] Countdown already in progress\n"
        );
    }

    #[test]
    fn test_encoded_command_parses_back() {
        let cmd = Command::with_param(CommandKind::BuzzerOn, 3);
        let line = encode_command(&cmd);
        assert_eq!(parse_command_line(line.trim_end()), Ok(cmd));
    }

    #[test]
    fn test_line_decoder_partial() {
        let mut decoder = LineDecoder::new();

        decoder.extend(b"3 ");
        assert_eq!(decoder.decode_next(), Ok(None));
        assert_eq!(decoder.buffer_len(), 2);

        decoder.extend(b"2\r\n");
        assert_eq!(decoder.decode_next(), Ok(Some("3 2".to_string())));
        assert_eq!(decoder.buffer_len(), 0);
    }

    #[test]
    fn test_line_decoder_multiple_lines() {
        let mut decoder = LineDecoder::new();
        decoder.extend(b"1\n2\n8");

        assert_eq!(decoder.decode_next(), Ok(Some("1".to_string())));
        assert_eq!(decoder.decode_next(), Ok(Some("2".to_string())));
        assert_eq!(decoder.decode_next(), Ok(None));
        assert_eq!(decoder.buffer_len(), 1);
    }

    #[test]
    fn test_line_too_long() {
        let mut decoder = LineDecoder::new();
        decoder.extend(&vec![b'1'; MAX_LINE_LENGTH + 1]);

        assert!(matches!(
            decoder.decode_next(),
            Err(CodecError::LineTooLong(_))
        ));
        assert_eq!(decoder.buffer_len(), 0);

        // The tail of the same line is not a new command
        decoder.extend(b"1111");
        assert_eq!(decoder.decode_next(), Ok(None));
        decoder.extend(b"2\n");
        assert_eq!(decoder.decode_next(), Ok(None));

        decoder.extend(b"2\n");
        assert_eq!(decoder.decode_next(), Ok(Some("2".to_string())));
    }

    #[test]
    fn test_line_too_long_with_terminator_in_buffer() {
        let mut decoder = LineDecoder::new();
        let mut data = vec![b'a'; MAX_LINE_LENGTH + 1];
        data.extend_from_slice(b"1\n7\n");
        decoder.extend(&data);

        assert!(matches!(
            decoder.decode_next(),
            Err(CodecError::LineTooLong(_))
        ));
        assert_eq!(decoder.decode_next(), Ok(Some("7".to_string())));
        assert_eq!(decoder.decode_next(), Ok(None));
    }
}
