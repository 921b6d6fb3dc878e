//! IoT Shared Protocol Types
//!
//! This crate provides the command/response types, the line codec and the
//! control-loop state machine shared by the device control server and the
//! operator client.

pub mod codec;
pub mod state_machine;

use std::fmt;

/// Protocol parameters for the system
pub mod limits {
    /// Default TCP port of the control server
    pub const SERVER_PORT: u16 = 8080;

    /// Maximum number of commands waiting for the device control loop
    pub const QUEUE_CAPACITY: usize = 100;

    /// How long a session waits for the response to one command
    pub const RESPONSE_TIMEOUT_MS: u64 = 5000;

    /// Idle wait of the device control loop; doubles as the sensor poll tick
    pub const POLL_INTERVAL_MS: u64 = 1000;

    /// Maximum length of one operator input line
    pub const MAX_LINE_LENGTH: usize = 1024;

    /// Legal LED brightness levels
    pub const BRIGHTNESS_MIN: i32 = 1;
    pub const BRIGHTNESS_MAX: i32 = 3;

    /// Legal melody ids
    pub const MELODY_MIN: i32 = 1;
    pub const MELODY_MAX: i32 = 4;

    /// Legal countdown lengths in seconds (one seven-segment digit)
    pub const COUNTDOWN_MIN: i32 = 1;
    pub const COUNTDOWN_MAX: i32 = 9;
}

/// Command kinds, numbered as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandKind {
    Exit = 0,
    LedOn = 1,
    LedOff = 2,
    SetBrightness = 3,
    BuzzerOn = 4,
    BuzzerOff = 5,
    SensorOn = 6,
    SensorOff = 7,
    SegmentDisplay = 8,
    SegmentStop = 9,
}

impl CommandKind {
    /// Wire number of this command kind
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Whether the first parameter must be supplied before the command is queued
    pub fn requires_param(self) -> bool {
        matches!(
            self,
            CommandKind::SetBrightness | CommandKind::BuzzerOn | CommandKind::SegmentDisplay
        )
    }
}

impl TryFrom<i32> for CommandKind {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CommandKind::Exit),
            1 => Ok(CommandKind::LedOn),
            2 => Ok(CommandKind::LedOff),
            3 => Ok(CommandKind::SetBrightness),
            4 => Ok(CommandKind::BuzzerOn),
            5 => Ok(CommandKind::BuzzerOff),
            6 => Ok(CommandKind::SensorOn),
            7 => Ok(CommandKind::SensorOff),
            8 => Ok(CommandKind::SegmentDisplay),
            9 => Ok(CommandKind::SegmentStop),
            other => Err(other),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Exit => "EXIT",
            CommandKind::LedOn => "LED_ON",
            CommandKind::LedOff => "LED_OFF",
            CommandKind::SetBrightness => "SET_BRIGHTNESS",
            CommandKind::BuzzerOn => "BUZZER_ON",
            CommandKind::BuzzerOff => "BUZZER_OFF",
            CommandKind::SensorOn => "SENSOR_ON",
            CommandKind::SensorOff => "SENSOR_OFF",
            CommandKind::SegmentDisplay => "SEGMENT_DISPLAY",
            CommandKind::SegmentStop => "SEGMENT_STOP",
        };
        f.write_str(name)
    }
}

/// A discrete operator request awaiting execution by the device control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub param1: i32,
    pub param2: i32,
}

impl Command {
    /// Create a command without parameters
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            param1: 0,
            param2: 0,
        }
    }

    /// Create a command with its first parameter set
    pub fn with_param(kind: CommandKind, param1: i32) -> Self {
        Self {
            kind,
            param1,
            param2: 0,
        }
    }
}

/// Outcome of one executed command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// Response delivered to the session that submitted a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub status: ResponseStatus,
    pub message: String,
    pub value: i32,
}

impl CommandResponse {
    /// Create a success response
    pub fn success(message: impl Into<String>, value: i32) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            value,
        }
    }

    /// Create a failure response
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failure,
            message: message.into(),
            value: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// LED brightness levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Brightness {
    Low = 1,
    Medium = 2,
    #[default]
    High = 3,
}

impl Brightness {
    pub fn level(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Brightness {
    type Error = i32;

    fn try_from(level: i32) -> Result<Self, Self::Error> {
        if !(limits::BRIGHTNESS_MIN..=limits::BRIGHTNESS_MAX).contains(&level) {
            return Err(level);
        }
        Ok(match level {
            1 => Brightness::Low,
            2 => Brightness::Medium,
            _ => Brightness::High,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_kind_codes() {
        for code in 0..=9 {
            let kind = CommandKind::try_from(code).expect("valid code");
            assert_eq!(kind.code(), code);
        }
        assert_eq!(CommandKind::try_from(10), Err(10));
        assert_eq!(CommandKind::try_from(-1), Err(-1));
    }

    #[test]
    fn test_requires_param() {
        assert!(CommandKind::SetBrightness.requires_param());
        assert!(CommandKind::BuzzerOn.requires_param());
        assert!(CommandKind::SegmentDisplay.requires_param());
        assert!(!CommandKind::LedOn.requires_param());
        assert!(!CommandKind::SegmentStop.requires_param());
    }

    #[test]
    fn test_response_creation() {
        let ok = CommandResponse::success("Brightness set to 2", 2);
        assert!(ok.is_success());
        assert_eq!(ok.value, 2);

        let err = CommandResponse::failure("No countdown in progress");
        assert_eq!(err.status, ResponseStatus::Failure);
        assert_eq!(err.value, 0);
    }

    #[test]
    fn test_brightness_levels() {
        assert_eq!(Brightness::try_from(limits::BRIGHTNESS_MIN), Ok(Brightness::Low));
        assert_eq!(Brightness::try_from(2), Ok(Brightness::Medium));
        assert_eq!(Brightness::try_from(limits::BRIGHTNESS_MAX), Ok(Brightness::High));
        assert_eq!(Brightness::try_from(0), Err(0));
        assert_eq!(Brightness::try_from(4), Err(4));
        assert_eq!(Brightness::default().level(), 3);
    }
}
