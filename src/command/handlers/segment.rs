//! Seven-segment countdown handlers

use super::HandlerContext;
use crate::command::CommandResult;
use iot_shared::limits::{COUNTDOWN_MAX, COUNTDOWN_MIN};
use iot_shared::Command;
use tracing::{info, warn};

/// Handle SEGMENT_DISPLAY command
///
/// Only one countdown may run at a time. When it reaches 0 the school bell
/// plays.
pub async fn handle_segment_display(ctx: &mut HandlerContext<'_>, command: &Command) -> CommandResult {
    let seconds = command.param1;
    if !(COUNTDOWN_MIN..=COUNTDOWN_MAX).contains(&seconds) {
        return CommandResult::Rejected {
            message: format!("Invalid countdown seconds: {} (use 1-9)", seconds),
        };
    }

    if ctx.state.segment_counting {
        return CommandResult::Rejected {
            message: "Countdown already in progress".into(),
        };
    }

    // Range checked above
    let digit = seconds as u8;
    match ctx.countdown.start(digit).await {
        Ok(_) => {
            ctx.state.segment_counting = true;
            info!("[DEVICE] Countdown started: {} seconds", seconds);
            CommandResult::Completed {
                message: format!("Countdown started from {} (will play music at 0)", seconds),
                value: seconds,
            }
        }
        Err(e) => {
            warn!("[DEVICE] Countdown start failed: {}", e);
            CommandResult::Failed {
                message: "Failed to start countdown".into(),
            }
        }
    }
}

/// Handle SEGMENT_STOP command
pub async fn handle_segment_stop(ctx: &mut HandlerContext<'_>, _command: &Command) -> CommandResult {
    if !ctx.state.segment_counting {
        return CommandResult::Rejected {
            message: "No countdown in progress".into(),
        };
    }

    ctx.countdown.stop();
    ctx.state.segment_counting = false;
    info!("[DEVICE] Countdown stopped");
    CommandResult::completed("Countdown stopped")
}
