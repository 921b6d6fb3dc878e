//! Buzzer command handlers

use super::HandlerContext;
use crate::command::{CommandResult, FollowUp};
use crate::device::Melody;
use iot_shared::Command;
use tracing::warn;

/// Handle BUZZER_ON command
///
/// Playback outlasts the response deadline, so the command is answered
/// first and the melody is played as a follow-up. Unknown melody numbers
/// play the school bell.
pub async fn handle_buzzer_on(ctx: &mut HandlerContext<'_>, command: &Command) -> CommandResult {
    let melody = Melody::from_id_or_default(command.param1);
    ctx.state.buzzer_playing = true;

    CommandResult::Pending {
        message: format!("Playing music {}", melody.id()),
        value: melody.id(),
        follow_up: FollowUp::PlayMelody(melody),
    }
}

/// Handle BUZZER_OFF command
pub async fn handle_buzzer_off(ctx: &mut HandlerContext<'_>, _command: &Command) -> CommandResult {
    if let Err(e) = ctx.drivers.stop_melody().await {
        warn!("[DEVICE] Stopping melody failed: {}", e);
    }
    ctx.state.buzzer_playing = false;
    CommandResult::completed("Buzzer stopped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::handlers::test_support::Fixture;
    use crate::device::faulty::Fault;
    use iot_shared::CommandKind;

    #[tokio::test]
    async fn test_unknown_melody_plays_school_bell() {
        let mut fixture = Fixture::new();
        let command = Command::with_param(CommandKind::BuzzerOn, 99);

        let result = handle_buzzer_on(&mut fixture.ctx(), &command).await;

        match result {
            CommandResult::Pending {
                message,
                value,
                follow_up,
            } => {
                assert_eq!(message, "Playing music 1");
                assert_eq!(value, 1);
                assert_eq!(follow_up, FollowUp::PlayMelody(Melody::SchoolBell));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(fixture.state.buzzer_playing);
    }

    #[tokio::test]
    async fn test_buzzer_off_always_succeeds() {
        let mut fixture = Fixture::new();
        fixture.state.buzzer_playing = true;

        let result = handle_buzzer_off(&mut fixture.ctx(), &Command::new(CommandKind::BuzzerOff)).await;

        assert!(matches!(result, CommandResult::Completed { .. }));
        assert!(!fixture.state.buzzer_playing);
    }

    #[tokio::test]
    async fn test_buzzer_off_succeeds_when_driver_fails() {
        let mut fixture = Fixture::new();
        fixture.drivers.fail(Fault::Buzzer);
        fixture.state.buzzer_playing = true;

        let result = handle_buzzer_off(&mut fixture.ctx(), &Command::new(CommandKind::BuzzerOff)).await;

        assert_eq!(result, CommandResult::completed("Buzzer stopped"));
        assert!(!fixture.state.buzzer_playing);
    }
}
