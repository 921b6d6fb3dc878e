//! LED command handlers

use super::HandlerContext;
use crate::command::CommandResult;
use iot_shared::{Brightness, Command};
use tracing::warn;

/// Handle LED_ON command
pub async fn handle_led_on(ctx: &mut HandlerContext<'_>, _command: &Command) -> CommandResult {
    match ctx.drivers.set_led(true).await {
        Ok(()) => {
            ctx.state.led_on = true;
            CommandResult::completed("LED turned ON")
        }
        Err(e) => {
            warn!("[DEVICE] LED on failed: {}", e);
            CommandResult::Failed {
                message: "Failed to turn ON LED".into(),
            }
        }
    }
}

/// Handle LED_OFF command
pub async fn handle_led_off(ctx: &mut HandlerContext<'_>, _command: &Command) -> CommandResult {
    match ctx.drivers.set_led(false).await {
        Ok(()) => {
            ctx.state.led_on = false;
            CommandResult::completed("LED turned OFF")
        }
        Err(e) => {
            warn!("[DEVICE] LED off failed: {}", e);
            CommandResult::Failed {
                message: "Failed to turn OFF LED".into(),
            }
        }
    }
}

/// Handle SET_BRIGHTNESS command
///
/// Setting a level also lights the LED at that level.
pub async fn handle_set_brightness(ctx: &mut HandlerContext<'_>, command: &Command) -> CommandResult {
    let level = match Brightness::try_from(command.param1) {
        Ok(level) => level,
        Err(n) => {
            return CommandResult::Rejected {
                message: format!("Invalid brightness level: {} (use 1-3)", n),
            };
        }
    };

    match ctx.drivers.set_brightness(level).await {
        Ok(()) => {
            ctx.state.led_brightness = level;
            ctx.state.led_on = true;
            CommandResult::Completed {
                message: format!("Brightness set to {}", level.level()),
                value: level.level(),
            }
        }
        Err(e) => {
            warn!("[DEVICE] Brightness change failed: {}", e);
            CommandResult::Failed {
                message: "Failed to set brightness".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::handlers::test_support::Fixture;
    use crate::control::DeviceState;
    use crate::device::faulty::Fault;
    use iot_shared::CommandKind;

    #[tokio::test]
    async fn test_set_brightness_lights_led() {
        let mut fixture = Fixture::new();
        let command = Command::with_param(CommandKind::SetBrightness, 2);

        let result = handle_set_brightness(&mut fixture.ctx(), &command).await;

        assert!(matches!(
            result,
            CommandResult::Completed { ref message, value: 2 } if message == "Brightness set to 2"
        ));
        assert_eq!(fixture.state.led_brightness, Brightness::Medium);
        assert!(fixture.state.led_on);
        assert_eq!(fixture.drivers.snapshot().led_pwm, 34);
    }

    #[tokio::test]
    async fn test_invalid_brightness_leaves_state_alone() {
        let mut fixture = Fixture::new();
        let command = Command::with_param(CommandKind::SetBrightness, 7);

        let result = handle_set_brightness(&mut fixture.ctx(), &command).await;

        assert!(matches!(
            result,
            CommandResult::Rejected { ref message } if message == "Invalid brightness level: 7 (use 1-3)"
        ));
        assert_eq!(fixture.state.led_brightness, Brightness::High);
        assert!(!fixture.state.led_on);
        assert_eq!(fixture.drivers.snapshot().led_writes, 0);
    }

    #[tokio::test]
    async fn test_led_on_then_off() {
        let mut fixture = Fixture::new();

        handle_led_on(&mut fixture.ctx(), &Command::new(CommandKind::LedOn)).await;
        assert!(fixture.state.led_on);

        let result = handle_led_off(&mut fixture.ctx(), &Command::new(CommandKind::LedOff)).await;
        assert!(matches!(result, CommandResult::Completed { .. }));
        assert!(!fixture.state.led_on);
        assert!(!fixture.drivers.snapshot().led_on());
    }

    #[tokio::test]
    async fn test_led_failures_reported() {
        let mut fixture = Fixture::new();
        fixture.drivers.fail(Fault::Led);

        let result = handle_led_on(&mut fixture.ctx(), &Command::new(CommandKind::LedOn)).await;
        assert_eq!(
            result,
            CommandResult::Failed {
                message: "Failed to turn ON LED".into()
            }
        );
        assert_eq!(fixture.state, DeviceState::default());

        fixture.state.led_on = true;
        let result = handle_led_off(&mut fixture.ctx(), &Command::new(CommandKind::LedOff)).await;
        assert_eq!(
            result,
            CommandResult::Failed {
                message: "Failed to turn OFF LED".into()
            }
        );
        assert!(fixture.state.led_on);
        assert_eq!(fixture.drivers.snapshot().led_writes, 0);
    }

    #[tokio::test]
    async fn test_brightness_failure_keeps_previous_level() {
        let mut fixture = Fixture::new();
        fixture.drivers.fail(Fault::Led);
        let command = Command::with_param(CommandKind::SetBrightness, 1);

        let result = handle_set_brightness(&mut fixture.ctx(), &command).await;

        assert_eq!(
            result,
            CommandResult::Failed {
                message: "Failed to set brightness".into()
            }
        );
        assert_eq!(fixture.state, DeviceState::default());
        assert!(!fixture.drivers.snapshot().led_on());
    }
}
