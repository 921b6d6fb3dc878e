//! Light sensor monitoring handlers

use super::HandlerContext;
use crate::command::CommandResult;
use iot_shared::Command;
use tracing::info;

/// Handle SENSOR_ON command
pub async fn handle_sensor_on(ctx: &mut HandlerContext<'_>, _command: &Command) -> CommandResult {
    ctx.state.sensor_monitoring = true;
    info!("[DEVICE] Sensor monitoring started");
    CommandResult::completed("Sensor monitoring started")
}

/// Handle SENSOR_OFF command
pub async fn handle_sensor_off(ctx: &mut HandlerContext<'_>, _command: &Command) -> CommandResult {
    ctx.state.sensor_monitoring = false;
    info!("[DEVICE] Sensor monitoring stopped");
    CommandResult::completed("Sensor monitoring stopped")
}
