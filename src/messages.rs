// Message types on the wire

use serde::{Deserialize, Serialize};

use crate::swerve::kinematics::ChassisSpeeds;

/// Command from teleop/autonomous -> runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriveCommand {
    /// Forward velocity in m/s (positive = forward)
    pub vx: f64,
    /// Lateral velocity in m/s (positive = left)
    pub vy: f64,
    /// Rotational velocity in rad/s (positive = counter-clockwise)
    pub omega: f64,
    /// Whether (vx, vy) are in the field frame rather than the robot frame
    #[serde(default)]
    pub field_relative: bool,
}

impl From<&DriveCommand> for ChassisSpeeds {
    fn from(cmd: &DriveCommand) -> Self {
        Self {
            vx: cmd.vx,
            vy: cmd.vy,
            omega: cmd.omega,
        }
    }
}

/// One wheel's share of the per-tick telemetry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleTelemetry {
    pub name: String,
    pub speed_mps: f64,
    pub angle_rad: f64,
    pub current_a: f64,
}

/// Aggregated drivetrain state published every tick, best-effort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrivetrainTelemetry {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub vx_mps: f64,
    pub vy_mps: f64,
    pub omega_rad_s: f64,
    pub modules: [ModuleTelemetry; 4],
    pub total_current_a: f64,
}

/// Health status published by the runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    /// At least one device exhausted its configuration retries
    Degraded,
}
