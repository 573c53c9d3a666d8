// Loop timing, topics, chassis geometry, per-module hardware configuration
use std::time::Duration;

use crate::hardware::ClosedLoopGains;
use crate::swerve::module::ModuleConfig;

// Control loop frequency, matched to the actuation network update rate
pub const LOOP_HZ: u64 = 50;
pub const TICK_PERIOD: Duration = Duration::from_millis(1000 / LOOP_HZ);
pub const TICK_PERIOD_S: f64 = 0.02;

// Command timeout for the watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Bounded-retry budget for hardware configuration at startup
pub const MAX_CONFIG_RETRIES: u32 = 5;

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "swerve/cmd/drive"; // commands
pub const TOPIC_RT_DRIVETRAIN: &str = "swerve/rt/drivetrain"; // telemetry
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status

// Chassis geometry (meters)
pub const WHEELBASE_M: f64 = 0.62;
pub const TRACK_WIDTH_M: f64 = 0.62;

// Highest wheel speed the drive motors can sustain; desaturation limit
pub const MAX_WHEEL_SPEED_MPS: f64 = 4.5;

const DRIVE_GAINS: ClosedLoopGains = ClosedLoopGains {
    kp: 0.12,
    ki: 0.0,
    kd: 0.0,
    kv: 0.21,
    ka: 0.03,
};

const STEER_GAINS: ClosedLoopGains = ClosedLoopGains {
    kp: 4.8,
    ki: 0.0,
    kd: 0.1,
    kv: 0.0,
    ka: 0.0,
};

const DRIVETRAIN_CANBUS: &str = "drivetrain";

// Module order everywhere: [front-left, front-right, back-left, back-right]
pub const MODULE_CONFIGS: [ModuleConfig; 4] = [
    ModuleConfig {
        name: "front-left",
        can_bus: DRIVETRAIN_CANBUS,
        drive_id: 11,
        steer_id: 12,
        encoder_id: 13,
        encoder_offset_rad: -0.184,
        drive_gains: DRIVE_GAINS,
        steer_gains: STEER_GAINS,
    },
    ModuleConfig {
        name: "front-right",
        can_bus: DRIVETRAIN_CANBUS,
        drive_id: 21,
        steer_id: 22,
        encoder_id: 23,
        encoder_offset_rad: 1.035,
        drive_gains: DRIVE_GAINS,
        steer_gains: STEER_GAINS,
    },
    ModuleConfig {
        name: "back-left",
        can_bus: DRIVETRAIN_CANBUS,
        drive_id: 31,
        steer_id: 32,
        encoder_id: 33,
        encoder_offset_rad: 2.517,
        drive_gains: DRIVE_GAINS,
        steer_gains: STEER_GAINS,
    },
    ModuleConfig {
        name: "back-right",
        can_bus: DRIVETRAIN_CANBUS,
        drive_id: 41,
        steer_id: 42,
        encoder_id: 43,
        encoder_offset_rad: -2.871,
        drive_gains: DRIVE_GAINS,
        steer_gains: STEER_GAINS,
    },
];
