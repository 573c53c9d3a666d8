// 50 Hz control loop with watchdog
//
// Every tick: drain pending drive commands, apply the watchdog, actuate the
// drivetrain, update odometry, optionally step the simulated hardware, and
// republish telemetry and health. The tick always issues some actuator
// command; a stale or absent command degrades to a stop, never to silence.

use std::time::Instant;

use tracing::{info, warn};

use crate::config::{
    CMD_TIMEOUT, LOOP_HZ, TICK_PERIOD, TICK_PERIOD_S, TOPIC_CMD_DRIVE, TOPIC_HEALTH,
    TOPIC_RT_DRIVETRAIN,
};
use crate::messages::{DriveCommand, RuntimeHealth};
use crate::swerve::{ChassisSpeeds, SwerveDrive};

pub struct Runtime {
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: DriveCommand) {
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Pick this tick's chassis command based on watchdog state.
    pub fn compute_command(&mut self) -> (ChassisSpeeds, bool) {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping robot", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            (ChassisSpeeds::default(), false)
        } else if let Some(ref cmd) = self.latest_cmd {
            self.health = RuntimeHealth::Ok;
            (ChassisSpeeds::from(cmd), cmd.field_relative)
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            (ChassisSpeeds::default(), false)
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run(sim: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_RT_DRIVETRAIN).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    // Hardware configuration happens here, once, under the bounded-retry
    // policy; the periodic loop starts regardless of the outcome
    let mut drivetrain = SwerveDrive::with_sim_hardware();
    let degraded = drivetrain.config_status().is_degraded();
    if degraded {
        warn!("drivetrain started degraded: {:?}", drivetrain.config_status());
    }

    let mut runtime = Runtime::new();
    let mut tick = tokio::time::interval(TICK_PERIOD);

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, sim={}",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis(),
        sim
    );
    info!("Subscribed to: {}", TOPIC_CMD_DRIVE);
    info!("Publishing to: {}, {}", TOPIC_RT_DRIVETRAIN, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        }

        // 2. Actuate (includes watchdog logic), then update odometry
        let (speeds, field_relative) = runtime.compute_command();
        drivetrain.drive(speeds, field_relative);
        drivetrain.update_odometry();

        // 3. Optional second phase: advance the simulated hardware
        if sim {
            drivetrain.step_sim(TICK_PERIOD_S);
        }

        // 4. Publish telemetry and health, best-effort
        let health = if degraded && runtime.health() == RuntimeHealth::Ok {
            RuntimeHealth::Degraded
        } else {
            runtime.health()
        };
        match serde_json::to_string(&drivetrain.telemetry()) {
            Ok(json) => {
                if let Err(e) = pub_telemetry.put(json).await {
                    warn!("telemetry publish failed: {e}");
                }
            }
            Err(e) => warn!("telemetry serialization failed: {e}"),
        }
        if let Err(e) = pub_health.put(serde_json::to_string(&health)?).await {
            warn!("health publish failed: {e}");
        }
    }
}
