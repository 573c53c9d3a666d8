// Drivetrain orchestrator
//
// Per tick: command -> (field-to-robot rotation) -> discretize -> inverse
// kinematics -> desaturate -> per-module optimize/dispatch, then one odometry
// update. Exposes the pose/speed accessors a path follower needs.

use tracing::{info, warn};

use crate::config;
use crate::hardware::{HeadingProvider, SimActuator, SimAngleSensor, SimHeading};
use crate::messages::{DrivetrainTelemetry, ModuleTelemetry};
use crate::swerve::kinematics::{
    ChassisSpeeds, ModulePosition, ModuleState, SwerveKinematics,
};
use crate::swerve::module::{ConfigStatus, ModuleConfig, RetryPolicy, SwerveModule};
use crate::swerve::odometry::{Pose2d, PoseEstimator};

pub struct SwerveDrive {
    modules: [SwerveModule; 4],
    kinematics: SwerveKinematics,
    estimator: PoseEstimator,
    heading: Box<dyn HeadingProvider>,
    config_status: ConfigStatus,
    last_heading_rad: f64,
    heading_healthy: bool,
}

impl SwerveDrive {
    /// Build the drivetrain from four modules and an injected heading sensor,
    /// configure every device under the bounded-retry policy, and zero the
    /// pose. Construction never fails: a module that exhausts its retries
    /// runs degraded with default actuator behavior.
    pub fn new(mut modules: [SwerveModule; 4], heading: Box<dyn HeadingProvider>) -> Self {
        let mut config_status = ConfigStatus::Ok;
        for module in modules.iter_mut() {
            config_status = config_status.merge(module.configure_all());
        }

        let heading_rad = heading.heading().unwrap_or_else(|e| {
            warn!("heading unavailable at startup, assuming zero: {e}");
            0.0
        });
        let positions = read_positions(&mut modules);
        let kinematics =
            SwerveKinematics::rectangular(config::WHEELBASE_M, config::TRACK_WIDTH_M);
        let estimator =
            PoseEstimator::new(kinematics.clone(), heading_rad, positions, Pose2d::default());

        info!("swerve drivetrain initialized ({config_status:?})");

        Self {
            modules,
            kinematics,
            estimator,
            heading,
            config_status,
            last_heading_rad: heading_rad,
            heading_healthy: true,
        }
    }

    /// Build a fully simulated drivetrain from the static module configs.
    pub fn with_sim_hardware() -> Self {
        let retry = RetryPolicy::new(config::MAX_CONFIG_RETRIES);
        let modules = config::MODULE_CONFIGS.map(|cfg: ModuleConfig| {
            SwerveModule::new(
                cfg,
                Box::new(SimActuator::new(format!("{} drive", cfg.name))),
                Box::new(SimActuator::new(format!("{} steer", cfg.name))),
                Box::new(SimAngleSensor::new(
                    format!("{} encoder", cfg.name),
                    cfg.encoder_offset_rad,
                )),
                retry,
            )
        });
        Self::new(modules, Box::new(SimHeading::new(0.0)))
    }

    pub fn config_status(&self) -> ConfigStatus {
        self.config_status
    }

    /// Drive from a chassis velocity command.
    ///
    /// Non-finite commands are rejected and replaced with a stop so nothing
    /// malformed ever reaches the kinematics or the hardware.
    pub fn drive(&mut self, speeds: ChassisSpeeds, field_relative: bool) {
        let speeds = if speeds.is_finite() {
            speeds
        } else {
            warn!("rejecting non-finite drive command {speeds:?}");
            ChassisSpeeds::default()
        };

        let robot_speeds = if field_relative {
            ChassisSpeeds::from_field_relative(speeds, self.pose().heading_rad)
        } else {
            speeds
        };
        self.dispatch(robot_speeds, None);
    }

    /// Path-follower entry point: robot-relative command with per-module
    /// linear-acceleration feedforwards.
    pub fn drive_robot_relative_with_ff(&mut self, speeds: ChassisSpeeds, accels_mps2: [f64; 4]) {
        let speeds = if speeds.is_finite() {
            speeds
        } else {
            warn!("rejecting non-finite drive command {speeds:?}");
            ChassisSpeeds::default()
        };
        self.dispatch(speeds, Some(accels_mps2));
    }

    fn dispatch(&mut self, robot_speeds: ChassisSpeeds, accels_mps2: Option<[f64; 4]>) {
        // A stop carries no wheel direction; hold each wheel's current
        // heading instead of slewing the whole drivetrain back to zero
        if robot_speeds == ChassisSpeeds::default() {
            for module in self.modules.iter_mut() {
                let angle = module.position().angle_rad;
                module.set_target_state(ModuleState::new(0.0, angle));
            }
            return;
        }

        let discrete = SwerveKinematics::discretize(robot_speeds, config::TICK_PERIOD_S);
        let mut states = self.kinematics.to_module_states(discrete);
        SwerveKinematics::desaturate(&mut states, config::MAX_WHEEL_SPEED_MPS);

        for (i, module) in self.modules.iter_mut().enumerate() {
            match accels_mps2 {
                Some(accels) => module.set_target_state_with_ff(states[i], accels[i]),
                None => module.set_target_state(states[i]),
            }
        }
    }

    /// Point the wheels along the chassis diagonals with zero speed, bracing
    /// the robot against pushes.
    pub fn hold_x(&mut self) {
        let positions = self.kinematics.module_positions();
        for (module, (x, y)) in self.modules.iter_mut().zip(positions) {
            module.set_target_state(ModuleState::new(0.0, y.atan2(x)));
        }
    }

    /// Advance the pose estimate. Called exactly once per control tick, after
    /// actuation.
    ///
    /// If the heading sensor fails, the last good reading is reused (warned
    /// once per outage) and dead reckoning continues on translation alone.
    pub fn update_odometry(&mut self) -> Pose2d {
        let heading_rad = match self.heading.heading() {
            Ok(h) => {
                if !self.heading_healthy {
                    info!("heading sensor recovered");
                    self.heading_healthy = true;
                }
                self.last_heading_rad = h;
                h
            }
            Err(e) => {
                if self.heading_healthy {
                    warn!("heading unavailable, holding last reading: {e}");
                    self.heading_healthy = false;
                }
                self.last_heading_rad
            }
        };

        let positions = read_positions(&mut self.modules);
        self.estimator.update(heading_rad, &positions)
    }

    pub fn pose(&self) -> Pose2d {
        self.estimator.pose()
    }

    /// Re-seat the pose estimate, re-zeroing the heading sensor and keeping
    /// the wheel baselines consistent. Used at match start and by the path
    /// follower.
    pub fn reset_pose(&mut self, pose: Pose2d) {
        if let Err(e) = self.heading.reset_heading() {
            warn!("heading reset failed: {e}");
        }
        for module in self.modules.iter_mut() {
            module.reset_drive_encoder();
        }
        let heading_rad = self.heading.heading().unwrap_or(self.last_heading_rad);
        self.last_heading_rad = heading_rad;
        let positions = read_positions(&mut self.modules);
        self.estimator.reset(pose, heading_rad, &positions);
    }

    pub fn robot_relative_speeds(&mut self) -> ChassisSpeeds {
        let states = read_states(&mut self.modules);
        self.kinematics.to_chassis_speeds(&states)
    }

    pub fn field_relative_speeds(&mut self) -> ChassisSpeeds {
        let heading = self.pose().heading_rad;
        ChassisSpeeds::to_field_relative(self.robot_relative_speeds(), heading)
    }

    /// Instantaneous current draw summed over all modules, in amps.
    pub fn total_current_draw(&self) -> f64 {
        self.modules.iter().map(|m| m.current_draw()).sum()
    }

    /// Snapshot of everything the runtime republishes each tick.
    pub fn telemetry(&mut self) -> DrivetrainTelemetry {
        let pose = self.pose();
        let speeds = self.robot_relative_speeds();
        let modules: [ModuleTelemetry; 4] = std::array::from_fn(|i| {
            let state = self.modules[i].state();
            ModuleTelemetry {
                name: self.modules[i].name().to_string(),
                speed_mps: state.speed_mps,
                angle_rad: state.angle_rad,
                current_a: self.modules[i].current_draw(),
            }
        });
        DrivetrainTelemetry {
            x_m: pose.x,
            y_m: pose.y,
            heading_rad: pose.heading_rad,
            vx_mps: speeds.vx,
            vy_mps: speeds.vy,
            omega_rad_s: speeds.omega,
            total_current_a: modules.iter().map(|m| m.current_a).sum(),
            modules,
        }
    }

    /// Second sequential phase of a tick when running against simulated
    /// hardware: advance the mechanism models and the simulated gyro.
    pub fn step_sim(&mut self, dt: f64) {
        for module in self.modules.iter_mut() {
            module.step_sim(dt);
        }
        let omega = self.robot_relative_speeds().omega;
        self.heading.step_sim(omega, dt);
    }
}

fn read_positions(modules: &mut [SwerveModule; 4]) -> [ModulePosition; 4] {
    std::array::from_fn(|i| modules[i].position())
}

fn read_states(modules: &mut [SwerveModule; 4]) -> [ModuleState; 4] {
    std::array::from_fn(|i| modules[i].state())
}
