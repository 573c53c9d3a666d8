// One swerve module: a drive motor, a steering motor, and an absolute
// steering encoder, all behind the hardware capability traits.

use std::f64::consts::{FRAC_PI_2, PI};

use tracing::{error, warn};

use crate::hardware::{Actuator, AngleSensor, ClosedLoopGains, HardwareError};
use crate::swerve::kinematics::{ModulePosition, ModuleState, wrap_angle};

/// Immutable per-wheel descriptor, built once at startup.
#[derive(Debug, Clone, Copy)]
pub struct ModuleConfig {
    pub name: &'static str,
    pub can_bus: &'static str,
    pub drive_id: u8,
    pub steer_id: u8,
    pub encoder_id: u8,
    /// Encoder mounting offset in rad
    pub encoder_offset_rad: f64,
    pub drive_gains: ClosedLoopGains,
    pub steer_gains: ClosedLoopGains,
}

/// Outcome of configuring one device or one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStatus {
    /// Configured on the first attempt
    Ok,
    /// Configured after transient failures; carries the attempt count
    Retried(u32),
    /// All attempts exhausted; the device runs with default behavior
    Failed(u32),
}

impl ConfigStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ConfigStatus::Failed(_))
    }

    /// Combine two statuses, keeping the worse one.
    pub fn merge(self, other: ConfigStatus) -> ConfigStatus {
        use ConfigStatus::*;
        match (self, other) {
            (Failed(n), _) | (_, Failed(n)) => Failed(n),
            (Retried(n), _) | (_, Retried(n)) => Retried(n),
            _ => Ok,
        }
    }
}

/// Bounded retry with no backoff, so configuration stays deterministic and
/// fast under test.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted.
    ///
    /// Each failure logs a warning naming the module and device; exhaustion
    /// logs a single error. Never returns an Err: a failed device degrades,
    /// it does not halt startup.
    pub fn run<F>(&self, module: &str, device: &str, mut op: F) -> ConfigStatus
    where
        F: FnMut() -> Result<(), HardwareError>,
    {
        let mut attempt = 0;
        while attempt < self.max_attempts {
            attempt += 1;
            match op() {
                Ok(()) => {
                    return if attempt == 1 {
                        ConfigStatus::Ok
                    } else {
                        ConfigStatus::Retried(attempt)
                    };
                }
                Err(e) => warn!(
                    "failure configuring {module} {device} (attempt {attempt}/{}): {e}",
                    self.max_attempts
                ),
            }
        }
        error!(
            "error configuring {module} {device}: gave up after {} attempts",
            self.max_attempts
        );
        ConfigStatus::Failed(self.max_attempts)
    }
}

/// Flip the target by 180 degrees when that shortens the steering move.
///
/// (speed, angle) and (-speed, angle + 180) describe the same wheel motion;
/// pick the one within 90 degrees of where the wheel currently points.
pub fn optimize(target: ModuleState, current_angle_rad: f64) -> ModuleState {
    let delta = wrap_angle(target.angle_rad - current_angle_rad);
    if delta.abs() > FRAC_PI_2 {
        ModuleState::new(-target.speed_mps, target.angle_rad + PI)
    } else {
        target
    }
}

/// Scale speed by the cosine of the remaining steering error so the wheel
/// does not drag sideways while it is still rotating into position.
pub fn cosine_scale(target: ModuleState, current_angle_rad: f64) -> ModuleState {
    let scale = wrap_angle(current_angle_rad - target.angle_rad).cos();
    ModuleState {
        speed_mps: target.speed_mps * scale,
        angle_rad: target.angle_rad,
    }
}

pub struct SwerveModule {
    config: ModuleConfig,
    drive: Box<dyn Actuator>,
    steer: Box<dyn Actuator>,
    encoder: Box<dyn AngleSensor>,
    retry: RetryPolicy,
    last_state: ModuleState,
    last_position: ModulePosition,
}

impl SwerveModule {
    pub fn new(
        config: ModuleConfig,
        drive: Box<dyn Actuator>,
        steer: Box<dyn Actuator>,
        encoder: Box<dyn AngleSensor>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            config,
            drive,
            steer,
            encoder,
            retry,
            last_state: ModuleState::default(),
            last_position: ModulePosition::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    /// Configure the drive motor, steering motor, and steering encoder.
    ///
    /// Each device retries independently until its own success or exhaustion;
    /// an already-configured device is never re-applied because a sibling
    /// failed. Returns the worst per-device status.
    pub fn configure_all(&mut self) -> ConfigStatus {
        let name = self.config.name;
        let retry = self.retry;

        let drive = {
            let gains = self.config.drive_gains;
            let motor = &mut self.drive;
            retry.run(name, "drive motor", || motor.configure(&gains))
        };
        let steer = {
            let gains = self.config.steer_gains;
            let motor = &mut self.steer;
            retry.run(name, "steer motor", || motor.configure(&gains))
        };
        let encoder = {
            let offset = self.config.encoder_offset_rad;
            let sensor = &mut self.encoder;
            retry.run(name, "steer encoder", || sensor.configure(offset))
        };

        // Seed the steering shaft from the absolute encoder so position
        // control is meaningful from the first tick
        if !encoder.is_degraded() {
            match self.encoder.angle() {
                Ok(angle) => {
                    if let Err(e) = self.steer.set_sensor_position(angle) {
                        warn!("failed to seed {name} steer position: {e}");
                    }
                }
                Err(e) => warn!("failed to read {name} steer encoder: {e}"),
            }
        }

        drive.merge(steer).merge(encoder)
    }

    /// Command the module to a target state.
    pub fn set_target_state(&mut self, target: ModuleState) {
        self.set_target_state_with_ff(target, 0.0);
    }

    /// Command the module to a target state with a linear-acceleration
    /// feedforward added to the drive command.
    pub fn set_target_state_with_ff(&mut self, target: ModuleState, accel_mps2: f64) {
        // The steering shaft position is continuous while targets are wrapped;
        // a failed read falls back to the last wrapped angle
        let shaft_angle = match self.steer.position() {
            Ok(angle) => angle,
            Err(e) => {
                warn!("steer read failed on {}: {e}", self.config.name);
                self.last_position.angle_rad
            }
        };
        let current_angle = wrap_angle(shaft_angle);
        let optimized = optimize(target, current_angle);
        let scaled = cosine_scale(optimized, current_angle);

        let feedforward = self.config.drive_gains.ka * accel_mps2;
        if let Err(e) = self.drive.set_velocity(scaled.speed_mps, feedforward) {
            warn!("drive write failed on {}: {e}", self.config.name);
        }
        // Unwrap the target onto the shaft so a wrap-crossing command turns
        // the short way instead of sweeping back through zero
        let setpoint = shaft_angle + wrap_angle(scaled.angle_rad - current_angle);
        if let Err(e) = self.steer.set_position(setpoint) {
            warn!("steer write failed on {}: {e}", self.config.name);
        }
    }

    /// Current (speed, angle); a failed read warns and returns the last good
    /// value.
    pub fn state(&mut self) -> ModuleState {
        match (self.drive.velocity(), self.steer.position()) {
            (Ok(speed), Ok(angle)) => {
                self.last_state = ModuleState::new(speed, angle);
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("state read failed on {}: {e}", self.config.name);
            }
        }
        self.last_state
    }

    /// Cumulative (distance, angle); a failed read warns and returns the last
    /// good value.
    pub fn position(&mut self) -> ModulePosition {
        match (self.drive.position(), self.steer.position()) {
            (Ok(distance), Ok(angle)) => {
                self.last_position = ModulePosition {
                    distance_m: distance,
                    angle_rad: wrap_angle(angle),
                };
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("position read failed on {}: {e}", self.config.name);
            }
        }
        self.last_position
    }

    /// Zero the cumulative drive distance. Used only at explicit pose reset.
    pub fn reset_drive_encoder(&mut self) {
        // Keep the cached distance in sync with the device: a failed write
        // leaves the device accumulating, so the cache must not claim zero
        match self.drive.set_sensor_position(0.0) {
            Ok(()) => self.last_position.distance_m = 0.0,
            Err(e) => warn!("drive encoder reset failed on {}: {e}", self.config.name),
        }
    }

    /// Instantaneous current draw of both motors, in amps.
    pub fn current_draw(&self) -> f64 {
        self.drive.current().unwrap_or(0.0) + self.steer.current().unwrap_or(0.0)
    }

    /// Advance simulated mechanisms by one tick.
    pub fn step_sim(&mut self, dt: f64) {
        self.drive.step_sim(dt);
        self.steer.step_sim(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::hardware::{SimActuator, SimAngleSensor};
    use std::f64::consts::TAU;

    const EPS: f64 = 1e-9;
    const DEG: f64 = PI / 180.0;

    fn test_config() -> ModuleConfig {
        config::MODULE_CONFIGS[0]
    }

    fn sim_module() -> SwerveModule {
        SwerveModule::new(
            test_config(),
            Box::new(SimActuator::new("drive")),
            Box::new(SimActuator::new("steer")),
            Box::new(SimAngleSensor::new("encoder", 0.0)),
            RetryPolicy::new(config::MAX_CONFIG_RETRIES),
        )
    }

    fn sim_module_with_drive_failures(n: u32) -> SwerveModule {
        let mut drive = SimActuator::new("drive");
        drive.fail_next_configures(n);
        SwerveModule::new(
            test_config(),
            Box::new(drive),
            Box::new(SimActuator::new("steer")),
            Box::new(SimAngleSensor::new("encoder", 0.0)),
            RetryPolicy::new(config::MAX_CONFIG_RETRIES),
        )
    }

    #[test]
    fn test_optimize_flips_long_moves() {
        // At 0 degrees, a 170 degree target flips to -10 with inverted speed
        let target = ModuleState::new(1.0, 170.0 * DEG);
        let out = optimize(target, 0.0);
        assert!((out.angle_rad - (-10.0 * DEG)).abs() < EPS);
        assert!((out.speed_mps + 1.0).abs() < EPS);
    }

    #[test]
    fn test_optimize_keeps_short_moves() {
        // 170 -> -170 is only 20 degrees through the wrap: no flip
        let target = ModuleState::new(1.0, -170.0 * DEG);
        let out = optimize(target, 170.0 * DEG);
        assert!((out.speed_mps - 1.0).abs() < EPS);
        let travel = wrap_angle(out.angle_rad - 170.0 * DEG);
        assert!(travel.abs() <= 20.0 * DEG + EPS);
    }

    #[test]
    fn test_optimize_never_exceeds_quarter_turn() {
        let mut angle = -TAU;
        while angle < TAU {
            let mut target = -TAU;
            while target < TAU {
                let out = optimize(ModuleState::new(1.0, target), angle);
                let travel = wrap_angle(out.angle_rad - wrap_angle(angle));
                assert!(
                    travel.abs() <= FRAC_PI_2 + EPS,
                    "current {angle} target {target} travel {travel}"
                );
                target += 0.1;
            }
            angle += 0.1;
        }
    }

    #[test]
    fn test_cosine_scale() {
        // Aligned wheel: full speed
        let aligned = cosine_scale(ModuleState::new(2.0, 0.0), 0.0);
        assert!((aligned.speed_mps - 2.0).abs() < EPS);

        // 60 degrees off: half speed
        let off = cosine_scale(ModuleState::new(2.0, 0.0), 60.0 * DEG);
        assert!((off.speed_mps - 1.0).abs() < EPS);
    }

    #[test]
    fn test_configure_all_clean() {
        let mut module = sim_module();
        assert_eq!(module.configure_all(), ConfigStatus::Ok);
    }

    #[test]
    fn test_configure_retries_then_succeeds() {
        // k = 3 failures then success: reports success after k + 1 attempts
        let mut module = sim_module_with_drive_failures(3);
        assert_eq!(module.configure_all(), ConfigStatus::Retried(4));
    }

    #[test]
    fn test_configure_exhausts_after_max_attempts() {
        let mut module = sim_module_with_drive_failures(100);
        assert_eq!(
            module.configure_all(),
            ConfigStatus::Failed(config::MAX_CONFIG_RETRIES)
        );
    }

    #[test]
    fn test_failed_device_does_not_rerun_siblings() {
        use std::cell::Cell;
        use std::rc::Rc;

        // Counts configure calls through the trait object boundary
        struct CountingActuator {
            inner: SimActuator,
            attempts: Rc<Cell<u32>>,
        }
        impl crate::hardware::Actuator for CountingActuator {
            fn configure(&mut self, gains: &crate::hardware::ClosedLoopGains) -> crate::hardware::actuator::Result<()> {
                self.attempts.set(self.attempts.get() + 1);
                self.inner.configure(gains)
            }
            fn set_velocity(&mut self, v: f64, ff: f64) -> crate::hardware::actuator::Result<()> {
                self.inner.set_velocity(v, ff)
            }
            fn set_position(&mut self, p: f64) -> crate::hardware::actuator::Result<()> {
                self.inner.set_position(p)
            }
            fn velocity(&self) -> crate::hardware::actuator::Result<f64> {
                self.inner.velocity()
            }
            fn position(&self) -> crate::hardware::actuator::Result<f64> {
                self.inner.position()
            }
            fn current(&self) -> crate::hardware::actuator::Result<f64> {
                self.inner.current()
            }
            fn set_sensor_position(&mut self, p: f64) -> crate::hardware::actuator::Result<()> {
                self.inner.set_sensor_position(p)
            }
        }

        let mut drive = SimActuator::new("drive");
        drive.fail_next_configures(100);
        let steer_attempts = Rc::new(Cell::new(0));
        let steer = CountingActuator {
            inner: SimActuator::new("steer"),
            attempts: steer_attempts.clone(),
        };

        let mut module = SwerveModule::new(
            test_config(),
            Box::new(drive),
            Box::new(steer),
            Box::new(SimAngleSensor::new("encoder", 0.0)),
            RetryPolicy::new(config::MAX_CONFIG_RETRIES),
        );
        let status = module.configure_all();
        assert!(status.is_degraded());
        // The healthy steer motor was configured exactly once, never
        // re-applied because the drive motor kept failing
        assert_eq!(steer_attempts.get(), 1);
        // The module still accepts commands in degraded mode
        module.set_target_state(ModuleState::new(1.0, 0.0));
    }

    #[test]
    fn test_target_state_reaches_actuators() {
        let mut module = sim_module();
        module.configure_all();
        module.set_target_state(ModuleState::new(1.0, 0.0));
        for _ in 0..100 {
            module.step_sim(0.02);
        }
        let state = module.state();
        assert!((state.speed_mps - 1.0).abs() < 1e-2);
        assert!(state.angle_rad.abs() < EPS);
    }

    #[test]
    fn test_steer_travel_stays_short_across_wrap() {
        let mut module = sim_module();
        module.configure_all();

        // Walk the wheel out to +170 degrees in two legal steps
        for angle in [85.0 * DEG, 170.0 * DEG] {
            module.set_target_state(ModuleState::new(0.5, angle));
            for _ in 0..100 {
                module.step_sim(0.02);
            }
        }
        assert!((module.position().angle_rad - 170.0 * DEG).abs() < 1e-6);

        // 170 -> -170 crosses the boundary: the shaft must sweep the 20
        // degrees through the wrap, not 340 back through zero
        let mut prev = module.steer.position().unwrap();
        let mut travel = 0.0;
        for _ in 0..200 {
            module.set_target_state(ModuleState::new(1.0, -170.0 * DEG));
            module.step_sim(0.02);
            let now = module.steer.position().unwrap();
            travel += (now - prev).abs();
            prev = now;
        }
        assert!(
            travel <= FRAC_PI_2 + 1e-6,
            "shaft swept {} degrees",
            travel / DEG
        );
        assert!((module.position().angle_rad - (-170.0 * DEG)).abs() < 1e-6);
    }

    #[test]
    fn test_reset_drive_encoder_zeroes_distance() {
        let mut module = sim_module();
        module.configure_all();
        module.set_target_state(ModuleState::new(1.0, 0.0));
        for _ in 0..100 {
            module.step_sim(0.02);
        }
        assert!(module.position().distance_m > 0.0);
        module.reset_drive_encoder();
        assert_eq!(module.position().distance_m, 0.0);
    }

    #[test]
    fn test_failed_encoder_reset_keeps_cached_distance() {
        use std::cell::Cell;
        use std::rc::Rc;

        // Drive motor with switchable write and read failures
        struct FlakyDrive {
            inner: SimActuator,
            fail_sensor_write: Rc<Cell<bool>>,
            fail_reads: Rc<Cell<bool>>,
        }
        impl FlakyDrive {
            fn injected(&self) -> HardwareError {
                HardwareError::Timeout { device: "drive".into() }
            }
        }
        impl crate::hardware::Actuator for FlakyDrive {
            fn configure(&mut self, gains: &ClosedLoopGains) -> crate::hardware::actuator::Result<()> {
                self.inner.configure(gains)
            }
            fn set_velocity(&mut self, v: f64, ff: f64) -> crate::hardware::actuator::Result<()> {
                self.inner.set_velocity(v, ff)
            }
            fn set_position(&mut self, p: f64) -> crate::hardware::actuator::Result<()> {
                self.inner.set_position(p)
            }
            fn velocity(&self) -> crate::hardware::actuator::Result<f64> {
                if self.fail_reads.get() {
                    return Err(self.injected());
                }
                self.inner.velocity()
            }
            fn position(&self) -> crate::hardware::actuator::Result<f64> {
                if self.fail_reads.get() {
                    return Err(self.injected());
                }
                self.inner.position()
            }
            fn current(&self) -> crate::hardware::actuator::Result<f64> {
                self.inner.current()
            }
            fn set_sensor_position(&mut self, p: f64) -> crate::hardware::actuator::Result<()> {
                if self.fail_sensor_write.get() {
                    return Err(self.injected());
                }
                self.inner.set_sensor_position(p)
            }
            fn step_sim(&mut self, dt: f64) {
                self.inner.step_sim(dt);
            }
        }

        let fail_sensor_write = Rc::new(Cell::new(false));
        let fail_reads = Rc::new(Cell::new(false));
        let drive = FlakyDrive {
            inner: SimActuator::new("drive"),
            fail_sensor_write: fail_sensor_write.clone(),
            fail_reads: fail_reads.clone(),
        };
        let mut module = SwerveModule::new(
            test_config(),
            Box::new(drive),
            Box::new(SimActuator::new("steer")),
            Box::new(SimAngleSensor::new("encoder", 0.0)),
            RetryPolicy::new(config::MAX_CONFIG_RETRIES),
        );
        module.configure_all();
        module.set_target_state(ModuleState::new(1.0, 0.0));
        for _ in 0..100 {
            module.step_sim(0.02);
        }
        let before = module.position().distance_m;
        assert!(before > 0.0);

        // The zeroing write fails: the device keeps its accumulated travel,
        // so the cached distance must not claim zero
        fail_sensor_write.set(true);
        module.reset_drive_encoder();
        fail_reads.set(true);
        assert!((module.position().distance_m - before).abs() < EPS);
    }

    #[test]
    fn test_status_merge_keeps_worst() {
        use ConfigStatus::*;
        assert_eq!(Ok.merge(Ok), Ok);
        assert_eq!(Ok.merge(Retried(2)), Retried(2));
        assert_eq!(Retried(2).merge(Failed(5)), Failed(5));
        assert!(Failed(5).merge(Ok).is_degraded());
    }
}
