// Simulated hardware
//
// First-order mechanism models good enough to exercise the control loop,
// odometry, and the configuration retry path without a robot attached.
// Configuration failures can be scripted for retry testing.

use crate::swerve::kinematics::wrap_angle;

use super::actuator::{Actuator, AngleSensor, ClosedLoopGains, HardwareError, Result};
use super::heading::HeadingProvider;

// Closed-loop tracking time constant for the velocity model
const VELOCITY_TAU_S: f64 = 0.1;
// Steering slew limit in rad/s
const STEER_RATE_RAD_S: f64 = 20.0;
// Crude current model: idle draw plus a velocity-proportional term
const IDLE_CURRENT_A: f64 = 0.4;
const CURRENT_PER_UNIT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ControlMode {
    Idle,
    Velocity,
    Position,
}

/// A simulated closed-loop motor controller.
pub struct SimActuator {
    name: String,
    mode: ControlMode,
    target_velocity: f64,
    target_position: f64,
    velocity: f64,
    position: f64,
    configured: bool,
    // Scripted configure failures remaining
    fail_configures: u32,
    config_attempts: u32,
}

impl SimActuator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: ControlMode::Idle,
            target_velocity: 0.0,
            target_position: 0.0,
            velocity: 0.0,
            position: 0.0,
            configured: false,
            fail_configures: 0,
            config_attempts: 0,
        }
    }

    /// Make the next `n` configure calls fail with a bus error.
    pub fn fail_next_configures(&mut self, n: u32) {
        self.fail_configures = n;
    }

    /// Number of configure calls seen so far.
    pub fn config_attempts(&self) -> u32 {
        self.config_attempts
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }
}

impl Actuator for SimActuator {
    fn configure(&mut self, _gains: &ClosedLoopGains) -> Result<()> {
        self.config_attempts += 1;
        if self.fail_configures > 0 {
            self.fail_configures -= 1;
            return Err(HardwareError::Bus {
                device: self.name.clone(),
                reason: "injected configure failure".into(),
            });
        }
        self.configured = true;
        Ok(())
    }

    fn set_velocity(&mut self, velocity: f64, _feedforward: f64) -> Result<()> {
        self.mode = ControlMode::Velocity;
        self.target_velocity = velocity;
        Ok(())
    }

    fn set_position(&mut self, position: f64) -> Result<()> {
        self.mode = ControlMode::Position;
        self.target_position = position;
        Ok(())
    }

    fn velocity(&self) -> Result<f64> {
        Ok(self.velocity)
    }

    fn position(&self) -> Result<f64> {
        Ok(self.position)
    }

    fn current(&self) -> Result<f64> {
        Ok(IDLE_CURRENT_A + CURRENT_PER_UNIT * self.velocity.abs())
    }

    fn set_sensor_position(&mut self, position: f64) -> Result<()> {
        self.position = position;
        if self.mode == ControlMode::Position {
            self.target_position = position;
        }
        Ok(())
    }

    fn step_sim(&mut self, dt: f64) {
        match self.mode {
            ControlMode::Idle => {}
            ControlMode::Velocity => {
                let alpha = (dt / VELOCITY_TAU_S).min(1.0);
                self.velocity += (self.target_velocity - self.velocity) * alpha;
                self.position += self.velocity * dt;
            }
            ControlMode::Position => {
                let error = self.target_position - self.position;
                let step = (STEER_RATE_RAD_S * dt).min(error.abs());
                self.position += step.copysign(error);
                self.velocity = if dt > 0.0 { step.copysign(error) / dt } else { 0.0 };
            }
        }
    }
}

/// A simulated absolute steering encoder with a fixed mount angle.
pub struct SimAngleSensor {
    name: String,
    mount_angle_rad: f64,
    offset_rad: f64,
    fail_configures: u32,
    config_attempts: u32,
}

impl SimAngleSensor {
    pub fn new(name: impl Into<String>, mount_angle_rad: f64) -> Self {
        Self {
            name: name.into(),
            mount_angle_rad,
            offset_rad: 0.0,
            fail_configures: 0,
            config_attempts: 0,
        }
    }

    pub fn fail_next_configures(&mut self, n: u32) {
        self.fail_configures = n;
    }

    pub fn config_attempts(&self) -> u32 {
        self.config_attempts
    }
}

impl AngleSensor for SimAngleSensor {
    fn configure(&mut self, offset_rad: f64) -> Result<()> {
        self.config_attempts += 1;
        if self.fail_configures > 0 {
            self.fail_configures -= 1;
            return Err(HardwareError::Timeout {
                device: self.name.clone(),
            });
        }
        self.offset_rad = offset_rad;
        Ok(())
    }

    fn angle(&self) -> Result<f64> {
        Ok(wrap_angle(self.mount_angle_rad - self.offset_rad))
    }
}

/// A simulated gyro advanced by the drivetrain's sim step.
#[derive(Debug, Default)]
pub struct SimHeading {
    heading_rad: f64,
    rate_rad_s: f64,
}

impl SimHeading {
    pub fn new(heading_rad: f64) -> Self {
        Self {
            heading_rad,
            rate_rad_s: 0.0,
        }
    }
}

impl HeadingProvider for SimHeading {
    fn heading(&self) -> Result<f64> {
        Ok(self.heading_rad)
    }

    fn heading_rate(&self) -> Result<f64> {
        Ok(self.rate_rad_s)
    }

    fn reset_heading(&mut self) -> Result<()> {
        self.heading_rad = 0.0;
        self.rate_rad_s = 0.0;
        Ok(())
    }

    fn step_sim(&mut self, rate_rad_s: f64, dt: f64) {
        self.rate_rad_s = rate_rad_s;
        self.heading_rad = wrap_angle(self.heading_rad + rate_rad_s * dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains() -> ClosedLoopGains {
        ClosedLoopGains { kp: 1.0, ki: 0.0, kd: 0.0, kv: 0.0, ka: 0.0 }
    }

    #[test]
    fn test_velocity_mode_converges_and_integrates() {
        let mut motor = SimActuator::new("drive");
        motor.set_velocity(2.0, 0.0).unwrap();
        for _ in 0..200 {
            motor.step_sim(0.02);
        }
        assert!((motor.velocity().unwrap() - 2.0).abs() < 1e-3);
        assert!(motor.position().unwrap() > 0.0);
    }

    #[test]
    fn test_position_mode_slews_to_target() {
        let mut steer = SimActuator::new("steer");
        steer.set_position(1.0).unwrap();
        for _ in 0..100 {
            steer.step_sim(0.02);
        }
        assert!((steer.position().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scripted_configure_failures() {
        let mut motor = SimActuator::new("drive");
        motor.fail_next_configures(2);
        assert!(motor.configure(&gains()).is_err());
        assert!(motor.configure(&gains()).is_err());
        assert!(motor.configure(&gains()).is_ok());
        assert_eq!(motor.config_attempts(), 3);
        assert!(motor.is_configured());
    }

    #[test]
    fn test_encoder_applies_offset() {
        let mut encoder = SimAngleSensor::new("encoder", 0.5);
        encoder.configure(0.5).unwrap();
        assert!(encoder.angle().unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_sim_heading_integrates_rate() {
        let mut gyro = SimHeading::new(0.0);
        for _ in 0..50 {
            gyro.step_sim(1.0, 0.02);
        }
        assert!((gyro.heading().unwrap() - 1.0).abs() < 1e-9);
        assert!((gyro.heading_rate().unwrap() - 1.0).abs() < 1e-9);
    }
}
