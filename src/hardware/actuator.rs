// Capability traits for drivetrain hardware
//
// Everything above this layer works in mechanism units: meters and m/s for a
// drive wheel, radians for a steering shaft. Gear and encoder conversions are
// an implementation concern behind these traits.

/// Error types for device communication
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("bus error on {device}: {reason}")]
    Bus { device: String, reason: String },

    #[error("timeout waiting for {device}")]
    Timeout { device: String },

    #[error("{device} reported fault code 0x{code:02X}")]
    Fault { device: String, code: u8 },
}

pub type Result<T> = std::result::Result<T, HardwareError>;

/// Closed-loop controller gains applied at configuration time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedLoopGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Velocity feedforward
    pub kv: f64,
    /// Acceleration feedforward
    pub ka: f64,
}

/// A motor controller with onboard closed-loop velocity and position control.
pub trait Actuator {
    /// Apply closed-loop gains. May fail transiently; callers retry.
    fn configure(&mut self, gains: &ClosedLoopGains) -> Result<()>;

    /// Command closed-loop velocity with an additive feedforward term.
    fn set_velocity(&mut self, velocity: f64, feedforward: f64) -> Result<()>;

    /// Command closed-loop position.
    fn set_position(&mut self, position: f64) -> Result<()>;

    fn velocity(&self) -> Result<f64>;

    /// Integrated position since the last `set_sensor_position`.
    fn position(&self) -> Result<f64>;

    fn current(&self) -> Result<f64>;

    /// Overwrite the integrated position (zeroing, or seeding the steering
    /// shaft from an absolute encoder).
    fn set_sensor_position(&mut self, position: f64) -> Result<()>;

    /// Advance a simulated mechanism by one tick. Real hardware ignores this.
    fn step_sim(&mut self, _dt: f64) {}
}

/// An absolute angle sensor on a steering shaft.
pub trait AngleSensor {
    /// Apply the mounting offset so `angle` reads the true wheel angle.
    fn configure(&mut self, offset_rad: f64) -> Result<()>;

    /// Absolute wheel angle in rad, normalized to (-pi, pi].
    fn angle(&self) -> Result<f64>;
}
