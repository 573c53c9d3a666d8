// Heading sensor abstraction
//
// The gyro is authoritative for rotation: odometry only ever takes
// translation from the wheels. Injected into the drivetrain at construction
// so tests can substitute a scripted heading.

use super::actuator::Result;

pub trait HeadingProvider {
    /// Yaw in rad, counter-clockwise positive.
    fn heading(&self) -> Result<f64>;

    /// Yaw rate in rad/s.
    fn heading_rate(&self) -> Result<f64>;

    /// Re-zero the sensor. Called only on explicit pose reset.
    fn reset_heading(&mut self) -> Result<()>;

    /// Advance a simulated gyro at the given rate. Real hardware ignores this.
    fn step_sim(&mut self, _rate_rad_s: f64, _dt: f64) {}
}
