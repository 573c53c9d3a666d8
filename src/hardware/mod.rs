// Hardware abstraction layer
//
// Provides:
// - Capability traits for closed-loop actuators and angle sensors
// - The heading (gyro) provider trait
// - Simulated implementations used for offline testing and bring-up

pub mod actuator;
pub mod heading;
pub mod sim;

pub use actuator::{Actuator, AngleSensor, ClosedLoopGains, HardwareError};
pub use heading::HeadingProvider;
pub use sim::{SimActuator, SimAngleSensor, SimHeading};
