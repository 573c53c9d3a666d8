// Swerve drivetrain core
//
// Provides:
// - Bidirectional chassis/module kinematics with desaturation and
//   tick discretization
// - Per-module closed-loop control with angle-wrap optimization
// - Gyro-fused dead-reckoning pose estimation
// - The orchestrating drivetrain controller

pub mod drive;
pub mod kinematics;
pub mod module;
pub mod odometry;

pub use drive::SwerveDrive;
pub use kinematics::{ChassisSpeeds, ModulePosition, ModuleState, SwerveKinematics, wrap_angle};
pub use module::{ConfigStatus, ModuleConfig, RetryPolicy, SwerveModule};
pub use odometry::{Pose2d, PoseEstimator};
