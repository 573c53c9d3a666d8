// Dead-reckoning pose estimation
//
// Translation comes from forward kinematics on wheel travel deltas; heading
// always comes from the gyro (wheel-derived heading drifts with scrub and is
// only used when the gyro delta is unavailable upstream).

use crate::swerve::kinematics::{ModulePosition, SwerveKinematics, Twist2d, wrap_angle};

/// 2-D position + heading in the field frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose2d {
    pub x: f64,
    pub y: f64,
    pub heading_rad: f64,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, heading_rad: f64) -> Self {
        Self { x, y, heading_rad }
    }

    /// Apply a robot-frame twist to this pose (pose exponential).
    pub fn exp(&self, twist: Twist2d) -> Pose2d {
        let dtheta = twist.dtheta;
        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
        };
        let local_dx = twist.dx * s - twist.dy * c;
        let local_dy = twist.dx * c + twist.dy * s;

        let (sin_h, cos_h) = self.heading_rad.sin_cos();
        Pose2d {
            x: self.x + local_dx * cos_h - local_dy * sin_h,
            y: self.y + local_dx * sin_h + local_dy * cos_h,
            heading_rad: wrap_angle(self.heading_rad + dtheta),
        }
    }
}

/// Fuses per-wheel travel with the gyro heading into a running pose.
///
/// Single-writer: `update` is called exactly once per control tick.
pub struct PoseEstimator {
    kinematics: SwerveKinematics,
    pose: Pose2d,
    // pose heading = gyro heading + offset, so reset can place the robot at an
    // arbitrary field heading without touching the gyro
    gyro_offset_rad: f64,
    prev_heading_rad: f64,
    prev_positions: [ModulePosition; 4],
}

impl PoseEstimator {
    pub fn new(
        kinematics: SwerveKinematics,
        heading_rad: f64,
        positions: [ModulePosition; 4],
        pose: Pose2d,
    ) -> Self {
        Self {
            kinematics,
            pose,
            gyro_offset_rad: wrap_angle(pose.heading_rad - heading_rad),
            prev_heading_rad: heading_rad,
            prev_positions: positions,
        }
    }

    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    /// Advance the estimate by one tick of wheel travel and gyro heading.
    pub fn update(&mut self, heading_rad: f64, positions: &[ModulePosition; 4]) -> Pose2d {
        let mut deltas = [ModulePosition::default(); 4];
        for i in 0..4 {
            deltas[i] = ModulePosition {
                distance_m: positions[i].distance_m - self.prev_positions[i].distance_m,
                angle_rad: positions[i].angle_rad,
            };
        }

        let mut twist = self.kinematics.to_twist(&deltas);
        // The gyro is authoritative for rotation
        twist.dtheta = wrap_angle(heading_rad - self.prev_heading_rad);

        let moved = self.pose.exp(twist);
        self.pose = Pose2d {
            x: moved.x,
            y: moved.y,
            heading_rad: wrap_angle(heading_rad + self.gyro_offset_rad),
        };

        self.prev_heading_rad = heading_rad;
        self.prev_positions = *positions;
        self.pose
    }

    /// Replace the estimate and re-baseline the stored wheel positions.
    pub fn reset(&mut self, pose: Pose2d, heading_rad: f64, positions: &[ModulePosition; 4]) {
        self.pose = pose;
        self.gyro_offset_rad = wrap_angle(pose.heading_rad - heading_rad);
        self.prev_heading_rad = heading_rad;
        self.prev_positions = *positions;
    }
}
