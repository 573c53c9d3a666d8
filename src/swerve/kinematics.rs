// Swerve drive kinematics
// Converts chassis-frame velocities (vx, vy, omega) to per-module (speed, angle)
// pairs and back, for a fixed rectangular wheelbase.

use std::f64::consts::{PI, TAU};

/// Chassis translation + rotation rate as a single 3-DOF vector.
///
/// Whether this is robot-relative or field-relative is tracked by the caller,
/// not by the type.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChassisSpeeds {
    /// Forward velocity in m/s (positive = forward)
    pub vx: f64,
    /// Lateral velocity in m/s (positive = left)
    pub vy: f64,
    /// Rotational velocity in rad/s (positive = counter-clockwise)
    pub omega: f64,
}

impl ChassisSpeeds {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.omega.is_finite()
    }

    /// Rotate a field-relative velocity into the robot frame given the
    /// robot's field heading.
    pub fn from_field_relative(field: ChassisSpeeds, heading_rad: f64) -> Self {
        let (sin, cos) = heading_rad.sin_cos();
        Self {
            vx: field.vx * cos + field.vy * sin,
            vy: -field.vx * sin + field.vy * cos,
            omega: field.omega,
        }
    }

    /// Rotate a robot-relative velocity into the field frame.
    pub fn to_field_relative(robot: ChassisSpeeds, heading_rad: f64) -> Self {
        Self::from_field_relative(robot, -heading_rad)
    }
}

/// A wheel's instantaneous (speed, steering angle) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModuleState {
    /// Signed wheel-frame speed in m/s
    pub speed_mps: f64,
    /// Steering angle in rad, normalized to (-pi, pi]
    pub angle_rad: f64,
}

impl ModuleState {
    pub fn new(speed_mps: f64, angle_rad: f64) -> Self {
        Self {
            speed_mps,
            angle_rad: wrap_angle(angle_rad),
        }
    }
}

/// A wheel's cumulative travel and current steering angle, read for odometry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModulePosition {
    /// Cumulative drive distance in m
    pub distance_m: f64,
    /// Steering angle in rad
    pub angle_rad: f64,
}

/// A small chassis displacement over one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Twist2d {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

/// Normalize an angle to (-pi, pi].
pub fn wrap_angle(angle_rad: f64) -> f64 {
    let a = angle_rad.rem_euclid(TAU);
    if a > PI { a - TAU } else { a }
}

/// Stateless kinematics for a four-module swerve base.
///
/// Module order is [front-left, front-right, back-left, back-right], with
/// positions given as (x forward, y left) offsets from the chassis center.
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    positions: [(f64, f64); 4],
    // Sum of |r_i|^2, used by the least-squares forward transform
    sum_r_sq: f64,
}

impl SwerveKinematics {
    pub fn new(positions: [(f64, f64); 4]) -> Self {
        let sum_r_sq = positions.iter().map(|(x, y)| x * x + y * y).sum();
        Self { positions, sum_r_sq }
    }

    /// Build kinematics for a rectangular base from its full wheelbase length
    /// (front-back) and track width (left-right), both in meters.
    pub fn rectangular(wheelbase_m: f64, track_width_m: f64) -> Self {
        let hl = wheelbase_m / 2.0;
        let hw = track_width_m / 2.0;
        Self::new([(hl, hw), (hl, -hw), (-hl, hw), (-hl, -hw)])
    }

    pub fn module_positions(&self) -> [(f64, f64); 4] {
        self.positions
    }

    /// Inverse kinematics: chassis velocity to four module states.
    ///
    /// Each wheel's velocity is the chassis translation plus omega cross the
    /// wheel's position vector.
    pub fn to_module_states(&self, speeds: ChassisSpeeds) -> [ModuleState; 4] {
        self.positions.map(|(x, y)| {
            let wx = speeds.vx - speeds.omega * y;
            let wy = speeds.vy + speeds.omega * x;
            let speed = wx.hypot(wy);
            // Hold angle at zero for a zero-velocity wheel so a stopped
            // chassis does not slew the steering.
            let angle = if speed < 1e-9 { 0.0 } else { wy.atan2(wx) };
            ModuleState::new(speed, angle)
        })
    }

    /// Forward kinematics: four module states to chassis velocity.
    ///
    /// Least-squares solution; exact for a base whose module positions sum to
    /// zero (any rectangular layout centered on the chassis origin).
    pub fn to_chassis_speeds(&self, states: &[ModuleState; 4]) -> ChassisSpeeds {
        let mut vx = 0.0;
        let mut vy = 0.0;
        let mut cross = 0.0;
        for (state, (x, y)) in states.iter().zip(self.positions) {
            let wx = state.speed_mps * state.angle_rad.cos();
            let wy = state.speed_mps * state.angle_rad.sin();
            vx += wx;
            vy += wy;
            cross += x * wy - y * wx;
        }
        ChassisSpeeds {
            vx: vx / 4.0,
            vy: vy / 4.0,
            omega: cross / self.sum_r_sq,
        }
    }

    /// Forward kinematics on per-module travel deltas, yielding the chassis
    /// displacement for one odometry step.
    pub fn to_twist(&self, deltas: &[ModulePosition; 4]) -> Twist2d {
        let states = deltas.map(|d| ModuleState {
            speed_mps: d.distance_m,
            angle_rad: d.angle_rad,
        });
        let speeds = self.to_chassis_speeds(&states);
        Twist2d {
            dx: speeds.vx,
            dy: speeds.vy,
            dtheta: speeds.omega,
        }
    }

    /// Scale all module speeds uniformly so none exceeds `max_speed_mps`.
    ///
    /// Preserves the speed ratios between modules and therefore the commanded
    /// motion direction; only the magnitude is clamped.
    pub fn desaturate(states: &mut [ModuleState; 4], max_speed_mps: f64) {
        let top = states
            .iter()
            .map(|s| s.speed_mps.abs())
            .fold(0.0f64, f64::max);
        if top > max_speed_mps {
            let scale = max_speed_mps / top;
            for state in states.iter_mut() {
                state.speed_mps *= scale;
            }
        }
    }

    /// Correct a chassis velocity for the fact that translation and rotation
    /// are applied simultaneously over a discrete tick.
    ///
    /// Naively holding (vx, vy, omega) constant for `dt` drives the robot
    /// along a chord instead of the intended arc, drifting in proportion to
    /// omega * dt. Taking the pose logarithm of the intended one-tick
    /// displacement yields the constant twist that actually lands there.
    pub fn discretize(speeds: ChassisSpeeds, dt: f64) -> ChassisSpeeds {
        let dx = speeds.vx * dt;
        let dy = speeds.vy * dt;
        let dtheta = speeds.omega * dt;

        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = dtheta.cos() - 1.0;
        let half_theta_by_tan = if cos_minus_one.abs() < 1e-9 {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        // Rotate (dx, dy) by Rotation(half_theta_by_tan, -half_dtheta) and
        // scale by its magnitude: the closed form of log(exp of the delta).
        let norm = half_theta_by_tan.hypot(half_dtheta);
        let cos = half_theta_by_tan / norm;
        let sin = -half_dtheta / norm;
        let tx = (dx * cos - dy * sin) * norm;
        let ty = (dx * sin + dy * cos) * norm;

        ChassisSpeeds {
            vx: tx / dt,
            vy: ty / dt,
            omega: speeds.omega,
        }
    }
}
