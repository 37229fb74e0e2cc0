/*!
Per-tick steering for free-moving (flying and swimming) NPCs.

Two strategies share the [`Steering`] trait so a flying motor can be configured with either:

- [`FlyerSteering`]: hovering bots. Velocity decays exponentially and thrust is applied toward the
  target; obstacles bounce the velocity along the hit normal and the bot keeps a minimum height
  above the floor. Produces banking targets for the body pose.
- [`SteeringAvoidance`]: swimmers. Seek/arrive steering toward the target, a one-second hull probe
  ahead of the current velocity, floor and water-surface corrections, and a per-axis clamp in the
  mover's local frame.
*/

use crate::{
    config::{FlyerConfig, SwimmerConfig},
    constants::{EPSILON, GROUND_CLEARANCE_PUSH, MIN_CLEARANCE_FRACTION, PSEUDO_FORCE_MULTIPLIER},
    kinematics::{exponential_decay, simple_spline_remap, yaw_to_right, yaw_to_vector},
    probe::{MoveProbe, ObstacleKind},
    types::{EntityId, HullSpec, Vec3},
};

/// Whether to slow down when closing in on the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SteeringMode {
    /// Full speed at the target.
    #[default]
    Seek,
    /// Decelerate inside the waypoint distance.
    Arrive,
}

/// Orthonormal frame of a mover facing `yaw` (Y-up, no pitch or roll).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyFrame {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl BodyFrame {
    pub fn from_yaw(yaw: f32) -> Self {
        Self {
            forward: yaw_to_vector(yaw),
            right: yaw_to_right(yaw),
            up: Vec3::y(),
        }
    }

    /// Components of `v` along forward, right and up.
    pub fn to_local(&self, v: &Vec3) -> Vec3 {
        Vec3::new(v.dot(&self.forward), v.dot(&self.right), v.dot(&self.up))
    }

    pub fn to_world(&self, local: &Vec3) -> Vec3 {
        self.forward * local.x + self.right * local.y + self.up * local.z
    }
}

/// Everything a strategy may look at for one tick.
#[derive(Clone, Copy)]
pub struct SteeringInput<'a> {
    pub probe: &'a dyn MoveProbe,
    pub origin: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub target: Vec3,
    pub mode: SteeringMode,
    /// The mover itself; traces ignore it.
    pub mover: Option<EntityId>,
    /// The entity being chased; bumping into it is not avoided.
    pub target_entity: Option<EntityId>,
    pub hull: HullSpec,
    pub interval: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SteeringOutput {
    /// New velocity before the move is attempted.
    pub velocity: Vec3,
    /// Banking targets (flyers).
    pub banking: Vec3,
    /// Clamped steering as a fraction of the per-axis limits (swimmers), for posing.
    pub relative_steer: Vec3,
}

pub trait Steering {
    fn steer(&self, input: &SteeringInput<'_>) -> SteeringOutput;

    /// Speed cap applied to the output velocity.
    fn max_speed(&self) -> f32;

    /// Retry a blocked move at half the step before giving up.
    fn retries_half_step(&self) -> bool {
        false
    }
}

/// Hovering flyer steering.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlyerSteering {
    pub config: FlyerConfig,
}

impl FlyerSteering {
    pub fn new(config: FlyerConfig) -> Self {
        Self { config }
    }

    /// Decay `velocity` and add thrust along `dir`; `accel_xy` drives the planar axes, `accel_y`
    /// the vertical one.
    pub fn move_in_direction(
        &self,
        velocity: Vec3,
        dir: Vec3,
        accel_xy: f32,
        accel_y: f32,
        interval: f32,
    ) -> Vec3 {
        let decay = exponential_decay(self.config.decay, 1.0, interval);
        let accel_xy = accel_xy * interval;
        let accel_y = accel_y * interval;
        Vec3::new(
            decay * velocity.x + accel_xy * dir.x,
            decay * velocity.y + accel_y * dir.y,
            decay * velocity.z + accel_xy * dir.z,
        )
    }

    /// Thrust toward `target`. Returns the new velocity and the unit direction to the target.
    pub fn steer_toward(
        &self,
        origin: Vec3,
        velocity: Vec3,
        target: Vec3,
        interval: f32,
    ) -> (Vec3, Vec3) {
        let offset = target - origin;
        let dist = offset.norm();
        if dist <= EPSILON || interval <= 0.0 {
            return (velocity, Vec3::zeros());
        }
        let target_dir = offset / dist;

        let heading = velocity.try_normalize(EPSILON).unwrap_or_else(Vec3::zeros);
        let mut accel = if target_dir.dot(&heading) > self.config.forward_dot {
            self.config.accel_forward
        } else {
            self.config.accel_correcting
        };
        let mut accel_y = self.config.accel_vertical;

        // Do not thrust past the target in a single step.
        let reach = dist / interval;
        accel = accel.min(reach);
        accel_y = accel_y.min(reach);

        (
            self.move_in_direction(velocity, target_dir, accel, accel_y, interval),
            target_dir,
        )
    }

    /// Extra velocity that keeps the flyer off walls and the floor.
    pub fn avoid_obstacles(
        &self,
        probe: &dyn MoveProbe,
        origin: Vec3,
        velocity: Vec3,
        interval: f32,
        mover: Option<EntityId>,
    ) -> Vec3 {
        let travel = velocity * interval;
        if travel.norm() > EPSILON {
            let tr = probe.trace_line(origin, origin + travel, mover);
            if !tr.is_clear() {
                return tr.normal * 0.5 * velocity.norm();
            }
        }

        let down = origin - Vec3::new(0.0, self.config.min_ground_distance, 0.0);
        let tr = probe.trace_line(origin, down, mover);
        if !tr.is_clear() {
            return Vec3::new(
                0.0,
                GROUND_CLEARANCE_PUSH / tr.fraction.max(MIN_CLEARANCE_FRACTION),
                0.0,
            );
        }

        Vec3::zeros()
    }

    /// Lean into turns, scaled by how close to top speed the flyer is.
    pub fn banking(&self, yaw: f32, target_dir: Vec3, speed: f32) -> Vec3 {
        let right = yaw_to_right(yaw);
        let bank = Vec3::new(
            target_dir.x,
            0.0,
            self.config.banking_scale * right.dot(&target_dir),
        );
        let speed_perc =
            simple_spline_remap(speed, 0.0, self.config.max_speed, 0.0, 1.0).clamp(0.0, 1.0);
        bank * speed_perc
    }
}

impl Steering for FlyerSteering {
    fn steer(&self, input: &SteeringInput<'_>) -> SteeringOutput {
        let (mut velocity, target_dir) =
            self.steer_toward(input.origin, input.velocity, input.target, input.interval);
        velocity += self.avoid_obstacles(
            input.probe,
            input.origin,
            velocity,
            input.interval,
            input.mover,
        );

        let speed = velocity.norm();
        if speed > self.config.max_speed {
            velocity *= self.config.max_speed / speed;
        }

        SteeringOutput {
            velocity,
            banking: self.banking(input.yaw, target_dir, velocity.norm()),
            relative_steer: Vec3::zeros(),
        }
    }

    fn max_speed(&self) -> f32 {
        self.config.max_speed
    }
}

/// Swimmer steering with obstacle avoidance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SteeringAvoidance {
    pub config: SwimmerConfig,
}

impl SteeringAvoidance {
    pub fn new(config: SwimmerConfig) -> Self {
        Self { config }
    }

    /// Steer to reach `target` at full speed.
    pub fn seek(&self, origin: Vec3, velocity: Vec3, target: Vec3) -> Vec3 {
        let dir = (target - origin)
            .try_normalize(EPSILON)
            .unwrap_or_else(Vec3::zeros);
        dir * self.config.ground_speed - velocity
    }

    /// Steer to stop at `target`, slowing inside the waypoint distance.
    pub fn arrive(&self, origin: Vec3, velocity: Vec3, target: Vec3) -> Vec3 {
        let offset = target - origin;
        let dist = offset.norm();
        let ideal = self.config.ground_speed * (dist / self.config.waypoint_distance);
        let clipped = ideal.min(self.config.ground_speed);

        let desired = if dist > self.config.waypoint_distance {
            offset * (clipped / dist)
        } else {
            Vec3::zeros()
        };
        desired - velocity
    }

    /// Avoidance steering, or `None` when nothing needs avoiding.
    pub fn avoid_obstacles(&self, input: &SteeringInput<'_>) -> Option<Vec3> {
        let origin = input.origin;
        let velocity = input.velocity;
        let speed = velocity.norm();

        let mut steer = Vec3::zeros();
        let mut collided = false;

        if speed > EPSILON {
            // Look one second ahead.
            let tr = input
                .probe
                .trace_hull(origin, origin + velocity, input.hull, input.mover);

            if tr.hit_entity(input.target_entity) {
                return None;
            }

            if !tr.is_clear() {
                let scale = if tr.fraction > 0.0 {
                    speed / tr.fraction
                } else {
                    speed * PSEUDO_FORCE_MULTIPLIER
                };

                steer = match tr.entity {
                    Some(hit) if hit.kind == ObstacleKind::Character => {
                        log::trace!("swimmer: steering around character {}", hit.id);
                        // Part of the contact normal perpendicular to the velocity; head-on hits
                        // fall back to the normal itself.
                        let side = velocity.cross(&tr.normal).cross(&velocity);
                        side.try_normalize(EPSILON).unwrap_or(tr.normal) * scale
                    }
                    _ => tr.normal * scale,
                };
                collided = true;
            }
        }

        // Keep some water under the belly.
        let below = origin - Vec3::new(0.0, self.config.height_preference, 0.0);
        let tr = input.probe.trace_line(origin, below, input.mover);
        if !tr.is_clear() {
            steer.y += self.config.accel_max.z / tr.fraction.max(MIN_CLEARANCE_FRACTION);
            collided = true;
        }

        if !self.config.ignore_surface {
            let depth = self.config.depth_preference;
            let surface = input.probe.water_level(origin, origin.y, origin.y + depth);
            let level = (surface - origin.y) / depth;
            if level < 1.0 {
                steer.y -= self.config.accel_max.z / level.max(MIN_CLEARANCE_FRACTION);
                collided = true;
            }
        }

        collided.then_some(steer)
    }

    /// Clamp `steer` per local axis. Returns the clamped world steering and the per-axis fraction
    /// of the maximum.
    pub fn clamp(&self, steer: Vec3, frame: &BodyFrame) -> (Vec3, Vec3) {
        let local = frame.to_local(&steer);
        let (min, max) = (self.config.accel_min, self.config.accel_max);

        let clamped = Vec3::new(
            clamp_axis(local.x, min.x, max.x),
            clamp_axis(local.y, min.y, max.y),
            clamp_axis(local.z, min.z, max.z),
        );
        let relative = Vec3::new(
            ratio(clamped.x, max.x),
            ratio(clamped.y, max.y),
            ratio(clamped.z, max.z),
        );

        (frame.to_world(&clamped), relative)
    }
}

fn clamp_axis(v: f32, min: f32, max: f32) -> f32 {
    if v > 0.0 { v.min(max) } else { v.max(min) }
}

fn ratio(v: f32, max: f32) -> f32 {
    if max.abs() > EPSILON { v / max } else { 0.0 }
}

impl Steering for SteeringAvoidance {
    fn steer(&self, input: &SteeringInput<'_>) -> SteeringOutput {
        let mut steer = match input.mode {
            SteeringMode::Seek => self.seek(input.origin, input.velocity, input.target),
            SteeringMode::Arrive => self.arrive(input.origin, input.velocity, input.target),
        };

        if let Some(avoid) = self.avoid_obstacles(input) {
            steer = avoid;
        }

        let frame = BodyFrame::from_yaw(input.yaw);
        let (steer, relative_steer) = self.clamp(steer, &frame);

        let mut velocity = input.velocity + steer * input.interval;
        let speed = velocity.norm();
        if speed > self.config.ground_speed {
            velocity *= self.config.ground_speed / speed;
        }

        SteeringOutput {
            velocity,
            banking: Vec3::zeros(),
            relative_steer,
        }
    }

    fn max_speed(&self) -> f32 {
        self.config.ground_speed
    }

    fn retries_half_step(&self) -> bool {
        true
    }
}
