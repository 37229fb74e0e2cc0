/*!
Motors: turn a movement goal into per-tick position, velocity and yaw changes.

Every motor implements [`Motor`]. The caller owns the mover ([`MoverBody`]) and the world
([`MoveProbe`]) and passes both in through a [`MotorContext`] on each call; motors keep only their
own integration state ([`MotorState`]) between ticks.

Variants:
- [`GroundBlendedMotor`]: follows a velocity script and a turn script built from the path.
- [`FlyingMotor`]: fly-path progress plus a [`Steering`](crate::steering::Steering) strategy
  (hovering bots, or swimmers as [`SwimmingMotor`]).
- [`PhysicsFlyingMotor`]: the same steering driving a lagging point-mass body.
*/

mod flying;
mod ground;
mod physics;

pub use flying::{FlyingMotor, SwimmingMotor};
pub use ground::GroundBlendedMotor;
pub use physics::PhysicsFlyingMotor;

use crate::{
    constants::{ARRIVED_DISTANCE, BLOCKED_TOLERANCE, EPSILON},
    kinematics::{angle_diff, approach_angle, change_distance, yaw_from_vector},
    path::Path,
    probe::{MoveProbe, MoveTrace},
    turn_script::TurnScript,
    types::{EntityId, HullSpec, MotorMoveResult, NavType, Vec3},
    velocity_script::VelocityScript,
};

/// The moving character as the motor sees it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoverBody {
    /// Ignored by the mover's own traces.
    pub id: Option<EntityId>,
    pub origin: Vec3,
    /// Degrees.
    pub yaw: f32,
    pub ideal_speed: f32,
    pub ideal_accel: f32,
    /// Positive magnitude along -Y.
    pub gravity: f32,
    pub hull: HullSpec,
}

impl Default for MoverBody {
    fn default() -> Self {
        Self {
            id: None,
            origin: Vec3::zeros(),
            yaw: 0.0,
            ideal_speed: 0.0,
            ideal_accel: 0.0,
            gravity: 600.0,
            hull: HullSpec::default(),
        }
    }
}

/// Per-call access to the mover and its world.
pub struct MotorContext<'a> {
    pub body: &'a mut MoverBody,
    pub probe: &'a dyn MoveProbe,
    /// Seconds covered by this call.
    pub interval: f32,
}

/// What the mover is trying to do this tick.
pub struct MoveGoal<'a> {
    pub path: &'a mut Path,
    /// Entity the move aims at; bumping into it is not a failure.
    pub target: Option<EntityId>,
    /// End of the caller's direct trace when it was obstructed.
    pub obstruction: Option<Vec3>,
    /// End of the caller's look-ahead trace, used for grade speed adjust and head yaw.
    pub look_ahead: Option<Vec3>,
}

impl<'a> MoveGoal<'a> {
    pub fn new(path: &'a mut Path) -> Self {
        Self {
            path,
            target: None,
            obstruction: None,
            look_ahead: None,
        }
    }
}

/// Integration state a motor carries between ticks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MotorState {
    pub current_velocity: Vec3,
    /// Banking targets for flyers (x = pitch-ish lean, z = roll).
    pub current_banking: Vec3,
    /// Head yaw relative to the body, degrees.
    pub head_yaw: f32,
    pub velocity_script: VelocityScript,
    pub turn_script: TurnScript,
    /// Seconds since the scripts were built.
    pub script_clock: f32,
    /// Fixed yaw rate requested by the caller.
    pub yaw_speed_override: Option<f32>,
    pub decelerating_to_goal: bool,
    /// Last clamped steering, relative to the per-axis limits (swimmers).
    pub relative_steer: Vec3,
}

impl MotorState {
    /// Drop both scripts and their clock. Velocity and facing persist.
    pub fn clear_scripts(&mut self) {
        self.velocity_script = VelocityScript::default();
        self.turn_script = TurnScript::default();
        self.script_clock = 0.0;
    }

    pub fn has_scripts(&self) -> bool {
        !self.velocity_script.is_empty()
    }
}

pub trait Motor {
    fn state(&self) -> &MotorState;

    fn state_mut(&mut self) -> &mut MotorState;

    /// A new move is starting; scripts are rebuilt on the next execute.
    fn move_start(&mut self) {
        let state = self.state_mut();
        state.clear_scripts();
        state.decelerating_to_goal = false;
    }

    fn move_stop(&mut self) {
        let state = self.state_mut();
        state.clear_scripts();
        state.decelerating_to_goal = false;
        log::debug!("motor: move stopped");
    }

    fn reset_move_calculations(&mut self) {
        self.state_mut().clear_scripts();
    }

    fn move_ground_execute(
        &mut self,
        ctx: &mut MotorContext<'_>,
        goal: &mut MoveGoal<'_>,
    ) -> MotorMoveResult;

    fn move_fly_execute(
        &mut self,
        ctx: &mut MotorContext<'_>,
        goal: &mut MoveGoal<'_>,
    ) -> MotorMoveResult;

    /// Dispatch on the navigation type of the current waypoint.
    fn move_execute(
        &mut self,
        ctx: &mut MotorContext<'_>,
        goal: &mut MoveGoal<'_>,
    ) -> MotorMoveResult {
        match goal.path.current().nav_type {
            NavType::Fly => self.move_fly_execute(ctx, goal),
            _ => self.move_ground_execute(ctx, goal),
        }
    }

    /// Remaining scripted travel time up to the arrival distance, or -1 without a script.
    fn move_script_total_time(&self) -> f32 {
        -1.0
    }

    /// Yaw rate (degrees per second) that replaces the motor's default, if any.
    fn yaw_speed_override(&self) -> Option<f32> {
        self.state().yaw_speed_override
    }

    fn set_yaw_speed_override(&mut self, rate: Option<f32>) {
        self.state_mut().yaw_speed_override = rate;
    }
}

/// Map a swept move onto a [`MotorMoveResult`].
///
/// A move that made no progress at all fails, unless it ran into the entity it was aiming for.
pub fn classify_move(trace: &MoveTrace, target: Option<EntityId>) -> MotorMoveResult {
    if !trace.status.is_blocked() {
        return MotorMoveResult::Success;
    }

    let hit_target = target.is_some() && trace.obstruction == target;
    if (trace.dist_obstructed - trace.total_distance).abs() <= BLOCKED_TOLERANCE {
        return if hit_target {
            MotorMoveResult::PartialHitTarget
        } else {
            MotorMoveResult::Failed
        };
    }

    if hit_target {
        MotorMoveResult::PartialHitTarget
    } else {
        MotorMoveResult::PartialHitWorld
    }
}

/// Sweep the body from its origin to `end`, commit the result, and update the velocity.
pub(crate) fn commit_move(
    ctx: &mut MotorContext<'_>,
    state: &mut MotorState,
    nav: NavType,
    end: Vec3,
) -> MoveTrace {
    let start = ctx.body.origin;
    let trace = ctx
        .probe
        .move_limit(nav, start, end, ctx.body.hull, ctx.body.id);
    ctx.body.origin = trace.end_position;
    if ctx.interval > 0.0 {
        state.current_velocity = (trace.end_position - start) / ctx.interval;
    }
    trace
}

/// Turn the body toward `target_yaw` at `rate` degrees per second.
pub(crate) fn turn_body(body: &mut MoverBody, target_yaw: f32, rate: f32, interval: f32) {
    body.yaw = approach_angle(target_yaw, body.yaw, rate * interval);
}

/// Turn the head toward `look_yaw` (world), keeping it within `limit` degrees of the body.
pub(crate) fn update_head_yaw(
    state: &mut MotorState,
    body_yaw: f32,
    look_yaw: f32,
    rate: f32,
    limit: f32,
    interval: f32,
) {
    let desired = angle_diff(look_yaw, body_yaw).clamp(-limit, limit);
    state.head_yaw = approach_angle(desired, state.head_yaw, rate * interval).clamp(-limit, limit);
}

/// Unscripted step toward the current waypoint using the single-step integrator.
///
/// Used when there is no usable script (zero remaining distance) and by motors without one.
pub(crate) fn plain_step(
    ctx: &mut MotorContext<'_>,
    state: &mut MotorState,
    goal: &mut MoveGoal<'_>,
    yaw_rate: f32,
) -> MotorMoveResult {
    let cursor = goal.path.cursor();
    let waypoint = *goal.path.current();
    let offset = waypoint.position - ctx.body.origin;
    let dist = offset.norm();

    if dist < ARRIVED_DISTANCE {
        if !goal.path.advance() {
            state.current_velocity = Vec3::zeros();
        }
        return MotorMoveResult::Success;
    }
    if ctx.interval <= 0.0 {
        return MotorMoveResult::Success;
    }

    let is_goal = goal.path.is_goal(cursor);
    let ideal = if ctx.body.ideal_speed > 0.0 {
        ctx.body.ideal_speed
    } else {
        crate::constants::DEFAULT_IDEAL_SPEED
    };
    let accel = if ctx.body.ideal_accel > 0.0 {
        ctx.body.ideal_accel
    } else {
        crate::constants::DEFAULT_IDEAL_ACCEL
    };
    let goal_speed = if is_goal { goal.path.arrival_speed } else { ideal };

    let step = change_distance(
        ctx.interval,
        dist,
        goal_speed,
        state.current_velocity.norm(),
        ideal,
        accel,
    );
    let dir = offset / dist;

    if dir.x.abs() > EPSILON || dir.z.abs() > EPSILON {
        turn_body(ctx.body, yaw_from_vector(&dir), yaw_rate, ctx.interval);
    }

    let end = ctx.body.origin + dir * step.distance;
    let trace = commit_move(ctx, state, waypoint.nav_type, end);
    let result = classify_move(&trace, goal.target);

    if !trace.status.is_blocked() && (dist - step.distance) < ARRIVED_DISTANCE && !is_goal {
        goal.path.advance();
    }

    log::trace!(
        "plain step: {:.1} of {:.1} units -> {result:?}",
        step.distance,
        dist
    );
    result
}
