use crate::{
    config::{FlyerConfig, SwimmerConfig},
    constants::EPSILON,
    kinematics::{planar_length, yaw_from_vector},
    path::{FlyPathParams, progress_fly_path},
    probe::MoveTrace,
    steering::{
        FlyerSteering, Steering, SteeringAvoidance, SteeringInput, SteeringMode, SteeringOutput,
    },
    types::{FlyPathProgress, MotorMoveResult, NavType, Vec3},
};

use super::{Motor, MotorContext, MotorState, MoveGoal, classify_move, turn_body};

/// Default yaw rate of free-moving NPCs, degrees per second.
const FLYER_YAW_SPEED: f32 = 360.0;

/// Swimmers are [`FlyingMotor`]s driven by [`SteeringAvoidance`].
pub type SwimmingMotor = FlyingMotor<SteeringAvoidance>;

/// Motor for NPCs that move freely in 3D: progresses a fly path and integrates the steering
/// output directly into the position.
#[derive(Clone, Debug)]
pub struct FlyingMotor<S: Steering = FlyerSteering> {
    pub steering: S,
    pub params: FlyPathParams,
    pub max_yaw_speed: f32,
    state: MotorState,
}

impl FlyingMotor<FlyerSteering> {
    pub fn flyer(config: FlyerConfig) -> Self {
        let params = FlyPathParams {
            waypoint_tolerance: config.waypoint_tolerance,
            strict_point_tolerance: config.strict_point_tolerance,
            goal_tolerance: config.goal_tolerance,
            mover: None,
        };
        Self::new(FlyerSteering::new(config), params)
    }
}

impl FlyingMotor<SteeringAvoidance> {
    /// Arrival stops steering inside the waypoint distance, so that is also the goal tolerance.
    pub fn swimmer(config: SwimmerConfig) -> Self {
        let params = FlyPathParams {
            waypoint_tolerance: config.waypoint_distance,
            strict_point_tolerance: config.waypoint_distance * 0.5,
            goal_tolerance: config.waypoint_distance,
            mover: None,
        };
        Self::new(SteeringAvoidance::new(config), params)
    }
}

impl<S: Steering> FlyingMotor<S> {
    pub fn new(steering: S, params: FlyPathParams) -> Self {
        Self {
            steering,
            params,
            max_yaw_speed: FLYER_YAW_SPEED,
            state: MotorState::default(),
        }
    }

    fn yaw_rate(&self) -> f32 {
        self.state.yaw_speed_override.unwrap_or(self.max_yaw_speed)
    }
}

/// What one fly tick should do after path progress.
pub(super) enum FlyStep {
    Arrived,
    Steer(SteeringOutput),
}

/// Progress the fly path and ask `steering` for this tick's velocity.
pub(super) fn steer_along_path<S: Steering>(
    steering: &S,
    params: &FlyPathParams,
    state: &MotorState,
    ctx: &MotorContext<'_>,
    goal: &mut MoveGoal<'_>,
) -> FlyStep {
    let params = FlyPathParams {
        mover: ctx.body.id,
        ..*params
    };

    let progress = progress_fly_path(goal.path, ctx.body.origin, &params, ctx.probe);
    debug_assert!(
        progress != FlyPathProgress::Blocked,
        "fly path progress never reports blocked"
    );
    match progress {
        FlyPathProgress::Complete => return FlyStep::Arrived,
        FlyPathProgress::Blocked => {
            log::error!("fly path: unexpected blocked progress");
        }
        FlyPathProgress::Advanced => {
            log::trace!("fly path: advanced to waypoint {}", goal.path.cursor());
        }
        FlyPathProgress::NoChange => {}
    }

    let mode = if goal.path.is_goal(goal.path.cursor()) {
        SteeringMode::Arrive
    } else {
        SteeringMode::Seek
    };

    let input = SteeringInput {
        probe: ctx.probe,
        origin: ctx.body.origin,
        velocity: state.current_velocity,
        yaw: ctx.body.yaw,
        target: goal.path.current().position,
        mode,
        mover: ctx.body.id,
        target_entity: goal.target,
        hull: ctx.body.hull,
        interval: ctx.interval,
    };
    FlyStep::Steer(steering.steer(&input))
}

/// Sweep the body along `velocity` for one tick, retrying at half the step when `retry_half`
/// is set. Commits the end position and returns the trace plus the velocity actually achieved.
pub(super) fn fly_move(
    ctx: &mut MotorContext<'_>,
    velocity: Vec3,
    retry_half: bool,
) -> (MoveTrace, Vec3) {
    let start = ctx.body.origin;
    let step = velocity * ctx.interval;
    let (hull, id) = (ctx.body.hull, ctx.body.id);

    let mut trace = ctx
        .probe
        .move_limit(NavType::Fly, start, start + step, hull, id);
    if trace.status.is_blocked() && retry_half {
        let half = ctx
            .probe
            .move_limit(NavType::Fly, start, start + step * 0.5, hull, id);
        if !half.status.is_blocked() {
            log::trace!("fly move: blocked, took a half step");
            trace = half;
        }
    }

    ctx.body.origin = trace.end_position;
    let achieved = if trace.status.is_blocked() || trace.end_position != start + step {
        (trace.end_position - start) / ctx.interval
    } else {
        velocity
    };
    (trace, achieved)
}

/// Face the direction of planar travel.
pub(super) fn face_velocity(ctx: &mut MotorContext<'_>, velocity: Vec3, rate: f32) {
    if planar_length(&velocity) > EPSILON {
        turn_body(ctx.body, yaw_from_vector(&velocity), rate, ctx.interval);
    }
}

impl<S: Steering> Motor for FlyingMotor<S> {
    fn state(&self) -> &MotorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MotorState {
        &mut self.state
    }

    fn move_ground_execute(
        &mut self,
        ctx: &mut MotorContext<'_>,
        goal: &mut MoveGoal<'_>,
    ) -> MotorMoveResult {
        self.move_fly_execute(ctx, goal)
    }

    fn move_fly_execute(
        &mut self,
        ctx: &mut MotorContext<'_>,
        goal: &mut MoveGoal<'_>,
    ) -> MotorMoveResult {
        if ctx.interval <= 0.0 {
            return MotorMoveResult::Success;
        }

        let out = match steer_along_path(&self.steering, &self.params, &self.state, ctx, goal) {
            FlyStep::Arrived => return MotorMoveResult::Success,
            FlyStep::Steer(out) => out,
        };

        let (trace, achieved) = fly_move(ctx, out.velocity, self.steering.retries_half_step());
        let rate = self.yaw_rate();
        face_velocity(ctx, out.velocity, rate);

        self.state.current_velocity = achieved;
        self.state.current_banking = out.banking;
        self.state.relative_steer = out.relative_steer;

        classify_move(&trace, goal.target)
    }
}
