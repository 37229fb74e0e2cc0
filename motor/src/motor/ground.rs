use crate::{
    config::MotorConfig,
    constants::{ARRIVED_DISTANCE, EPSILON},
    kinematics::{planar, planar_length, yaw_from_vector, yaw_to_vector},
    turn_script::TurnScriptBuilder,
    types::{MotorMoveResult, NavType, Vec3},
    velocity_script::{VelocityScriptBuilder, VelocityScriptInput},
};

use super::{
    Motor, MotorContext, MotorState, MoveGoal, classify_move, commit_move, plain_step, turn_body,
    update_head_yaw,
};

/// Obstruction points that moved less than this keep the current scripts.
const OBSTRUCTION_MOVE_TOLERANCE: f32 = 1.0;

/// Ground motor that follows a velocity script and a turn script built from the path.
///
/// Scripts are rebuilt when the path changes, when the obstruction point moves, and every
/// [`MotorConfig::script_refresh_interval`] seconds. A blocked move drops both scripts.
#[derive(Clone, Debug, Default)]
pub struct GroundBlendedMotor {
    pub config: MotorConfig,
    state: MotorState,
    built_revision: Option<u64>,
    /// Revision the motor last acted on, kept across invalidation.
    seen_revision: Option<u64>,
    built_obstruction: Option<Vec3>,
    since_build: f32,
    arrival_distance: f32,
}

impl GroundBlendedMotor {
    pub fn new(config: MotorConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    fn scripts_stale(&self, goal: &MoveGoal<'_>) -> bool {
        if self.state.velocity_script.len() < 2 {
            return true;
        }
        if self.built_revision != Some(goal.path.revision()) {
            return true;
        }
        let obstruction_moved = match (self.built_obstruction, goal.obstruction) {
            (None, None) => false,
            (Some(a), Some(b)) => (a - b).norm() > OBSTRUCTION_MOVE_TOLERANCE,
            _ => true,
        };
        obstruction_moved || self.since_build >= self.config.script_refresh_interval
    }

    fn rebuild(&mut self, ctx: &MotorContext<'_>, goal: &MoveGoal<'_>) {
        let body = &*ctx.body;
        let forward = yaw_to_vector(body.yaw);

        let mut input = VelocityScriptInput::new(
            &*goal.path,
            body.origin,
            planar(&self.state.current_velocity).norm(),
            forward,
            body.ideal_speed,
            body.ideal_accel,
        );
        input.gravity = body.gravity;
        input.obstruction_distance = goal
            .obstruction
            .map(|p| planar_length(&(p - body.origin)));
        input.look_ahead = goal.look_ahead;
        input.decelerating_to_goal = self.state.decelerating_to_goal;
        input.probe = Some(ctx.probe);

        let velocity = VelocityScriptBuilder::new(self.config.velocity).build(&input);
        let turn =
            TurnScriptBuilder::new(self.config.turn).build(&*goal.path, body.yaw, &velocity);

        log::debug!(
            "ground motor: rebuilt scripts ({} velocity, {} turn nodes, {:.2}s)",
            velocity.len(),
            turn.len(),
            velocity.total_time()
        );

        self.state.decelerating_to_goal = velocity.decelerating_to_goal;
        self.state.velocity_script = velocity;
        self.state.turn_script = turn;
        self.state.script_clock = 0.0;
        self.since_build = 0.0;
        self.built_revision = Some(goal.path.revision());
        self.built_obstruction = goal.obstruction;
        self.arrival_distance = goal.path.arrival_distance;
    }

    fn invalidate(&mut self) {
        self.state.clear_scripts();
        self.built_revision = None;
        self.built_obstruction = None;
        self.since_build = 0.0;
    }

    /// Advance the path cursor past waypoints the script has already passed.
    fn advance_cursor(&mut self, goal: &mut MoveGoal<'_>) {
        let clock = self.state.script_clock;
        let passed = self
            .state
            .velocity_script
            .entries
            .iter()
            .filter(|e| e.elapsed_time <= clock)
            .filter_map(|e| e.source_waypoint)
            .max();

        if let Some(passed) = passed {
            while goal.path.cursor() <= passed && !goal.path.is_goal(goal.path.cursor()) {
                goal.path.advance();
            }
            // Our own progress does not invalidate the scripts.
            self.built_revision = Some(goal.path.revision());
        }
    }

    /// A route change the motor did not make itself ends the braking for the old goal.
    fn track_route_change(&mut self, goal: &MoveGoal<'_>) {
        let revision = goal.path.revision();
        if self.seen_revision.is_some_and(|seen| seen != revision) {
            if self.state.decelerating_to_goal {
                log::debug!("ground motor: route changed, dropping goal deceleration");
            }
            self.state.decelerating_to_goal = false;
        }
    }

    fn arrive(&mut self) {
        self.state.current_velocity = Vec3::zeros();
        self.state.decelerating_to_goal = false;
        self.invalidate();
    }

    fn ground_step(
        &mut self,
        ctx: &mut MotorContext<'_>,
        goal: &mut MoveGoal<'_>,
    ) -> MotorMoveResult {
        let goal_pos = goal.path.goal().position;
        let at_goal = goal.path.is_goal(goal.path.cursor());
        if at_goal && (goal_pos - ctx.body.origin).norm() < ARRIVED_DISTANCE {
            self.arrive();
            return MotorMoveResult::Success;
        }

        if self.scripts_stale(goal) {
            self.rebuild(ctx, goal);
        }

        self.look_toward(ctx, goal);

        if self.state.velocity_script.len() < 2 {
            let rate = self.yaw_rate();
            return plain_step(ctx, &mut self.state, goal, rate);
        }

        let clock = self.state.script_clock + ctx.interval;
        let sample = self.state.velocity_script.sample(clock);
        let nav = goal.path.current().nav_type;

        let target_yaw = self.state.turn_script.yaw_at(clock).or_else(|| {
            let dir = sample.position - ctx.body.origin;
            (planar_length(&dir) > EPSILON).then(|| yaw_from_vector(&dir))
        });
        if let Some(target_yaw) = target_yaw {
            let rate = self.yaw_rate();
            turn_body(ctx.body, target_yaw, rate, ctx.interval);
        }

        let trace = commit_move(ctx, &mut self.state, nav, sample.position);
        let result = classify_move(&trace, goal.target);

        if trace.status.is_blocked() {
            log::debug!(
                "ground motor: blocked after {:.1} of {:.1} units ({result:?})",
                trace.total_distance - trace.dist_obstructed,
                trace.total_distance
            );
            self.invalidate();
            return result;
        }

        self.state.script_clock = clock;
        self.since_build += ctx.interval;
        self.advance_cursor(goal);

        if clock >= self.state.velocity_script.total_time() && goal.path.is_goal(goal.path.cursor())
        {
            let remaining = (goal_pos - ctx.body.origin).norm();
            if remaining < ARRIVED_DISTANCE {
                self.arrive();
            }
        }

        result
    }

    fn yaw_rate(&self) -> f32 {
        self.state
            .yaw_speed_override
            .unwrap_or(self.config.max_yaw_speed)
    }

    fn look_toward(&mut self, ctx: &MotorContext<'_>, goal: &MoveGoal<'_>) {
        let look_at = goal.look_ahead.unwrap_or(goal.path.current().position);
        let dir = look_at - ctx.body.origin;
        if planar_length(&dir) <= EPSILON {
            return;
        }
        update_head_yaw(
            &mut self.state,
            ctx.body.yaw,
            yaw_from_vector(&dir),
            self.config.head_turn_rate,
            self.config.head_yaw_limit,
            ctx.interval,
        );
    }
}

impl Motor for GroundBlendedMotor {
    fn state(&self) -> &MotorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MotorState {
        &mut self.state
    }

    fn move_start(&mut self) {
        self.invalidate();
        self.state.decelerating_to_goal = false;
    }

    fn move_stop(&mut self) {
        self.invalidate();
        self.state.decelerating_to_goal = false;
        log::debug!("ground motor: move stopped");
    }

    fn reset_move_calculations(&mut self) {
        self.invalidate();
    }

    fn move_ground_execute(
        &mut self,
        ctx: &mut MotorContext<'_>,
        goal: &mut MoveGoal<'_>,
    ) -> MotorMoveResult {
        self.track_route_change(goal);
        let result = self.ground_step(ctx, goal);
        self.seen_revision = Some(goal.path.revision());
        result
    }

    fn move_fly_execute(
        &mut self,
        ctx: &mut MotorContext<'_>,
        goal: &mut MoveGoal<'_>,
    ) -> MotorMoveResult {
        self.track_route_change(goal);
        // No scripts for flight links; walk them with the single-step integrator.
        if self.state.has_scripts() {
            self.invalidate();
        }
        let rate = self.yaw_rate();
        let result = plain_step(ctx, &mut self.state, goal, rate);
        self.seen_revision = Some(goal.path.revision());
        result
    }

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

    fn move_script_total_time(&self) -> f32 {
        let script = &self.state.velocity_script;
        if script.is_empty() {
            return -1.0;
        }
        (script.time_to_arrival(self.arrival_distance) - self.state.script_clock).max(0.0)
    }
}
