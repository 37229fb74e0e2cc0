use crate::{
    config::{FlyerConfig, PhysicsFlyerConfig},
    path::FlyPathParams,
    steering::{FlyerSteering, Steering},
    types::{MotorMoveResult, Vec3},
};

use super::{
    Motor, MotorContext, MotorState, MoveGoal, classify_move,
    flying::{FlyStep, face_velocity, fly_move, steer_along_path},
};

/// Flying motor whose body trails the steering output.
///
/// The steering velocity is treated as the controller's target: each tick the body velocity moves
/// toward it by at most `max_acceleration * dt`, then linear damping is applied.
#[derive(Clone, Debug)]
pub struct PhysicsFlyingMotor<S: Steering = FlyerSteering> {
    pub steering: S,
    pub params: FlyPathParams,
    pub config: PhysicsFlyerConfig,
    state: MotorState,
}

impl PhysicsFlyingMotor<FlyerSteering> {
    pub fn flyer(flyer: FlyerConfig, config: PhysicsFlyerConfig) -> Self {
        let params = FlyPathParams {
            waypoint_tolerance: flyer.waypoint_tolerance,
            strict_point_tolerance: flyer.strict_point_tolerance,
            goal_tolerance: flyer.goal_tolerance,
            mover: None,
        };
        Self::new(FlyerSteering::new(flyer), params, config)
    }
}

impl<S: Steering> PhysicsFlyingMotor<S> {
    pub fn new(steering: S, params: FlyPathParams, config: PhysicsFlyerConfig) -> Self {
        Self {
            steering,
            params,
            config,
            state: MotorState::default(),
        }
    }

    /// One controller step from `current` toward `desired`.
    pub fn integrate(&self, current: Vec3, desired: Vec3, dt: f32) -> Vec3 {
        let max_dv = self.config.max_acceleration * dt;
        let dv = desired - current;
        let dv_len = dv.norm();
        let dv = if dv_len > max_dv {
            dv * (max_dv / dv_len)
        } else {
            dv
        };
        (current + dv) / (1.0 + dt * self.config.linear_damping)
    }
}

impl<S: Steering> Motor for PhysicsFlyingMotor<S> {
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
            FlyStep::Arrived => {
                // Nothing drives the body any more; it coasts while damping bleeds off the speed.
                let velocity =
                    self.integrate(self.state.current_velocity, Vec3::zeros(), ctx.interval);
                let (_, achieved) = fly_move(ctx, velocity, false);
                self.state.current_velocity = achieved;
                return MotorMoveResult::Success;
            }
            FlyStep::Steer(out) => out,
        };

        let velocity = self.integrate(self.state.current_velocity, out.velocity, ctx.interval);
        let (trace, achieved) = fly_move(ctx, velocity, self.steering.retries_half_step());
        let rate = self
            .state
            .yaw_speed_override
            .unwrap_or(self.config.max_yaw_speed);
        face_velocity(ctx, velocity, rate);

        self.state.current_velocity = achieved;
        self.state.current_banking = out.banking;
        self.state.relative_steer = out.relative_steer;

        classify_move(&trace, goal.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        motor::MoverBody,
        path::{Path, Waypoint},
        probe::tests::OpenSpace,
        types::HullSpec,
    };

    fn motor(max_acceleration: f32) -> PhysicsFlyingMotor {
        PhysicsFlyingMotor::flyer(
            FlyerConfig::default(),
            PhysicsFlyerConfig {
                max_acceleration,
                ..Default::default()
            },
        )
    }

    fn body() -> MoverBody {
        MoverBody {
            hull: HullSpec {
                radius: 0.0,
                half_height: 1.0,
            },
            ..Default::default()
        }
    }

    fn tick(m: &mut PhysicsFlyingMotor, body: &mut MoverBody, path: &mut Path) -> MotorMoveResult {
        let mut ctx = MotorContext {
            body,
            probe: &OpenSpace,
            interval: 0.1,
        };
        let mut goal = MoveGoal::new(path);
        m.move_execute(&mut ctx, &mut goal)
    }

    #[test]
    fn velocity_change_is_limited_then_damped() {
        let m = motor(50.0);
        let v = m.integrate(Vec3::zeros(), Vec3::new(0.0, 0.0, -100.0), 0.1);
        assert!((v.z + 5.0 / 1.05).abs() < 1.0e-4);

        let v = m.integrate(Vec3::new(0.0, 0.0, -10.0), Vec3::new(0.0, 0.0, -12.0), 0.1);
        assert!((v.z + 12.0 / 1.05).abs() < 1.0e-4);
    }

    #[test]
    fn body_lags_the_steering_output() {
        let mut m = motor(50.0);
        let mut body = body();
        let mut path = Path::new(vec![Waypoint::fly(Vec3::new(0.0, 0.0, -1000.0))]).unwrap();

        tick(&mut m, &mut body, &mut path);
        // Steering alone would have asked for 12.8 units/s.
        assert!(m.state().current_velocity.norm() <= 5.0 + 1.0e-4);
        assert!(body.origin.z < 0.0);
    }

    #[test]
    fn reaches_the_goal_and_coasts_down() {
        let mut m = motor(600.0);
        let mut body = body();
        let goal = Vec3::new(0.0, 0.0, -500.0);
        let mut path = Path::new(vec![Waypoint::fly(goal)]).unwrap();

        let mut last = MotorMoveResult::Failed;
        for _ in 0..400 {
            last = tick(&mut m, &mut body, &mut path);
        }
        assert_eq!(last, MotorMoveResult::Success);
        // Inside the goal tolerance, plus whatever the last coast carried past it.
        assert!((body.origin - goal).norm() <= 48.0 + 10.0);
        assert!(m.state().current_velocity.norm() < 100.0);
    }

    #[test]
    fn arrived_body_moves_with_its_reported_velocity() {
        let mut m = motor(50.0);
        m.state_mut().current_velocity = Vec3::new(0.0, 0.0, -50.0);
        let mut body = body();
        body.origin = Vec3::new(0.0, 0.0, -490.0);
        let mut path = Path::new(vec![Waypoint::fly(Vec3::new(0.0, 0.0, -500.0))]).unwrap();

        let result = tick(&mut m, &mut body, &mut path);
        assert_eq!(result, MotorMoveResult::Success);
        // dv limited to 5, then damped by 1.05.
        let v = m.state().current_velocity;
        assert!((v.z + 45.0 / 1.05).abs() < 1.0e-3);
        assert!((body.origin.z - (-490.0 + v.z * 0.1)).abs() < 1.0e-3);

        for _ in 0..20 {
            let before = body.origin;
            tick(&mut m, &mut body, &mut path);
            let moved = (body.origin - before) / 0.1;
            assert!((moved - m.state().current_velocity).norm() < 1.0e-2);
        }
    }
}
