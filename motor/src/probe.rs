/*!
Collision queries the motors need from the world.

The motors never talk to a physics engine directly. They ask a [`MoveProbe`] for:
- line and hull traces (obstacle probing, ground clearance, line of sight)
- the water surface height (swimmers stay below it)
- a swept move limit (how far a step actually gets before it hits something)
- a ballistic launch velocity for jump links

[`crate::rapier_world::RapierProbe`] implements the trait over a rapier query pipeline; hosts with
their own collision world implement it directly.
*/

use crate::{
    constants::EPSILON,
    kinematics::planar,
    types::{EntityId, HullSpec, NavType, Vec3},
};

/// What kind of thing a trace ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ObstacleKind {
    #[default]
    World,
    /// Another NPC or player; swimmers steer around these instead of bouncing.
    Character,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HitEntity {
    pub id: EntityId,
    pub kind: ObstacleKind,
}

/// Result of a line or hull trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceResult {
    /// Fraction (0..=1) of the requested sweep completed before the hit.
    pub fraction: f32,
    pub end_position: Vec3,
    /// Surface normal at the hit (zero when clear).
    pub normal: Vec3,
    pub entity: Option<HitEntity>,
}

impl TraceResult {
    pub fn clear(end_position: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end_position,
            normal: Vec3::zeros(),
            entity: None,
        }
    }

    #[inline]
    pub fn is_clear(&self) -> bool {
        self.fraction >= 1.0
    }

    #[inline]
    pub fn hit_entity(&self, id: Option<EntityId>) -> bool {
        match (self.entity, id) {
            (Some(hit), Some(id)) => hit.id == id,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveStatus {
    Ok,
    BlockedWorld,
    BlockedCharacter,
}

impl MoveStatus {
    #[inline]
    pub fn is_blocked(self) -> bool {
        self != MoveStatus::Ok
    }
}

/// Result of a swept move request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveTrace {
    pub status: MoveStatus,
    pub end_position: Vec3,
    pub total_distance: f32,
    /// Part of the requested distance that could not be covered.
    pub dist_obstructed: f32,
    pub obstruction: Option<EntityId>,
}

/// Launch parameters for a ballistic jump.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JumpSolution {
    pub velocity: Vec3,
    pub apex: Vec3,
    /// Apex height above the start.
    pub height: f32,
}

/// Solve the launch velocity of a jump from `start` to `end`.
///
/// The apex is at least `min_height` above the start, high enough to cover the step up, and
/// high enough that the planar part never exceeds `max_horz_speed`. `gravity` is a positive
/// magnitude acting along -Y.
pub fn jump_launch_velocity(
    start: Vec3,
    end: Vec3,
    gravity: f32,
    min_height: f32,
    max_horz_speed: f32,
) -> JumpSolution {
    let step_height = end.y - start.y;
    let planar_delta = planar(&(end - start));
    let distance = planar_delta.norm();
    let dir = if distance > EPSILON {
        planar_delta / distance
    } else {
        Vec3::zeros()
    };

    let gravity = gravity.abs().max(EPSILON);
    let max_horz_speed = max_horz_speed.max(EPSILON);

    // Hang time needed to keep the planar speed under the cap.
    let min_horz_time = distance / max_horz_speed;
    let min_horz_height = 0.5 * gravity * (min_horz_time * 0.5) * (min_horz_time * 0.5);

    let height = min_height.max(min_horz_height).max(step_height).max(0.0);

    let t_up = (2.0 * height / gravity).sqrt();
    let t_down = (2.0 * (height - step_height).abs() / gravity).sqrt();
    let flight = t_up + t_down;

    let horz_speed = if flight > EPSILON {
        distance / flight
    } else {
        0.0
    };

    let velocity = dir * horz_speed + Vec3::new(0.0, (2.0 * gravity * height).sqrt(), 0.0);
    let apex = start + dir * horz_speed * t_up + Vec3::new(0.0, height, 0.0);

    JumpSolution {
        velocity,
        apex,
        height,
    }
}

/// Collision queries answered by the host world.
pub trait MoveProbe {
    /// Ray from `start` to `end`, ignoring `ignore`.
    fn trace_line(&self, start: Vec3, end: Vec3, ignore: Option<EntityId>) -> TraceResult;

    /// Sweep `hull` from `start` to `end`, ignoring `ignore`.
    fn trace_hull(
        &self,
        start: Vec3,
        end: Vec3,
        hull: HullSpec,
        ignore: Option<EntityId>,
    ) -> TraceResult;

    /// Height of the water surface between `min_y` and `max_y` above `point`.
    ///
    /// Returns `max_y` when the whole column is submerged or the world has no water.
    fn water_level(&self, point: Vec3, min_y: f32, max_y: f32) -> f32 {
        let _ = (point, min_y);
        max_y
    }

    /// How far a mover gets when stepping from `start` toward `end`.
    fn move_limit(
        &self,
        nav: NavType,
        start: Vec3,
        end: Vec3,
        hull: HullSpec,
        mover: Option<EntityId>,
    ) -> MoveTrace {
        let _ = nav;
        let total_distance = (end - start).norm();
        let tr = self.trace_hull(start, end, hull, mover);
        if tr.is_clear() {
            return MoveTrace {
                status: MoveStatus::Ok,
                end_position: end,
                total_distance,
                dist_obstructed: 0.0,
                obstruction: None,
            };
        }

        let status = match tr.entity.map(|e| e.kind) {
            Some(ObstacleKind::Character) => MoveStatus::BlockedCharacter,
            _ => MoveStatus::BlockedWorld,
        };

        MoveTrace {
            status,
            end_position: tr.end_position,
            total_distance,
            dist_obstructed: total_distance * (1.0 - tr.fraction.clamp(0.0, 1.0)),
            obstruction: tr.entity.map(|e| e.id),
        }
    }

    fn jump_launch_velocity(
        &self,
        start: Vec3,
        end: Vec3,
        gravity: f32,
        min_height: f32,
        max_horz_speed: f32,
    ) -> JumpSolution {
        jump_launch_velocity(start, end, gravity, min_height, max_horz_speed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Nothing to hit anywhere.
    pub(crate) struct OpenSpace;

    impl MoveProbe for OpenSpace {
        fn trace_line(&self, _start: Vec3, end: Vec3, _ignore: Option<EntityId>) -> TraceResult {
            TraceResult::clear(end)
        }

        fn trace_hull(
            &self,
            _start: Vec3,
            end: Vec3,
            _hull: HullSpec,
            _ignore: Option<EntityId>,
        ) -> TraceResult {
            TraceResult::clear(end)
        }
    }

    /// Solid half-spaces `normal . x < dist`, traced analytically.
    pub(crate) struct Planes {
        pub planes: Vec<(Vec3, f32, Option<HitEntity>)>,
        pub water_surface: Option<f32>,
    }

    impl Planes {
        pub(crate) fn new() -> Self {
            Self {
                planes: Vec::new(),
                water_surface: None,
            }
        }

        pub(crate) fn with(mut self, normal: Vec3, dist: f32, entity: Option<HitEntity>) -> Self {
            self.planes.push((normal.normalize(), dist, entity));
            self
        }

        fn sweep(&self, start: Vec3, end: Vec3, radius: f32, ignore: Option<EntityId>) -> TraceResult {
            let delta = end - start;
            let mut best = TraceResult::clear(end);
            for &(n, d, entity) in &self.planes {
                if entity.is_some_and(|e| Some(e.id) == ignore) {
                    continue;
                }
                let d = d + radius;
                let s = n.dot(&start) - d;
                let e = n.dot(&end) - d;
                if s < 0.0 {
                    // Starting inside.
                    return TraceResult {
                        fraction: 0.0,
                        end_position: start,
                        normal: n,
                        entity,
                    };
                }
                if e >= 0.0 {
                    continue;
                }
                let t = s / (s - e);
                if t < best.fraction {
                    best = TraceResult {
                        fraction: t,
                        end_position: start + delta * t,
                        normal: n,
                        entity,
                    };
                }
            }
            best
        }
    }

    impl MoveProbe for Planes {
        fn trace_line(&self, start: Vec3, end: Vec3, ignore: Option<EntityId>) -> TraceResult {
            self.sweep(start, end, 0.0, ignore)
        }

        fn trace_hull(
            &self,
            start: Vec3,
            end: Vec3,
            hull: HullSpec,
            ignore: Option<EntityId>,
        ) -> TraceResult {
            self.sweep(start, end, hull.radius, ignore)
        }

        fn water_level(&self, _point: Vec3, min_y: f32, max_y: f32) -> f32 {
            match self.water_surface {
                Some(surface) => surface.clamp(min_y, max_y),
                None => max_y,
            }
        }
    }

    #[test]
    fn jump_covers_distance_and_step() {
        let start = Vec3::zeros();
        let end = Vec3::new(0.0, 32.0, -200.0);
        let sol = jump_launch_velocity(start, end, 600.0, 0.0, 100.0);

        assert!(sol.height >= 32.0);
        // Integrate the flight and land on the target.
        let t_up = sol.velocity.y / 600.0;
        let t_down = (2.0 * (sol.height - 32.0) / 600.0).sqrt();
        let landed = planar(&sol.velocity) * (t_up + t_down);
        assert!((landed.norm() - 200.0).abs() < 0.5);
    }

    #[test]
    fn flat_jump_respects_planar_speed_cap() {
        let sol = jump_launch_velocity(Vec3::zeros(), Vec3::new(0.0, 0.0, -200.0), 600.0, 0.0, 100.0);
        assert!(planar(&sol.velocity).norm() <= 100.0 + 1.0e-3);
        assert!((sol.apex.z + 100.0).abs() < 1.0e-2);
    }

    #[test]
    fn jump_in_place_is_vertical() {
        let sol = jump_launch_velocity(Vec3::zeros(), Vec3::zeros(), 600.0, 10.0, 100.0);
        assert_eq!(sol.velocity.x, 0.0);
        assert_eq!(sol.velocity.z, 0.0);
        assert!(sol.velocity.y > 0.0);
    }

    #[test]
    fn move_limit_reports_obstructed_distance() {
        let wall = Planes::new().with(Vec3::new(0.0, 0.0, 1.0), -100.0, None);
        let trace = wall.move_limit(
            NavType::Ground,
            Vec3::zeros(),
            Vec3::new(0.0, 0.0, -200.0),
            HullSpec {
                radius: 0.0,
                half_height: 1.0,
            },
            None,
        );
        assert_eq!(trace.status, MoveStatus::BlockedWorld);
        assert!((trace.dist_obstructed - 100.0).abs() < 1.0e-3);
        assert!((trace.end_position.z + 100.0).abs() < 1.0e-3);
    }

    #[test]
    fn move_limit_flags_characters() {
        let npc = HitEntity {
            id: 7,
            kind: ObstacleKind::Character,
        };
        let wall = Planes::new().with(Vec3::new(0.0, 0.0, 1.0), -50.0, Some(npc));
        let trace = wall.move_limit(
            NavType::Ground,
            Vec3::zeros(),
            Vec3::new(0.0, 0.0, -100.0),
            HullSpec::default(),
            None,
        );
        assert_eq!(trace.status, MoveStatus::BlockedCharacter);
        assert_eq!(trace.obstruction, Some(7));
    }
}
