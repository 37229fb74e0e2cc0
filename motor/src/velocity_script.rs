/*!
Velocity profile ("move script") synthesis.

Given the remaining waypoints of a [`Path`], the mover's current position and speed, and its ideal
speed and acceleration, [`VelocityScriptBuilder::build`] produces an ordered list of
[`MovementScriptEntry`] nodes. Speed varies linearly between adjacent nodes, so the list is a
piecewise-linear velocity profile over planar distance.

Build order (later passes rely on the ordering of earlier ones):
1. Seed with the mover's own position and speed.
2. Walk ground/fly waypoints and assign per-link speeds (corner sharpness, jump launch speed,
   zero for climbs, arrival speed at the goal). Near-duplicate waypoints are dropped.
3. Measure segments and detect "decelerating to goal".
4. Insert hard slowdown nodes at an obstruction and at the arrival distance.
5. Penalise the start speed when the mover is not facing the first segment.
6. Clamp accelerating transitions front to back, then decelerating transitions back to front.
7. Insert cruise nodes where the mover can reach its ideal speed (or a peak below it).
8. Apply the velocity floor and compute per-segment distance, time, and elapsed time.
*/

use crate::{
    config::{SlowdownPolicy, VelocityScriptConfig},
    constants::{
        EPSILON, HALT_SLOWDOWN_SPEED, MIN_CRUISE_RAMP_DISTANCE, MIN_CRUISE_RAMP_TIME,
        MIN_JUMP_HORZ_SPEED, REACHABLE_SLOWDOWN_FLOOR, ZERO_SEGMENT_FALLBACK_SPEED,
    },
    kinematics::{delta_v, planar, planar_dir, planar_length, ramp_distance, solve_quadratic},
    path::Path,
    probe::{MoveProbe, jump_launch_velocity},
    types::{MovementScriptEntry, NavType, ScriptNodeKind, Vec3},
};

/// Everything the velocity builder reads about the mover and its surroundings.
#[derive(Clone, Copy)]
pub struct VelocityScriptInput<'a> {
    pub path: &'a Path,
    pub origin: Vec3,
    /// Current speed along the direction of travel.
    pub current_speed: f32,
    /// Planar facing of the mover.
    pub forward: Vec3,
    pub ideal_speed: f32,
    pub ideal_accel: f32,
    /// Positive gravity magnitude, used to plan jump links.
    pub gravity: f32,
    /// Planar distance to an obstruction the caller's trace ran into this tick.
    pub obstruction_distance: Option<f32>,
    /// End of the caller's look-ahead trace, used for the grade speed adjust.
    pub look_ahead: Option<Vec3>,
    /// Whether the previous build already committed to decelerating to the goal.
    pub decelerating_to_goal: bool,
    /// Answers jump launch queries; the ballistic solver is used when absent.
    pub probe: Option<&'a dyn MoveProbe>,
}

impl<'a> VelocityScriptInput<'a> {
    /// Input with no obstruction, no look-ahead and no probe.
    pub fn new(
        path: &'a Path,
        origin: Vec3,
        current_speed: f32,
        forward: Vec3,
        ideal_speed: f32,
        ideal_accel: f32,
    ) -> Self {
        Self {
            path,
            origin,
            current_speed,
            forward,
            ideal_speed,
            ideal_accel,
            gravity: 600.0,
            obstruction_distance: None,
            look_ahead: None,
            decelerating_to_goal: false,
            probe: None,
        }
    }
}

/// A built velocity profile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VelocityScript {
    pub entries: Vec<MovementScriptEntry>,
    /// Net braking over the whole script exceeds the ideal acceleration.
    pub decelerating_to_goal: bool,
    /// Multiplier applied to the ideal speed by the grade adjust.
    pub speed_adjust: f32,
}

/// Speed and location at a point in time along a [`VelocityScript`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScriptSample {
    /// Planar distance covered since the first node.
    pub distance: f32,
    pub speed: f32,
    pub position: Vec3,
}

impl VelocityScript {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_time(&self) -> f32 {
        self.entries.last().map_or(0.0, |e| e.elapsed_time)
    }

    pub fn total_distance(&self) -> f32 {
        self.entries.iter().map(|e| e.distance_to_next).sum()
    }

    /// Speed, distance and position `t` seconds after the first node.
    pub fn sample(&self, t: f32) -> ScriptSample {
        let Some(first) = self.entries.first() else {
            return ScriptSample {
                distance: 0.0,
                speed: 0.0,
                position: Vec3::zeros(),
            };
        };

        let mut remaining = t.max(0.0);
        let mut distance = 0.0;
        for pair in self.entries.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if remaining < a.time_to_next {
                let frac = remaining / a.time_to_next;
                let speed = a.max_velocity + (b.max_velocity - a.max_velocity) * frac;
                let covered = 0.5 * (a.max_velocity + speed) * remaining;
                let along = if a.distance_to_next > EPSILON {
                    (covered / a.distance_to_next).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                return ScriptSample {
                    distance: distance + covered,
                    speed,
                    position: a.position.lerp(&b.position, along),
                };
            }
            remaining -= a.time_to_next;
            distance += a.distance_to_next;
        }

        let last = self.entries.last().unwrap_or(first);
        ScriptSample {
            distance,
            speed: last.max_velocity,
            position: last.position,
        }
    }

    /// Elapsed script time at which the mover is `arrival_distance` short of the last node.
    ///
    /// Returns -1 for an empty script.
    pub fn time_to_arrival(&self, arrival_distance: f32) -> f32 {
        if self.entries.is_empty() {
            return -1.0;
        }

        let mut remaining = arrival_distance;
        let mut i = self.entries.len() - 1;
        while i > 0 && remaining > 1.0 {
            remaining -= self.entries[i - 1].distance_to_next;
            i -= 1;
        }
        self.entries[i].elapsed_time
    }
}

/// Builds [`VelocityScript`]s with a fixed configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityScriptBuilder {
    pub config: VelocityScriptConfig,
}

impl VelocityScriptBuilder {
    pub fn new(config: VelocityScriptConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, input: &VelocityScriptInput<'_>) -> VelocityScript {
        let cfg = &self.config;

        let mut ideal_speed = if input.ideal_speed > 0.0 {
            input.ideal_speed
        } else {
            cfg.default_ideal_speed
        };
        let ideal_accel = if input.ideal_accel > 0.0 {
            input.ideal_accel
        } else {
            cfg.default_ideal_accel
        };

        let speed_adjust = self.grade_speed_adjust(input);
        ideal_speed *= speed_adjust;

        // 1) Seed.
        let mut entries = vec![MovementScriptEntry::new(
            input.origin,
            input.current_speed.max(0.0),
            ScriptNodeKind::Start,
        )];

        // 2) Per-link speeds.
        self.collect_waypoints(input, ideal_speed, &mut entries);

        // 3) Distances.
        let total_distance = measure(&mut entries);
        if total_distance <= 0.0 {
            log::debug!("velocity script: zero-length path, keeping start speed");
            entries.truncate(1);
            return VelocityScript {
                entries,
                decelerating_to_goal: input.decelerating_to_goal,
                speed_adjust,
            };
        }

        let mut decelerating_to_goal = input.decelerating_to_goal;
        if !decelerating_to_goal && entries.len() > 1 {
            let last = entries[entries.len() - 1].max_velocity;
            let needed = delta_v(entries[0].max_velocity, last, total_distance);
            decelerating_to_goal = needed < -ideal_accel;
        }

        if decelerating_to_goal {
            // Corners must not ask for more speed than we already have while braking for the goal.
            let cap = entries[0].max_velocity;
            for e in entries.iter_mut().skip(1) {
                e.max_velocity = e.max_velocity.min(cap);
            }
        }

        // 4) Hard slowdowns.
        if cfg.insert_pause_at_obstruction {
            if let Some(dist) = input.obstruction_distance {
                self.insert_slowdown(
                    &mut entries,
                    dist + cfg.obstruction_clearance,
                    ideal_accel,
                    false,
                    ScriptNodeKind::ObstructionSlowdown,
                );
            }
        }

        let arrival_distance = input.path.arrival_distance;
        if cfg.insert_pause_at_est_end && arrival_distance > 0.0 {
            self.insert_slowdown(
                &mut entries,
                total_distance - arrival_distance,
                ideal_accel,
                true,
                ScriptNodeKind::ArrivalSlowdown,
            );
        }

        // 5) Slow down before a sharp immediate turn.
        if cfg.adjust_speed_on_immediate_turns && entries.len() > 1 {
            let forward = planar_dir(&input.forward);
            let first_leg = planar_dir(&(entries[1].position - entries[0].position));
            let dot = forward.dot(&first_leg).clamp(0.0, 1.0);
            entries[0].max_velocity *= dot;
        }

        // 6) Acceleration clamps; forward first, backward resolves stops against final upper bounds.
        clamp_accelerations(&mut entries, ideal_accel);
        clamp_decelerations(&mut entries, ideal_accel);

        // 7) Cruise nodes.
        if !decelerating_to_goal {
            insert_cruise_nodes(&mut entries, ideal_speed, ideal_accel);
        }

        // 8) Floor and timing.
        for e in entries.iter_mut() {
            e.max_velocity = e.max_velocity.max(cfg.min_velocity);
        }
        retime(&mut entries);

        let script = VelocityScript {
            entries,
            decelerating_to_goal,
            speed_adjust,
        };

        log::debug!(
            "velocity script: {} nodes, {:.1} units, {:.2}s",
            script.len(),
            script.total_distance(),
            script.total_time()
        );

        script
    }

    fn grade_speed_adjust(&self, input: &VelocityScriptInput<'_>) -> f32 {
        if !self.config.height_adjust {
            return 1.0;
        }
        let Some(look_ahead) = input.look_ahead else {
            return 1.0;
        };

        let flat = planar_length(&(look_ahead - input.origin));
        let height = look_ahead.y - input.origin.y;
        let grade = if flat > 0.0 { height / flat } else { 0.0 };
        let floor = if height > 0.0 { 0.5 } else { 0.8 };
        (1.1 - grade.abs()).clamp(floor, 1.0)
    }

    fn collect_waypoints(
        &self,
        input: &VelocityScriptInput<'_>,
        ideal_speed: f32,
        entries: &mut Vec<MovementScriptEntry>,
    ) {
        let path = input.path;
        let mut index = Some(path.cursor());

        while let Some(i) = index {
            let Some(waypoint) = path.waypoint(i) else {
                break;
            };
            if !waypoint.nav_type.is_continuous() {
                break;
            }

            let next = path.next_of(i);
            let max_velocity = match next.and_then(|n| path.waypoint(n)) {
                Some(next_wp) => match next_wp.nav_type {
                    NavType::Ground | NavType::Fly => {
                        let outgoing = next_wp.position - waypoint.position;
                        if planar_length(&outgoing) < self.config.duplicate_waypoint_distance {
                            // Drop very short non-terminal links.
                            index = next;
                            continue;
                        }

                        let prev = entries[entries.len() - 1].position;
                        let incoming = planar_dir(&(waypoint.position - prev));
                        let dot = if incoming == Vec3::zeros() {
                            1.0
                        } else {
                            planar_dir(&outgoing).dot(&incoming) + self.config.corner_dot_bias
                        };
                        if dot > 0.0 {
                            ideal_speed * dot.clamp(0.0, 1.0)
                        } else {
                            0.0
                        }
                    }
                    NavType::Jump => {
                        let max_horz = input.current_speed.max(MIN_JUMP_HORZ_SPEED);
                        let solution = match input.probe {
                            Some(probe) => probe.jump_launch_velocity(
                                waypoint.position,
                                next_wp.position,
                                input.gravity,
                                0.0,
                                max_horz,
                            ),
                            None => jump_launch_velocity(
                                waypoint.position,
                                next_wp.position,
                                input.gravity,
                                0.0,
                                max_horz,
                            ),
                        };
                        planar_length(&solution.velocity)
                    }
                    NavType::Climb => 0.0,
                },
                None => path.arrival_speed,
            };

            let mut entry =
                MovementScriptEntry::new(waypoint.position, max_velocity, ScriptNodeKind::Waypoint);
            entry.source_waypoint = Some(i);
            entries.push(entry);

            index = next;
        }
    }

    /// Split the segment containing `dist` (measured from the first node) and force a slow node there.
    fn insert_slowdown(
        &self,
        entries: &mut Vec<MovementScriptEntry>,
        dist: f32,
        ideal_accel: f32,
        always_slowdown: bool,
        kind: ScriptNodeKind,
    ) {
        if dist <= 0.0 {
            return;
        }

        let from_start = dist;
        let mut dist = dist;
        for i in 0..entries.len().saturating_sub(1) {
            let seg = entries[i].distance_to_next;
            if seg > 0.0 && dist < seg {
                let a = dist / seg;
                let position = entries[i].position.lerp(&entries[i + 1].position, a);

                let max_velocity = match self.config.slowdown_policy {
                    SlowdownPolicy::Halt => HALT_SLOWDOWN_SPEED,
                    SlowdownPolicy::Reachable if always_slowdown => REACHABLE_SLOWDOWN_FLOOR,
                    SlowdownPolicy::Reachable => {
                        // Braking from the start speed over the whole distance to the node.
                        let v0 = entries[0].max_velocity;
                        match solve_quadratic(-0.5 * ideal_accel, v0, -from_start) {
                            Some((t, _)) if t.is_finite() => {
                                (v0 - ideal_accel * t).max(REACHABLE_SLOWDOWN_FLOOR)
                            }
                            _ => REACHABLE_SLOWDOWN_FLOOR,
                        }
                    }
                };

                let mut node = MovementScriptEntry::new(position, max_velocity, kind);
                node.distance_to_next = seg - dist;
                entries[i].distance_to_next = dist;
                entries.insert(i + 1, node);
                log::trace!("velocity script: {kind:?} at {dist:.1} -> {max_velocity:.1}");
                return;
            }
            dist -= seg;
        }
    }
}

/// Recompute planar segment distances; returns the total.
fn measure(entries: &mut [MovementScriptEntry]) -> f32 {
    let mut total = 0.0;
    for i in 0..entries.len() {
        let d = match entries.get(i + 1) {
            Some(next) => planar(&(next.position - entries[i].position)).norm(),
            None => 0.0,
        };
        entries[i].distance_to_next = d;
        total += d;
    }
    total
}

fn clamp_accelerations(entries: &mut [MovementScriptEntry], accel: f32) {
    for i in 0..entries.len().saturating_sub(1) {
        let v = entries[i].max_velocity;
        let dv = entries[i + 1].max_velocity - v;
        if dv <= 0.0 {
            continue;
        }

        let needed = ramp_distance(v, v + dv, accel);
        let dist = entries[i].distance_to_next;
        if needed > dist {
            if let Some((t, _)) = solve_quadratic(0.5 * accel, v, -dist) {
                entries[i + 1].max_velocity = v + accel * t;
            }
        }
    }
}

fn clamp_decelerations(entries: &mut [MovementScriptEntry], accel: f32) {
    for i in (1..entries.len()).rev() {
        let v = entries[i].max_velocity;
        let dv = v - entries[i - 1].max_velocity;
        if dv >= 0.0 {
            continue;
        }

        // Braking from v[i-1] to v[i] mirrors accelerating from v[i] to v[i-1].
        let needed = ramp_distance(v, v - dv, accel);
        let dist = entries[i - 1].distance_to_next;
        if needed > dist {
            if let Some((t, _)) = solve_quadratic(0.5 * accel, v, -dist) {
                entries[i - 1].max_velocity = v + accel * t;
            }
        }
    }
}

fn insert_cruise_nodes(entries: &mut Vec<MovementScriptEntry>, ideal: f32, accel: f32) {
    let mut i = 0;
    while i + 1 < entries.len() {
        let start = entries[i].position;
        let end = entries[i + 1].position;
        let v1 = entries[i].max_velocity;
        let v2 = entries[i + 1].max_velocity;
        let dist = planar(&(end - start)).norm();
        entries[i].distance_to_next = dist;

        let t1 = (ideal - v1) / accel;
        let d1 = ramp_distance(v1, ideal, accel);
        let t2 = (ideal - v2) / accel;
        let d2 = ramp_distance(v2, ideal, accel);

        if d1 + d2 < dist {
            // Room to reach the ideal speed: end the ramp up, hold, then start the ramp down.
            let mut inserted = 0;
            if d1 > MIN_CRUISE_RAMP_DISTANCE && t1 > MIN_CRUISE_RAMP_TIME {
                let node = MovementScriptEntry::new(
                    start.lerp(&end, d1 / dist),
                    ideal,
                    ScriptNodeKind::Cruise,
                );
                entries.insert(i + 1, node);
                inserted += 1;
            }
            if dist - d2 > MIN_CRUISE_RAMP_DISTANCE && t2 > MIN_CRUISE_RAMP_TIME {
                let node = MovementScriptEntry::new(
                    start.lerp(&end, (dist - d2) / dist),
                    ideal,
                    ScriptNodeKind::Cruise,
                );
                entries.insert(i + 1 + inserted, node);
                inserted += 1;
            }
            i += 1 + inserted;
            continue;
        }

        if dist > EPSILON && delta_v(v1, v2, dist).abs() < accel {
            // Not enough room for the ideal speed, but some for a peak:
            // (vp^2 - v1^2) / 2a + (vp^2 - v2^2) / 2a = dist
            let peak = ((2.0 * accel * dist + v1 * v1 + v2 * v2) * 0.5).sqrt();
            let d_up = (peak * peak - v1 * v1) / (2.0 * accel);
            if peak > v1.max(v2)
                && peak <= ideal
                && d_up > MIN_CRUISE_RAMP_DISTANCE
                && dist - d_up > MIN_CRUISE_RAMP_DISTANCE
            {
                let node =
                    MovementScriptEntry::new(start.lerp(&end, d_up / dist), peak, ScriptNodeKind::Cruise);
                entries.insert(i + 1, node);
                i += 2;
                continue;
            }
        }

        i += 1;
    }
}

/// Final forward pass: distances, segment times and elapsed times.
fn retime(entries: &mut [MovementScriptEntry]) {
    measure(entries);
    if let Some(first) = entries.first_mut() {
        first.elapsed_time = 0.0;
    }

    for i in 0..entries.len().saturating_sub(1) {
        if entries[i].max_velocity == 0.0 && entries[i + 1].max_velocity == 0.0 {
            log::warn!(
                "velocity script: segment {i} has zero speed at both ends, forcing {ZERO_SEGMENT_FALLBACK_SPEED}"
            );
            entries[i + 1].max_velocity = ZERO_SEGMENT_FALLBACK_SPEED;
        }

        let avg = 0.5 * (entries[i].max_velocity + entries[i + 1].max_velocity);
        let t = entries[i].distance_to_next / avg;
        entries[i].time_to_next = t;
        entries[i + 1].elapsed_time = entries[i].elapsed_time + t;
    }

    if let Some(last) = entries.last_mut() {
        last.time_to_next = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Waypoint;

    const FWD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

    fn build(path: &Path, v0: f32, speed: f32, accel: f32) -> VelocityScript {
        let input = VelocityScriptInput::new(path, Vec3::zeros(), v0, FWD, speed, accel);
        VelocityScriptBuilder::default().build(&input)
    }

    fn assert_monotonic(script: &VelocityScript) {
        for pair in script.entries.windows(2) {
            assert!(pair[0].elapsed_time <= pair[1].elapsed_time);
            assert!(pair[0].distance_to_next >= 0.0);
            assert!(pair[0].time_to_next >= 0.0);
        }
    }

    fn assert_accel_bound(script: &VelocityScript, accel: f32) {
        for pair in script.entries.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.distance_to_next < 1.0e-3 || b.kind.is_hard_override() {
                continue;
            }
            let needed = delta_v(a.max_velocity, b.max_velocity, a.distance_to_next).abs();
            assert!(
                needed <= accel * 1.001 + 1.0e-3,
                "{needed} > {accel} between {a:?} and {b:?}"
            );
        }
    }

    #[test]
    fn long_straight_segment_reaches_cruise_speed() {
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -1000.0)]).unwrap();
        let script = build(&path, 0.0, 300.0, 100.0);

        assert!(script.len() >= 3);
        assert!(
            script
                .entries
                .iter()
                .any(|e| (e.max_velocity - 300.0).abs() < 1.0e-3)
        );
        assert!(script.entries.iter().all(|e| e.max_velocity >= 0.0));
        assert_monotonic(&script);
        assert_accel_bound(&script, 100.0);

        // Integral of speed over time equals the path length.
        let integral: f32 = script
            .entries
            .windows(2)
            .map(|p| 0.5 * (p[0].max_velocity + p[1].max_velocity) * p[0].time_to_next)
            .sum();
        assert!((integral - 1000.0).abs() < 0.5);
        assert!((script.total_distance() - 1000.0).abs() < 0.5);
    }

    #[test]
    fn short_segment_gets_a_peak_node() {
        // 0 -> 0 over 200 with accel 100: the peak is sqrt(100 * 200) ~ 141 < 300.
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -200.0)]).unwrap();
        let script = build(&path, 0.0, 300.0, 100.0);

        let peak = script
            .entries
            .iter()
            .map(|e| e.max_velocity)
            .fold(0.0f32, f32::max);
        assert!((peak - (100.0f32 * 200.0).sqrt()).abs() < 0.5);
        assert_accel_bound(&script, 100.0);
    }

    #[test]
    fn sharp_corner_limits_speed() {
        let path = Path::from_points(&[
            Vec3::new(0.0, 0.0, -500.0),
            Vec3::new(500.0, 0.0, -500.0),
        ])
        .unwrap();
        let script = build(&path, 0.0, 300.0, 1.0e6);

        let corner = script
            .entries
            .iter()
            .find(|e| e.source_waypoint == Some(0))
            .unwrap();
        // Right angle: (0 + 0.2) * 300.
        assert!((corner.max_velocity - 60.0).abs() < 1.0e-2);
    }

    #[test]
    fn u_turn_stops_at_the_corner() {
        let path = Path::from_points(&[
            Vec3::new(0.0, 0.0, -500.0),
            Vec3::new(0.0, 0.0, 0.0),
        ])
        .unwrap();
        let script = build(&path, 0.0, 300.0, 100.0);
        let corner = script
            .entries
            .iter()
            .find(|e| e.source_waypoint == Some(0))
            .unwrap();
        assert_eq!(corner.max_velocity, 0.0);
        assert_monotonic(&script);
    }

    #[test]
    fn near_duplicate_waypoints_are_dropped() {
        let path = Path::from_points(&[
            Vec3::new(0.0, 0.0, -100.0),
            Vec3::new(0.5, 0.0, -100.0),
            Vec3::new(0.0, 0.0, -300.0),
        ])
        .unwrap();
        let script = build(&path, 0.0, 300.0, 100.0);
        assert!(
            script
                .entries
                .iter()
                .all(|e| e.source_waypoint != Some(0))
        );
        assert!(
            script
                .entries
                .iter()
                .any(|e| e.source_waypoint == Some(1))
        );
    }

    #[test]
    fn obstruction_inserts_hard_slowdown_with_clearance() {
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -500.0)]).unwrap();
        let mut input = VelocityScriptInput::new(&path, Vec3::zeros(), 200.0, FWD, 300.0, 100.0);
        input.obstruction_distance = Some(200.0);
        let script = VelocityScriptBuilder::default().build(&input);

        let slow = script
            .entries
            .iter()
            .find(|e| e.kind == ScriptNodeKind::ObstructionSlowdown)
            .expect("slowdown node");
        assert!((slow.position.z + 216.0).abs() < 1.0e-2);
        assert!((slow.max_velocity - 1.0).abs() < 1.0e-3);
        assert_monotonic(&script);
    }

    #[test]
    fn reachable_policy_keeps_a_speed_floor() {
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -500.0)]).unwrap();
        let mut input = VelocityScriptInput::new(&path, Vec3::zeros(), 200.0, FWD, 300.0, 100.0);
        input.obstruction_distance = Some(200.0);
        let builder = VelocityScriptBuilder::new(VelocityScriptConfig {
            slowdown_policy: SlowdownPolicy::Reachable,
            ..Default::default()
        });
        let script = builder.build(&input);

        let slow = script
            .entries
            .iter()
            .find(|e| e.kind == ScriptNodeKind::ObstructionSlowdown)
            .unwrap();
        // Braking from 200 at 100 u/s^2 stops within 200 units, short of 216, so the
        // quadratic has no root and the floor applies.
        assert!((slow.max_velocity - 10.0).abs() < 1.0e-3);
    }

    fn reachable_slowdown_speed(points: &[Vec3], v0: f32, obstruction: f32) -> f32 {
        let path = Path::from_points(points).unwrap();
        let mut input = VelocityScriptInput::new(&path, Vec3::zeros(), v0, FWD, 300.0, 100.0);
        input.obstruction_distance = Some(obstruction);
        let builder = VelocityScriptBuilder::new(VelocityScriptConfig {
            slowdown_policy: SlowdownPolicy::Reachable,
            ..Default::default()
        });
        let script = builder.build(&input);
        assert_monotonic(&script);
        assert_accel_bound(&script, 100.0);
        script
            .entries
            .iter()
            .find(|e| e.kind == ScriptNodeKind::ObstructionSlowdown)
            .map(|e| e.max_velocity)
            .unwrap()
    }

    #[test]
    fn reachable_slowdown_ignores_intermediate_waypoints() {
        let end = Vec3::new(0.0, 0.0, -500.0);
        let single = reachable_slowdown_speed(&[end], 200.0, 200.0);
        let split = reachable_slowdown_speed(&[Vec3::new(0.0, 0.0, -100.0), end], 200.0, 200.0);
        assert!((single - 10.0).abs() < 1.0e-3);
        assert!((split - single).abs() < 1.0e-3);
    }

    #[test]
    fn reachable_slowdown_past_the_first_waypoint_brakes_from_the_start() {
        // Node at 50 + 16 = 66 units, past the waypoint at 40: v = sqrt(200^2 - 2 * 100 * 66).
        let expected = (200.0f32 * 200.0 - 2.0 * 100.0 * 66.0).sqrt();
        let points = [Vec3::new(0.0, 0.0, -40.0), Vec3::new(0.0, 0.0, -500.0)];
        let speed = reachable_slowdown_speed(&points, 200.0, 50.0);
        assert!((speed - expected).abs() < 1.0e-2, "{speed} vs {expected}");
    }

    #[test]
    fn corners_respect_the_acceleration_bound() {
        let path = Path::from_points(&[
            Vec3::new(0.0, 0.0, -300.0),
            Vec3::new(200.0, 0.0, -500.0),
            Vec3::new(200.0, 0.0, -900.0),
            Vec3::new(-100.0, 0.0, -950.0),
            Vec3::new(-100.0, 0.0, -1400.0),
        ])
        .unwrap();
        let script = build(&path, 50.0, 300.0, 120.0);

        assert_monotonic(&script);
        assert_accel_bound(&script, 120.0);
        // Each corner is slower than the cruise speed.
        for i in 0..4 {
            let corner = script
                .entries
                .iter()
                .find(|e| e.source_waypoint == Some(i))
                .unwrap();
            assert!(corner.max_velocity < 300.0);
        }
        assert!(script.entries.iter().any(|e| e.kind == ScriptNodeKind::Cruise));
    }

    #[test]
    fn obstruction_beyond_a_corner_keeps_the_bound() {
        let path = Path::from_points(&[
            Vec3::new(0.0, 0.0, -150.0),
            Vec3::new(150.0, 0.0, -300.0),
            Vec3::new(150.0, 0.0, -800.0),
        ])
        .unwrap();
        let mut input = VelocityScriptInput::new(&path, Vec3::zeros(), 100.0, FWD, 300.0, 100.0);
        input.obstruction_distance = Some(380.0);
        let script = VelocityScriptBuilder::default().build(&input);

        let slow = script
            .entries
            .iter()
            .position(|e| e.kind == ScriptNodeKind::ObstructionSlowdown)
            .unwrap();
        assert!(script.entries[..slow].iter().any(|e| e.source_waypoint == Some(1)));
        assert_monotonic(&script);
        assert_accel_bound(&script, 100.0);
    }

    #[test]
    fn obstruction_switch_disables_slowdown() {
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -500.0)]).unwrap();
        let mut input = VelocityScriptInput::new(&path, Vec3::zeros(), 0.0, FWD, 300.0, 100.0);
        input.obstruction_distance = Some(200.0);
        let builder = VelocityScriptBuilder::new(VelocityScriptConfig {
            insert_pause_at_obstruction: false,
            ..Default::default()
        });
        let script = builder.build(&input);
        assert!(
            script
                .entries
                .iter()
                .all(|e| e.kind != ScriptNodeKind::ObstructionSlowdown)
        );
    }

    #[test]
    fn arrival_distance_inserts_slowdown() {
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -500.0)])
            .unwrap()
            .with_arrival_distance(100.0);
        let script = build(&path, 0.0, 300.0, 100.0);
        let slow = script
            .entries
            .iter()
            .find(|e| e.kind == ScriptNodeKind::ArrivalSlowdown)
            .expect("arrival slowdown");
        assert!((slow.position.z + 400.0).abs() < 1.0e-2);
    }

    #[test]
    fn facing_away_kills_the_start_speed() {
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -500.0)]).unwrap();
        let input = VelocityScriptInput::new(
            &path,
            Vec3::zeros(),
            200.0,
            Vec3::new(0.0, 0.0, 1.0),
            300.0,
            100.0,
        );
        let script = VelocityScriptBuilder::default().build(&input);
        assert_eq!(script.entries[0].max_velocity, 0.0);
    }

    #[test]
    fn braking_goal_sets_decelerating_flag() {
        // 300 u/s with 100 units left needs 450 u/s^2 of braking.
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -100.0)]).unwrap();
        let script = build(&path, 300.0, 300.0, 100.0);
        assert!(script.decelerating_to_goal);
        assert!(
            script
                .entries
                .iter()
                .all(|e| e.kind != ScriptNodeKind::Cruise)
        );
    }

    #[test]
    fn zero_length_path_keeps_start_speed() {
        let path = Path::from_points(&[Vec3::zeros()]).unwrap();
        let script = build(&path, 42.0, 300.0, 100.0);
        assert_eq!(script.len(), 1);
        assert_eq!(script.entries[0].max_velocity, 42.0);
    }

    #[test]
    fn climb_links_stop_and_zero_segments_are_forced_moving() {
        let path = Path::new(vec![
            Waypoint::ground(Vec3::new(0.0, 0.0, -1.5)),
            Waypoint::new(Vec3::new(0.0, 100.0, -1.5), NavType::Climb),
        ])
        .unwrap();
        let script = build(&path, 0.0, 300.0, 100.0);
        // The climb waypoint itself is not part of a ground script.
        assert_eq!(script.len(), 2);
        // Too short for a peak node, so both ends stay zero until the fallback kicks in.
        assert!(script.total_time().is_finite());
        assert_eq!(script.entries[1].max_velocity, 1.0);
    }

    #[test]
    fn jump_links_use_launch_speed() {
        let path = Path::new(vec![
            Waypoint::ground(Vec3::new(0.0, 0.0, -100.0)),
            Waypoint::new(Vec3::new(0.0, 0.0, -300.0), NavType::Jump),
        ])
        .unwrap();
        let script = build(&path, 0.0, 300.0, 1.0e6);
        let takeoff = script
            .entries
            .iter()
            .find(|e| e.source_waypoint == Some(0))
            .unwrap();
        assert!((takeoff.max_velocity - 100.0).abs() < 0.5);
    }

    #[test]
    fn downhill_look_ahead_slows_less_than_uphill() {
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -1000.0)]).unwrap();
        let mut input = VelocityScriptInput::new(&path, Vec3::zeros(), 0.0, FWD, 300.0, 100.0);
        input.look_ahead = Some(Vec3::new(0.0, 100.0, -100.0));
        let up = VelocityScriptBuilder::default().build(&input);
        input.look_ahead = Some(Vec3::new(0.0, -100.0, -100.0));
        let down = VelocityScriptBuilder::default().build(&input);

        assert!((up.speed_adjust - 0.5).abs() < 1.0e-4);
        assert!((down.speed_adjust - 0.8).abs() < 1.0e-4);
    }

    #[test]
    fn build_is_idempotent() {
        let path = Path::from_points(&[
            Vec3::new(0.0, 0.0, -300.0),
            Vec3::new(200.0, 0.0, -500.0),
            Vec3::new(200.0, 0.0, -900.0),
        ])
        .unwrap();
        assert_eq!(build(&path, 50.0, 300.0, 100.0), build(&path, 50.0, 300.0, 100.0));
    }

    #[test]
    fn sample_interpolates_speed_and_position() {
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -1000.0)]).unwrap();
        let script = build(&path, 0.0, 300.0, 100.0);

        let s = script.sample(1.0);
        assert!((s.speed - 100.0).abs() < 0.1);
        assert!((s.distance - 50.0).abs() < 0.1);
        assert!((s.position.z + 50.0).abs() < 0.1);

        let end = script.sample(script.total_time() + 1.0);
        assert!((end.distance - 1000.0).abs() < 0.5);
        assert_eq!(end.position, Vec3::new(0.0, 0.0, -1000.0));
    }

    #[test]
    fn time_to_arrival_stops_short_of_the_end() {
        let path = Path::from_points(&[Vec3::new(0.0, 0.0, -1000.0)]).unwrap();
        let script = build(&path, 0.0, 300.0, 100.0);
        assert_eq!(script.time_to_arrival(0.0), script.total_time());
        assert!(script.time_to_arrival(500.0) < script.total_time());
        assert_eq!(VelocityScript::default().time_to_arrival(0.0), -1.0);
    }
}
