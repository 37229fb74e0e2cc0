/*!
Heading profile ("turn script") paired with a [`VelocityScript`].

The turn script shares the velocity script's clock: every node carries the elapsed time at which
the mover should face `yaw`. Between nodes the yaw is interpolated along the shortest arc.

Passes:
1. Seed with the mover's position and yaw, then add a node per corner waypoint, rotated only
   `corner_lead_fraction` of the way into the new heading, and the arrival heading at the goal.
2. Walk back from the goal pulling each node to within `turn_rate * time` of its successor.
3. For each adjacent pair, face along the straight line between them when the turn budget allows
   (one or two interior nodes); otherwise leave the pair alone and turn across the whole segment.
*/

use crate::{
    config::TurnScriptConfig,
    kinematics::{angle_diff, angle_normalize, approach_angle, planar, yaw_from_vector},
    path::Path,
    types::{TurnScriptEntry, Vec3},
    velocity_script::VelocityScript,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnScript {
    pub entries: Vec<TurnScriptEntry>,
}

impl TurnScript {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_time(&self) -> f32 {
        self.entries.last().map_or(0.0, |e| e.elapsed_time)
    }

    /// Desired yaw `t` seconds into the script.
    pub fn yaw_at(&self, t: f32) -> Option<f32> {
        let first = self.entries.first()?;
        if t <= first.elapsed_time {
            return Some(first.yaw);
        }

        for pair in self.entries.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if t < b.elapsed_time && a.time_to_next > 0.0 {
                let frac = ((t - a.elapsed_time) / a.time_to_next).clamp(0.0, 1.0);
                return Some(angle_normalize(a.yaw + angle_diff(b.yaw, a.yaw) * frac));
            }
        }

        self.entries.last().map(|e| e.yaw)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TurnScriptBuilder {
    pub config: TurnScriptConfig,
}

impl TurnScriptBuilder {
    pub fn new(config: TurnScriptConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, path: &Path, current_yaw: f32, velocity: &VelocityScript) -> TurnScript {
        let Some(start) = velocity.entries.first() else {
            return TurnScript::default();
        };

        let mut script = TurnScript {
            entries: vec![TurnScriptEntry::new(
                start.position,
                angle_normalize(current_yaw),
                0.0,
            )],
        };

        self.add_corner_nodes(path, velocity, &mut script);
        self.limit_turn_rate(&mut script);

        let mut i = 0;
        while i + 1 < script.entries.len() {
            i += self.refine_pair(&mut script, i, i + 1) + 1;
        }

        log::debug!(
            "turn script: {} nodes over {:.2}s",
            script.len(),
            script.total_time()
        );

        script
    }

    fn add_corner_nodes(&self, path: &Path, velocity: &VelocityScript, script: &mut TurnScript) {
        let mut prev_position = velocity.entries[0].position;

        for entry in velocity.entries.iter().skip(1) {
            let Some(index) = entry.source_waypoint else {
                continue;
            };
            let Some(waypoint) = path.waypoint(index) else {
                continue;
            };

            let t = entry.elapsed_time;
            if let Some(last) = script.entries.last_mut() {
                last.time_to_next = t - last.elapsed_time;
            }

            let mut node = TurnScriptEntry::new(waypoint.position, 0.0, t);
            node.source_waypoint = Some(index);

            match path.next_of(index).and_then(|n| path.waypoint(n)) {
                Some(next) => {
                    let yaw_out = yaw_from_vector(&planar(&(next.position - waypoint.position)));
                    let yaw_in = yaw_from_vector(&planar(&(waypoint.position - prev_position)));
                    let delta = angle_diff(yaw_out, yaw_in).abs();
                    if delta > self.config.min_turn_delta {
                        node.yaw =
                            approach_angle(yaw_out, yaw_in, delta * self.config.corner_lead_fraction);
                        script.entries.push(node);
                    }
                }
                None => {
                    node.yaw = yaw_from_vector(&path.arrival_direction());
                    script.entries.push(node);
                }
            }

            prev_position = waypoint.position;
        }
    }

    /// Pull each node toward its successor so no segment needs more than the turn rate.
    fn limit_turn_rate(&self, script: &mut TurnScript) {
        let entries = &mut script.entries;
        for i in (1..entries.len()).rev() {
            let delta = angle_diff(entries[i - 1].yaw, entries[i].yaw);
            let max_yaw = self.config.turn_rate * entries[i - 1].time_to_next.max(0.0);
            if delta.abs() > max_yaw {
                entries[i - 1].yaw = approach_angle(entries[i - 1].yaw, entries[i].yaw, max_yaw);
            }
        }
    }

    /// Insert interior nodes between `i` and `j`; returns how many were inserted.
    pub(crate) fn refine_pair(&self, script: &mut TurnScript, i: usize, j: usize) -> usize {
        let cfg = &self.config;
        let (from, to) = (script.entries[i], script.entries[j]);

        let total = to.elapsed_time - from.elapsed_time;
        if total <= 0.0 {
            if total < 0.0 {
                log::warn!("turn script: negative time budget {total:.3}s between {i} and {j}");
            }
            return 0;
        }

        let interior = yaw_from_vector(&planar(&(to.position - from.position)));
        let t1 = angle_diff(interior, from.yaw).abs() / cfg.turn_rate;
        let t2 = angle_diff(to.yaw, interior).abs() / cfg.turn_rate;
        let budget = total * cfg.interior_budget_fraction;

        if t1 < cfg.instant_turn_time {
            if t2 > budget {
                return 0;
            }
            script.entries[i].yaw = interior;
            return match self.insert_node(script, i, total - t2) {
                Some(k) => {
                    script.entries[k].yaw = interior;
                    1
                }
                None => 0,
            };
        }

        if t2 < cfg.instant_turn_time {
            if t1 > budget {
                return 0;
            }
            return match self.insert_node(script, i, t1) {
                Some(k) => {
                    script.entries[k].yaw = interior;
                    1
                }
                None => 0,
            };
        }

        if t1 + t2 > total {
            // Too little time to face the interior line; turn across the whole segment instead.
            return 0;
        }

        if t1 + t2 < budget {
            let Some(k) = self.insert_node(script, i, t1) else {
                return 0;
            };
            script.entries[k].yaw = interior;
            let Some(k) = self.insert_node(script, k, total - t2 - t1) else {
                return 1;
            };
            script.entries[k].yaw = interior;
            return 2;
        }

        0
    }

    /// Split the turn script `time` seconds after node `i`; returns the new node's index.
    pub(crate) fn insert_node(&self, script: &mut TurnScript, i: usize, time: f32) -> Option<usize> {
        if time <= 0.0 {
            log::warn!("turn script: refusing to insert a node {time:.3}s after {i}");
            return None;
        }

        let entries = &mut script.entries;
        let mut time = time;
        for k in i..entries.len().saturating_sub(1) {
            let seg = entries[k].time_to_next;
            if seg < time {
                time -= seg;
                continue;
            }

            let a = time / seg;
            let mut node = TurnScriptEntry::new(
                entries[k].position.lerp(&entries[k + 1].position, a),
                entries[k].yaw,
                entries[k].elapsed_time + time,
            );
            node.time_to_next = seg - time;
            node.interpolated = true;
            entries[k].time_to_next = time;
            entries.insert(k + 1, node);
            return Some(k + 1);
        }

        log::warn!("turn script: insertion time past the end of the script");
        None
    }
}

/// Planar yaw of the direct line from `a` to `b`.
pub fn yaw_between(a: Vec3, b: Vec3) -> f32 {
    yaw_from_vector(&planar(&(b - a)))
}
