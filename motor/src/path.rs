//! Path model consumed by the motors.
//!
//! A [`Path`] is produced by an external navigator and handed to the motor by reference. The
//! motor only reads waypoints, walks the cursor forward, and watches `revision` to know when its
//! scripts went stale.

use crate::{
    bitmask_flags::BitmaskFlags,
    define_bitmask_flags,
    error::PathError,
    kinematics::{planar, planar_dir},
    probe::MoveProbe,
    types::{EntityId, FlyPathProgress, NavType, Vec3},
};

define_bitmask_flags!(
    /// Per-waypoint tags.
    WaypointFlag, u8, {
        /// Placed by a level designer; must be visited, never simplified away.
        PathCorner,
        DontSimplify,
        /// Final waypoint of the route.
        Goal,
    }
);

pub type WaypointFlags = BitmaskFlags<u8>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub position: Vec3,
    /// How the link that ends at this waypoint is traversed.
    pub nav_type: NavType,
    pub flags: WaypointFlags,
}

impl Waypoint {
    pub fn new(position: Vec3, nav_type: NavType) -> Self {
        Self {
            position,
            nav_type,
            flags: WaypointFlags::default(),
        }
    }

    pub fn ground(position: Vec3) -> Self {
        Self::new(position, NavType::Ground)
    }

    pub fn fly(position: Vec3) -> Self {
        Self::new(position, NavType::Fly)
    }

    pub fn with_flag(mut self, flag: WaypointFlag) -> Self {
        self.flags.add(flag);
        self
    }

    /// Strict waypoints use the tighter tolerance and are never skipped.
    pub fn is_strict(&self) -> bool {
        self.flags
            .has_any(&[WaypointFlag::PathCorner, WaypointFlag::DontSimplify])
    }
}

/// Ordered route plus the arrival parameters for its last waypoint.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    waypoints: Vec<Waypoint>,
    cursor: usize,
    /// Speed the mover should have when it reaches the goal.
    pub arrival_speed: f32,
    /// Distance before the goal at which the arrival animation starts (0 = none).
    pub arrival_distance: f32,
    arrival_direction: Option<Vec3>,
    pub goal_tolerance: f32,
    revision: u64,
}

impl Path {
    pub fn new(waypoints: Vec<Waypoint>) -> Result<Self, PathError> {
        if waypoints.is_empty() {
            return Err(PathError::Empty);
        }
        if let Some(index) = waypoints.iter().position(|w| {
            !(w.position.x.is_finite() && w.position.y.is_finite() && w.position.z.is_finite())
        }) {
            return Err(PathError::NonFinite { index });
        }

        let mut waypoints = waypoints;
        if let Some(last) = waypoints.last_mut() {
            last.flags.add(WaypointFlag::Goal);
        }

        Ok(Self {
            waypoints,
            cursor: 0,
            arrival_speed: 0.0,
            arrival_distance: 0.0,
            arrival_direction: None,
            goal_tolerance: 0.0,
            revision: 0,
        })
    }

    /// Convenience for all-ground routes.
    pub fn from_points(points: &[Vec3]) -> Result<Self, PathError> {
        Self::new(points.iter().copied().map(Waypoint::ground).collect())
    }

    pub fn with_arrival_speed(mut self, speed: f32) -> Self {
        self.arrival_speed = speed.max(0.0);
        self
    }

    pub fn with_arrival_distance(mut self, distance: f32) -> Self {
        self.arrival_distance = distance.max(0.0);
        self
    }

    pub fn with_arrival_direction(mut self, dir: Vec3) -> Self {
        self.arrival_direction = Some(dir);
        self
    }

    pub fn with_goal_tolerance(mut self, tolerance: f32) -> Self {
        self.goal_tolerance = tolerance.max(0.0);
        self
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn waypoint(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) -> Result<(), PathError> {
        if cursor >= self.waypoints.len() {
            return Err(PathError::CursorOutOfRange {
                cursor,
                len: self.waypoints.len(),
            });
        }
        self.cursor = cursor;
        self.bump_revision();
        Ok(())
    }

    /// The waypoint the mover is currently heading for.
    pub fn current(&self) -> &Waypoint {
        &self.waypoints[self.cursor]
    }

    /// Index of the waypoint after `index`, if any.
    pub fn next_of(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        (next < self.waypoints.len()).then_some(next)
    }

    pub fn is_goal(&self, index: usize) -> bool {
        index + 1 == self.waypoints.len()
    }

    /// Waypoints from the cursor to the goal (inclusive).
    pub fn remaining(&self) -> impl Iterator<Item = (usize, &Waypoint)> {
        self.waypoints.iter().enumerate().skip(self.cursor)
    }

    /// Move the cursor to the next waypoint. Returns false at the goal.
    pub fn advance(&mut self) -> bool {
        if self.is_goal(self.cursor) {
            return false;
        }
        self.cursor += 1;
        self.bump_revision();
        true
    }

    pub fn goal(&self) -> &Waypoint {
        &self.waypoints[self.waypoints.len() - 1]
    }

    /// Facing the mover should have on arrival.
    ///
    /// Falls back to the direction of the last planar segment, or -Z for single-point paths.
    pub fn arrival_direction(&self) -> Vec3 {
        if let Some(dir) = self.arrival_direction {
            return dir;
        }

        let n = self.waypoints.len();
        let fallback = Vec3::new(0.0, 0.0, -1.0);
        if n < 2 {
            return fallback;
        }

        let dir = planar_dir(&(self.waypoints[n - 1].position - self.waypoints[n - 2].position));
        if dir == Vec3::zeros() { fallback } else { dir }
    }

    /// Bumped whenever the route changes; motors rebuild their scripts on a new revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn bump_revision(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Replace the route (new goal). Keeps arrival parameters.
    pub fn replace_waypoints(&mut self, waypoints: Vec<Waypoint>) -> Result<(), PathError> {
        let fresh = Path::new(waypoints)?;
        self.waypoints = fresh.waypoints;
        self.cursor = 0;
        self.bump_revision();
        Ok(())
    }

    /// Total planar length from `origin` through the remaining waypoints.
    pub fn remaining_planar_length(&self, origin: Vec3) -> f32 {
        let mut prev = origin;
        let mut total = 0.0;
        for (_, w) in self.remaining() {
            total += planar(&(w.position - prev)).norm();
            prev = w.position;
        }
        total
    }
}

/// Tolerances used while progressing a fly path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlyPathParams {
    pub waypoint_tolerance: f32,
    pub strict_point_tolerance: f32,
    pub goal_tolerance: f32,
    /// Ignored by line-of-sight checks.
    pub mover: Option<EntityId>,
}

/// Advance the cursor of a fly path based on the mover's `origin`.
///
/// - Within goal tolerance of the goal: `Complete`.
/// - Within tolerance of an intermediate waypoint with a clear line to the next one: advance.
/// - Otherwise try to skip a non-strict waypoint whose successor is already visible.
///
/// Never returns `Blocked`.
pub fn progress_fly_path(
    path: &mut Path,
    origin: Vec3,
    params: &FlyPathParams,
    probe: &dyn MoveProbe,
) -> FlyPathProgress {
    let cursor = path.cursor();
    let waypoint = *path.current();
    let waypoint_dist = (waypoint.position - origin).norm();

    if path.is_goal(cursor) {
        let tolerance = params.goal_tolerance.max(path.goal_tolerance);
        if waypoint_dist <= tolerance {
            return FlyPathProgress::Complete;
        }
        return FlyPathProgress::NoChange;
    }

    let tolerance = if waypoint.is_strict() {
        params.strict_point_tolerance
    } else {
        params.waypoint_tolerance
    };

    if let Some(next) = path.next_of(cursor).and_then(|i| path.waypoint(i)).copied() {
        if waypoint_dist <= tolerance
            && probe.trace_line(origin, next.position, params.mover).is_clear()
        {
            path.advance();
            return FlyPathProgress::Advanced;
        }

        if !waypoint.is_strict()
            && probe.trace_line(origin, next.position, params.mover).is_clear()
        {
            log::trace!("fly path: skipping waypoint {cursor}, next one is visible");
            path.advance();
            return FlyPathProgress::Advanced;
        }
    }

    FlyPathProgress::NoChange
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{TraceResult, tests::OpenSpace};

    fn straight() -> Path {
        Path::from_points(&[
            Vec3::new(0.0, 0.0, -100.0),
            Vec3::new(0.0, 0.0, -200.0),
            Vec3::new(100.0, 0.0, -200.0),
        ])
        .unwrap()
    }

    #[test]
    fn empty_paths_are_rejected() {
        assert_eq!(Path::new(vec![]), Err(PathError::Empty));
    }

    #[test]
    fn non_finite_waypoints_are_rejected() {
        let err = Path::from_points(&[Vec3::zeros(), Vec3::new(f32::NAN, 0.0, 0.0)]).unwrap_err();
        assert_eq!(err, PathError::NonFinite { index: 1 });
    }

    #[test]
    fn last_waypoint_is_tagged_goal() {
        let path = straight();
        assert!(path.goal().flags.has(WaypointFlag::Goal));
        assert!(!path.waypoints()[0].flags.has(WaypointFlag::Goal));
    }

    #[test]
    fn advance_bumps_revision_and_stops_at_goal() {
        let mut path = straight();
        let r0 = path.revision();
        assert!(path.advance());
        assert!(path.advance());
        assert!(!path.advance());
        assert_eq!(path.cursor(), 2);
        assert_eq!(path.revision(), r0 + 2);
    }

    #[test]
    fn cursor_out_of_range_is_rejected() {
        let mut path = straight();
        assert_eq!(
            path.set_cursor(3),
            Err(PathError::CursorOutOfRange { cursor: 3, len: 3 })
        );
    }

    #[test]
    fn arrival_direction_falls_back_to_last_segment() {
        let path = straight();
        let dir = path.arrival_direction();
        assert!((dir - Vec3::new(1.0, 0.0, 0.0)).norm() < 1.0e-5);

        let explicit = straight().with_arrival_direction(Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(explicit.arrival_direction(), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn arrival_builders_set_goal_behavior() {
        let path = straight()
            .with_arrival_speed(40.0)
            .with_arrival_distance(24.0)
            .with_goal_tolerance(8.0);
        assert_eq!(path.arrival_speed, 40.0);
        assert_eq!(path.arrival_distance, 24.0);
        assert_eq!(path.goal_tolerance, 8.0);
    }

    #[test]
    fn remaining_length_counts_from_origin() {
        let path = straight();
        assert!((path.remaining_planar_length(Vec3::zeros()) - 300.0).abs() < 1.0e-3);
    }

    #[test]
    fn fly_progress_completes_at_goal() {
        let mut path = straight();
        path.set_cursor(2).unwrap();
        let params = FlyPathParams {
            waypoint_tolerance: 10.0,
            strict_point_tolerance: 5.0,
            goal_tolerance: 10.0,
            mover: None,
        };
        let progress = progress_fly_path(
            &mut path,
            Vec3::new(95.0, 0.0, -200.0),
            &params,
            &OpenSpace,
        );
        assert_eq!(progress, FlyPathProgress::Complete);
    }

    #[test]
    fn fly_progress_keeps_strict_waypoints() {
        let mut path = Path::new(vec![
            Waypoint::fly(Vec3::new(0.0, 0.0, -100.0)).with_flag(WaypointFlag::PathCorner),
            Waypoint::fly(Vec3::new(0.0, 0.0, -200.0)),
        ])
        .unwrap();
        let params = FlyPathParams {
            waypoint_tolerance: 50.0,
            strict_point_tolerance: 5.0,
            goal_tolerance: 10.0,
            mover: None,
        };

        // 20 units away: outside strict tolerance and the corner may not be skipped.
        let progress = progress_fly_path(
            &mut path,
            Vec3::new(0.0, 0.0, -80.0),
            &params,
            &OpenSpace,
        );
        assert_eq!(progress, FlyPathProgress::NoChange);
        assert_eq!(path.cursor(), 0);
    }

    #[test]
    fn fly_progress_skips_visible_waypoints() {
        let mut path = straight();
        let params = FlyPathParams {
            waypoint_tolerance: 10.0,
            strict_point_tolerance: 5.0,
            goal_tolerance: 10.0,
            mover: None,
        };
        let progress = progress_fly_path(&mut path, Vec3::zeros(), &params, &OpenSpace);
        assert_eq!(progress, FlyPathProgress::Advanced);
        assert_eq!(path.cursor(), 1);
    }

    #[test]
    fn trace_result_clear_is_full_fraction() {
        assert!(TraceResult::clear(Vec3::zeros()).is_clear());
    }
}
