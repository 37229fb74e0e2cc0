/*!
Core data types and math aliases shared by the motor modules.

This module intentionally contains no algorithms. It defines the data exchanged between:
- the path model (waypoints produced by an external navigator)
- the script builders (velocity and turn profiles)
- the move probe (collision queries answered by the host or by rapier)
- the motors (per-tick execution and result reporting)

Conventions
- World is Y-up. "Planar" means the XZ plane.
- Yaw is in degrees. Yaw 0 faces -Z, yaw 90 faces -X.
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;

/// Opaque identifier of an entity a probe can report as an obstruction.
pub type EntityId = u32;

/// How a mover traverses the link that ends at a waypoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NavType {
    #[default]
    Ground,
    Fly,
    Jump,
    Climb,
}

impl NavType {
    /// Ground and fly links are the only ones a velocity script is built across.
    #[inline]
    pub fn is_continuous(self) -> bool {
        matches!(self, NavType::Ground | NavType::Fly)
    }
}

/// Why a velocity-script node exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptNodeKind {
    /// The mover's own position at build time.
    Start,
    /// A path waypoint.
    Waypoint,
    /// End of an acceleration ramp or start of a deceleration ramp.
    Cruise,
    /// Hard slowdown in front of an obstruction.
    ObstructionSlowdown,
    /// Hard slowdown at the estimated arrival distance.
    ArrivalSlowdown,
}

impl ScriptNodeKind {
    /// Slowdown nodes override the acceleration limits.
    #[inline]
    pub fn is_hard_override(self) -> bool {
        matches!(
            self,
            ScriptNodeKind::ObstructionSlowdown | ScriptNodeKind::ArrivalSlowdown
        )
    }
}

/// One node of the velocity profile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementScriptEntry {
    pub position: Vec3,
    /// Speed the mover should have when passing this node.
    pub max_velocity: f32,
    /// Planar distance to the next node (0 on the last node).
    pub distance_to_next: f32,
    /// Time to reach the next node (0 on the last node).
    pub time_to_next: f32,
    pub elapsed_time: f32,
    /// Index of the path waypoint this node came from.
    pub source_waypoint: Option<usize>,
    pub kind: ScriptNodeKind,
}

impl MovementScriptEntry {
    pub fn new(position: Vec3, max_velocity: f32, kind: ScriptNodeKind) -> Self {
        Self {
            position,
            max_velocity,
            distance_to_next: 0.0,
            time_to_next: 0.0,
            elapsed_time: 0.0,
            source_waypoint: None,
            kind,
        }
    }
}

/// One node of the heading profile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnScriptEntry {
    pub position: Vec3,
    pub yaw: f32,
    pub time_to_next: f32,
    pub elapsed_time: f32,
    pub source_waypoint: Option<usize>,
    /// Inserted by interpolation rather than taken from the velocity script.
    pub interpolated: bool,
}

impl TurnScriptEntry {
    pub fn new(position: Vec3, yaw: f32, elapsed_time: f32) -> Self {
        Self {
            position,
            yaw,
            time_to_next: 0.0,
            elapsed_time,
            source_waypoint: None,
            interpolated: false,
        }
    }
}

/// Outcome of one motor execute call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotorMoveResult {
    Success,
    /// Moved part of the way, then hit world geometry.
    PartialHitWorld,
    /// Bumped into the entity the move was aiming for.
    PartialHitTarget,
    Failed,
}

/// Progress of a fly path for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlyPathProgress {
    NoChange,
    Advanced,
    Complete,
    /// Never produced by [`crate::path::progress_fly_path`]; blocked handling belongs to the caller.
    Blocked,
}

/// Axis-aligned collision hull of a mover, Y-aligned capsule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HullSpec {
    pub radius: f32,
    /// Half of the cylinder section along +Y.
    pub half_height: f32,
}

impl Default for HullSpec {
    fn default() -> Self {
        Self {
            radius: 16.0,
            half_height: 20.0,
        }
    }
}
