/*!
Motor tunables and fixed engine constants.

Distances are in world units (the engine's inches), time in seconds, angles in degrees.
Values that hosts are expected to tune live on the config structs in [`crate::config`];
this module keeps the constants the algorithms treat as fixed, plus the defaults the
config structs start from.
*/

/// Maximum yaw rate assumed by the turn script (degrees per second).
pub const YAW_SPEED: f32 = 150.0;

/// Fraction of a corner's heading change taken before reaching the corner waypoint.
pub const CORNER_LEAD_FRACTION: f32 = 0.8;

/// Heading changes at or below this (degrees) are treated as straight.
pub const MIN_TURN_DELTA: f32 = 0.1;

/// Turns that need less time than this (seconds) are considered already done.
pub const INSTANT_TURN_TIME: f32 = 0.01;

/// Ideal speed substituted when the mover reports zero.
pub const DEFAULT_IDEAL_SPEED: f32 = 50.0;

/// Ideal acceleration substituted when the mover reports zero.
pub const DEFAULT_IDEAL_ACCEL: f32 = 100.0;

/// Added to `dot(incoming, outgoing)` when deriving corner speed.
///
/// A right angle still allows 20% of the ideal speed.
pub const CORNER_DOT_BIAS: f32 = 0.2;

/// Waypoints closer than this (planar) to their successor are dropped from the velocity script.
pub const DUPLICATE_WAYPOINT_DISTANCE: f32 = 1.0;

/// Obstruction distances are measured from the stand position, not a trace; push them out by a step.
pub const OBSTRUCTION_CLEARANCE: f32 = 16.0;

/// Speed forced at a hard slowdown node under [`crate::config::SlowdownPolicy::Halt`].
pub const HALT_SLOWDOWN_SPEED: f32 = 1.0;

/// Lowest speed a [`crate::config::SlowdownPolicy::Reachable`] slowdown may request.
pub const REACHABLE_SLOWDOWN_FLOOR: f32 = 10.0;

/// Speed forced on a segment whose both ends are at zero, so its time stays finite.
pub const ZERO_SEGMENT_FALLBACK_SPEED: f32 = 1.0;

/// Cruise nodes are only inserted when the ramp covers more than this distance...
pub const MIN_CRUISE_RAMP_DISTANCE: f32 = 1.0;

/// ...and takes longer than this (seconds).
pub const MIN_CRUISE_RAMP_TIME: f32 = 0.1;

/// Remaining distances below this are considered arrived.
pub const ARRIVED_DISTANCE: f32 = 0.01;

/// Practical small value for float guards.
pub const EPSILON: f32 = 1.0e-6;

/// A move counts as totally blocked when the obstructed distance is within this of the request.
pub const BLOCKED_TOLERANCE: f32 = 0.1;

/// Jumps are planned with at least this horizontal speed.
pub const MIN_JUMP_HORZ_SPEED: f32 = 100.0;

/// Stand-in for `1 / fraction` when a probe reports a hit at fraction 0.
pub const PSEUDO_FORCE_MULTIPLIER: f32 = 1000.0;

/// Ground clearance fractions are clamped to at least this before dividing.
pub const MIN_CLEARANCE_FRACTION: f32 = 0.1;

/// Upward push (units/s) used by flying bots to keep their ground clearance.
pub const GROUND_CLEARANCE_PUSH: f32 = 50.0;

/// Maximum bank angle (degrees) produced by a full-right target direction.
pub const BANKING_SCALE: f32 = 120.0;
