/*!
Explicit configuration for the motor algorithms.

The engine drove several branches of the script builders through global console variables.
Here every such switch is a field on a plain struct that the caller owns and passes in, so two
movers can run with different policies in the same frame.

Every struct has a `Default` carrying the engine defaults and a `validated()` method that rejects
values the algorithms cannot work with (negative distances, zero rates, fractions outside [0, 1]).
*/

use crate::{
    constants::{
        BANKING_SCALE, CORNER_DOT_BIAS, CORNER_LEAD_FRACTION, DEFAULT_IDEAL_ACCEL,
        DEFAULT_IDEAL_SPEED, DUPLICATE_WAYPOINT_DISTANCE, INSTANT_TURN_TIME, MIN_TURN_DELTA,
        OBSTRUCTION_CLEARANCE, YAW_SPEED,
    },
    error::{ConfigError, fraction, non_negative, positive},
    types::Vec3,
};

/// How fast the mover may still be going at an inserted slowdown node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SlowdownPolicy {
    /// Unconditional near-stop (1 unit/s) at the slowdown node.
    #[default]
    Halt,
    /// Whatever braking at the ideal acceleration allows, but never below 10 units/s.
    Reachable,
}

/// Switches and tolerances for [`crate::velocity_script::VelocityScriptBuilder`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityScriptConfig {
    /// Insert a slowdown node in front of an obstruction reported by the caller.
    pub insert_pause_at_obstruction: bool,
    /// Insert a slowdown node at the path's arrival distance.
    pub insert_pause_at_est_end: bool,
    /// Scale the start speed by how well the mover already faces the first segment.
    pub adjust_speed_on_immediate_turns: bool,
    /// Scale the ideal speed by the grade towards the look-ahead point.
    pub height_adjust: bool,
    /// Added to the obstruction distance before inserting the slowdown.
    pub obstruction_clearance: f32,
    pub slowdown_policy: SlowdownPolicy,
    /// Velocity floor applied to every node before timing.
    pub min_velocity: f32,
    pub duplicate_waypoint_distance: f32,
    /// Used when the mover reports an ideal speed of zero.
    pub default_ideal_speed: f32,
    /// Used when the mover reports an ideal acceleration of zero.
    pub default_ideal_accel: f32,
    pub corner_dot_bias: f32,
}

impl Default for VelocityScriptConfig {
    fn default() -> Self {
        Self {
            insert_pause_at_obstruction: true,
            insert_pause_at_est_end: true,
            adjust_speed_on_immediate_turns: true,
            height_adjust: true,
            obstruction_clearance: OBSTRUCTION_CLEARANCE,
            slowdown_policy: SlowdownPolicy::Halt,
            min_velocity: 0.0,
            duplicate_waypoint_distance: DUPLICATE_WAYPOINT_DISTANCE,
            default_ideal_speed: DEFAULT_IDEAL_SPEED,
            default_ideal_accel: DEFAULT_IDEAL_ACCEL,
            corner_dot_bias: CORNER_DOT_BIAS,
        }
    }
}

impl VelocityScriptConfig {
    pub fn validated(self) -> Result<Self, ConfigError> {
        non_negative("obstruction_clearance", self.obstruction_clearance)?;
        non_negative("min_velocity", self.min_velocity)?;
        non_negative(
            "duplicate_waypoint_distance",
            self.duplicate_waypoint_distance,
        )?;
        positive("default_ideal_speed", self.default_ideal_speed)?;
        positive("default_ideal_accel", self.default_ideal_accel)?;
        non_negative("corner_dot_bias", self.corner_dot_bias)?;
        Ok(self)
    }
}

/// Tunables for [`crate::turn_script::TurnScriptBuilder`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnScriptConfig {
    /// Degrees per second.
    pub turn_rate: f32,
    pub corner_lead_fraction: f32,
    pub min_turn_delta: f32,
    pub instant_turn_time: f32,
    /// Interior nodes are only inserted when both turns fit in this share of the segment time.
    pub interior_budget_fraction: f32,
}

impl Default for TurnScriptConfig {
    fn default() -> Self {
        Self {
            turn_rate: YAW_SPEED,
            corner_lead_fraction: CORNER_LEAD_FRACTION,
            min_turn_delta: MIN_TURN_DELTA,
            instant_turn_time: INSTANT_TURN_TIME,
            interior_budget_fraction: 0.8,
        }
    }
}

impl TurnScriptConfig {
    pub fn validated(self) -> Result<Self, ConfigError> {
        positive("turn_rate", self.turn_rate)?;
        fraction("corner_lead_fraction", self.corner_lead_fraction)?;
        non_negative("min_turn_delta", self.min_turn_delta)?;
        non_negative("instant_turn_time", self.instant_turn_time)?;
        fraction("interior_budget_fraction", self.interior_budget_fraction)?;
        Ok(self)
    }
}

/// Settings for the ground blended motor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorConfig {
    pub velocity: VelocityScriptConfig,
    pub turn: TurnScriptConfig,
    /// Scripts older than this (seconds) are rebuilt even if nothing else changed.
    pub script_refresh_interval: f32,
    /// Body yaw rate (degrees per second) when no override applies.
    pub max_yaw_speed: f32,
    pub head_turn_rate: f32,
    /// Head yaw is kept within +/- this many degrees of the body.
    pub head_yaw_limit: f32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            velocity: VelocityScriptConfig::default(),
            turn: TurnScriptConfig::default(),
            script_refresh_interval: 0.25,
            max_yaw_speed: 360.0,
            head_turn_rate: 180.0,
            head_yaw_limit: 90.0,
        }
    }
}

impl MotorConfig {
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.velocity.validated()?;
        self.turn.validated()?;
        non_negative("script_refresh_interval", self.script_refresh_interval)?;
        positive("max_yaw_speed", self.max_yaw_speed)?;
        non_negative("head_turn_rate", self.head_turn_rate)?;
        non_negative("head_yaw_limit", self.head_yaw_limit)?;
        Ok(self)
    }
}

/// Flight model of the hovering flying bots (scanners, manhacks).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlyerConfig {
    pub max_speed: f32,
    /// Planar acceleration when the target is roughly ahead.
    pub accel_forward: f32,
    /// Planar acceleration when correcting away from the current heading.
    pub accel_correcting: f32,
    pub accel_vertical: f32,
    /// Fraction of velocity kept after one second without thrust.
    pub decay: f32,
    /// `dot(target_dir, heading)` above which `accel_forward` applies.
    pub forward_dot: f32,
    pub min_ground_distance: f32,
    pub waypoint_tolerance: f32,
    pub strict_point_tolerance: f32,
    pub goal_tolerance: f32,
    pub banking_scale: f32,
}

impl Default for FlyerConfig {
    fn default() -> Self {
        Self {
            max_speed: 300.0,
            accel_forward: 250.0,
            accel_correcting: 128.0,
            accel_vertical: 400.0,
            decay: 0.15,
            forward_dot: 0.25,
            min_ground_distance: 72.0,
            waypoint_tolerance: 64.0,
            strict_point_tolerance: 32.0,
            goal_tolerance: 48.0,
            banking_scale: BANKING_SCALE,
        }
    }
}

impl FlyerConfig {
    pub fn validated(self) -> Result<Self, ConfigError> {
        positive("max_speed", self.max_speed)?;
        non_negative("accel_forward", self.accel_forward)?;
        non_negative("accel_correcting", self.accel_correcting)?;
        non_negative("accel_vertical", self.accel_vertical)?;
        positive("decay", self.decay)?;
        fraction("decay", self.decay)?;
        non_negative("min_ground_distance", self.min_ground_distance)?;
        non_negative("waypoint_tolerance", self.waypoint_tolerance)?;
        non_negative("strict_point_tolerance", self.strict_point_tolerance)?;
        non_negative("goal_tolerance", self.goal_tolerance)?;
        Ok(self)
    }
}

/// Point-mass body that trails the steering output, as a physics motion controller would.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsFlyerConfig {
    /// Largest velocity change the controller may apply per second.
    pub max_acceleration: f32,
    /// Rapier-style linear damping: `v *= 1 / (1 + dt * damping)` each step.
    pub linear_damping: f32,
    pub max_yaw_speed: f32,
}

impl Default for PhysicsFlyerConfig {
    fn default() -> Self {
        Self {
            max_acceleration: 600.0,
            linear_damping: 0.5,
            max_yaw_speed: 360.0,
        }
    }
}

impl PhysicsFlyerConfig {
    pub fn validated(self) -> Result<Self, ConfigError> {
        positive("max_acceleration", self.max_acceleration)?;
        non_negative("linear_damping", self.linear_damping)?;
        positive("max_yaw_speed", self.max_yaw_speed)?;
        Ok(self)
    }
}

/// Steering limits of the swimming NPCs (ichthyosaur).
///
/// Acceleration limits are expressed in the mover's local frame:
/// `x` = forward, `y` = right, `z` = up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwimmerConfig {
    pub ground_speed: f32,
    pub accel_max: Vec3,
    pub accel_min: Vec3,
    /// Preferred clearance above the floor.
    pub height_preference: f32,
    /// Preferred depth below the water surface.
    pub depth_preference: f32,
    /// Arrival slows down inside this distance of the target.
    pub waypoint_distance: f32,
    /// Skip the stay-under-the-surface correction.
    pub ignore_surface: bool,
}

impl Default for SwimmerConfig {
    fn default() -> Self {
        Self {
            ground_speed: 400.0,
            accel_max: Vec3::new(256.0, 1024.0, 512.0),
            accel_min: Vec3::new(-256.0, -1024.0, -512.0),
            height_preference: 16.0,
            depth_preference: 8.0,
            waypoint_distance: 64.0,
            ignore_surface: false,
        }
    }
}

impl SwimmerConfig {
    pub fn validated(self) -> Result<Self, ConfigError> {
        positive("ground_speed", self.ground_speed)?;
        for axis in 0..3 {
            if self.accel_min[axis] > self.accel_max[axis] {
                return Err(ConfigError::InvertedRange {
                    min_field: "accel_min",
                    min: self.accel_min[axis],
                    max_field: "accel_max",
                    max: self.accel_max[axis],
                });
            }
        }
        non_negative("height_preference", self.height_preference)?;
        positive("depth_preference", self.depth_preference)?;
        positive("waypoint_distance", self.waypoint_distance)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MotorConfig::default().validated().is_ok());
        assert!(FlyerConfig::default().validated().is_ok());
        assert!(SwimmerConfig::default().validated().is_ok());
        assert!(PhysicsFlyerConfig::default().validated().is_ok());
    }

    #[test]
    fn engine_defaults_are_preserved() {
        let v = VelocityScriptConfig::default();
        assert!(v.insert_pause_at_obstruction);
        assert_eq!(v.obstruction_clearance, 16.0);
        assert_eq!(v.slowdown_policy, SlowdownPolicy::Halt);
        assert_eq!(v.min_velocity, 0.0);

        let t = TurnScriptConfig::default();
        assert_eq!(t.turn_rate, 150.0);
        assert_eq!(t.corner_lead_fraction, 0.8);
    }

    #[test]
    fn zero_turn_rate_is_rejected() {
        let cfg = TurnScriptConfig {
            turn_rate: 0.0,
            ..Default::default()
        };
        assert_eq!(
            cfg.validated(),
            Err(ConfigError::NotPositive {
                field: "turn_rate",
                value: 0.0
            })
        );
    }

    #[test]
    fn inverted_swimmer_limits_are_rejected() {
        let cfg = SwimmerConfig {
            accel_min: Vec3::new(300.0, -1.0, -1.0),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validated(),
            Err(ConfigError::InvertedRange { .. })
        ));
    }

    #[test]
    fn nested_motor_config_errors_surface() {
        let mut cfg = MotorConfig::default();
        cfg.velocity.min_velocity = -1.0;
        assert!(cfg.validated().is_err());
    }
}
