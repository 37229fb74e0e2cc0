pub mod bitmask_flags;
pub mod config;
pub mod constants;
pub mod error;
pub mod kinematics;
pub mod motor;
pub mod path;
pub mod probe;
pub mod rapier_world;
pub mod steering;
pub mod turn_script;
pub mod types;
pub mod velocity_script;

pub use config::{
    FlyerConfig, MotorConfig, PhysicsFlyerConfig, SlowdownPolicy, SwimmerConfig,
    TurnScriptConfig, VelocityScriptConfig,
};
pub use error::{ConfigError, PathError};
pub use motor::{
    FlyingMotor, GroundBlendedMotor, Motor, MotorContext, MotorState, MoveGoal, MoverBody,
    PhysicsFlyingMotor, SwimmingMotor, classify_move,
};
pub use path::{FlyPathParams, Path, Waypoint, WaypointFlag, WaypointFlags, progress_fly_path};
pub use probe::{
    HitEntity, JumpSolution, MoveProbe, MoveStatus, MoveTrace, ObstacleKind, TraceResult,
};
pub use rapier_world::{ObstacleDef, ObstacleShape, RapierProbe};
pub use steering::{
    BodyFrame, FlyerSteering, Steering, SteeringAvoidance, SteeringInput, SteeringMode,
    SteeringOutput,
};
pub use turn_script::{TurnScript, TurnScriptBuilder};
pub use types::{
    EntityId, FlyPathProgress, HullSpec, MotorMoveResult, MovementScriptEntry, NavType, Quat,
    ScriptNodeKind, TurnScriptEntry, Vec3,
};
pub use velocity_script::{ScriptSample, VelocityScript, VelocityScriptBuilder, VelocityScriptInput};
