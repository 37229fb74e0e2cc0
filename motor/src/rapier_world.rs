//! Rapier-backed [`MoveProbe`] over a static obstacle set.
//!
//! Obstacles are inserted as fixed bodies, one collider each, with the obstacle id and kind packed
//! into the collider's `user_data` so traces can report what they hit. The broad and narrow phases
//! are stepped once at build time; afterwards the world is query-only.
//!
//! - Line traces are rays.
//! - Hull traces sweep a Y-aligned capsule built from the mover's [`HullSpec`].

use rapier3d::na::Translation3;
use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::prelude::*;

use crate::{
    constants::EPSILON,
    probe::{HitEntity, MoveProbe, ObstacleKind, TraceResult},
    types::{EntityId, HullSpec, Quat, Vec3},
};

/// One immutable obstacle.
#[derive(Clone, Debug)]
pub struct ObstacleDef {
    /// Stable id; also the insertion order.
    pub id: EntityId,
    pub kind: ObstacleKind,
    pub translation: Vec3,
    pub rotation: Quat,
    pub shape: ObstacleShape,
}

impl ObstacleDef {
    pub fn world(id: EntityId, translation: Vec3, shape: ObstacleShape) -> Self {
        Self {
            id,
            kind: ObstacleKind::World,
            translation,
            rotation: Quat::identity(),
            shape,
        }
    }

    /// Another mover, approximated by a standing capsule.
    pub fn character(id: EntityId, translation: Vec3, hull: HullSpec) -> Self {
        Self {
            id,
            kind: ObstacleKind::Character,
            translation,
            rotation: Quat::identity(),
            shape: ObstacleShape::CapsuleY {
                radius: hull.radius,
                half_height: hull.half_height,
            },
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }
}

#[derive(Clone, Debug)]
pub enum ObstacleShape {
    /// Half-space whose normal is `rotation * +Y`, offset along that normal.
    Plane { offset_along_normal: f32 },
    Cuboid { half_extents: Vec3 },
    Sphere { radius: f32 },
    CapsuleY { radius: f32, half_height: f32 },
}

const KIND_SHIFT: u32 = 32;

fn pack_user_data(id: EntityId, kind: ObstacleKind) -> u128 {
    let kind_bits: u128 = match kind {
        ObstacleKind::World => 0,
        ObstacleKind::Character => 1,
    };
    (id as u128) | (kind_bits << KIND_SHIFT)
}

fn unpack_user_data(data: u128) -> HitEntity {
    let kind = if (data >> KIND_SHIFT) & 1 == 1 {
        ObstacleKind::Character
    } else {
        ObstacleKind::World
    };
    HitEntity {
        id: (data & u128::from(u32::MAX)) as EntityId,
        kind,
    }
}

/// Query-only rapier scene.
pub struct RapierProbe {
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub broad_phase: BroadPhaseBvh,
    pub narrow_phase: NarrowPhase,
    /// Height of a flat water surface, if the scene has one.
    pub water_surface: Option<f32>,
}

impl RapierProbe {
    pub fn build(mut defs: Vec<ObstacleDef>) -> Self {
        defs.sort_by_key(|d| d.id);

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        for def in &defs {
            let iso = Isometry::from_parts(Translation3::from(def.translation), def.rotation);
            let rb_handle = bodies.insert(RigidBodyBuilder::fixed().pose(iso).build());
            colliders.insert_with_parent(collider_from_def(def), rb_handle, &mut bodies);
        }

        let mut broad_phase = BroadPhaseBvh::new();
        let mut narrow_phase = NarrowPhase::new();
        let mut collision_pipeline = CollisionPipeline::new();
        collision_pipeline.step(
            0.0,
            &mut broad_phase,
            &mut narrow_phase,
            &mut bodies,
            &mut colliders,
            &(),
            &(),
        );

        log::debug!("rapier probe: {} obstacles", defs.len());

        Self {
            bodies,
            colliders,
            broad_phase,
            narrow_phase,
            water_surface: None,
        }
    }

    pub fn with_water_surface(mut self, height: f32) -> Self {
        self.water_surface = Some(height);
        self
    }

    pub fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }

    fn hit_entity(&self, handle: ColliderHandle) -> Option<HitEntity> {
        self.colliders
            .get(handle)
            .map(|c| unpack_user_data(c.user_data))
    }
}

fn collider_from_def(def: &ObstacleDef) -> Collider {
    let builder = match &def.shape {
        ObstacleShape::Plane {
            offset_along_normal,
        } => {
            // The body pose already carries the rotation; the collider only needs the offset.
            ColliderBuilder::halfspace(Vector::y_axis()).translation(vector![
                0.0,
                *offset_along_normal,
                0.0
            ])
        }
        ObstacleShape::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
        ObstacleShape::Sphere { radius } => ColliderBuilder::ball(*radius),
        ObstacleShape::CapsuleY {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(*half_height, *radius),
    };

    builder
        .user_data(pack_user_data(def.id, def.kind))
        .build()
}

impl MoveProbe for RapierProbe {
    fn trace_line(&self, start: Vec3, end: Vec3, ignore: Option<EntityId>) -> TraceResult {
        let delta = end - start;
        let length = delta.norm();
        if length <= EPSILON {
            return TraceResult::clear(end);
        }

        let skip = |_: ColliderHandle, c: &Collider| ignore != Some(unpack_user_data(c.user_data).id);
        let query_pipeline = self.query_pipeline(QueryFilter::default().predicate(&skip));

        let ray = Ray::new(point![start.x, start.y, start.z], delta / length);
        match query_pipeline.cast_ray_and_get_normal(&ray, length, true) {
            Some((handle, hit)) => {
                let fraction = (hit.time_of_impact / length).clamp(0.0, 1.0);
                TraceResult {
                    fraction,
                    end_position: start + delta * fraction,
                    normal: hit.normal,
                    entity: self.hit_entity(handle),
                }
            }
            None => TraceResult::clear(end),
        }
    }

    fn trace_hull(
        &self,
        start: Vec3,
        end: Vec3,
        hull: HullSpec,
        ignore: Option<EntityId>,
    ) -> TraceResult {
        let delta = end - start;
        if delta.norm() <= EPSILON {
            return TraceResult::clear(end);
        }

        let skip = |_: ColliderHandle, c: &Collider| ignore != Some(unpack_user_data(c.user_data).id);
        let query_pipeline = self.query_pipeline(QueryFilter::default().predicate(&skip));

        let capsule = Capsule::new_y(hull.half_height, hull.radius);
        let iso = Isometry::translation(start.x, start.y, start.z);
        let mut opts = ShapeCastOptions::with_max_time_of_impact(1.0);
        opts.stop_at_penetration = true;

        match query_pipeline.cast_shape(&iso, &delta, &capsule, opts) {
            Some((handle, hit)) => {
                let fraction = hit.time_of_impact.clamp(0.0, 1.0);
                // Report the surface normal facing back along the sweep.
                let mut normal = hit.normal1.into_inner();
                if normal.dot(&delta) > 0.0 {
                    normal = -normal;
                }
                TraceResult {
                    fraction,
                    end_position: start + delta * fraction,
                    normal,
                    entity: self.hit_entity(handle),
                }
            }
            None => TraceResult::clear(end),
        }
    }

    fn water_level(&self, _point: Vec3, min_y: f32, max_y: f32) -> f32 {
        match self.water_surface {
            Some(surface) => surface.clamp(min_y, max_y),
            None => max_y,
        }
    }
}
