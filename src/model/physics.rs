//! Rigid-body world backed by rapier.
//!
//! Only the handful of operations the simulation needs are exposed; rapier
//! types stay inside this module.

use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

/// Surface response against the ground. The ground carries the maximum
/// friction and zero restitution, combined with `Min`/`Max` rules, so each
/// pair ends up with the values set here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaterial {
    pub friction: f32,
    pub restitution: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    /// Infinite plane y = 0 facing up.
    Ground,
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub shape: BodyShape,
    pub position: Vec3,
    /// Zero makes the body static.
    pub mass: f32,
    pub material: ContactMaterial,
    /// Bodies whose position is written directly every frame opt out of
    /// engine gravity and rotation.
    pub kinematic_driven: bool,
}

impl BodyDesc {
    pub fn ground() -> Self {
        Self {
            shape: BodyShape::Ground,
            position: Vec3::ZERO,
            mass: 0.0,
            material: ContactMaterial { friction: 1.0, restitution: 0.0 },
            kinematic_driven: false,
        }
    }

    pub fn character(position: Vec3, radius: f32) -> Self {
        Self {
            shape: BodyShape::Sphere { radius },
            position,
            mass: 1.0,
            material: ContactMaterial { friction: 0.3, restitution: 0.0 },
            kinematic_driven: true,
        }
    }

    pub fn crate_box(position: Vec3, half_extents: Vec3) -> Self {
        Self {
            shape: BodyShape::Cuboid { half_extents },
            position,
            mass: 1.0,
            material: ContactMaterial { friction: 0.4, restitution: 0.3 },
            kinematic_driven: false,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity: vector![gravity.x, gravity.y, gravity.z],
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    pub fn add_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let p = desc.position;
        let builder = if desc.mass > 0.0 {
            RigidBodyBuilder::dynamic()
        } else {
            RigidBodyBuilder::fixed()
        };
        let mut builder = builder.translation(vector![p.x, p.y, p.z]);
        if desc.kinematic_driven {
            builder = builder.gravity_scale(0.0).lock_rotations();
        }
        let handle = self.bodies.insert(builder.build());

        let collider = match desc.shape {
            BodyShape::Ground => ColliderBuilder::halfspace(Vector::y_axis())
                .friction_combine_rule(CoefficientCombineRule::Min)
                .restitution_combine_rule(CoefficientCombineRule::Max),
            BodyShape::Sphere { radius } => ColliderBuilder::ball(radius),
            BodyShape::Cuboid { half_extents: h } => ColliderBuilder::cuboid(h.x, h.y, h.z),
        }
        .friction(desc.material.friction)
        .restitution(desc.material.restitution)
        .mass(desc.mass)
        .build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        tracing::debug!(shape = ?desc.shape, position = ?p, "added body");
        BodyHandle(handle)
    }

    /// Removes the body and its colliders. Unknown handles are ignored.
    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.bodies
            .remove(
                handle.0,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    pub fn step(&mut self, dt: f32) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    pub fn transform(&self, handle: BodyHandle) -> Option<BodyTransform> {
        let body = self.bodies.get(handle.0)?;
        let t = body.translation();
        let q = body.rotation();
        Some(BodyTransform {
            position: Vec3::new(t.x, t.y, t.z),
            rotation: Quat::from_xyzw(q.i, q.j, q.k, q.w),
        })
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Vec3> {
        self.transform(handle).map(|t| t.position)
    }

    /// Teleports the body and clears its linear velocity.
    pub fn set_translation(&mut self, handle: BodyHandle, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            body.set_translation(vector![position.x, position.y, position.z], true);
            body.set_linvel(Vector::zeros(), true);
        }
    }

    pub fn set_transform(&mut self, handle: BodyHandle, transform: BodyTransform) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            let p = transform.position;
            let q = transform.rotation;
            body.set_translation(vector![p.x, p.y, p.z], true);
            body.set_rotation(
                UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z)),
                true,
            );
            body.set_linvel(Vector::zeros(), true);
            body.set_angvel(Vector::zeros(), true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn box_settles_on_ground() {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.82, 0.0));
        world.add_body(&BodyDesc::ground());
        let cube = world.add_body(&BodyDesc::crate_box(Vec3::new(0.0, 2.0, 0.0), Vec3::splat(0.5)));

        for _ in 0..600 {
            world.step(DT);
        }
        let y = world.position(cube).unwrap().y;
        assert!((y - 0.5).abs() < 0.05, "cube rests at {y}");
    }

    #[test]
    fn driven_body_ignores_engine_gravity() {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.82, 0.0));
        let body = world.add_body(&BodyDesc::character(Vec3::new(0.0, 3.0, 0.0), 0.5));
        for _ in 0..60 {
            world.step(DT);
        }
        assert!((world.position(body).unwrap().y - 3.0).abs() < 1e-4);
    }

    #[test]
    fn removed_body_is_gone() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let body = world.add_body(&BodyDesc::crate_box(Vec3::ONE, Vec3::splat(0.5)));
        assert!(world.remove_body(body));
        assert!(!world.contains(body));
        assert!(world.transform(body).is_none());
        assert!(!world.remove_body(body));
    }

    #[test]
    fn set_transform_round_trips() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let body = world.add_body(&BodyDesc::crate_box(Vec3::ZERO, Vec3::splat(0.5)));
        let rotation = Quat::from_rotation_y(0.7);
        world.set_transform(body, BodyTransform { position: Vec3::new(1.0, 2.0, 3.0), rotation });
        let t = world.transform(body).unwrap();
        assert!((t.position - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        assert!(t.rotation.dot(rotation).abs() > 0.9999);
    }
}
