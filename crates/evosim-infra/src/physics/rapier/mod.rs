// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rapier implementation of the physics engine contract.

mod conversions;
mod hooks;

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroUsize;

use evosim_core::math::{Aabb, Vec3};
use evosim_core::physics::{
    BodyDesc, BodyId, BodyState, Contact, ContactGeom, GeomClass, GeomData, GeomDesc, GeomId,
    GeomPose, GeomShape, JointDesc, JointId, JointKind, JointState, NearCallback, PhysicsEngine,
    SpaceId,
};
use rapier3d::na::{Translation3, Unit, UnitQuaternion, Vector3};
use rapier3d::parry::query::{
    ContactManifold, DefaultQueryDispatcher, PersistentQueryDispatcher, Ray,
};
use rapier3d::prelude::*;

use self::conversions::*;
use self::hooks::{ContactGroup, ContactGroupHooks};

/// Distance below which two shapes count as touching in the narrow phase.
pub const CONTACT_PREDICTION: Real = 0.002;

/// Semi-implicit Euler substeps per [`PhysicsEngine::world_step`]. External
/// forces and gravity are integrated once per substep.
pub const SOLVER_SUBSTEPS: usize = 4;

enum GeomKind {
    Collider(ColliderHandle),
    Ray { direction: Vector3<Real>, length: Real },
    Space(SpaceId),
}

struct GeomRecord {
    class: GeomClass,
    data: GeomData,
    body: Option<BodyId>,
    /// Placement relative to the body, or to the world for static geoms.
    local: Isometry<Real>,
    /// Turns rapier's native shape frame onto the geom frame.
    alignment: Isometry<Real>,
    kind: GeomKind,
}

struct SpaceRecord {
    geom: GeomId,
    children: Vec<GeomId>,
}

struct JointRecord {
    kind: JointKind,
    body1: Option<BodyId>,
    body2: Option<BodyId>,
    /// Joint frame in body-local coordinates. The frame's x axis is the joint axis.
    frame1: Isometry<Real>,
    frame2: Isometry<Real>,
}

fn ordered<T: Ord>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Implementation of the `PhysicsEngine` trait using the Rapier3D physics engine.
///
/// Spaces, rays and the per-step contact group live on this side of the
/// boundary. Rapier only ever sees bodies, solid colliders and joints, and
/// its solver is restricted to the pairs admitted through
/// [`PhysicsEngine::create_contact`].
pub struct RapierEngine {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,

    bodies: Vec<RigidBodyHandle>,
    geoms: Vec<GeomRecord>,
    spaces: Vec<SpaceRecord>,
    joints: Vec<JointRecord>,
    ground: Option<RigidBodyHandle>,
    connected: HashSet<(BodyId, BodyId)>,
    contact_group: ContactGroup,
    contact_stats: BTreeMap<(Option<BodyId>, Option<BodyId>), usize>,
    total_contacts: usize,
}

impl Default for RapierEngine {
    fn default() -> Self {
        let mut engine = Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: vector![0.0, 0.0, 0.0],
            integration_parameters: IntegrationParameters {
                num_solver_iterations: NonZeroUsize::new(SOLVER_SUBSTEPS)
                    .unwrap_or(NonZeroUsize::MIN),
                ..IntegrationParameters::default()
            },
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            bodies: Vec::new(),
            geoms: Vec::new(),
            spaces: Vec::new(),
            joints: Vec::new(),
            ground: None,
            connected: HashSet::new(),
            contact_group: ContactGroup::default(),
            contact_stats: BTreeMap::new(),
            total_contacts: 0,
        };
        engine.push_space(None);
        engine
    }
}

impl RapierEngine {
    /// Creates an empty world with zero gravity and a root space.
    pub fn new() -> Self {
        Self::default()
    }

    fn push_space(&mut self, parent: Option<SpaceId>) -> SpaceId {
        let space = SpaceId(self.spaces.len() as u32);
        let geom = GeomId(self.geoms.len() as u32);
        self.geoms.push(GeomRecord {
            class: GeomClass::Space,
            data: GeomData::Unset,
            body: None,
            local: Isometry::identity(),
            alignment: Isometry::identity(),
            kind: GeomKind::Space(space),
        });
        self.spaces.push(SpaceRecord {
            geom,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.spaces[parent.0 as usize].children.push(geom);
        }
        space
    }

    fn geom(&self, geom: GeomId) -> &GeomRecord {
        &self.geoms[geom.0 as usize]
    }

    fn body_handle(&self, body: BodyId) -> RigidBodyHandle {
        self.bodies[body.0 as usize]
    }

    fn ground_handle(&mut self) -> RigidBodyHandle {
        if let Some(ground) = self.ground {
            return ground;
        }
        let ground = self
            .rigid_body_set
            .insert(RigidBodyBuilder::fixed().build());
        self.ground = Some(ground);
        ground
    }

    fn body_pose(&self, body: Option<BodyId>) -> Isometry<Real> {
        match body {
            Some(body) => *self.rigid_body_set[self.body_handle(body)].position(),
            None => Isometry::identity(),
        }
    }

    fn body_velocities(&self, body: Option<BodyId>) -> (Vector<Real>, Vector<Real>) {
        match body {
            Some(body) => {
                let rb = &self.rigid_body_set[self.body_handle(body)];
                (*rb.linvel(), *rb.angvel())
            }
            None => (Vector::zeros(), Vector::zeros()),
        }
    }

    /// World placement of the geom frame.
    fn geom_iso(&self, geom: GeomId) -> Isometry<Real> {
        let record = self.geom(geom);
        self.body_pose(record.body) * record.local
    }

    /// World placement of the rapier shape.
    fn world_iso(&self, geom: GeomId) -> Isometry<Real> {
        self.geom_iso(geom) * self.geom(geom).alignment
    }

    fn geom_aabb(&self, geom: GeomId) -> Aabb {
        let record = self.geom(geom);
        match &record.kind {
            GeomKind::Space(space) => self.space_bounds(*space).unwrap_or(Aabb::INVALID),
            GeomKind::Ray { direction, length } => {
                let iso = self.world_iso(geom);
                let start = iso.translation.vector;
                let end = start + iso.rotation * (*direction * *length);
                Aabb::from_min_max(from_rapier_vec(start), from_rapier_vec(end))
            }
            GeomKind::Collider(_) if record.class.is_terrain() => Aabb::EVERYWHERE,
            GeomKind::Collider(handle) => {
                let iso = self.world_iso(geom);
                from_parry_aabb(&self.collider_set[*handle].shape().compute_aabb(&iso))
            }
        }
    }

    /// Broad-phase test shared by both space queries.
    fn may_touch(&self, a: GeomId, b: GeomId) -> bool {
        if a == b {
            return false;
        }
        let (ra, rb) = (self.geom(a), self.geom(b));
        if ra.body.is_some() && ra.body == rb.body {
            return false;
        }
        self.geom_aabb(a)
            .loosened(CONTACT_PREDICTION)
            .intersects_aabb(&self.geom_aabb(b))
    }

    fn joint(&self, joint: JointId) -> &JointRecord {
        &self.joints[joint.0 as usize]
    }

    /// World-space joint frames of both sides.
    fn joint_frames(&self, joint: &JointRecord) -> (Isometry<Real>, Isometry<Real>) {
        (
            self.body_pose(joint.body1) * joint.frame1,
            self.body_pose(joint.body2) * joint.frame2,
        )
    }

    fn ray_contact(&self, ray: GeomId, other: GeomId) -> Option<ContactGeom> {
        let GeomKind::Ray { direction, length } = &self.geom(ray).kind else {
            return None;
        };
        let GeomKind::Collider(handle) = &self.geom(other).kind else {
            return None;
        };
        let iso = self.world_iso(ray);
        let dir = iso.rotation * *direction;
        let cast = Ray::new(Point::from(iso.translation.vector), dir);
        let shape = self.collider_set[*handle].shape();
        let toi = shape.cast_ray(&self.world_iso(other), &cast, *length, true)?;
        Some(ContactGeom {
            position: from_rapier_point(cast.point_at(toi)),
            normal: from_rapier_vec(-dir),
            depth: toi,
            g1: ray,
            g2: other,
        })
    }

    /// Contact manifold of two solid geoms, capped at `max_contacts` points.
    fn shape_contacts(&self, o1: GeomId, o2: GeomId, max_contacts: usize) -> Vec<ContactGeom> {
        let (GeomKind::Collider(h1), GeomKind::Collider(h2)) =
            (&self.geom(o1).kind, &self.geom(o2).kind)
        else {
            return Vec::new();
        };
        let pos1 = self.world_iso(o1);
        let pos12 = pos1.inv_mul(&self.world_iso(o2));
        let mut manifolds: Vec<ContactManifold<(), ()>> = Vec::new();
        if let Err(err) = DefaultQueryDispatcher.contact_manifolds(
            &pos12,
            self.collider_set[*h1].shape(),
            self.collider_set[*h2].shape(),
            CONTACT_PREDICTION,
            &mut manifolds,
            &mut None,
        ) {
            log::warn!("No contact generation between {o1:?} and {o2:?}: {err}");
            return Vec::new();
        }
        manifolds
            .iter()
            .flat_map(|manifold| {
                let normal = from_rapier_vec(pos1.rotation * manifold.local_n1);
                manifold
                    .points
                    .iter()
                    .filter(|point| point.dist <= CONTACT_PREDICTION)
                    .map(move |point| ContactGeom {
                        position: from_rapier_point(pos1 * point.local_p1),
                        normal,
                        depth: -point.dist,
                        g1: o1,
                        g2: o2,
                    })
            })
            .take(max_contacts)
            .collect()
    }

    fn make_shape(shape: &GeomShape) -> (SharedShape, Isometry<Real>) {
        // Rapier's round shapes are aligned with y; turn them onto z.
        let y_to_z = Isometry::rotation(Vector::x() * std::f32::consts::FRAC_PI_2);
        match *shape {
            GeomShape::Box { half_extents } => (
                SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z),
                Isometry::identity(),
            ),
            GeomShape::Sphere { radius } => (SharedShape::ball(radius), Isometry::identity()),
            GeomShape::Cylinder { radius, length } => {
                (SharedShape::cylinder(length * 0.5, radius), y_to_z)
            }
            GeomShape::Capsule { radius, length } => {
                (SharedShape::capsule_y(length * 0.5, radius), y_to_z)
            }
            GeomShape::Plane { normal, offset } => {
                let normal = Unit::new_normalize(to_rapier_vec(normal));
                (
                    SharedShape::halfspace(normal),
                    Isometry::from_parts(
                        Translation3::from(normal.into_inner() * offset),
                        UnitQuaternion::identity(),
                    ),
                )
            }
            // Rays never reach rapier.
            GeomShape::Ray { .. } => (SharedShape::ball(0.0), Isometry::identity()),
        }
    }
}

impl PhysicsEngine for RapierEngine {
    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_rapier_vec(gravity);
    }

    fn world_step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        let hooks = ContactGroupHooks {
            group: &self.contact_group,
        };
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &hooks,
            &(),
        );
        for (_, rb) in self.rigid_body_set.iter_mut() {
            rb.reset_forces(false);
            rb.reset_torques(false);
        }
    }

    fn top_space(&self) -> SpaceId {
        SpaceId(0)
    }

    fn create_space(&mut self, parent: SpaceId) -> SpaceId {
        self.push_space(Some(parent))
    }

    fn space_geom(&self, space: SpaceId) -> GeomId {
        self.spaces[space.0 as usize].geom
    }

    fn geom_space(&self, geom: GeomId) -> Option<SpaceId> {
        match self.geom(geom).kind {
            GeomKind::Space(space) => Some(space),
            _ => None,
        }
    }

    fn space_bounds(&self, space: SpaceId) -> Option<Aabb> {
        // Planes are unbounded and left out.
        let bounds = self.spaces[space.0 as usize]
            .children
            .iter()
            .filter(|child| !self.geom(**child).class.is_terrain())
            .map(|child| self.geom_aabb(*child))
            .filter(Aabb::is_valid)
            .fold(Aabb::INVALID, |acc, aabb| acc.merge(&aabb));
        bounds.is_valid().then_some(bounds)
    }

    fn space_collide(&mut self, space: SpaceId, callback: &mut dyn NearCallback) {
        let children = &self.spaces[space.0 as usize].children;
        let mut pairs = Vec::new();
        for (i, &a) in children.iter().enumerate() {
            for &b in &children[i + 1..] {
                if self.may_touch(a, b) {
                    pairs.push((a, b));
                }
            }
        }
        for (a, b) in pairs {
            callback.near(self, a, b);
        }
    }

    fn space_collide2(&mut self, o1: GeomId, o2: GeomId, callback: &mut dyn NearCallback) {
        let pairs: Vec<(GeomId, GeomId)> = match (self.geom_space(o1), self.geom_space(o2)) {
            (Some(space), _) => self.spaces[space.0 as usize]
                .children
                .iter()
                .filter(|child| self.may_touch(**child, o2))
                .map(|child| (*child, o2))
                .collect(),
            (None, Some(space)) => self.spaces[space.0 as usize]
                .children
                .iter()
                .filter(|child| self.may_touch(o1, **child))
                .map(|child| (o1, *child))
                .collect(),
            (None, None) if self.may_touch(o1, o2) => vec![(o1, o2)],
            (None, None) => Vec::new(),
        };
        for (a, b) in pairs {
            callback.near(self, a, b);
        }
    }

    fn create_body(&mut self, desc: &BodyDesc) -> BodyId {
        let rigid_body = RigidBodyBuilder::dynamic()
            .position(to_rapier_iso(desc.position, desc.rotation))
            .can_sleep(true)
            .build();
        let handle = self.rigid_body_set.insert(rigid_body);
        let id = BodyId(self.bodies.len() as u32);
        self.bodies.push(handle);
        id
    }

    fn body_state(&self, body: BodyId) -> BodyState {
        let rb = &self.rigid_body_set[self.body_handle(body)];
        BodyState {
            position: from_rapier_vec(*rb.translation()),
            rotation: from_rapier_quat(*rb.rotation()),
            linear_velocity: from_rapier_vec(*rb.linvel()),
            angular_velocity: from_rapier_vec(*rb.angvel()),
        }
    }

    fn add_body_force(&mut self, body: BodyId, force: Vec3) {
        let handle = self.body_handle(body);
        self.rigid_body_set[handle].add_force(to_rapier_vec(force), true);
    }

    fn add_body_torque(&mut self, body: BodyId, torque: Vec3) {
        let handle = self.body_handle(body);
        self.rigid_body_set[handle].add_torque(to_rapier_vec(torque), true);
    }

    fn create_geom(&mut self, space: SpaceId, desc: &GeomDesc) -> GeomId {
        let id = GeomId(self.geoms.len() as u32);
        let offset = Isometry::from_parts(
            Translation3::from(to_rapier_vec(desc.offset)),
            UnitQuaternion::identity(),
        );
        let record = match desc.shape {
            GeomShape::Ray { direction, length } => GeomRecord {
                class: GeomClass::Ray,
                data: GeomData::Unset,
                body: desc.body,
                local: offset,
                alignment: Isometry::identity(),
                kind: GeomKind::Ray {
                    direction: to_rapier_vec(direction.normalize()),
                    length,
                },
            },
            ref shape => {
                let (shared, alignment) = Self::make_shape(shape);
                let mut builder = ColliderBuilder::new(shared)
                    .position(offset * alignment)
                    .active_hooks(
                        ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::MODIFY_SOLVER_CONTACTS,
                    )
                    .user_data(id.0 as u128);
                if desc.mass > 0.0 {
                    builder = builder.mass(desc.mass);
                }
                let handle = match desc.body {
                    Some(body) => {
                        let parent = self.body_handle(body);
                        self.collider_set.insert_with_parent(
                            builder.build(),
                            parent,
                            &mut self.rigid_body_set,
                        )
                    }
                    None => self.collider_set.insert(builder.build()),
                };
                GeomRecord {
                    class: shape.class(),
                    data: GeomData::Unset,
                    body: desc.body,
                    local: offset,
                    alignment,
                    kind: GeomKind::Collider(handle),
                }
            }
        };
        self.geoms.push(record);
        self.spaces[space.0 as usize].children.push(id);
        id
    }

    fn geom_class(&self, geom: GeomId) -> GeomClass {
        self.geom(geom).class
    }

    fn geom_data(&self, geom: GeomId) -> GeomData {
        self.geom(geom).data
    }

    fn set_geom_data(&mut self, geom: GeomId, data: GeomData) {
        self.geoms[geom.0 as usize].data = data;
    }

    fn geom_body(&self, geom: GeomId) -> Option<BodyId> {
        self.geom(geom).body
    }

    fn geom_pose(&self, geom: GeomId) -> GeomPose {
        let iso = self.geom_iso(geom);
        GeomPose {
            position: from_rapier_vec(iso.translation.vector),
            rotation: from_rapier_quat(iso.rotation),
        }
    }

    fn collide(&mut self, o1: GeomId, o2: GeomId, max_contacts: usize) -> Vec<ContactGeom> {
        if max_contacts == 0 {
            return Vec::new();
        }
        let ray_hit = match (self.geom_class(o1), self.geom_class(o2)) {
            (GeomClass::Space, _) | (_, GeomClass::Space) => None,
            (GeomClass::Ray, GeomClass::Ray) => None,
            (GeomClass::Ray, _) => self.ray_contact(o1, o2),
            (_, GeomClass::Ray) => self.ray_contact(o2, o1).map(|c| ContactGeom {
                normal: -c.normal,
                g1: o1,
                g2: o2,
                ..c
            }),
            _ => {
                self.contact_group.request(o1, o2, max_contacts);
                return self.shape_contacts(o1, o2, max_contacts);
            }
        };
        ray_hit.into_iter().collect()
    }

    fn create_joint(&mut self, desc: &JointDesc) -> JointId {
        let axis = Unit::new_normalize(to_rapier_vec(desc.axis));
        let rotation = UnitQuaternion::rotation_between(&Vector::x(), &axis).unwrap_or_else(|| {
            UnitQuaternion::from_axis_angle(&Vector::z_axis(), std::f32::consts::PI)
        });
        let world_frame =
            Isometry::from_parts(Translation3::from(to_rapier_vec(desc.anchor)), rotation);
        let frame1 = self.body_pose(desc.body1).inverse() * world_frame;
        let frame2 = self.body_pose(desc.body2).inverse() * world_frame;

        // Rapier measures the second frame relative to the first; the reported
        // position is the first relative to the second.
        let limits = desc
            .limits
            .filter(|(lo, hi)| lo < hi)
            .map(|(lo, hi)| [-hi, -lo]);
        let mut joint: GenericJoint = match desc.kind {
            JointKind::Hinge => {
                let mut builder =
                    RevoluteJointBuilder::new(Vector::x_axis()).contacts_enabled(false);
                if let Some(limits) = limits {
                    builder = builder.limits(limits);
                }
                builder.build().into()
            }
            JointKind::Slider => {
                let mut builder =
                    PrismaticJointBuilder::new(Vector::x_axis()).contacts_enabled(false);
                if let Some(limits) = limits {
                    builder = builder.limits(limits);
                }
                builder.build().into()
            }
        };
        joint.set_local_frame1(frame1);
        joint.set_local_frame2(frame2);

        let rb1 = match desc.body1 {
            Some(body) => self.body_handle(body),
            None => self.ground_handle(),
        };
        let rb2 = match desc.body2 {
            Some(body) => self.body_handle(body),
            None => self.ground_handle(),
        };
        self.impulse_joint_set.insert(rb1, rb2, joint, true);

        if let (Some(b1), Some(b2)) = (desc.body1, desc.body2) {
            self.connected.insert(ordered(b1, b2));
        }
        let id = JointId(self.joints.len() as u32);
        log::debug!(
            "Created {:?} joint {} between {:?} and {:?}",
            desc.kind,
            id.0,
            desc.body1,
            desc.body2
        );
        self.joints.push(JointRecord {
            kind: desc.kind,
            body1: desc.body1,
            body2: desc.body2,
            frame1,
            frame2,
        });
        id
    }

    fn joint_state(&self, joint: JointId) -> JointState {
        let record = self.joint(joint);
        let (w1, w2) = self.joint_frames(record);
        let axis = w1.rotation * Vector::x();
        let (v1, omega1) = self.body_velocities(record.body1);
        let (v2, omega2) = self.body_velocities(record.body2);
        let (position, rate) = match record.kind {
            JointKind::Hinge => {
                let mut relative = (w2.rotation.inverse() * w1.rotation).into_inner();
                if relative.w < 0.0 {
                    relative = -relative;
                }
                let angle = 2.0 * relative.i.atan2(relative.w);
                (angle, (omega1 - omega2).dot(&axis))
            }
            JointKind::Slider => {
                let offset = w1.translation.vector - w2.translation.vector;
                (offset.dot(&axis), (v1 - v2).dot(&axis))
            }
        };
        JointState {
            position,
            rate,
            anchor: from_rapier_vec(w1.translation.vector),
            axis: from_rapier_vec(axis),
        }
    }

    fn add_joint_effort(&mut self, joint: JointId, effort: f32) {
        let record = self.joint(joint);
        let (kind, body1, body2) = (record.kind, record.body1, record.body2);
        let axis = self.joint_state(joint).axis * effort;
        for (body, v) in [(body1, axis), (body2, -axis)] {
            let Some(body) = body else { continue };
            match kind {
                JointKind::Hinge => self.add_body_torque(body, v),
                JointKind::Slider => self.add_body_force(body, v),
            }
        }
    }

    fn are_connected(&self, b1: BodyId, b2: BodyId) -> bool {
        self.connected.contains(&ordered(b1, b2))
    }

    fn create_contact(&mut self, contact: &Contact) {
        let (g1, g2) = (contact.geom.g1, contact.geom.g2);
        let both_solid = matches!(self.geom(g1).kind, GeomKind::Collider(_))
            && matches!(self.geom(g2).kind, GeomKind::Collider(_));
        if !both_solid {
            return;
        }
        self.contact_group.admit(g1, g2, &contact.surface);
        let key = ordered(self.geom_body(g1), self.geom_body(g2));
        *self.contact_stats.entry(key).or_insert(0) += 1;
        self.total_contacts += 1;
    }

    fn empty_contact_group(&mut self) {
        self.contact_group.clear();
    }

    fn contact_joints_between(&self, b1: Option<BodyId>, b2: Option<BodyId>) -> usize {
        self.contact_stats
            .get(&ordered(b1, b2))
            .copied()
            .unwrap_or(0)
    }

    fn total_contact_joints(&self) -> usize {
        self.total_contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use evosim_core::math::Quaternion;
    use evosim_core::physics::SurfaceParams;

    fn ground(engine: &mut RapierEngine) -> GeomId {
        let top = engine.top_space();
        engine.create_geom(
            top,
            &GeomDesc {
                shape: GeomShape::Plane {
                    normal: Vec3::Z,
                    offset: 0.0,
                },
                body: None,
                offset: Vec3::ZERO,
                mass: 0.0,
            },
        )
    }

    fn unit_box(engine: &mut RapierEngine, z: f32) -> (BodyId, GeomId) {
        let body = engine.create_body(&BodyDesc {
            position: Vec3::new(0.0, 0.0, z),
            rotation: Quaternion::IDENTITY,
        });
        let top = engine.top_space();
        let geom = engine.create_geom(
            top,
            &GeomDesc {
                shape: GeomShape::Box {
                    half_extents: Vec3::new(0.5, 0.5, 0.5),
                },
                body: Some(body),
                offset: Vec3::ZERO,
                mass: 1.0,
            },
        );
        (body, geom)
    }

    struct Pairs(Vec<(GeomId, GeomId)>);

    impl NearCallback for Pairs {
        fn near(&mut self, _engine: &mut dyn PhysicsEngine, o1: GeomId, o2: GeomId) {
            self.0.push((o1, o2));
        }
    }

    #[test]
    fn test_free_body_falls_under_gravity() {
        let mut engine = RapierEngine::new();
        engine.set_gravity(Vec3::new(0.0, 0.0, -9.8));
        let (body, _) = unit_box(&mut engine, 1.0);
        for _ in 0..10 {
            engine.world_step(0.01);
        }
        let state = engine.body_state(body);
        assert_abs_diff_eq!(state.linear_velocity.z, -0.98, epsilon = 1e-3);
        // Semi-implicit Euler: z = z0 - g h² n(n + 1) / 2 over n substeps of h.
        let n = (10 * SOLVER_SUBSTEPS) as f32;
        let h = 0.01 / SOLVER_SUBSTEPS as f32;
        let expected = 1.0 - 9.8 * h * h * n * (n + 1.0) * 0.5;
        assert_abs_diff_eq!(state.position.z, expected, epsilon = 1e-4);
    }

    #[test]
    fn test_broad_phase_reports_overlapping_pairs_once() {
        let mut engine = RapierEngine::new();
        let plane = ground(&mut engine);
        let (_, low) = unit_box(&mut engine, 0.5);
        let (_, high) = unit_box(&mut engine, 5.0);
        let mut pairs = Pairs(Vec::new());
        let top = engine.top_space();
        engine.space_collide(top, &mut pairs);
        assert_eq!(pairs.0, vec![(plane, low), (plane, high)]);
    }

    #[test]
    fn test_box_on_plane_touches() {
        let mut engine = RapierEngine::new();
        let plane = ground(&mut engine);
        let (_, geom) = unit_box(&mut engine, 0.49);
        let contacts = engine.collide(plane, geom, 10);
        assert_eq!(contacts.len(), 4);
        for contact in &contacts {
            assert_abs_diff_eq!(contact.depth, 0.01, epsilon = 1e-4);
            assert_abs_diff_eq!(contact.position.z, 0.0, epsilon = 1e-4);
            assert_abs_diff_eq!(contact.normal.z, 1.0, epsilon = 1e-4);
            assert_eq!(contact.g1, plane);
        }
    }

    #[test]
    fn test_collide_caps_the_manifold() {
        let mut engine = RapierEngine::new();
        let plane = ground(&mut engine);
        let (_, geom) = unit_box(&mut engine, 0.49);
        assert_eq!(engine.collide(plane, geom, 1).len(), 1);
        assert_eq!(engine.collide(geom, plane, 2).len(), 2);
        assert!(engine.collide(plane, geom, 0).is_empty());
    }

    #[test]
    fn test_separated_shapes_have_no_contacts() {
        let mut engine = RapierEngine::new();
        let plane = ground(&mut engine);
        let (_, geom) = unit_box(&mut engine, 0.6);
        assert!(engine.collide(plane, geom, 10).is_empty());
    }

    #[test]
    fn test_ray_reports_distance_to_plane() {
        let mut engine = RapierEngine::new();
        let plane = ground(&mut engine);
        let top = engine.top_space();
        let ray = engine.create_geom(
            top,
            &GeomDesc {
                shape: GeomShape::Ray {
                    direction: -Vec3::Z,
                    length: 2.0,
                },
                body: None,
                offset: Vec3::new(0.0, 0.0, 1.0),
                mass: 0.0,
            },
        );
        let contacts = engine.collide(ray, plane, 1);
        assert_eq!(contacts.len(), 1);
        assert_abs_diff_eq!(contacts[0].depth, 1.0, epsilon = 1e-4);
        assert_eq!(engine.geom_class(ray), GeomClass::Ray);
    }

    #[test]
    fn test_nested_space_expands_in_collide2() {
        let mut engine = RapierEngine::new();
        let plane = ground(&mut engine);
        let top = engine.top_space();
        let inner = engine.create_space(top);
        let body = engine.create_body(&BodyDesc {
            position: Vec3::new(0.0, 0.0, 0.5),
            rotation: Quaternion::IDENTITY,
        });
        let geom = engine.create_geom(
            inner,
            &GeomDesc {
                shape: GeomShape::Sphere { radius: 0.5 },
                body: Some(body),
                offset: Vec3::ZERO,
                mass: 1.0,
            },
        );
        let inner_geom = engine.space_geom(inner);
        assert_eq!(engine.geom_space(inner_geom), Some(inner));
        assert!(engine.geom_is_space(inner_geom));

        let mut pairs = Pairs(Vec::new());
        engine.space_collide2(plane, inner_geom, &mut pairs);
        assert_eq!(pairs.0, vec![(plane, geom)]);
        assert!(engine.space_bounds(inner).is_some());
    }

    #[test]
    fn test_hinge_reports_relative_angle() {
        let mut engine = RapierEngine::new();
        let (b1, _) = unit_box(&mut engine, 1.0);
        let joint = engine.create_joint(&JointDesc {
            kind: JointKind::Hinge,
            body1: Some(b1),
            body2: None,
            anchor: Vec3::new(0.0, 0.0, 1.0),
            axis: Vec3::Y,
            limits: None,
        });
        let state = engine.joint_state(joint);
        assert_abs_diff_eq!(state.position, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(state.axis.y, 1.0, epsilon = 1e-6);

        for _ in 0..20 {
            engine.add_joint_effort(joint, 1.0);
            engine.world_step(0.01);
        }
        let state = engine.joint_state(joint);
        assert!(state.position > 0.0);
        assert!(state.rate > 0.0);
    }

    #[test]
    fn test_contacts_are_counted_per_body_pair() {
        let mut engine = RapierEngine::new();
        let plane = ground(&mut engine);
        let (body, geom) = unit_box(&mut engine, 0.49);
        let contacts = engine.collide(plane, geom, 10);
        for geom in contacts {
            engine.create_contact(&Contact {
                geom,
                surface: SurfaceParams::LOCOMOTION,
            });
        }
        assert_eq!(engine.contact_joints_between(Some(body), None), 4);
        assert_eq!(engine.contact_joints_between(None, Some(body)), 4);
        assert_eq!(engine.total_contact_joints(), 4);
        engine.empty_contact_group();
        assert_eq!(engine.contact_group.len(), 0);
        assert_eq!(engine.total_contact_joints(), 4);
    }
}
