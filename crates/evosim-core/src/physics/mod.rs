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

//! # Physics Abstractions
//!
//! The contract between the simulation driver and the rigid-body engine it
//! drives. The engine owns the world, a tree of collision spaces, bodies,
//! geoms, joints and a contact-joint group; the driver only ever holds the
//! opaque handles defined here.
//!
//! Collision detection is split the classic way: the engine enumerates
//! candidate geom pairs in a space and hands each to a [`NearCallback`], which
//! decides whether to run the narrow phase ([`PhysicsEngine::collide`]) and
//! which contacts to turn into constraints ([`PhysicsEngine::create_contact`]).

mod contact;

pub use contact::{Contact, ContactGeom, SurfaceMode, SurfaceParams};

use crate::math::{Aabb, Quaternion, Vec3};

/// Opaque handle to a rigid body in the physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

/// Opaque handle to a geom (collision shape, ray or space) in the physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeomId(pub u32);

/// Opaque handle to a joint in the physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub u32);

/// Opaque handle to a collision space in the physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceId(pub u32);

/// The class of a geom, as seen by the broad-phase callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeomClass {
    /// A sphere.
    Sphere,
    /// A box.
    Box,
    /// A capsule.
    Capsule,
    /// A flat-ended cylinder.
    Cylinder,
    /// An infinite plane.
    Plane,
    /// A height-field terrain.
    Heightfield,
    /// A one-dimensional probe.
    Ray,
    /// A collision space containing other geoms.
    Space,
}

impl GeomClass {
    /// Returns true for static terrain geoms, which always collide.
    #[inline]
    pub fn is_terrain(self) -> bool {
        matches!(self, GeomClass::Plane | GeomClass::Heightfield)
    }
}

/// User data attached to a geom.
///
/// The driver stores the owning entity's ID by value so that the callback
/// can look the entity up without borrowing into entity storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeomData {
    /// Nothing was attached.
    #[default]
    Unset,
    /// The reserved "collide with anything" marker carried by the ground.
    CollideAlways,
    /// The ID of the entity owning this geom.
    Entity(usize),
}

/// Shape description for a new geom.
///
/// Cylinders and capsules are aligned with the body-local z axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeomShape {
    /// Box with half-extents.
    Box {
        /// Half the side lengths.
        half_extents: Vec3,
    },
    /// Sphere with radius.
    Sphere {
        /// Sphere radius.
        radius: f32,
    },
    /// Cylinder along z.
    Cylinder {
        /// Cylinder radius.
        radius: f32,
        /// Full length of the flat-ended section.
        length: f32,
    },
    /// Capsule along z.
    Capsule {
        /// Radius of the capsule caps.
        radius: f32,
        /// Length of the cylindrical section, excluding the caps.
        length: f32,
    },
    /// The plane `normal · p = offset`.
    Plane {
        /// Unit plane normal.
        normal: Vec3,
        /// Distance of the plane from the origin along `normal`.
        offset: f32,
    },
    /// A ray starting at the geom offset.
    Ray {
        /// Direction, in the frame of the owning body (or the world).
        direction: Vec3,
        /// Maximum length of the ray.
        length: f32,
    },
}

impl GeomShape {
    /// The class a geom created from this shape will report.
    pub fn class(&self) -> GeomClass {
        match self {
            GeomShape::Box { .. } => GeomClass::Box,
            GeomShape::Sphere { .. } => GeomClass::Sphere,
            GeomShape::Cylinder { .. } => GeomClass::Cylinder,
            GeomShape::Capsule { .. } => GeomClass::Capsule,
            GeomShape::Plane { .. } => GeomClass::Plane,
            GeomShape::Ray { .. } => GeomClass::Ray,
        }
    }
}

/// Description for creating a rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    /// Initial position of the centre of the body frame.
    pub position: Vec3,
    /// Initial orientation.
    pub rotation: Quaternion,
}

/// Description for creating a geom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeomDesc {
    /// Shape of the geom.
    pub shape: GeomShape,
    /// Body the geom moves with, or `None` for a static geom.
    pub body: Option<BodyId>,
    /// Position relative to the body frame (or the world for static geoms).
    pub offset: Vec3,
    /// Mass contributed to the body. Ignored for static geoms and rays.
    pub mass: f32,
}

/// The degree of freedom a joint leaves free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointKind {
    /// Rotation about a single axis.
    Hinge,
    /// Translation along a single axis.
    Slider,
}

/// Description for creating a joint. `None` bodies attach to the static world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointDesc {
    /// Joint kind.
    pub kind: JointKind,
    /// First body.
    pub body1: Option<BodyId>,
    /// Second body.
    pub body2: Option<BodyId>,
    /// World-space anchor at creation time.
    pub anchor: Vec3,
    /// World-space axis at creation time.
    pub axis: Vec3,
    /// Lower and upper limits of the free coordinate, if any.
    pub limits: Option<(f32, f32)>,
}

/// Kinematic state of a body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub rotation: Quaternion,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
}

/// State of a joint's free coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointState {
    /// Hinge angle in radians, or slider displacement, relative to creation.
    pub position: f32,
    /// Time derivative of `position`.
    pub rate: f32,
    /// Current world-space anchor (on the first body).
    pub anchor: Vec3,
    /// Current world-space axis.
    pub axis: Vec3,
}

/// World-space placement of a geom.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeomPose {
    /// World position of the geom origin.
    pub position: Vec3,
    /// World orientation of the geom.
    pub rotation: Quaternion,
}

/// The broad-phase callback, invoked once per candidate geom pair.
pub trait NearCallback {
    /// Handles a candidate pair. The engine is passed back so the callback
    /// can recurse into spaces, run the narrow phase and create contacts.
    fn near(&mut self, engine: &mut dyn PhysicsEngine, o1: GeomId, o2: GeomId);
}

/// Interface contract for any rigid-body engine implementation (e.g., Rapier).
///
/// Handles passed to the engine must have been returned by the same engine;
/// implementations may panic on foreign handles.
pub trait PhysicsEngine {
    // --- World ---

    /// Sets the global gravity vector.
    fn set_gravity(&mut self, gravity: Vec3);

    /// Integrates the world by `dt` seconds using the current contact group.
    /// Forces and torques added since the previous step are consumed.
    fn world_step(&mut self, dt: f32);

    // --- Spaces ---

    /// The root collision space.
    fn top_space(&self) -> SpaceId;

    /// Creates a space nested inside `parent`.
    fn create_space(&mut self, parent: SpaceId) -> SpaceId;

    /// The geom standing for a space inside its parent.
    fn space_geom(&self, space: SpaceId) -> GeomId;

    /// Returns the space a geom stands for, if the geom is a space.
    fn geom_space(&self, geom: GeomId) -> Option<SpaceId>;

    /// Bounding box of everything inside a space, if it contains anything.
    fn space_bounds(&self, space: SpaceId) -> Option<Aabb>;

    /// Calls `callback` for every potentially colliding pair of direct
    /// children of `space`. Nested spaces are reported as geoms.
    fn space_collide(&mut self, space: SpaceId, callback: &mut dyn NearCallback);

    /// Calls `callback` for every potentially colliding pair between `o1` and
    /// `o2`. A space is expanded into its direct children.
    fn space_collide2(&mut self, o1: GeomId, o2: GeomId, callback: &mut dyn NearCallback);

    // --- Bodies ---

    /// Adds a rigid body.
    fn create_body(&mut self, desc: &BodyDesc) -> BodyId;

    /// Reads the kinematic state of a body.
    fn body_state(&self, body: BodyId) -> BodyState;

    /// Accumulates a world-space force at the body's centre of mass.
    fn add_body_force(&mut self, body: BodyId, force: Vec3);

    /// Accumulates a world-space torque.
    fn add_body_torque(&mut self, body: BodyId, torque: Vec3);

    // --- Geoms ---

    /// Adds a geom to `space`.
    fn create_geom(&mut self, space: SpaceId, desc: &GeomDesc) -> GeomId;

    /// Class of a geom.
    fn geom_class(&self, geom: GeomId) -> GeomClass;

    /// Returns true if the geom is a space.
    fn geom_is_space(&self, geom: GeomId) -> bool {
        self.geom_class(geom) == GeomClass::Space
    }

    /// User data attached to a geom.
    fn geom_data(&self, geom: GeomId) -> GeomData;

    /// Attaches user data to a geom.
    fn set_geom_data(&mut self, geom: GeomId, data: GeomData);

    /// Body a geom moves with.
    fn geom_body(&self, geom: GeomId) -> Option<BodyId>;

    /// Current world placement of a geom.
    fn geom_pose(&self, geom: GeomId) -> GeomPose;

    /// Runs the narrow phase on a pair and returns at most `max_contacts` contacts.
    fn collide(&mut self, o1: GeomId, o2: GeomId, max_contacts: usize) -> Vec<ContactGeom>;

    // --- Joints ---

    /// Adds a joint.
    fn create_joint(&mut self, desc: &JointDesc) -> JointId;

    /// Reads the state of a joint's free coordinate.
    fn joint_state(&self, joint: JointId) -> JointState;

    /// Accumulates a generalized effort on the joint: a torque about a hinge
    /// axis or a force along a slider axis, applied equal and opposite.
    fn add_joint_effort(&mut self, joint: JointId, effort: f32);

    /// Returns true if a joint connects the two bodies.
    fn are_connected(&self, b1: BodyId, b2: BodyId) -> bool;

    // --- Contact group ---

    /// Creates a contact constraint between the bodies of the contact's geoms.
    /// It lasts until [`PhysicsEngine::empty_contact_group`].
    fn create_contact(&mut self, contact: &Contact);

    /// Discards every contact constraint created since the last call.
    fn empty_contact_group(&mut self);

    /// Number of contact constraints ever created between two bodies
    /// (`None` being the static world), in either order.
    fn contact_joints_between(&self, b1: Option<BodyId>, b2: Option<BodyId>) -> usize;

    /// Number of contact constraints ever created.
    fn total_contact_joints(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_classes() {
        assert!(GeomClass::Plane.is_terrain());
        assert!(GeomClass::Heightfield.is_terrain());
        assert!(!GeomClass::Box.is_terrain());
        assert!(!GeomClass::Ray.is_terrain());
        assert!(!GeomClass::Space.is_terrain());
    }

    #[test]
    fn test_shape_class() {
        let ray = GeomShape::Ray {
            direction: Vec3::Z,
            length: 1.0,
        };
        assert_eq!(ray.class(), GeomClass::Ray);
        let plane = GeomShape::Plane {
            normal: Vec3::Z,
            offset: 0.0,
        };
        assert_eq!(plane.class(), GeomClass::Plane);
        assert_eq!(GeomData::default(), GeomData::Unset);
    }
}
