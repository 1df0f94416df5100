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

//! # Collision Dispatcher
//!
//! The near callback run by the engine's broad phase. Each candidate pair is
//! classified by geom class:
//!
//! 1. a space on either side is expanded, then collided with itself;
//! 2. a ray on either side updates the ray's observation;
//! 3. terrain on either side always generates contacts;
//! 4. two bodies generate contacts unless a joint connects them or the
//!    collision policy keeps their groups apart.
//!
//! Generated contacts use [`SurfaceParams::LOCOMOTION`].

use evosim_core::physics::{
    Contact, GeomClass, GeomData, GeomId, NearCallback, PhysicsEngine, SurfaceParams,
};
use evosim_core::render::Color;

use crate::collision_policy::{CollisionPolicy, COLLIDE};
use crate::environment::Environment;
use crate::error::InvariantError;

/// Broad-phase callback over an [`Environment`].
///
/// The engine cannot carry errors back through the broad phase. The first
/// invariant violation is latched until [`CollisionDispatcher::finish`] and
/// later pairs are ignored.
pub struct CollisionDispatcher<'a> {
    env: &'a mut Environment,
    policy: &'a CollisionPolicy,
    max_contacts: usize,
    error: Option<InvariantError>,
}

impl<'a> CollisionDispatcher<'a> {
    /// Creates a dispatcher generating at most `max_contacts` contacts per pair.
    pub fn new(env: &'a mut Environment, policy: &'a CollisionPolicy, max_contacts: usize) -> Self {
        Self {
            env,
            policy,
            max_contacts,
            error: None,
        }
    }

    /// Ends the pass, returning the latched error if there is one.
    pub fn finish(self) -> Result<(), InvariantError> {
        self.error.map_or(Ok(()), Err)
    }

    fn dispatch(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        o1: GeomId,
        o2: GeomId,
    ) -> Result<(), InvariantError> {
        let s1 = engine.geom_space(o1);
        let s2 = engine.geom_space(o2);
        if s1.is_some() || s2.is_some() {
            engine.space_collide2(o1, o2, self);
            for space in [s1, s2].into_iter().flatten() {
                engine.space_collide(space, self);
            }
            return Ok(());
        }

        let c1 = engine.geom_class(o1);
        let c2 = engine.geom_class(o2);
        if c1 == GeomClass::Ray {
            return self.handle_ray(engine, o1, o2);
        }
        if c2 == GeomClass::Ray {
            return self.handle_ray(engine, o2, o1);
        }

        let d1 = geom_data(engine, o1)?;
        let d2 = geom_data(engine, o2)?;
        if !c1.is_terrain() && !c2.is_terrain() {
            if let (Some(b1), Some(b2)) = (engine.geom_body(o1), engine.geom_body(o2)) {
                if engine.are_connected(b1, b2) {
                    return Ok(());
                }
            }
            let g1 = self.group(d1)?;
            let g2 = self.group(d2)?;
            if g1 != COLLIDE && g2 != COLLIDE && !self.policy.allowed(g1, g2) {
                return Ok(());
            }
        }

        let contacts = engine.collide(o1, o2, self.max_contacts);
        if contacts.is_empty() {
            return Ok(());
        }
        for data in [d1, d2] {
            if let GeomData::Entity(id) = data {
                self.env.touch(id)?;
            }
        }
        for geom in contacts {
            engine.create_contact(&Contact {
                geom,
                surface: SurfaceParams::LOCOMOTION,
            });
        }
        Ok(())
    }

    fn handle_ray(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        ray: GeomId,
        other: GeomId,
    ) -> Result<(), InvariantError> {
        let other_class = engine.geom_class(other);
        if other_class == GeomClass::Ray {
            return Ok(());
        }
        let mount = engine.geom_body(ray);
        if mount.is_some() && mount == engine.geom_body(other) {
            return Ok(());
        }
        let GeomData::Entity(id) = geom_data(engine, ray)? else {
            return Err(InvariantError::MissingGeomData(ray.0));
        };
        if let Some(hit) = engine.collide(ray, other, 1).first() {
            let color = if other_class.is_terrain() {
                Color::BLACK
            } else {
                Color::RED
            };
            self.env.observe_ray(id, hit.depth, color)?;
        }
        Ok(())
    }

    fn group(&self, data: GeomData) -> Result<&str, InvariantError> {
        match data {
            GeomData::Entity(id) => {
                let entity = self.env.entity(id)?;
                entity
                    .as_body()
                    .map(|body| body.group.as_str())
                    .ok_or(InvariantError::UnexpectedEntity {
                        id,
                        expected: "rigid body",
                        found: entity.kind.name(),
                    })
            }
            _ => Ok(COLLIDE),
        }
    }
}

fn geom_data(engine: &dyn PhysicsEngine, geom: GeomId) -> Result<GeomData, InvariantError> {
    match engine.geom_data(geom) {
        GeomData::Unset => Err(InvariantError::MissingGeomData(geom.0)),
        data => Ok(data),
    }
}

impl NearCallback for CollisionDispatcher<'_> {
    fn near(&mut self, engine: &mut dyn PhysicsEngine, o1: GeomId, o2: GeomId) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.dispatch(engine, o1, o2) {
            log::error!("Collision between geoms {} and {} failed: {err}", o1.0, o2.0);
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evosim_core::math::{Quaternion, Vec3};
    use evosim_core::physics::{BodyDesc, BodyId, GeomDesc, GeomShape, SpaceId};
    use evosim_infra::RapierEngine;
    use std::io::Cursor;

    use crate::protocol::ProtocolReader;

    fn boxed(engine: &mut RapierEngine, z: f32) -> (BodyId, GeomId) {
        let top = engine.top_space();
        boxed_in(engine, top, z)
    }

    fn boxed_in(engine: &mut RapierEngine, space: SpaceId, z: f32) -> (BodyId, GeomId) {
        let body = engine.create_body(&BodyDesc {
            position: Vec3::new(0.0, 0.0, z),
            rotation: Quaternion::IDENTITY,
        });
        let geom = engine.create_geom(
            space,
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

    #[test]
    fn test_missing_geom_data_is_latched() {
        let mut engine = RapierEngine::new();
        let (_, first) = boxed(&mut engine, 0.5);
        boxed(&mut engine, 1.4);
        let mut env = Environment::new();
        let policy = CollisionPolicy::new();
        let mut dispatcher = CollisionDispatcher::new(&mut env, &policy, 4);
        let top = engine.top_space();
        engine.space_collide(top, &mut dispatcher);
        assert_eq!(
            dispatcher.finish(),
            Err(InvariantError::MissingGeomData(first.0))
        );
        assert_eq!(engine.total_contact_joints(), 0);
    }

    #[test]
    fn test_collide_always_bypasses_the_policy() {
        let mut engine = RapierEngine::new();
        let (b1, g1) = boxed(&mut engine, 0.5);
        let (b2, g2) = boxed(&mut engine, 1.45);
        engine.set_geom_data(g1, GeomData::CollideAlways);
        engine.set_geom_data(g2, GeomData::CollideAlways);
        let mut env = Environment::new();
        let policy = CollisionPolicy::new();
        let mut dispatcher = CollisionDispatcher::new(&mut env, &policy, 4);
        let top = engine.top_space();
        engine.space_collide(top, &mut dispatcher);
        assert_eq!(dispatcher.finish(), Ok(()));
        assert!(engine.contact_joints_between(Some(b1), Some(b2)) > 0);
    }

    /// Two bodies in groups `a` and `b`, known to the environment as entities 0 and 1.
    fn grouped_pair(a: &str, b: &str) -> Environment {
        let records = format!(
            "Entity RigidBody 0 0 0.5 1 0 0 0 Add 0 CollisionGroup {a} \
             Entity RigidBody 0 0 1.45 1 0 0 0 Add 1 CollisionGroup {b}"
        );
        let mut reader = ProtocolReader::new(Cursor::new(records.into_bytes()));
        let mut env = Environment::new();
        while let Ok(Some(tag)) = reader.next_token() {
            match tag.as_str() {
                "Entity" => {
                    env.read_entity(&mut reader).expect("entity record");
                }
                _ => env.read_attachment(&mut reader).expect("add record"),
            }
        }
        env
    }

    fn touched(env: &Environment, id: usize) -> Option<bool> {
        env.entity(id).ok().and_then(|e| e.as_body()).map(|b| b.touched)
    }

    struct NestedScene {
        engine: RapierEngine,
        lower: BodyId,
        upper: BodyId,
    }

    /// A ground plane in the top space and a stack of two boxes in a sub-space.
    fn nested_scene() -> NestedScene {
        let mut engine = RapierEngine::new();
        let top = engine.top_space();
        let plane = engine.create_geom(
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
        );
        engine.set_geom_data(plane, GeomData::CollideAlways);
        let inner = engine.create_space(top);
        let (lower, g0) = boxed_in(&mut engine, inner, 0.5);
        let (upper, g1) = boxed_in(&mut engine, inner, 1.45);
        engine.set_geom_data(g0, GeomData::Entity(0));
        engine.set_geom_data(g1, GeomData::Entity(1));
        NestedScene {
            engine,
            lower,
            upper,
        }
    }

    #[test]
    fn test_nested_space_pairs_respect_the_policy() {
        let NestedScene {
            mut engine,
            lower,
            upper,
        } = nested_scene();
        let mut env = grouped_pair("Legs", "Torso");
        let policy = CollisionPolicy::new();
        let mut dispatcher = CollisionDispatcher::new(&mut env, &policy, 4);
        let top = engine.top_space();
        engine.space_collide(top, &mut dispatcher);
        assert_eq!(dispatcher.finish(), Ok(()));

        assert!(engine.contact_joints_between(Some(lower), None) > 0);
        assert_eq!(engine.contact_joints_between(Some(upper), None), 0);
        assert_eq!(engine.contact_joints_between(Some(lower), Some(upper)), 0);
        assert_eq!(touched(&env, 0), Some(true));
        assert_eq!(touched(&env, 1), Some(false));
    }

    #[test]
    fn test_nested_space_pairs_collide_when_allowed() {
        let NestedScene {
            mut engine,
            lower,
            upper,
        } = nested_scene();
        let mut env = grouped_pair("Legs", "Torso");
        let mut policy = CollisionPolicy::new();
        policy.allow("Torso", "Legs");
        let mut dispatcher = CollisionDispatcher::new(&mut env, &policy, 4);
        let top = engine.top_space();
        engine.space_collide(top, &mut dispatcher);
        assert_eq!(dispatcher.finish(), Ok(()));

        assert!(engine.contact_joints_between(Some(lower), None) > 0);
        assert!(engine.contact_joints_between(Some(lower), Some(upper)) > 0);
        assert_eq!(touched(&env, 1), Some(true));
    }
}
