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

//! # Environment
//!
//! The registry of entities. Entities live in a `Vec` indexed by their ID
//! and are never removed, so the ID stored in a geom's user data stays valid
//! for the whole evaluation.

use std::io::{self, BufRead, Write};

use evosim_core::math::{Quaternion, Vec3};
use evosim_core::physics::{
    BodyId, GeomData, GeomDesc, GeomId, GeomShape, JointKind, PhysicsEngine,
};
use evosim_core::render::{Color, DrawSink};

use crate::entity::{Attachment, Entity, EntityKind, Neuron};
use crate::error::{InvariantError, ProtocolError, SimError};
use crate::parameters::Parameters;
use crate::protocol::ProtocolReader;

/// The entities of a scene, in ingest order.
#[derive(Debug, Default)]
pub struct Environment {
    entities: Vec<Entity>,
    ground: Option<GeomId>,
    created: bool,
}

impl Environment {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true when no entity was ingested.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities, indexed by ID.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Looks an entity up by ID.
    pub fn entity(&self, id: usize) -> Result<&Entity, InvariantError> {
        self.entities.get(id).ok_or(InvariantError::EntityOutOfRange {
            id,
            count: self.entities.len(),
        })
    }

    /// Looks an entity up by ID, mutably.
    pub fn entity_mut(&mut self, id: usize) -> Result<&mut Entity, InvariantError> {
        let count = self.entities.len();
        self.entities
            .get_mut(id)
            .ok_or(InvariantError::EntityOutOfRange { id, count })
    }

    /// The ground plane geom, once created.
    pub fn ground(&self) -> Option<GeomId> {
        self.ground
    }

    /// Returns true once [`Environment::create_all`] succeeded.
    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Reads the rest of an `Entity` record and registers the entity under
    /// the next free ID, which is returned.
    pub fn read_entity<R: BufRead>(
        &mut self,
        reader: &mut ProtocolReader<R>,
    ) -> Result<usize, ProtocolError> {
        let tag = reader.read_string("entity kind")?;
        let id = self.entities.len();
        let entity = Entity::read(id, &tag, reader)?;
        log::debug!("Entity {id}: {}", entity.kind.name());
        self.entities.push(entity);
        Ok(id)
    }

    /// Reads the rest of an `Add` record and applies it to its target.
    pub fn read_attachment<R: BufRead>(
        &mut self,
        reader: &mut ProtocolReader<R>,
    ) -> Result<(), SimError> {
        let id = reader.read_index("entity ID")?;
        let tag = reader.read_string("attachment kind")?;
        let attachment = Attachment::read(&tag, reader)?;
        self.entity_mut(id)?.attach(&tag, attachment)?;
        log::debug!("Added {tag} to entity {id}");
        Ok(())
    }

    /// Instantiates the whole scene in `engine`, in ingest order.
    ///
    /// References between entities must point back at earlier entities of
    /// the right kind.
    pub fn create_all(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        params: &Parameters,
    ) -> Result<(), InvariantError> {
        if self.created {
            return Err(InvariantError::AlreadyCreated);
        }
        engine.set_gravity(params.gravity());
        let space = engine.top_space();

        if params.ground_plane() {
            let ground = engine.create_geom(
                space,
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
            engine.set_geom_data(ground, GeomData::CollideAlways);
            self.ground = Some(ground);
        }

        for id in 0..self.entities.len() {
            let (earlier, rest) = self.entities.split_at_mut(id);
            let entity = &mut rest[0];
            match &mut entity.kind {
                EntityKind::RigidBody(body) => body.create(engine, space, id)?,
                EntityKind::Ray(ray) => {
                    let mount = resolve_body(earlier, id, ray.mount)?;
                    ray.create(engine, space, id, mount);
                }
                EntityKind::Joint(joint) => {
                    let body1 = resolve_body(earlier, id, joint.body1)?;
                    let body2 = resolve_body(earlier, id, joint.body2)?;
                    joint.create(engine, body1, body2);
                }
                EntityKind::Actuator(actuator) => {
                    resolve_joint(earlier, id, actuator.joint, actuator.kind)?;
                }
                EntityKind::Network(_) => {}
            }
        }

        for entity in &self.entities {
            if let EntityKind::Network(network) = &entity.kind {
                network.validate(entity.id)?;
                for neuron in &network.neurons {
                    self.validate_neuron(entity.id, neuron)?;
                }
            }
        }

        self.created = true;
        log::info!("Completed creation of {} entities", self.entities.len());
        Ok(())
    }

    fn validate_neuron(&self, network: usize, neuron: &Neuron) -> Result<(), InvariantError> {
        let reason = match *neuron {
            Neuron::Sensor {
                entity,
                sensor,
                channel,
            } => match self.entities.get(entity).and_then(|e| e.sensors.get(sensor)) {
                None => format!("entity {entity} has no sensor {sensor}"),
                Some(s) if channel >= s.kind().channels() => {
                    format!("sensor {sensor} of entity {entity} has no channel {channel}")
                }
                Some(_) => return Ok(()),
            },
            Neuron::Motor { actuator, .. } => match self.entities.get(actuator) {
                Some(Entity {
                    kind: EntityKind::Actuator(_),
                    ..
                }) => return Ok(()),
                _ => format!("entity {actuator} is not an actuator"),
            },
            _ => return Ok(()),
        };
        Err(InvariantError::InvalidNeuronReference { network, reason })
    }

    /// Prepares step `step` of length `dt`. Per-step observations are
    /// cleared and networks updated before every actuator applies its effort.
    pub fn take_step(&mut self, engine: &mut dyn PhysicsEngine, step: u64, dt: f32) {
        for entity in &mut self.entities {
            match &mut entity.kind {
                EntityKind::RigidBody(body) => body.touched = false,
                EntityKind::Ray(ray) => ray.reset(),
                _ => {}
            }
        }

        let mut commands = Vec::new();
        for id in 0..self.entities.len() {
            let EntityKind::Network(network) = &self.entities[id].kind else {
                continue;
            };
            let readings: Vec<f32> = network
                .neurons
                .iter()
                .map(|neuron| match *neuron {
                    Neuron::Sensor {
                        entity,
                        sensor,
                        channel,
                    } => self
                        .entities
                        .get(entity)
                        .and_then(|e| e.sensor_value(sensor, channel))
                        .unwrap_or(0.0),
                    _ => 0.0,
                })
                .collect();
            if let EntityKind::Network(network) = &mut self.entities[id].kind {
                commands.extend(network.update(step, &readings));
            }
        }
        for (actuator, command) in commands {
            if let Some(EntityKind::Actuator(actuator)) =
                self.entities.get_mut(actuator).map(|e| &mut e.kind)
            {
                actuator.command = command;
            }
        }

        for entity in &self.entities {
            let EntityKind::Actuator(actuator) = &entity.kind else {
                continue;
            };
            let target = usize::try_from(actuator.joint)
                .ok()
                .and_then(|id| self.entities.get(id))
                .and_then(Entity::as_joint);
            if let Some(joint) = target {
                if let Some(handle) = joint.joint() {
                    actuator.actuate(engine, handle, joint.limits, dt);
                }
            }
        }
    }

    /// Marks a body as touched during the current step.
    pub fn touch(&mut self, id: usize) -> Result<(), InvariantError> {
        if let Some(body) = self.entity_mut(id)?.as_body_mut() {
            body.touched = true;
        }
        Ok(())
    }

    /// Records a ray hit for the current step.
    pub fn observe_ray(
        &mut self,
        id: usize,
        distance: f32,
        color: Color,
    ) -> Result<(), InvariantError> {
        let entity = self.entity_mut(id)?;
        let found = entity.kind.name();
        let ray = entity.as_ray_mut().ok_or(InvariantError::UnexpectedEntity {
            id,
            expected: "ray",
            found,
        })?;
        ray.observe(distance, color);
        Ok(())
    }

    /// Records one sample in every sensor. Called after integration.
    pub fn sample(&mut self, engine: &dyn PhysicsEngine) {
        for entity in &mut self.entities {
            entity.sample(engine);
        }
    }

    /// Draws bodies and rays, plus joints and space bounds when asked.
    pub fn draw(
        &self,
        engine: &dyn PhysicsEngine,
        sink: &mut dyn DrawSink,
        draw_joints: bool,
        draw_spaces: bool,
    ) {
        for entity in &self.entities {
            match &entity.kind {
                EntityKind::RigidBody(body) => body.draw(engine, sink),
                EntityKind::Ray(ray) => ray.draw(engine, sink),
                EntityKind::Joint(joint) if draw_joints => joint.draw(engine, sink),
                _ => {}
            }
        }
        if draw_spaces {
            if let Some(bounds) = engine.space_bounds(engine.top_space()) {
                sink.set_color(Color::GREY);
                sink.draw_box(
                    (bounds.min + bounds.max) * 0.5,
                    Quaternion::IDENTITY,
                    bounds.max - bounds.min,
                );
            }
        }
    }

    /// Streams every sensor's time series, in entity order.
    pub fn write_sensors<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for entity in &self.entities {
            entity.write_sensors(out)?;
        }
        Ok(())
    }
}

fn resolve_body(
    earlier: &[Entity],
    from: usize,
    reference: Option<i64>,
) -> Result<Option<BodyId>, InvariantError> {
    let Some(to) = reference else {
        return Ok(None);
    };
    let entity = usize::try_from(to)
        .ok()
        .and_then(|index| earlier.get(index))
        .ok_or(InvariantError::AbsentBody { from, body: to })?;
    entity
        .as_body()
        .and_then(|body| body.body())
        .map(Some)
        .ok_or(InvariantError::MismatchedReference {
            from,
            to,
            expected: "rigid body",
        })
}

fn resolve_joint(
    earlier: &[Entity],
    from: usize,
    to: i64,
    kind: JointKind,
) -> Result<(), InvariantError> {
    let expected = match kind {
        JointKind::Hinge => "hinge joint",
        JointKind::Slider => "slider joint",
    };
    let fits = usize::try_from(to)
        .ok()
        .and_then(|index| earlier.get(index))
        .and_then(Entity::as_joint)
        .is_some_and(|joint| joint.kind == kind);
    if fits {
        Ok(())
    } else {
        Err(InvariantError::MismatchedReference { from, to, expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ingest(records: &str) -> Environment {
        let mut reader = ProtocolReader::new(Cursor::new(records.as_bytes().to_vec()));
        let mut env = Environment::new();
        while let Ok(Some(tag)) = reader.next_token() {
            match tag.as_str() {
                "Entity" => {
                    env.read_entity(&mut reader).expect("entity record");
                }
                "Add" => env.read_attachment(&mut reader).expect("add record"),
                other => panic!("unexpected tag {other}"),
            }
        }
        env
    }

    #[test]
    fn test_ids_are_dense_in_ingest_order() {
        let env = ingest(
            "Entity RigidBody 0 0 1 1 0 0 0\n\
             Entity RigidBody 0 0 2 1 0 0 0\n\
             Entity HingeJoint 0 1 0 0 1.5 1 0 0 0 0\n",
        );
        assert_eq!(env.len(), 3);
        for (index, entity) in env.entities().iter().enumerate() {
            assert_eq!(entity.id, index);
        }
        assert!(env.entity(2).is_ok_and(|e| e.as_joint().is_some()));
        assert_eq!(
            env.entity(3).err(),
            Some(InvariantError::EntityOutOfRange { id: 3, count: 3 })
        );
    }

    #[test]
    fn test_add_to_missing_entity_is_an_invariant_violation() {
        let mut env = Environment::new();
        let mut reader = ProtocolReader::new(Cursor::new(b"4 PositionSensor".to_vec()));
        assert!(matches!(
            env.read_attachment(&mut reader),
            Err(SimError::Invariant(InvariantError::EntityOutOfRange { id: 4, count: 0 }))
        ));
    }

    #[test]
    fn test_add_of_wrong_kind_is_a_protocol_error() {
        let mut env = ingest("Entity RigidBody 0 0 1 1 0 0 0\n");
        let mut reader = ProtocolReader::new(Cursor::new(b"0 RaySensor".to_vec()));
        assert!(matches!(
            env.read_attachment(&mut reader),
            Err(SimError::Protocol(ProtocolError::MismatchedAttachment { .. }))
        ));
    }

    #[test]
    fn test_actuator_must_point_at_matching_joint() {
        let env = ingest(
            "Entity RigidBody 0 0 1 1 0 0 0\n\
             Entity SliderJoint 0 -1 0 0 1 0 0 1 0 0\n\
             Entity RotaryActuator 1 10 1\n",
        );
        let earlier = &env.entities()[..2];
        assert_eq!(
            resolve_joint(earlier, 2, 1, JointKind::Hinge),
            Err(InvariantError::MismatchedReference {
                from: 2,
                to: 1,
                expected: "hinge joint"
            })
        );
        assert!(resolve_joint(earlier, 2, 1, JointKind::Slider).is_ok());
        assert_eq!(
            resolve_body(earlier, 2, Some(5)),
            Err(InvariantError::AbsentBody { from: 2, body: 5 })
        );
        assert_eq!(resolve_body(earlier, 2, None), Ok(None));
    }
}
