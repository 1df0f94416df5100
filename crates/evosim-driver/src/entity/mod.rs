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

//! # Entities
//!
//! The polymorphic units of a scene. Each entity is one of a small set of
//! kinds and carries the sensors attached to it. Entities are addressed by
//! their dense integer ID; geoms store that ID by value.

mod actuator;
mod body;
mod joint;
mod network;
mod ray;
mod sensor;

pub use actuator::Actuator;
pub use body::{GeomSpec, RigidBody, ShapeSpec};
pub use joint::Joint;
pub use network::{Network, Neuron, Synapse};
pub use ray::{RayObservation, RayProbe};
pub use sensor::{Sensor, SensorKind};

use std::io::{self, BufRead, Write};

use evosim_core::physics::{JointKind, PhysicsEngine};

use crate::error::ProtocolError;
use crate::protocol::ProtocolReader;

/// The kind-specific part of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// A rigid body with collision shapes.
    RigidBody(RigidBody),
    /// A distance probe.
    Ray(RayProbe),
    /// A hinge or slider.
    Joint(Joint),
    /// A servo on a joint.
    Actuator(Actuator),
    /// An internal controller.
    Network(Network),
}

impl EntityKind {
    /// Human-readable kind name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::RigidBody(_) => "rigid body",
            EntityKind::Ray(_) => "ray",
            EntityKind::Joint(joint) => match joint.kind {
                JointKind::Hinge => "hinge joint",
                JointKind::Slider => "slider joint",
            },
            EntityKind::Actuator(actuator) => match actuator.kind {
                JointKind::Hinge => "rotary actuator",
                JointKind::Slider => "linear actuator",
            },
            EntityKind::Network(_) => "neural network",
        }
    }
}

/// Something an `Add` record attaches to an existing entity.
///
/// The payload is parsed completely before the target is checked, so a
/// rejected record never leaves tokens behind.
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    /// A collision shape.
    Geom(GeomSpec),
    /// The collision group of a body.
    CollisionGroup(String),
    /// A sensor.
    Sensor(SensorKind),
    /// A network neuron.
    Neuron(Neuron),
    /// A network synapse.
    Synapse(Synapse),
}

impl Attachment {
    /// Reads the payload of an attachment named by `tag`.
    pub fn read<R: BufRead>(
        tag: &str,
        reader: &mut ProtocolReader<R>,
    ) -> Result<Self, ProtocolError> {
        if let Some(geom) = GeomSpec::read(tag, reader)? {
            return Ok(Attachment::Geom(geom));
        }
        if let Some(kind) = SensorKind::from_tag(tag) {
            return Ok(Attachment::Sensor(kind));
        }
        if let Some(neuron) = Neuron::read(tag, reader)? {
            return Ok(Attachment::Neuron(neuron));
        }
        match tag {
            "CollisionGroup" => Ok(Attachment::CollisionGroup(
                reader.read_string("collision group name")?,
            )),
            "Synapse" => Ok(Attachment::Synapse(Synapse::read(reader)?)),
            _ => Err(ProtocolError::UnknownAttachment(tag.to_owned())),
        }
    }

    fn fits(&self, target: &EntityKind) -> bool {
        match (self, target) {
            (Attachment::Geom(_) | Attachment::CollisionGroup(_), EntityKind::RigidBody(_)) => true,
            (Attachment::Neuron(_) | Attachment::Synapse(_), EntityKind::Network(_)) => true,
            (Attachment::Sensor(kind), target) => matches!(
                (kind, target),
                (
                    SensorKind::Position
                        | SensorKind::Velocity
                        | SensorKind::Orientation
                        | SensorKind::Touch,
                    EntityKind::RigidBody(_)
                ) | (SensorKind::Ray, EntityKind::Ray(_))
                    | (SensorKind::Proprioceptive, EntityKind::Joint(_))
            ),
            _ => false,
        }
    }
}

/// A scene entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Dense ID, assigned in ingest order.
    pub id: usize,
    /// Kind-specific state.
    pub kind: EntityKind,
    /// Attached sensors, in attachment order.
    pub sensors: Vec<Sensor>,
}

impl Entity {
    /// Creates an entity without sensors.
    pub fn new(id: usize, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            sensors: Vec::new(),
        }
    }

    /// Reads the payload of an `Entity` record of kind `tag`.
    pub fn read<R: BufRead>(
        id: usize,
        tag: &str,
        reader: &mut ProtocolReader<R>,
    ) -> Result<Self, ProtocolError> {
        let kind = match tag {
            "RigidBody" => EntityKind::RigidBody(RigidBody::read(reader)?),
            "Ray" => EntityKind::Ray(RayProbe::read(reader)?),
            "HingeJoint" => EntityKind::Joint(Joint::read(JointKind::Hinge, reader)?),
            "SliderJoint" => EntityKind::Joint(Joint::read(JointKind::Slider, reader)?),
            "RotaryActuator" => EntityKind::Actuator(Actuator::read(JointKind::Hinge, reader)?),
            "LinearActuator" => EntityKind::Actuator(Actuator::read(JointKind::Slider, reader)?),
            "NeuralNetwork" => EntityKind::Network(Network::new()),
            _ => return Err(ProtocolError::UnknownEntityKind(tag.to_owned())),
        };
        Ok(Self::new(id, kind))
    }

    /// Applies an attachment read from an `Add` record named `tag`.
    pub fn attach(&mut self, tag: &str, attachment: Attachment) -> Result<(), ProtocolError> {
        if !attachment.fits(&self.kind) {
            return Err(ProtocolError::MismatchedAttachment {
                kind: tag.to_owned(),
                target: self.kind.name(),
                id: self.id,
            });
        }
        match (attachment, &mut self.kind) {
            (Attachment::Geom(geom), EntityKind::RigidBody(body)) => body.geoms.push(geom),
            (Attachment::CollisionGroup(group), EntityKind::RigidBody(body)) => body.group = group,
            (Attachment::Neuron(neuron), EntityKind::Network(network)) => {
                network.add_neuron(neuron)
            }
            (Attachment::Synapse(synapse), EntityKind::Network(network)) => {
                network.add_synapse(synapse)
            }
            (Attachment::Sensor(kind), _) => self.sensors.push(Sensor::new(kind)),
            _ => {}
        }
        Ok(())
    }

    /// Records one sample in every sensor.
    pub fn sample(&mut self, engine: &dyn PhysicsEngine) {
        if self.sensors.is_empty() {
            return;
        }
        match &self.kind {
            EntityKind::RigidBody(body) => {
                let Some(handle) = body.body() else {
                    return;
                };
                let state = engine.body_state(handle);
                let touch = if body.touched { 1.0 } else { 0.0 };
                for sensor in &mut self.sensors {
                    match sensor.kind() {
                        SensorKind::Position => sensor.record(&state.position.to_array()),
                        SensorKind::Velocity => sensor.record(&state.linear_velocity.to_array()),
                        SensorKind::Orientation => sensor.record(&state.rotation.to_wxyz()),
                        SensorKind::Touch => sensor.record(&[touch]),
                        _ => {}
                    }
                }
            }
            EntityKind::Ray(ray) => {
                let reading = ray.reading();
                for sensor in &mut self.sensors {
                    sensor.record(&reading);
                }
            }
            EntityKind::Joint(joint) => {
                let position = joint.position(engine);
                for sensor in &mut self.sensors {
                    sensor.record(&[position]);
                }
            }
            EntityKind::Actuator(_) | EntityKind::Network(_) => {}
        }
    }

    /// Most recent value of a sensor channel.
    pub fn sensor_value(&self, sensor: usize, channel: usize) -> Option<f32> {
        self.sensors.get(sensor)?.latest(channel)
    }

    /// Writes every sensor's time series.
    pub fn write_sensors<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (index, sensor) in self.sensors.iter().enumerate() {
            sensor.write_to(out, self.id, index)?;
        }
        Ok(())
    }

    /// The rigid body, if this entity is one.
    pub fn as_body(&self) -> Option<&RigidBody> {
        match &self.kind {
            EntityKind::RigidBody(body) => Some(body),
            _ => None,
        }
    }

    /// The rigid body, mutably, if this entity is one.
    pub fn as_body_mut(&mut self) -> Option<&mut RigidBody> {
        match &mut self.kind {
            EntityKind::RigidBody(body) => Some(body),
            _ => None,
        }
    }

    /// The ray, mutably, if this entity is one.
    pub fn as_ray_mut(&mut self) -> Option<&mut RayProbe> {
        match &mut self.kind {
            EntityKind::Ray(ray) => Some(ray),
            _ => None,
        }
    }

    /// The joint, if this entity is one.
    pub fn as_joint(&self) -> Option<&Joint> {
        match &self.kind {
            EntityKind::Joint(joint) => Some(joint),
            _ => None,
        }
    }
}
