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

//! Rigid bodies and their collision shapes.

use std::io::BufRead;

use evosim_core::math::{Quaternion, Vec3};
use evosim_core::physics::{
    BodyDesc, BodyId, GeomData, GeomDesc, GeomId, GeomShape, PhysicsEngine, SpaceId,
};
use evosim_core::render::{Color, DrawSink};

use crate::collision_policy::COLLIDE;
use crate::error::{InvariantError, ProtocolError};
use crate::protocol::ProtocolReader;

/// The shape of one geom, as described on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeSpec {
    /// Box with full side lengths.
    Box {
        /// Side lengths along the body axes.
        sides: Vec3,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Cylinder along the body z axis.
    Cylinder {
        /// Radius.
        radius: f32,
        /// Length.
        length: f32,
    },
    /// Capsule along the body z axis.
    Capsule {
        /// Cap radius.
        radius: f32,
        /// Length of the straight section.
        length: f32,
    },
}

impl ShapeSpec {
    fn to_engine(self) -> GeomShape {
        match self {
            ShapeSpec::Box { sides } => GeomShape::Box {
                half_extents: sides * 0.5,
            },
            ShapeSpec::Sphere { radius } => GeomShape::Sphere { radius },
            ShapeSpec::Cylinder { radius, length } => GeomShape::Cylinder { radius, length },
            ShapeSpec::Capsule { radius, length } => GeomShape::Capsule { radius, length },
        }
    }
}

/// One collision shape of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeomSpec {
    /// Shape.
    pub shape: ShapeSpec,
    /// Offset from the body origin, in body coordinates.
    pub offset: Vec3,
    /// Mass contributed to the body.
    pub mass: f32,
    /// Drawing colour.
    pub color: Color,
}

impl GeomSpec {
    /// Reads the payload of a shape attachment named by `tag`.
    /// Returns `None` if `tag` is not a shape.
    pub fn read<R: BufRead>(
        tag: &str,
        reader: &mut ProtocolReader<R>,
    ) -> Result<Option<Self>, ProtocolError> {
        if !matches!(tag, "Box" | "Sphere" | "Cylinder" | "Capsule") {
            return Ok(None);
        }
        let offset = reader.read_vec3("geom offset")?;
        let shape = match tag {
            "Box" => ShapeSpec::Box {
                sides: reader.read_vec3("box sides")?,
            },
            "Sphere" => ShapeSpec::Sphere {
                radius: reader.read_float("sphere radius")?,
            },
            "Cylinder" => ShapeSpec::Cylinder {
                radius: reader.read_float("cylinder radius")?,
                length: reader.read_float("cylinder length")?,
            },
            _ => ShapeSpec::Capsule {
                radius: reader.read_float("capsule radius")?,
                length: reader.read_float("capsule length")?,
            },
        };
        let mass = reader.read_float("geom mass")?;
        let rgb = reader.read_vec3("geom colour")?;
        Ok(Some(Self {
            shape,
            offset,
            mass,
            color: Color::new(rgb.x, rgb.y, rgb.z),
        }))
    }
}

/// A rigid body entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    /// Initial position.
    pub position: Vec3,
    /// Initial orientation.
    pub rotation: Quaternion,
    /// Collision shapes, in attachment order.
    pub geoms: Vec<GeomSpec>,
    /// Collision group name.
    pub group: String,
    /// Whether the body received a contact during the current step.
    pub touched: bool,
    body: Option<BodyId>,
    geom_ids: Vec<GeomId>,
}

impl RigidBody {
    /// Creates a body with no geoms in the [`COLLIDE`] group.
    pub fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self {
            position,
            rotation,
            geoms: Vec::new(),
            group: COLLIDE.to_owned(),
            touched: false,
            body: None,
            geom_ids: Vec::new(),
        }
    }

    /// Reads the `Entity RigidBody` payload.
    pub fn read<R: BufRead>(reader: &mut ProtocolReader<R>) -> Result<Self, ProtocolError> {
        let position = reader.read_vec3("body position")?;
        let rotation = reader.read_quaternion("body orientation")?;
        Ok(Self::new(position, rotation))
    }

    /// The engine body, once created.
    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    /// The engine geoms, once created.
    pub fn geom_ids(&self) -> &[GeomId] {
        &self.geom_ids
    }

    /// Instantiates the body and its geoms, tagging every geom with `id`.
    pub fn create(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        space: SpaceId,
        id: usize,
    ) -> Result<(), InvariantError> {
        if self.geoms.is_empty() {
            return Err(InvariantError::EmptyBody(id));
        }
        let body = engine.create_body(&BodyDesc {
            position: self.position,
            rotation: self.rotation,
        });
        for geom in &self.geoms {
            let geom_id = engine.create_geom(
                space,
                &GeomDesc {
                    shape: geom.shape.to_engine(),
                    body: Some(body),
                    offset: geom.offset,
                    mass: geom.mass,
                },
            );
            engine.set_geom_data(geom_id, GeomData::Entity(id));
            self.geom_ids.push(geom_id);
        }
        self.body = Some(body);
        Ok(())
    }

    /// Draws every geom at its current pose.
    pub fn draw(&self, engine: &dyn PhysicsEngine, sink: &mut dyn DrawSink) {
        for (spec, geom) in self.geoms.iter().zip(&self.geom_ids) {
            let pose = engine.geom_pose(*geom);
            sink.set_color(spec.color);
            match spec.shape {
                ShapeSpec::Box { sides } => sink.draw_box(pose.position, pose.rotation, sides),
                ShapeSpec::Sphere { radius } => {
                    sink.draw_sphere(pose.position, pose.rotation, radius)
                }
                ShapeSpec::Cylinder { radius, length } => {
                    sink.draw_cylinder(pose.position, pose.rotation, length, radius)
                }
                ShapeSpec::Capsule { radius, length } => {
                    sink.draw_capsule(pose.position, pose.rotation, length, radius)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_box_attachment() {
        let mut reader = ProtocolReader::new(Cursor::new(b"0 0 0.5 1 2 3 4.5 1 0 0".to_vec()));
        let spec = GeomSpec::read("Box", &mut reader).ok().flatten();
        assert_eq!(
            spec,
            Some(GeomSpec {
                shape: ShapeSpec::Box {
                    sides: Vec3::new(1.0, 2.0, 3.0)
                },
                offset: Vec3::new(0.0, 0.0, 0.5),
                mass: 4.5,
                color: Color::RED,
            })
        );
    }

    #[test]
    fn test_non_shape_tag_reads_nothing() {
        let mut reader = ProtocolReader::new(Cursor::new(b"7".to_vec()));
        assert!(matches!(GeomSpec::read("PositionSensor", &mut reader), Ok(None)));
        assert_eq!(reader.read_int("left over").ok(), Some(7));
    }

    #[test]
    fn test_new_body_collides_with_everything() {
        let body = RigidBody::new(Vec3::ZERO, Quaternion::IDENTITY);
        assert_eq!(body.group, COLLIDE);
        assert!(body.body().is_none());
    }
}
