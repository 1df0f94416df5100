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

//! Distance probes.

use std::io::BufRead;

use evosim_core::math::Vec3;
use evosim_core::physics::{
    BodyId, GeomData, GeomDesc, GeomId, GeomShape, PhysicsEngine, SpaceId,
};
use evosim_core::render::{Color, DrawSink};

use crate::error::ProtocolError;
use crate::protocol::ProtocolReader;

/// What a ray saw during the current step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayObservation {
    /// Distance to the nearest hit, or the ray length when nothing was hit.
    pub distance: f32,
    /// Colour of the nearest hit, black when nothing was hit.
    pub color: Color,
}

/// A ray entity, optionally mounted on a rigid body.
#[derive(Debug, Clone, PartialEq)]
pub struct RayProbe {
    /// Entity ID of the body carrying the ray, or `None` for a world ray.
    pub mount: Option<i64>,
    /// World-space origin at ingest.
    pub origin: Vec3,
    /// World-space direction at ingest.
    pub direction: Vec3,
    /// Maximum sensing distance.
    pub max_length: f32,
    /// The observation of the current step.
    pub observation: RayObservation,
    geom: Option<GeomId>,
    local_direction: Vec3,
}

impl RayProbe {
    /// Creates a ray seeing nothing.
    pub fn new(mount: Option<i64>, origin: Vec3, direction: Vec3, max_length: f32) -> Self {
        Self {
            mount,
            origin,
            direction: direction.normalize(),
            max_length,
            observation: RayObservation {
                distance: max_length,
                color: Color::BLACK,
            },
            geom: None,
            local_direction: direction.normalize(),
        }
    }

    /// Reads the `Entity Ray` payload.
    pub fn read<R: BufRead>(reader: &mut ProtocolReader<R>) -> Result<Self, ProtocolError> {
        let mount = reader.read_body_ref("ray body")?;
        let origin = reader.read_vec3("ray origin")?;
        let direction = reader.read_direction("ray direction")?;
        let max_length = reader.read_float("ray length")?;
        Ok(Self::new(mount, origin, direction, max_length))
    }

    /// The engine geom, once created.
    pub fn geom(&self) -> Option<GeomId> {
        self.geom
    }

    /// Instantiates the ray geom. `mount` is the engine body of the carrying
    /// entity; the ingest pose is converted into that body's frame.
    pub fn create(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        space: SpaceId,
        id: usize,
        mount: Option<BodyId>,
    ) {
        let (offset, direction) = match mount {
            Some(body) => {
                let state = engine.body_state(body);
                let inverse = state.rotation.conjugate();
                (
                    inverse * (self.origin - state.position),
                    inverse * self.direction,
                )
            }
            None => (self.origin, self.direction),
        };
        let geom = engine.create_geom(
            space,
            &GeomDesc {
                shape: GeomShape::Ray {
                    direction,
                    length: self.max_length,
                },
                body: mount,
                offset,
                mass: 0.0,
            },
        );
        engine.set_geom_data(geom, GeomData::Entity(id));
        self.geom = Some(geom);
        self.local_direction = direction;
    }

    /// Forgets the previous step's hit.
    pub fn reset(&mut self) {
        self.observation = RayObservation {
            distance: self.max_length,
            color: Color::BLACK,
        };
    }

    /// Records a hit, keeping the nearest one of the step.
    pub fn observe(&mut self, distance: f32, color: Color) {
        if distance <= self.observation.distance {
            self.observation = RayObservation { distance, color };
        }
    }

    /// The sensor values `distance r g b`.
    pub fn reading(&self) -> [f32; 4] {
        let RayObservation { distance, color } = self.observation;
        [distance, color.r, color.g, color.b]
    }

    /// Draws the ray up to its current hit.
    pub fn draw(&self, engine: &dyn PhysicsEngine, sink: &mut dyn DrawSink) {
        let Some(geom) = self.geom else {
            return;
        };
        let pose = engine.geom_pose(geom);
        let direction = pose.rotation * self.local_direction;
        sink.set_color(self.observation.color);
        sink.draw_line(
            pose.position,
            pose.position + direction * self.observation.distance,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_nearest_hit_wins() {
        let mut ray = RayProbe::new(None, Vec3::ZERO, -Vec3::Z, 2.0);
        assert_eq!(ray.reading(), [2.0, 0.0, 0.0, 0.0]);
        ray.observe(1.5, Color::RED);
        ray.observe(1.8, Color::BLACK);
        assert_eq!(ray.reading(), [1.5, 1.0, 0.0, 0.0]);
        ray.reset();
        assert_eq!(ray.reading(), [2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_read_world_ray() {
        let mut reader = ProtocolReader::new(Cursor::new(b"-1 0 0 1 0 0 -2 2".to_vec()));
        let ray = RayProbe::read(&mut reader).ok();
        let ray = ray.map(|r| (r.mount, r.origin, r.direction, r.max_length));
        assert_eq!(
            ray,
            Some((None, Vec3::new(0.0, 0.0, 1.0), -Vec3::Z, 2.0))
        );
    }
}
