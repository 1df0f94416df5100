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

//! A toolkit-independent wireframe recorder.
//!
//! Shapes are tessellated into world-space line segments as they are drawn,
//! and projected onto the screen with a pinhole camera when the frame is
//! painted.

use evosim_core::math::{degrees_to_radians, Quaternion, Vec3, PI};
use evosim_core::render::{camera_basis, Color, DrawSink, Viewpoint};

/// Number of segments used for circles.
const CIRCLE_SEGMENTS: usize = 16;
/// Distance of the near clipping plane in front of the eye.
const NEAR: f32 = 0.01;
/// Vertical field of view, in degrees.
const FIELD_OF_VIEW: f32 = 60.0;
/// Degrees of camera rotation per pixel of mouse drag.
const ORBIT_SPEED: f32 = 0.3;

/// A coloured world-space line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Start point.
    pub from: Vec3,
    /// End point.
    pub to: Vec3,
    /// Line colour.
    pub color: Color,
}

/// A segment projected onto the screen, in pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSegment {
    /// Start point.
    pub from: [f32; 2],
    /// End point.
    pub to: [f32; 2],
    /// Line colour.
    pub color: Color,
}

/// Records the primitives of one frame as line segments.
#[derive(Debug, Clone)]
pub struct WireframeCanvas {
    viewpoint: Viewpoint,
    color: Color,
    segments: Vec<Segment>,
}

impl Default for WireframeCanvas {
    fn default() -> Self {
        Self {
            viewpoint: Viewpoint::default(),
            color: Color::GREY,
            segments: Vec::new(),
        }
    }
}

impl WireframeCanvas {
    /// Creates an empty canvas looking along +y from the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the segments of the previous frame.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// The segments recorded so far.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Turns the camera by a mouse drag of `(dx, dy)` pixels.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.viewpoint.heading -= dx * ORBIT_SPEED;
        self.viewpoint.pitch = (self.viewpoint.pitch - dy * ORBIT_SPEED).clamp(-89.0, 89.0);
    }

    fn push(&mut self, from: Vec3, to: Vec3) {
        self.segments.push(Segment {
            from,
            to,
            color: self.color,
        });
    }

    /// A circle of `radius` in the local xy plane at height `z`.
    fn circle(&mut self, position: Vec3, rotation: Quaternion, radius: f32, z: f32) {
        let center = Vec3::Z * z;
        self.arc(position, rotation, radius, center, 2.0 * PI, Vec3::X, Vec3::Y);
    }

    #[allow(clippy::too_many_arguments)]
    fn arc(
        &mut self,
        position: Vec3,
        rotation: Quaternion,
        radius: f32,
        center: Vec3,
        sweep: f32,
        u: Vec3,
        v: Vec3,
    ) {
        let point = |t: f32| {
            let local = center + u * (radius * t.cos()) + v * (radius * t.sin());
            position + rotation * local
        };
        for i in 0..CIRCLE_SEGMENTS {
            let t0 = sweep * i as f32 / CIRCLE_SEGMENTS as f32;
            let t1 = sweep * (i + 1) as f32 / CIRCLE_SEGMENTS as f32;
            self.push(point(t0), point(t1));
        }
    }

    /// Axis lines between the end circles of a cylinder-like shape.
    fn sides(&mut self, position: Vec3, rotation: Quaternion, radius: f32, half: f32) {
        for dir in [Vec3::X, Vec3::Y, -Vec3::X, -Vec3::Y] {
            let offset = dir * radius;
            self.push(
                position + rotation * (offset - Vec3::Z * half),
                position + rotation * (offset + Vec3::Z * half),
            );
        }
    }

    /// Projects a world point onto a `width` × `height` screen.
    /// Points behind the near plane have no projection.
    pub fn project(&self, point: Vec3, width: f32, height: f32) -> Option<[f32; 2]> {
        let (x, y, depth) = self.camera_space(point);
        if depth < NEAR {
            return None;
        }
        Some(self.to_screen(x, y, depth, width, height))
    }

    fn camera_space(&self, point: Vec3) -> (f32, f32, f32) {
        let basis = camera_basis(self.viewpoint.heading, self.viewpoint.pitch);
        let rel = point - self.viewpoint.position;
        (rel.dot(basis.right), rel.dot(basis.up), rel.dot(basis.forward))
    }

    fn to_screen(&self, x: f32, y: f32, depth: f32, width: f32, height: f32) -> [f32; 2] {
        let focal = 0.5 * height / (0.5 * degrees_to_radians(FIELD_OF_VIEW)).tan();
        [
            0.5 * width + focal * x / depth,
            0.5 * height - focal * y / depth,
        ]
    }

    /// Projects every recorded segment, clipping against the near plane.
    pub fn project_all(&self, width: f32, height: f32) -> Vec<ScreenSegment> {
        self.segments
            .iter()
            .filter_map(|segment| {
                let mut a = self.camera_space(segment.from);
                let mut b = self.camera_space(segment.to);
                if a.2 < NEAR && b.2 < NEAR {
                    return None;
                }
                if a.2 < NEAR || b.2 < NEAR {
                    let t = (NEAR - a.2) / (b.2 - a.2);
                    let clipped = (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t, NEAR);
                    if a.2 < NEAR {
                        a = clipped;
                    } else {
                        b = clipped;
                    }
                }
                Some(ScreenSegment {
                    from: self.to_screen(a.0, a.1, a.2, width, height),
                    to: self.to_screen(b.0, b.1, b.2, width, height),
                    color: segment.color,
                })
            })
            .collect()
    }
}

impl DrawSink for WireframeCanvas {
    fn set_viewpoint(&mut self, viewpoint: Viewpoint) {
        self.viewpoint = viewpoint;
    }

    fn viewpoint(&self) -> Viewpoint {
        self.viewpoint
    }

    fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    fn draw_box(&mut self, position: Vec3, rotation: Quaternion, sides: Vec3) {
        let half = sides * 0.5;
        let corner = |i: usize| {
            let local = Vec3::new(
                if i & 1 == 0 { -half.x } else { half.x },
                if i & 2 == 0 { -half.y } else { half.y },
                if i & 4 == 0 { -half.z } else { half.z },
            );
            position + rotation * local
        };
        // Edges join corners differing in exactly one bit.
        for i in 0..8 {
            for bit in [1, 2, 4] {
                if i & bit == 0 {
                    self.push(corner(i), corner(i | bit));
                }
            }
        }
    }

    fn draw_sphere(&mut self, position: Vec3, rotation: Quaternion, radius: f32) {
        self.circle(position, rotation, radius, 0.0);
        self.arc(position, rotation, radius, Vec3::ZERO, 2.0 * PI, Vec3::X, Vec3::Z);
        self.arc(position, rotation, radius, Vec3::ZERO, 2.0 * PI, Vec3::Y, Vec3::Z);
    }

    fn draw_cylinder(&mut self, position: Vec3, rotation: Quaternion, length: f32, radius: f32) {
        let half = length * 0.5;
        self.circle(position, rotation, radius, -half);
        self.circle(position, rotation, radius, half);
        self.sides(position, rotation, radius, half);
    }

    fn draw_capsule(&mut self, position: Vec3, rotation: Quaternion, length: f32, radius: f32) {
        let half = length * 0.5;
        self.circle(position, rotation, radius, -half);
        self.circle(position, rotation, radius, half);
        self.sides(position, rotation, radius, half);
        for sign in [1.0, -1.0] {
            for u in [Vec3::X, Vec3::Y] {
                let cap = Vec3::Z * (half * sign);
                self.arc(position, rotation, radius, cap, PI, u, Vec3::Z * sign);
            }
        }
    }

    fn draw_line(&mut self, from: Vec3, to: Vec3) {
        self.push(from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn canvas_at_origin() -> WireframeCanvas {
        let mut canvas = WireframeCanvas::new();
        canvas.set_viewpoint(Viewpoint {
            position: Vec3::ZERO,
            heading: 90.0,
            pitch: 0.0,
            roll: 0.0,
        });
        canvas
    }

    #[test]
    fn test_point_ahead_projects_to_center() {
        let canvas = canvas_at_origin();
        let p = canvas.project(Vec3::new(0.0, 5.0, 0.0), 800.0, 600.0);
        let p = p.unwrap_or_default();
        assert_abs_diff_eq!(p[0], 400.0, epsilon = 1e-3);
        assert_abs_diff_eq!(p[1], 300.0, epsilon = 1e-3);
    }

    #[test]
    fn test_point_behind_is_culled() {
        let canvas = canvas_at_origin();
        assert!(canvas.project(Vec3::new(0.0, -1.0, 0.0), 800.0, 600.0).is_none());
    }

    #[test]
    fn test_up_and_right_map_to_screen_axes() {
        let canvas = canvas_at_origin();
        let up = canvas
            .project(Vec3::new(0.0, 5.0, 1.0), 800.0, 600.0)
            .unwrap_or_default();
        let right = canvas
            .project(Vec3::new(1.0, 5.0, 0.0), 800.0, 600.0)
            .unwrap_or_default();
        assert!(up[1] < 300.0);
        assert!(right[0] > 400.0);
    }

    #[test]
    fn test_box_has_twelve_edges() {
        let mut canvas = canvas_at_origin();
        canvas.draw_box(Vec3::new(0.0, 3.0, 0.0), Quaternion::IDENTITY, Vec3::ONE);
        assert_eq!(canvas.segments().len(), 12);
        canvas.clear();
        assert!(canvas.segments().is_empty());
    }

    #[test]
    fn test_segment_crossing_near_plane_is_clipped() {
        let mut canvas = canvas_at_origin();
        canvas.set_color(Color::RED);
        canvas.draw_line(Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let projected = canvas.project_all(800.0, 600.0);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].color, Color::RED);
    }

    #[test]
    fn test_orbit_clamps_pitch() {
        let mut canvas = canvas_at_origin();
        canvas.orbit(0.0, -1000.0);
        assert_abs_diff_eq!(canvas.viewpoint().pitch, 89.0);
    }
}
