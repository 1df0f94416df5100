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

//! # Drawing Abstractions
//!
//! The contract between the simulation and an optional windowing toolkit.
//!
//! The toolkit owns the window and the frame loop. Each frame it hands the
//! application a [`DrawSink`] to record primitives into, together with the
//! wall-clock time elapsed since the previous frame. Keyboard commands are
//! forwarded as single characters.

use crate::math::{degrees_to_radians, Quaternion, Vec3};

/// An RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
}

impl Color {
    /// Black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    /// Pure red.
    pub const RED: Self = Self::new(1.0, 0.0, 0.0);
    /// The colour of the pause indicator.
    pub const DARK_RED: Self = Self::new(0.6, 0.1, 0.1);
    /// Light grey.
    pub const GREY: Self = Self::new(0.7, 0.7, 0.7);

    /// Creates a colour from its components.
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Camera placement. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    /// Eye position.
    pub position: Vec3,
    /// Heading, measured from +x towards +y.
    pub heading: f32,
    /// Pitch above the horizon.
    pub pitch: f32,
    /// Roll. Carried but ignored by [`camera_basis`].
    pub roll: f32,
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            heading: 90.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }
}

/// The orthonormal frame of a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBasis {
    /// Viewing direction.
    pub forward: Vec3,
    /// Right-hand direction on screen.
    pub right: Vec3,
    /// Up direction on screen.
    pub up: Vec3,
}

impl CameraBasis {
    /// Converts a camera-space offset into a world position relative to `eye`.
    pub fn to_world(&self, eye: Vec3, forward: f32, right: f32, up: f32) -> Vec3 {
        eye + self.forward * forward + self.right * right + self.up * up
    }
}

/// Computes the camera frame from a heading and pitch in degrees.
///
/// `forward = (cos h cos p, sin h cos p, sin p)`, `right = (sin h, -cos h, 0)`
/// and `up = right × forward`.
pub fn camera_basis(heading_deg: f32, pitch_deg: f32) -> CameraBasis {
    let h = degrees_to_radians(heading_deg);
    let p = degrees_to_radians(pitch_deg);
    let forward = Vec3::new(h.cos() * p.cos(), h.sin() * p.cos(), p.sin());
    let right = Vec3::new(h.sin(), -h.cos(), 0.0);
    let up = right.cross(forward);
    CameraBasis { forward, right, up }
}

/// A recorder of drawing primitives for the current frame.
pub trait DrawSink {
    /// Moves the camera.
    fn set_viewpoint(&mut self, viewpoint: Viewpoint);

    /// Current camera placement.
    fn viewpoint(&self) -> Viewpoint;

    /// Sets the colour of subsequent primitives.
    fn set_color(&mut self, color: Color);

    /// Draws a box with full side lengths `sides`.
    fn draw_box(&mut self, position: Vec3, rotation: Quaternion, sides: Vec3);

    /// Draws a sphere.
    fn draw_sphere(&mut self, position: Vec3, rotation: Quaternion, radius: f32);

    /// Draws a cylinder whose axis is the local z axis.
    fn draw_cylinder(&mut self, position: Vec3, rotation: Quaternion, length: f32, radius: f32);

    /// Draws a capsule whose axis is the local z axis.
    fn draw_capsule(&mut self, position: Vec3, rotation: Quaternion, length: f32, radius: f32);

    /// Draws a line segment.
    fn draw_line(&mut self, from: Vec3, to: Vec3);
}

/// Whether the frame loop should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerFlow {
    /// Keep the window open.
    Continue,
    /// Close the window and return from the frame loop.
    Exit,
}

/// An application driven by a windowing toolkit.
pub trait ViewerApp {
    /// Called once before the first frame.
    fn start(&mut self, sink: &mut dyn DrawSink);

    /// Called once per frame with the wall-clock seconds elapsed since the
    /// previous frame.
    fn step(&mut self, sink: &mut dyn DrawSink, elapsed: f32) -> ViewerFlow;

    /// Handles a key press.
    fn command(&mut self, key: char) -> ViewerFlow;

    /// Called when the window is closed by the user.
    fn stop(&mut self);
}
