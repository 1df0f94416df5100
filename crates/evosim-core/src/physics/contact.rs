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

//! Narrow-phase output and the surface description of contact constraints.

use super::GeomId;
use crate::math::Vec3;

/// A single contact point produced by the narrow phase for a geom pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactGeom {
    /// World-space contact position.
    pub position: Vec3,
    /// Contact normal, pointing from `g1` towards `g2`.
    pub normal: Vec3,
    /// Penetration depth. For ray geoms, the distance from the ray origin to the hit.
    pub depth: f32,
    /// The first geom of the pair.
    pub g1: GeomId,
    /// The second geom of the pair.
    pub g2: GeomId,
}

/// Flags selecting which surface parameters a contact constraint honours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceMode {
    bits: u32,
}

impl SurfaceMode {
    /// No optional surface behaviour.
    pub const NONE: Self = Self { bits: 0 };
    /// Force-dependent slip along the first friction direction.
    pub const SLIP1: Self = Self { bits: 1 << 0 };
    /// Force-dependent slip along the second friction direction.
    pub const SLIP2: Self = Self { bits: 1 << 1 };
    /// Friction pyramid approximation for the first friction direction.
    pub const APPROX1: Self = Self { bits: 1 << 2 };

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks if these flags contain all of `other`.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }
}

impl std::ops::BitOr for SurfaceMode {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// Surface parameters applied to a contact constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceParams {
    /// Enabled surface behaviours.
    pub mode: SurfaceMode,
    /// Coulomb friction coefficient. `f32::INFINITY` means friction never saturates.
    pub mu: f32,
    /// Slip coefficient along the first friction direction.
    pub slip1: f32,
    /// Slip coefficient along the second friction direction.
    pub slip2: f32,
}

impl SurfaceParams {
    /// The surface every locomotion contact uses: unbounded friction softened by
    /// a small slip in both tangent directions.
    pub const LOCOMOTION: Self = Self {
        mode: SurfaceMode {
            bits: SurfaceMode::SLIP1.bits | SurfaceMode::SLIP2.bits | SurfaceMode::APPROX1.bits,
        },
        mu: f32::INFINITY,
        slip1: 0.01,
        slip2: 0.01,
    };
}

/// A contact point together with the surface used to constrain it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Geometry of the contact.
    pub geom: ContactGeom,
    /// Surface parameters of the constraint.
    pub surface: SurfaceParams,
}
