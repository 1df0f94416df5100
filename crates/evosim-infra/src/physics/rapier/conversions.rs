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

use evosim_core::math::{Aabb, Quaternion, Vec3};
use rapier3d::na::{Point3, Quaternion as NaQuaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::parry::bounding_volume::Aabb as ParryAabb;
use rapier3d::prelude::{Isometry, Real};

pub fn to_rapier_vec(v: Vec3) -> Vector3<Real> {
    Vector3::new(v.x, v.y, v.z)
}

pub fn to_rapier_quat(q: Quaternion) -> UnitQuaternion<Real> {
    UnitQuaternion::from_quaternion(NaQuaternion::new(q.w, q.x, q.y, q.z))
}

pub fn to_rapier_iso(position: Vec3, rotation: Quaternion) -> Isometry<Real> {
    Isometry::from_parts(
        Translation3::from(to_rapier_vec(position)),
        to_rapier_quat(rotation),
    )
}

pub fn from_rapier_vec(v: Vector3<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub fn from_rapier_point(p: Point3<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

pub fn from_rapier_quat(q: UnitQuaternion<Real>) -> Quaternion {
    Quaternion::new(q.i, q.j, q.k, q.w)
}

pub fn from_parry_aabb(aabb: &ParryAabb) -> Aabb {
    Aabb::from_min_max(from_rapier_point(aabb.mins), from_rapier_point(aabb.maxs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use evosim_core::math::FRAC_PI_2;

    #[test]
    fn test_quaternion_component_order() {
        let q = Quaternion::from_axis_angle(Vec3::Z, FRAC_PI_2);
        let back = from_rapier_quat(to_rapier_quat(q));
        assert_abs_diff_eq!(back.w, q.w, epsilon = 1e-6);
        assert_abs_diff_eq!(back.z, q.z, epsilon = 1e-6);

        let rotated = to_rapier_quat(q) * Vector3::x();
        assert_abs_diff_eq!(rotated.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_isometry_applies_rotation_then_translation() {
        let iso = to_rapier_iso(
            Vec3::new(0.0, 0.0, 1.0),
            Quaternion::from_axis_angle(Vec3::Z, FRAC_PI_2),
        );
        let p = from_rapier_point(iso * Point3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.z, 1.0, epsilon = 1e-6);
    }
}
