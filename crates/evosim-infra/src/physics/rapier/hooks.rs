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

//! The per-step contact group and the solver hooks that enforce it.
//!
//! Rapier generates contact manifolds for every overlapping collider pair on
//! its own. The hooks veto every pair the broad-phase callback did not turn
//! into a contact constraint, so the solver only sees admitted pairs.

use std::collections::HashMap;

use evosim_core::physics::{GeomId, SurfaceParams};
use rapier3d::prelude::*;

/// Friction coefficient standing in for an unbounded one.
pub const MAX_FRICTION: Real = 1.0e3;

/// A collider pair admitted to the current step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    /// Number of solver contact points kept for the pair.
    pub points: usize,
    /// Coulomb friction applied to those points.
    pub friction: Real,
}

fn pair_key(a: GeomId, b: GeomId) -> (GeomId, GeomId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The contact-joint group of one step.
#[derive(Debug, Default)]
pub struct ContactGroup {
    admitted: HashMap<(GeomId, GeomId), Admission>,
    requested: HashMap<(GeomId, GeomId), usize>,
}

impl ContactGroup {
    /// Remembers how many points the narrow phase was allowed for a pair.
    pub fn request(&mut self, a: GeomId, b: GeomId, max_points: usize) {
        let entry = self.requested.entry(pair_key(a, b)).or_insert(0);
        *entry = (*entry).max(max_points);
    }

    /// Admits a pair with the given surface.
    pub fn admit(&mut self, a: GeomId, b: GeomId, surface: &SurfaceParams) {
        let key = pair_key(a, b);
        let points = self.requested.get(&key).copied().unwrap_or(1).max(1);
        let friction = if surface.mu.is_finite() {
            surface.mu.clamp(0.0, MAX_FRICTION)
        } else {
            MAX_FRICTION
        };
        self.admitted
            .entry(key)
            .and_modify(|admission| admission.friction = friction)
            .or_insert(Admission { points, friction });
    }

    /// Looks up a pair in either order.
    pub fn get(&self, a: GeomId, b: GeomId) -> Option<&Admission> {
        self.admitted.get(&pair_key(a, b))
    }

    /// Number of admitted pairs.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    /// Discards every admission.
    pub fn clear(&mut self) {
        self.admitted.clear();
        self.requested.clear();
    }
}

/// Reads the geom a collider was created for from its user data.
fn collider_geom(colliders: &ColliderSet, handle: ColliderHandle) -> Option<GeomId> {
    colliders.get(handle).map(|c| GeomId(c.user_data as u32))
}

/// Solver hooks restricting contacts to the admitted pairs.
pub struct ContactGroupHooks<'a> {
    pub group: &'a ContactGroup,
}

impl ContactGroupHooks<'_> {
    fn admission(
        &self,
        colliders: &ColliderSet,
        c1: ColliderHandle,
        c2: ColliderHandle,
    ) -> Option<&Admission> {
        let g1 = collider_geom(colliders, c1)?;
        let g2 = collider_geom(colliders, c2)?;
        self.group.get(g1, g2)
    }
}

impl PhysicsHooks for ContactGroupHooks<'_> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        self.admission(context.colliders, context.collider1, context.collider2)
            .map(|_| SolverFlags::COMPUTE_IMPULSES)
    }

    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let Some(admission) =
            self.admission(context.colliders, context.collider1, context.collider2)
        else {
            context.solver_contacts.clear();
            return;
        };
        context.solver_contacts.truncate(admission.points);
        for contact in context.solver_contacts.iter_mut() {
            contact.friction = admission.friction;
            contact.restitution = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_is_symmetric() {
        let mut group = ContactGroup::default();
        group.request(GeomId(4), GeomId(1), 10);
        group.admit(GeomId(1), GeomId(4), &SurfaceParams::LOCOMOTION);
        let admission = group.get(GeomId(4), GeomId(1)).copied();
        assert_eq!(
            admission,
            Some(Admission {
                points: 10,
                friction: MAX_FRICTION
            })
        );
        assert!(group.get(GeomId(1), GeomId(2)).is_none());
    }

    #[test]
    fn test_clear_empties_group() {
        let mut group = ContactGroup::default();
        group.admit(GeomId(0), GeomId(1), &SurfaceParams::LOCOMOTION);
        assert_eq!(group.len(), 1);
        group.clear();
        assert_eq!(group.len(), 0);
        assert!(group.get(GeomId(0), GeomId(1)).is_none());
    }

    #[test]
    fn test_unrequested_pair_keeps_one_point() {
        let mut group = ContactGroup::default();
        let surface = SurfaceParams {
            mu: 0.8,
            ..SurfaceParams::LOCOMOTION
        };
        group.admit(GeomId(2), GeomId(3), &surface);
        let admission = group.get(GeomId(2), GeomId(3)).copied();
        assert_eq!(
            admission,
            Some(Admission {
                points: 1,
                friction: 0.8
            })
        );
    }
}
