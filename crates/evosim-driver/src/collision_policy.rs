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

//! Which collision groups generate contacts with which.

use std::collections::HashSet;

/// The group name that collides with every group.
pub const COLLIDE: &str = "Collide";

/// A symmetric relation over collision-group names.
///
/// Pairs never mentioned do not collide, unless one side is [`COLLIDE`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollisionPolicy {
    pairs: HashSet<(String, String)>,
}

impl CollisionPolicy {
    /// Creates an empty policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits contacts between two groups, in both orders.
    pub fn allow(&mut self, g1: &str, g2: &str) {
        self.pairs.insert((g1.to_owned(), g2.to_owned()));
        self.pairs.insert((g2.to_owned(), g1.to_owned()));
    }

    /// Returns true if bodies in the two groups generate contacts.
    pub fn allowed(&self, g1: &str, g2: &str) -> bool {
        g1 == COLLIDE || g2 == COLLIDE || self.pairs.contains(&(g1.to_owned(), g2.to_owned()))
    }

    /// Number of admitted ordered pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if no pair was admitted.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
