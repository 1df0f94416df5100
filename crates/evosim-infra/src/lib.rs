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

//! # Evosim Infra
//!
//! Concrete implementations of the collaborators defined in `evosim-core`:
//! a rapier3d rigid-body engine and an eframe/egui viewer window.

#![warn(missing_docs)]

#[cfg(feature = "physics")]
pub mod physics;
pub mod platform;

#[cfg(feature = "physics")]
pub use physics::rapier::RapierEngine;
#[cfg(feature = "render")]
pub use platform::viewer::EguiViewer;
