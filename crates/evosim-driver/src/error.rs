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

//! Error types of the driver.
//!
//! Every error is fatal to the evaluation: a corrupted run is re-run by the
//! controller, never salvaged.

use thiserror::Error;

/// Malformed ingest.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A top-level record tag nobody understands.
    #[error("unknown record tag '{0}'")]
    UnknownTag(String),

    /// The stream ended in the middle of a record.
    #[error("unexpected end of input while reading {expected}")]
    UnexpectedEof {
        /// What the reader was waiting for.
        expected: &'static str,
    },

    /// A token that does not parse as the expected type.
    #[error("expected {expected}, found '{token}'")]
    InvalidValue {
        /// The expected type of token.
        expected: &'static str,
        /// The offending token.
        token: String,
    },

    /// A direction or axis of zero length.
    #[error("{expected} must have non-zero length")]
    ZeroLength {
        /// The vector being read.
        expected: &'static str,
    },

    /// An `Entity` record with an unknown kind.
    #[error("unknown entity kind '{0}'")]
    UnknownEntityKind(String),

    /// An `Add` record with an unknown attachment kind.
    #[error("unknown attachment kind '{0}'")]
    UnknownAttachment(String),

    /// An attachment that does not fit the kind of its target entity.
    #[error("cannot add {kind} to {target} entity {id}")]
    MismatchedAttachment {
        /// The attachment kind.
        kind: String,
        /// The kind of the target entity.
        target: &'static str,
        /// The target entity ID.
        id: usize,
    },

    /// Reading from the controller failed.
    #[error("failed to read from the controller: {0}")]
    Io(#[from] std::io::Error),
}

/// A broken structural invariant of the scene.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantError {
    /// A colliding geom without an owning entity.
    #[error("geom {0} has no entity attached")]
    MissingGeomData(u32),

    /// An entity ID that was never assigned.
    #[error("entity {id} does not exist ({count} entities)")]
    EntityOutOfRange {
        /// The requested ID.
        id: usize,
        /// Number of entities in the scene.
        count: usize,
    },

    /// An entity of the wrong kind where a specific kind was required.
    #[error("entity {id} is a {found}, expected a {expected}")]
    UnexpectedEntity {
        /// The entity ID.
        id: usize,
        /// The kind that was required.
        expected: &'static str,
        /// The kind that was found.
        found: &'static str,
    },

    /// A reference to a body that does not exist yet.
    #[error("entity {from} references absent body {body}")]
    AbsentBody {
        /// The referencing entity.
        from: usize,
        /// The referenced entity ID.
        body: i64,
    },

    /// A reference that does not point back at an earlier entity of the right kind.
    #[error("entity {from} references entity {to}, which is not a valid {expected}")]
    MismatchedReference {
        /// The referencing entity.
        from: usize,
        /// The referenced entity ID.
        to: i64,
        /// The kind that was required.
        expected: &'static str,
    },

    /// A rigid body without any collision shape.
    #[error("rigid body {0} has no geoms")]
    EmptyBody(usize),

    /// The scene was instantiated twice.
    #[error("the scene has already been created")]
    AlreadyCreated,

    /// A neuron or synapse pointing outside its network or at a missing source.
    #[error("network {network}: {reason}")]
    InvalidNeuronReference {
        /// The network entity ID.
        network: usize,
        /// What is wrong with the reference.
        reason: String,
    },
}

/// Any failure of an evaluation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed ingest.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Broken scene invariant.
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantError),

    /// Writing results to the controller failed.
    #[error("failed to write results: {0}")]
    Io(#[from] std::io::Error),

    /// A step was requested after the evaluation ended.
    #[error("the simulation has already terminated")]
    AlreadyTerminated,
}

/// Result alias for driver operations.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = SimError::from(ProtocolError::UnknownTag("Foo".into()));
        assert_eq!(err.to_string(), "protocol error: unknown record tag 'Foo'");

        let err = SimError::from(InvariantError::EntityOutOfRange { id: 7, count: 3 });
        assert_eq!(
            err.to_string(),
            "invariant violation: entity 7 does not exist (3 entities)"
        );
    }
}
