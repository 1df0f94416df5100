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

//! Blocking tokenizer over the controller's ingest stream.
//!
//! The stream is a sequence of whitespace-separated tokens; line breaks carry
//! no meaning. Records are a leading tag followed by tag-specific tokens.

use std::collections::VecDeque;
use std::io::BufRead;
use std::str::FromStr;

use evosim_core::math::{Quaternion, Vec3, EPSILON};

use crate::error::ProtocolError;

/// Reads typed tokens from a buffered source.
pub struct ProtocolReader<R> {
    source: R,
    pending: VecDeque<String>,
    line: String,
}

impl<R: BufRead> ProtocolReader<R> {
    /// Wraps a buffered source.
    pub fn new(source: R) -> Self {
        Self {
            source,
            pending: VecDeque::new(),
            line: String::new(),
        }
    }

    /// Returns the next token, or `None` at the end of the stream.
    pub fn next_token(&mut self) -> Result<Option<String>, ProtocolError> {
        while self.pending.is_empty() {
            self.line.clear();
            if self.source.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.pending
                .extend(self.line.split_whitespace().map(str::to_owned));
        }
        Ok(self.pending.pop_front())
    }

    /// Reads a token that must be present.
    pub fn read_string(&mut self, expected: &'static str) -> Result<String, ProtocolError> {
        self.next_token()?
            .ok_or(ProtocolError::UnexpectedEof { expected })
    }

    fn read_parsed<T: FromStr>(&mut self, expected: &'static str) -> Result<T, ProtocolError> {
        let token = self.read_string(expected)?;
        token
            .parse()
            .map_err(|_| ProtocolError::InvalidValue { expected, token })
    }

    /// Reads a floating-point token.
    pub fn read_float(&mut self, expected: &'static str) -> Result<f32, ProtocolError> {
        self.read_parsed(expected)
    }

    /// Reads a floating-point token at full precision.
    pub fn read_double(&mut self, expected: &'static str) -> Result<f64, ProtocolError> {
        self.read_parsed(expected)
    }

    /// Reads a signed integer token.
    pub fn read_int(&mut self, expected: &'static str) -> Result<i64, ProtocolError> {
        self.read_parsed(expected)
    }

    /// Reads a non-negative integer token.
    pub fn read_index(&mut self, expected: &'static str) -> Result<usize, ProtocolError> {
        self.read_parsed(expected)
    }

    /// Reads three floats.
    pub fn read_vec3(&mut self, expected: &'static str) -> Result<Vec3, ProtocolError> {
        Ok(Vec3::new(
            self.read_float(expected)?,
            self.read_float(expected)?,
            self.read_float(expected)?,
        ))
    }

    /// Reads three floats that must not form a zero vector.
    pub fn read_direction(&mut self, expected: &'static str) -> Result<Vec3, ProtocolError> {
        let v = self.read_vec3(expected)?;
        if v.length() > EPSILON {
            Ok(v)
        } else {
            Err(ProtocolError::ZeroLength { expected })
        }
    }

    /// Reads a quaternion given scalar-first.
    pub fn read_quaternion(&mut self, expected: &'static str) -> Result<Quaternion, ProtocolError> {
        let w = self.read_float(expected)?;
        let x = self.read_float(expected)?;
        let y = self.read_float(expected)?;
        let z = self.read_float(expected)?;
        Ok(Quaternion::from_wxyz(w, x, y, z))
    }

    /// Reads a body reference, where `-1` means the static world.
    pub fn read_body_ref(&mut self, expected: &'static str) -> Result<Option<i64>, ProtocolError> {
        let id = self.read_int(expected)?;
        Ok((id >= 0).then_some(id))
    }
}
