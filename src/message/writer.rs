// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`Writer`] type to write on-the-wire DNS
//! messages.

use std::fmt;

use super::error::Result;
use super::fields::{Field, Fields};
use crate::name::{Compressor, Name};

////////////////////////////////////////////////////////////////////////
// WRITER                                                             //
////////////////////////////////////////////////////////////////////////

/// Serializes a DNS message into a growable buffer.
///
/// Data is appended sequentially, so the header must be written first,
/// followed by the sections in order. Every name goes through the
/// [`Compressor`] the `Writer` was created with; that compressor must
/// not have been used for any other message.
///
/// If a write fails, the message being written should be abandoned.
pub struct Writer<'c> {
    octets: Vec<u8>,
    compressor: &'c mut dyn Compressor,
}

impl<'c> Writer<'c> {
    /// Creates a new `Writer` whose buffer can hold `capacity` octets
    /// before it must grow.
    pub fn new(capacity: usize, compressor: &'c mut dyn Compressor) -> Self {
        Self {
            octets: Vec::with_capacity(capacity),
            compressor,
        }
    }

    /// Returns the number of octets written so far.
    pub fn len(&self) -> usize {
        self.octets.len()
    }

    /// Returns whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    /// Appends `octets` verbatim.
    pub fn write_octets(&mut self, octets: &[u8]) {
        self.octets.extend_from_slice(octets);
    }

    /// Appends a network-byte-order `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.write_octets(&value.to_be_bytes());
    }

    /// Appends a network-byte-order `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.write_octets(&value.to_be_bytes());
    }

    /// Appends a name through the compressor.
    pub fn write_name(&mut self, name: &Name) -> Result<()> {
        self.compressor.write_name(name, &mut self.octets)?;
        Ok(())
    }

    /// Writes each field in order, stopping at the first failure.
    pub fn write_fields(&mut self, fields: Fields) -> Result<()> {
        for field in fields {
            match field {
                Field::U16(value) => self.write_u16(value),
                Field::U32(value) => self.write_u32(value),
                Field::Name(name) => self.write_name(name)?,
            }
        }
        Ok(())
    }

    /// Consumes the `Writer`, returning the serialized message.
    pub fn finish(self) -> Vec<u8> {
        self.octets
    }
}

impl fmt::Debug for Writer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Writer")
            .field("len", &self.octets.len())
            .finish_non_exhaustive()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
