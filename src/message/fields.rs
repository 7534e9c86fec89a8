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

//! The fixed-width field sequences that make up the header, questions
//! and resource record headers.
//!
//! Every such structure is described once as an ordered list of
//! [`Field`]s (for writing) and [`FieldMut`]s (for reading) through
//! the [`WireRecord`] trait. [`Reader::read_fields`] and
//! [`Writer::write_fields`] then walk the list in order, so bounds
//! checking and byte order live in exactly one place each.
//!
//! [`Reader::read_fields`]: super::Reader::read_fields
//! [`Writer::write_fields`]: super::Writer::write_fields

use arrayvec::ArrayVec;

use crate::name::Name;

/// The most fields any structure has (the header, with six).
pub const MAX_FIELDS: usize = 6;

/// A field value to be written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Field<'a> {
    U16(u16),
    U32(u32),
    Name(&'a Name),
}

impl Field<'_> {
    /// Returns the uncompressed on-the-wire length of the field.
    pub fn wire_len(&self) -> usize {
        match self {
            Self::U16(_) => 2,
            Self::U32(_) => 4,
            Self::Name(name) => name.wire_len(),
        }
    }
}

/// A field location to be filled in by reading.
#[derive(Debug)]
pub enum FieldMut<'a> {
    U16(&'a mut u16),
    U32(&'a mut u32),
    Name(&'a mut Name),
}

/// An ordered list of [`Field`]s.
pub type Fields<'a> = ArrayVec<Field<'a>, MAX_FIELDS>;

/// An ordered list of [`FieldMut`]s.
pub type FieldsMut<'a> = ArrayVec<FieldMut<'a>, MAX_FIELDS>;

/// A structure whose on-the-wire form is a fixed sequence of fields.
///
/// The two methods must list the same fields in the same order.
pub trait WireRecord {
    /// Returns the fields to write, in wire order.
    fn fields(&self) -> Fields<'_>;

    /// Returns the locations to read into, in wire order.
    fn fields_mut(&mut self) -> FieldsMut<'_>;

    /// Returns the uncompressed on-the-wire length of the fields.
    fn fields_wire_len(&self) -> usize {
        self.fields().iter().map(Field::wire_len).sum()
    }
}
