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

//! Implementation of the [`Reader`] type to read on-the-wire DNS
//! messages.

use super::error::{Error, Result};
use super::fields::{FieldMut, FieldsMut, WireRecord};
use crate::name::{self, Name};

////////////////////////////////////////////////////////////////////////
// READER                                                             //
////////////////////////////////////////////////////////////////////////

/// A cursor over a buffer containing a DNS message.
///
/// Reads start at the beginning of the buffer and proceed sequentially.
/// Since names may contain compression pointers to any earlier part of
/// the message, the whole message is kept available to
/// [`Reader::read_name`], not just the unread remainder.
///
/// Every read is bounds-checked; running off the end of the buffer
/// fails with [`Error::TruncatedMessage`]. Reads are atomic, in that
/// the cursor is not changed on failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reader<'a> {
    octets: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Creates a `Reader` positioned at the start of `octets`.
    pub fn new(octets: &'a [u8]) -> Self {
        Self { octets, cursor: 0 }
    }

    /// Returns the current position of the cursor.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns whether the cursor has reached the end of the message.
    pub fn at_eom(&self) -> bool {
        self.cursor >= self.octets.len()
    }

    /// Reads `len` octets, returning them as a slice of the message.
    pub fn read_octets(&mut self, len: usize) -> Result<&'a [u8]> {
        let octets = self
            .octets
            .get(self.cursor..self.cursor + len)
            .ok_or(Error::TruncatedMessage)?;
        self.cursor += len;
        Ok(octets)
    }

    /// Reads a network-byte-order `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut array = [0; 2];
        array.copy_from_slice(self.read_octets(2)?);
        Ok(u16::from_be_bytes(array))
    }

    /// Reads a network-byte-order `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut array = [0; 4];
        array.copy_from_slice(self.read_octets(4)?);
        Ok(u32::from_be_bytes(array))
    }

    /// Reads a possibly compressed name. Name errors are mapped to
    /// message errors as described for [`Error`].
    pub fn read_name(&mut self) -> Result<Name> {
        let (name, resume_at) = name::decode_name(self.octets, self.cursor)?;
        self.cursor = resume_at;
        Ok(name)
    }

    /// Reads each field in order, stopping at the first failure.
    ///
    /// On failure, the cursor is restored, but fields before the one
    /// that failed will already have been filled in.
    pub fn read_fields(&mut self, fields: FieldsMut) -> Result<()> {
        let start = self.cursor;
        for field in fields {
            if let Err(err) = self.read_field(field) {
                self.cursor = start;
                return Err(err);
            }
        }
        Ok(())
    }

    fn read_field(&mut self, field: FieldMut) -> Result<()> {
        match field {
            FieldMut::U16(value) => *value = self.read_u16()?,
            FieldMut::U32(value) => *value = self.read_u32()?,
            FieldMut::Name(name) => *name = self.read_name()?,
        }
        Ok(())
    }

    /// Reads a whole [`WireRecord`] at the cursor.
    pub fn read_record<R: WireRecord + Default>(&mut self) -> Result<R> {
        let mut record = R::default();
        self.read_fields(record.fields_mut())?;
        Ok(record)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Error as NameError;

    #[test]
    fn integers_are_big_endian() {
        let mut reader = Reader::new(b"\x12\x34\x01\x02\x03\x04");
        assert_eq!(reader.read_u16(), Ok(0x1234));
        assert_eq!(reader.read_u32(), Ok(0x01020304));
        assert!(reader.at_eom());
        assert_eq!(reader.read_u16(), Err(Error::TruncatedMessage));
    }

    #[test]
    fn read_fields_is_atomic() {
        let mut reader = Reader::new(b"\x00\x01\x00\x02\x00");
        let (mut a, mut b, mut c) = (0, 0, 0);
        let fields: FieldsMut = [
            FieldMut::U16(&mut a),
            FieldMut::U16(&mut b),
            FieldMut::U32(&mut c),
        ]
        .into_iter()
        .collect();
        assert_eq!(reader.read_fields(fields), Err(Error::TruncatedMessage));
        assert_eq!(reader.cursor(), 0);
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn read_name_resumes_after_pointer() {
        let mut reader = Reader::new(b"\x03com\x00\x07example\xc0\x00\xff");
        assert_eq!(reader.read_name(), Ok("com.".parse().unwrap()));
        assert_eq!(reader.read_name(), Ok("example.com.".parse().unwrap()));
        assert_eq!(reader.cursor(), 15);
    }

    #[test]
    fn read_name_maps_errors() {
        let mut reader = Reader::new(b"\x07exam");
        assert_eq!(reader.read_name(), Err(Error::TruncatedMessage));
        let mut reader = Reader::new(b"\xc0\x00");
        assert_eq!(
            reader.read_name(),
            Err(Error::MalformedName(NameError::PointerLimitExceeded))
        );
        let mut reader = Reader::new(b"\x80");
        assert_eq!(
            reader.read_name(),
            Err(Error::MalformedName(NameError::ReservedLabelType))
        );
        assert_eq!(reader.cursor(), 0);
    }
}
