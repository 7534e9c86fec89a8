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

//! Implementation of the [`ResourceRecord`] type and its codec.

use super::error::{Error, Result};
use super::fields::{Field, FieldMut, Fields, FieldsMut, WireRecord};
use super::{Reader, Writer};
use crate::class::Class;
use crate::name::Name;
use crate::rr::Type;

/// A resource record as it appears in a message section.
///
/// The RDATA is kept as opaque octets; nothing here interprets it, and
/// in particular any names inside it are left exactly as received. The
/// RDLENGTH field is not stored: it is always the length of `rdata`.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ResourceRecord {
    pub name: Name,
    pub rr_type: Type,
    pub class: Class,
    pub ttl: u32,
    pub rdata: Box<[u8]>,
}

impl ResourceRecord {
    /// Returns the RDLENGTH of the record, or [`Error::InvalidField`]
    /// if the RDATA is too long to describe.
    pub fn rdlength(&self) -> Result<u16> {
        self.rdata
            .len()
            .try_into()
            .or(Err(Error::InvalidField("RDLENGTH")))
    }

    /// Returns the uncompressed on-the-wire length of the record.
    pub fn wire_len(&self) -> usize {
        self.fields_wire_len() + 2 + self.rdata.len()
    }

    /// Reads a record at the reader's cursor.
    pub(super) fn read(reader: &mut Reader) -> Result<Self> {
        let mut record = Self::default();
        let mut rdlength = 0;
        let mut fields = record.fields_mut();
        fields.push(FieldMut::U16(&mut rdlength));
        reader.read_fields(fields)?;
        record.rdata = reader.read_octets(rdlength as usize)?.into();
        Ok(record)
    }

    /// Writes the record, recomputing RDLENGTH from the RDATA.
    pub(super) fn write(&self, writer: &mut Writer) -> Result<()> {
        let mut fields = self.fields();
        fields.push(Field::U16(self.rdlength()?));
        writer.write_fields(fields)?;
        writer.write_octets(&self.rdata);
        Ok(())
    }
}

// RDLENGTH is appended by the codec above, since it is not stored.
impl WireRecord for ResourceRecord {
    fn fields(&self) -> Fields<'_> {
        let mut fields = Fields::new();
        fields.push(Field::Name(&self.name));
        fields.push(Field::U16(self.rr_type.into()));
        fields.push(Field::U16(self.class.into()));
        fields.push(Field::U32(self.ttl));
        fields
    }

    fn fields_mut(&mut self) -> FieldsMut<'_> {
        let mut fields = FieldsMut::new();
        fields.push(FieldMut::Name(&mut self.name));
        fields.push(FieldMut::U16(self.rr_type.raw_mut()));
        fields.push(FieldMut::U16(self.class.raw_mut()));
        fields.push(FieldMut::U32(&mut self.ttl));
        fields
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Uncompressed;

    fn example_record() -> ResourceRecord {
        ResourceRecord {
            name: "example.com.".parse().unwrap(),
            rr_type: Type::A,
            class: Class::IN,
            ttl: 0xdead_beef,
            rdata: Box::new([192, 0, 2, 1]),
        }
    }

    const EXAMPLE_RECORD_WIRE: &[u8] =
        b"\x07example\x03com\x00\x00\x01\x00\x01\xde\xad\xbe\xef\x00\x04\xc0\x00\x02\x01";

    #[test]
    fn write_recomputes_rdlength() {
        let record = example_record();
        let mut compressor = Uncompressed;
        let mut writer = Writer::new(record.wire_len(), &mut compressor);
        record.write(&mut writer).unwrap();
        assert_eq!(writer.finish(), EXAMPLE_RECORD_WIRE);
        assert_eq!(record.wire_len(), EXAMPLE_RECORD_WIRE.len());
    }

    #[test]
    fn read_works() {
        let mut reader = Reader::new(EXAMPLE_RECORD_WIRE);
        assert_eq!(ResourceRecord::read(&mut reader), Ok(example_record()));
        assert!(reader.at_eom());
    }

    #[test]
    fn read_rejects_rdlength_past_end() {
        let mut octets = EXAMPLE_RECORD_WIRE.to_vec();
        octets.pop();
        let mut reader = Reader::new(&octets);
        assert_eq!(
            ResourceRecord::read(&mut reader),
            Err(Error::TruncatedMessage)
        );
    }

    #[test]
    fn oversized_rdata_is_rejected() {
        let record = ResourceRecord {
            rdata: vec![0; 65536].into(),
            ..example_record()
        };
        assert_eq!(record.rdlength(), Err(Error::InvalidField("RDLENGTH")));
        let mut compressor = Uncompressed;
        let mut writer = Writer::new(0, &mut compressor);
        assert_eq!(
            record.write(&mut writer),
            Err(Error::InvalidField("RDLENGTH"))
        );

        let record = ResourceRecord {
            rdata: vec![0; 65535].into(),
            ..example_record()
        };
        assert_eq!(record.rdlength(), Ok(65535));
    }
}
