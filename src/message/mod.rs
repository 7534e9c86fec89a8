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

//! Implementation of reading and writing of DNS messages.
//!
//! A [`Message`] is decoded from a buffer with [`Message::from_wire`]
//! and encoded with [`Message::to_wire`] (or
//! [`Message::to_wire_with`] to compress names). The fixed-width parts
//! of the header, questions and resource records are described as
//! field lists (see [`WireRecord`]) and walked by a [`Reader`] or
//! [`Writer`].

mod constants;
mod error;
mod fields;
mod header;
mod opcode;
mod question;
mod rcode;
mod reader;
mod record;
mod writer;
pub use constants::HEADER_SIZE;
pub use error::{Error, Result};
pub use fields::{Field, FieldMut, Fields, FieldsMut, WireRecord, MAX_FIELDS};
pub use header::{Counts, Header};
pub use opcode::{IntoOpcodeError, Opcode};
pub use question::Question;
pub use rcode::{IntoRcodeError, Rcode};
pub use reader::Reader;
pub use record::ResourceRecord;
pub use writer::Writer;

use crate::name::{Compressor, Uncompressed};
use header::RawHeader;

////////////////////////////////////////////////////////////////////////
// MESSAGES                                                           //
////////////////////////////////////////////////////////////////////////

/// A DNS message.
///
/// The section counts of the header are not stored; they are the
/// lengths of the section vectors (see [`Message::counts`]).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Message {
    /// Decodes a message.
    ///
    /// Exactly as many questions and records are read as the header
    /// declares, and any octets after them are ignored. The first
    /// failure aborts decoding.
    pub fn from_wire(octets: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(octets);
        let raw: RawHeader = reader.read_record()?;
        let counts = raw.counts;
        Ok(Self {
            header: Header::from_wire(raw.id, raw.bits),
            questions: read_section(&mut reader, counts.qdcount, Reader::read_record)?,
            answers: read_section(&mut reader, counts.ancount, ResourceRecord::read)?,
            authorities: read_section(&mut reader, counts.nscount, ResourceRecord::read)?,
            additionals: read_section(&mut reader, counts.arcount, ResourceRecord::read)?,
        })
    }

    /// Encodes the message without name compression.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        self.to_wire_with(&mut Uncompressed)
    }

    /// Encodes the message, writing every name through `compressor`.
    /// The compressor must be fresh.
    pub fn to_wire_with(&self, compressor: &mut dyn Compressor) -> Result<Vec<u8>> {
        let raw = RawHeader {
            id: self.header.id,
            bits: self.header.bits(),
            counts: self.counts()?,
        };
        let mut writer = Writer::new(self.wire_len(), compressor);
        writer.write_fields(raw.fields())?;
        for question in &self.questions {
            writer.write_fields(question.fields())?;
        }
        for record in self.records() {
            record.write(&mut writer)?;
        }
        Ok(writer.finish())
    }

    /// Returns the section counts, or [`Error::InvalidField`] if a
    /// section has more than 65535 entries.
    pub fn counts(&self) -> Result<Counts> {
        Ok(Counts {
            qdcount: section_count(self.questions.len(), "QDCOUNT")?,
            ancount: section_count(self.answers.len(), "ANCOUNT")?,
            nscount: section_count(self.authorities.len(), "NSCOUNT")?,
            arcount: section_count(self.additionals.len(), "ARCOUNT")?,
        })
    }

    /// Returns the length of the message's uncompressed on-the-wire
    /// representation.
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE
            + self
                .questions
                .iter()
                .map(WireRecord::fields_wire_len)
                .sum::<usize>()
            + self.records().map(ResourceRecord::wire_len).sum::<usize>()
    }

    /// Starts a response to `query`: the ID, opcode and RD bit are
    /// copied, QR is set, and the question section is copied. Every
    /// other section is empty.
    pub fn response_to(query: &Message) -> Self {
        Self {
            header: Header {
                id: query.header.id,
                qr: true,
                opcode: query.header.opcode,
                rd: query.header.rd,
                ..Header::default()
            },
            questions: query.questions.clone(),
            ..Self::default()
        }
    }

    /// Returns an iterator over the answer, authority and additional
    /// records, in that order.
    fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
    }
}

/// Reads `count` consecutive entries of a section.
fn read_section<'a, T>(
    reader: &mut Reader<'a>,
    count: u16,
    mut read: impl FnMut(&mut Reader<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    // The count comes off the wire, so it is not used to preallocate.
    let mut section = Vec::new();
    for _ in 0..count {
        section.push(read(reader)?);
    }
    Ok(section)
}

fn section_count(len: usize, field: &'static str) -> Result<u16> {
    len.try_into().or(Err(Error::InvalidField(field)))
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
