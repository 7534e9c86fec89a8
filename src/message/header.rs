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

//! Implementation of the [`Header`] and [`Counts`] types.

use super::constants::*;
use super::fields::{Field, FieldMut, Fields, FieldsMut, WireRecord};
use super::{Opcode, Rcode};

////////////////////////////////////////////////////////////////////////
// HEADER                                                             //
////////////////////////////////////////////////////////////////////////

/// The header of a DNS message, minus the section counts.
///
/// See [RFC 1035 § 4.1.1]. The counts are not stored here, since a
/// [`Message`](super::Message) derives them from its sections when it
/// is written. The reserved Z bit (and the AD and CD bits of later
/// RFCs) are not represented: they are ignored when reading and always
/// written as zero.
///
/// [RFC 1035 § 4.1.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub opcode: Opcode,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub rcode: Rcode,
}

impl Header {
    /// Builds a `Header` from the message ID and the 16-bit flags word
    /// that follows it.
    pub fn from_wire(id: u16, bits: u16) -> Self {
        Self {
            id,
            qr: bits & QR_MASK != 0,
            opcode: Opcode::from_low_bits(((bits & OPCODE_MASK) >> OPCODE_SHIFT) as u8),
            aa: bits & AA_MASK != 0,
            tc: bits & TC_MASK != 0,
            rd: bits & RD_MASK != 0,
            ra: bits & RA_MASK != 0,
            rcode: Rcode::from_low_bits((bits & RCODE_MASK) as u8),
        }
    }

    /// Packs the flags into the 16-bit word that follows the ID.
    pub fn bits(&self) -> u16 {
        let mut bits =
            (u16::from(u8::from(self.opcode)) << OPCODE_SHIFT) | u16::from(u8::from(self.rcode));
        for (set, mask) in [
            (self.qr, QR_MASK),
            (self.aa, AA_MASK),
            (self.tc, TC_MASK),
            (self.rd, RD_MASK),
            (self.ra, RA_MASK),
        ] {
            if set {
                bits |= mask;
            }
        }
        bits
    }
}

////////////////////////////////////////////////////////////////////////
// SECTION COUNTS                                                     //
////////////////////////////////////////////////////////////////////////

/// The four section counts of a DNS message header.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Counts {
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

/// The header exactly as it appears on the wire.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(super) struct RawHeader {
    pub id: u16,
    pub bits: u16,
    pub counts: Counts,
}

impl WireRecord for RawHeader {
    fn fields(&self) -> Fields<'_> {
        [
            Field::U16(self.id),
            Field::U16(self.bits),
            Field::U16(self.counts.qdcount),
            Field::U16(self.counts.ancount),
            Field::U16(self.counts.nscount),
            Field::U16(self.counts.arcount),
        ]
        .into()
    }

    fn fields_mut(&mut self) -> FieldsMut<'_> {
        [
            FieldMut::U16(&mut self.id),
            FieldMut::U16(&mut self.bits),
            FieldMut::U16(&mut self.counts.qdcount),
            FieldMut::U16(&mut self.counts.ancount),
            FieldMut::U16(&mut self.counts.nscount),
            FieldMut::U16(&mut self.counts.arcount),
        ]
        .into()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
