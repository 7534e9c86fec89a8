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

//! Provides the [`Type`] structure for DNS RR types.

use std::fmt;

////////////////////////////////////////////////////////////////////////
// RR TYPES                                                           //
////////////////////////////////////////////////////////////////////////

/// The TYPE of a resource record, or the QTYPE of a question.
///
/// Like [`Class`](crate::class::Class), this wraps the 16-bit wire
/// value, which the codec never interprets. Constants cover the common
/// types and the QTYPE-only values [`IXFR`](Type::IXFR),
/// [`AXFR`](Type::AXFR) and [`ANY`](Type::ANY); everything else is
/// displayed as `TYPEn` ([RFC 3597 § 5]).
///
/// [RFC 3597 § 5]: https://datatracker.ietf.org/doc/html/rfc3597#section-5
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Type(u16);

impl Type {
    pub const A: Type = Type(1);
    pub const NS: Type = Type(2);
    pub const CNAME: Type = Type(5);
    pub const SOA: Type = Type(6);
    pub const NULL: Type = Type(10);
    pub const PTR: Type = Type(12);
    pub const HINFO: Type = Type(13);
    pub const MX: Type = Type(15);
    pub const TXT: Type = Type(16);
    pub const AAAA: Type = Type(28);
    pub const SRV: Type = Type(33);
    pub const OPT: Type = Type(41);
    pub const IXFR: Type = Type(251);
    pub const AXFR: Type = Type(252);
    pub const ANY: Type = Type(255);

    /// Returns the mnemonic for the type, if it has one.
    pub fn mnemonic(self) -> Option<&'static str> {
        MNEMONICS
            .iter()
            .find(|(rr_type, _)| *rr_type == self)
            .map(|(_, mnemonic)| *mnemonic)
    }

    /// Gives the message codec access to the raw value.
    pub(crate) fn raw_mut(&mut self) -> &mut u16 {
        &mut self.0
    }
}

const MNEMONICS: &[(Type, &str)] = &[
    (Type::A, "A"),
    (Type::NS, "NS"),
    (Type::CNAME, "CNAME"),
    (Type::SOA, "SOA"),
    (Type::NULL, "NULL"),
    (Type::PTR, "PTR"),
    (Type::HINFO, "HINFO"),
    (Type::MX, "MX"),
    (Type::TXT, "TXT"),
    (Type::AAAA, "AAAA"),
    (Type::SRV, "SRV"),
    (Type::OPT, "OPT"),
    (Type::IXFR, "IXFR"),
    (Type::AXFR, "AXFR"),
    (Type::ANY, "ANY"),
];

impl From<u16> for Type {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Type> for u16 {
    fn from(rr_type: Type) -> Self {
        rr_type.0
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.mnemonic() {
            Some(mnemonic) => f.write_str(mnemonic),
            None => write!(f, "TYPE{}", self.0),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_types_display_generically() {
        // TYPE65280 is from the private use range.
        assert_eq!(Type::from(0xff00).to_string(), "TYPE65280");
    }

    #[test]
    fn qtypes_display_mnemonics() {
        assert_eq!(Type::from(252), Type::AXFR);
        assert_eq!(Type::AXFR.to_string(), "AXFR");
        assert_eq!(Type::ANY.mnemonic(), Some("ANY"));
        assert_eq!(format!("{:?}", Type::AAAA), "AAAA");
    }

    #[test]
    fn every_mnemonic_is_unique() {
        for (i, (rr_type, _)) in MNEMONICS.iter().enumerate() {
            assert!(MNEMONICS[i + 1..].iter().all(|(other, _)| other != rr_type));
        }
    }
}
