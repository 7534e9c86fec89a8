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

//! Implementation of the [`Opcode`] type.

use std::fmt;

use super::constants::MAX_U4;

////////////////////////////////////////////////////////////////////////
// OPCODES                                                            //
////////////////////////////////////////////////////////////////////////

/// The four-bit opcode field of the DNS message header.
///
/// [RFC 1035 § 4.1.1] defines the opcode as indicating the kind of
/// query being made. An `Opcode` always holds a value from 0 to 15, so
/// every value has exactly one representation and can always be put
/// on the wire. Constants are provided for the values the IANA has
/// assigned; the rest are displayed as `OPCODEn`.
///
/// [RFC 1035 § 4.1.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Opcode(u8);

impl Opcode {
    pub const QUERY: Opcode = Opcode(0);
    pub const IQUERY: Opcode = Opcode(1);
    pub const STATUS: Opcode = Opcode(2);
    pub const NOTIFY: Opcode = Opcode(4);
    pub const UPDATE: Opcode = Opcode(5);
    pub const DSO: Opcode = Opcode(6);

    /// Builds an `Opcode` from the low four bits of `value`. The other
    /// bits are ignored.
    pub fn from_low_bits(value: u8) -> Self {
        Self(value & MAX_U4)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = IntoOpcodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= MAX_U4 {
            Ok(Self(value))
        } else {
            Err(IntoOpcodeError)
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        opcode.0
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::QUERY => f.write_str("QUERY"),
            Self::IQUERY => f.write_str("IQUERY"),
            Self::STATUS => f.write_str("STATUS"),
            Self::NOTIFY => f.write_str("NOTIFY"),
            Self::UPDATE => f.write_str("UPDATE"),
            Self::DSO => f.write_str("DSO"),
            Self(value) => write!(f, "OPCODE{value}"),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that the provided value does not fit in the
/// four-bit opcode field.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct IntoOpcodeError;

impl fmt::Display for IntoOpcodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("not a valid opcode")
    }
}

impl std::error::Error for IntoOpcodeError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_four_bit_value_converts_back() {
        for value in 0..=15u8 {
            let opcode = Opcode::try_from(value).unwrap();
            assert_eq!(u8::from(opcode), value);
            assert_eq!(Opcode::from_low_bits(value), opcode);
        }
        assert_eq!(Opcode::try_from(16), Err(IntoOpcodeError));
    }

    #[test]
    fn from_low_bits_ignores_high_bits() {
        assert_eq!(Opcode::from_low_bits(0xf2), Opcode::STATUS);
    }

    #[test]
    fn constants_match_their_values() {
        for (opcode, value) in [
            (Opcode::QUERY, 0),
            (Opcode::IQUERY, 1),
            (Opcode::STATUS, 2),
            (Opcode::NOTIFY, 4),
            (Opcode::UPDATE, 5),
            (Opcode::DSO, 6),
        ] {
            assert_eq!(Opcode::try_from(value), Ok(opcode));
        }
    }

    #[test]
    fn opcodes_display_iana_mnemonics() {
        assert_eq!(Opcode::NOTIFY.to_string(), "NOTIFY");
        assert_eq!(Opcode::from_low_bits(3).to_string(), "OPCODE3");
    }
}
