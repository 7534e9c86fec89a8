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

//! Implementation of the [`Class`] type for DNS classes.

use std::fmt;

/// The CLASS of a resource record, or the QCLASS of a question.
///
/// The message codec carries the 16-bit value through untouched, so
/// any value is representable. Constants are provided for the classes
/// still listed by the IANA and for the QCLASS-only values
/// [`NONE`](Class::NONE) and [`ANY`](Class::ANY). Values without a
/// mnemonic are displayed as `CLASSn`, as in [RFC 3597 § 5].
///
/// [RFC 3597 § 5]: https://datatracker.ietf.org/doc/html/rfc3597#section-5
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Class(u16);

impl Class {
    pub const IN: Self = Self(1);
    pub const CH: Self = Self(3);
    pub const HS: Self = Self(4);
    pub const NONE: Self = Self(254);
    pub const ANY: Self = Self(255);

    /// Returns the mnemonic for the class, if it has one.
    pub fn mnemonic(self) -> Option<&'static str> {
        MNEMONICS
            .iter()
            .find(|(class, _)| *class == self)
            .map(|(_, mnemonic)| *mnemonic)
    }

    /// Gives the message codec access to the raw value.
    pub(crate) fn raw_mut(&mut self) -> &mut u16 {
        &mut self.0
    }
}

const MNEMONICS: &[(Class, &str)] = &[
    (Class::IN, "IN"),
    (Class::CH, "CH"),
    (Class::HS, "HS"),
    (Class::NONE, "NONE"),
    (Class::ANY, "ANY"),
];

impl From<u16> for Class {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Class> for u16 {
    fn from(class: Class) -> Self {
        class.0
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.mnemonic() {
            Some(mnemonic) => f.write_str(mnemonic),
            None => write!(f, "CLASS{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Class;

    #[test]
    fn unknown_classes_display_generically() {
        // CLASS65280 is from the private use range.
        assert_eq!(Class::from(0xff00).to_string(), "CLASS65280");
        assert_eq!(Class::from(2).to_string(), "CLASS2");
    }

    #[test]
    fn known_classes_display_mnemonics() {
        assert_eq!(Class::IN.to_string(), "IN");
        assert_eq!(Class::from(255).to_string(), "ANY");
        assert_eq!(Class::NONE.mnemonic(), Some("NONE"));
        assert_eq!(format!("{:?}", Class::CH), "CH");
    }
}
