// Copyright 2021 Matthew Ingwersen.
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

//! Implementation of data structures related to domain names.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

pub mod compress;
mod error;
mod wire;
pub use compress::{Compressor, SuffixCompressor, Uncompressed};
pub use error::Error;
pub use wire::{decode_name, encode_name, MAX_POINTER_FOLLOWS};

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
pub const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
pub const MAX_LABEL_LEN: usize = 63;

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// A domain name.
///
/// A `Name` is an ordered sequence of labels, from the most specific
/// (leftmost) to the least specific. The null label that terminates
/// every name on the wire is implicit, so the root name has no labels
/// at all. Each label is an arbitrary octet string; labels are never
/// empty.
///
/// The textual form of a name (see the [`Display`](fmt::Display) and
/// [`FromStr`] implementations) follows every label with a `.`,
/// including the last one, so `www.example.com.` has three labels and
/// the root is `.`.
///
/// A `Name` is allowed to hold labels longer than 63 octets or to be
/// longer than 255 octets in total. Such names cannot be put on the
/// wire; [`encode_name`] rejects them.
///
/// In accordance with [RFC 4343], comparison and hashing of names is
/// ASCII-case-insensitive.
///
/// [RFC 4343]: https://datatracker.ietf.org/doc/html/rfc4343
#[derive(Clone, Default)]
pub struct Name {
    labels: Vec<Box<[u8]>>,
}

impl Name {
    /// Returns the root name.
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a name from a sequence of labels. Empty labels are
    /// dropped, so a sequence of only empty labels produces the root.
    pub fn from_labels<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        Self {
            labels: labels
                .into_iter()
                .filter(|label| !label.as_ref().is_empty())
                .map(|label| label.as_ref().into())
                .collect(),
        }
    }

    /// Returns whether this is the root name.
    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the number of labels in the name, not counting the
    /// implicit null label.
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Returns an iterator over the labels of the name.
    pub fn labels(&self) -> impl DoubleEndedIterator<Item = &[u8]> + ExactSizeIterator {
        self.labels.iter().map(|label| &label[..])
    }

    /// Returns the length of the name's uncompressed on-the-wire
    /// representation.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|label| label.len() + 1).sum::<usize>() + 1
    }

    /// Checks that the name can be written on the wire.
    pub fn validate(&self) -> Result<(), Error> {
        if self.labels.iter().any(|label| label.len() > MAX_LABEL_LEN) {
            Err(Error::LabelTooLong)
        } else if self.wire_len() > MAX_WIRE_LEN {
            Err(Error::NameTooLong)
        } else {
            Ok(())
        }
    }

    /// Returns the labels themselves, for the codec.
    pub(crate) fn raw_labels(&self) -> &[Box<[u8]>] {
        &self.labels
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in &self.labels {
            for octet in label.iter() {
                if *octet == b'.' {
                    f.write_str("\\.")?;
                } else if *octet == b'\\' {
                    f.write_str("\\\\")?;
                } else if octet.is_ascii_graphic() {
                    write!(f, "{}", *octet as char)?;
                } else {
                    write!(f, "\\{:03}", *octet)?;
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

// For use in HashMaps, this must agree with the case-insensitive
// PartialEq implementation above.
impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.labels.len());
        for label in &self.labels {
            state.write_u8(label.len() as u8);
            for octet in label.iter() {
                state.write_u8(octet.to_ascii_lowercase());
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Allows for conversion of a Rust [`str`] into a [`Name`]. The passed
/// string must be strictly ASCII. Escape sequences as defined by
/// [RFC 4343 § 2.1] are supported.
///
/// The string is canonicalized: a missing trailing `.` is implied, and
/// empty labels are dropped. Thus `""`, `"."`, and `".."` all parse
/// to the root, and `"example.com"` parses to `example.com.`.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut remaining_octets: &[u8] = s.as_ref();
        let mut labels = Vec::new();
        let mut current = Vec::new();

        // NOTE: to check that the string is ASCII, it suffices to check
        // that each octet is ASCII as we go. This is because all
        // multi-byte characters start with an octet that is not ASCII.
        while let Some(&octet) = remaining_octets.first() {
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining_octets[1..])?;
                current.push(value);
                remaining_octets = &remaining_octets[consumed + 1..];
            } else if octet == b'.' {
                if !current.is_empty() {
                    labels.push(std::mem::take(&mut current).into_boxed_slice());
                }
                remaining_octets = &remaining_octets[1..];
            } else if !octet.is_ascii() {
                return Err(Error::StrNotAscii);
            } else {
                current.push(octet);
                remaining_octets = &remaining_octets[1..];
            }
        }
        if !current.is_empty() {
            labels.push(current.into_boxed_slice());
        }
        Ok(Self { labels })
    }
}

/// Parses an escape sequence. We expect `remaining_octets` to start
/// with the octet immediately *after* the backslash that introduces the
/// escape sequence.
fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    if remaining_octets.is_empty() {
        Err(Error::InvalidEscape)
    } else if remaining_octets[0].is_ascii_digit() {
        if remaining_octets.len() < 3
            || !remaining_octets[1].is_ascii_digit()
            || !remaining_octets[2].is_ascii_digit()
        {
            Err(Error::InvalidEscape)
        } else {
            let hundreds = (remaining_octets[0] - b'0') as usize;
            let tens = (remaining_octets[1] - b'0') as usize;
            let ones = (remaining_octets[2] - b'0') as usize;
            let value = 100 * hundreds + 10 * tens + ones;
            if value > 255 {
                Err(Error::InvalidEscape)
            } else {
                Ok((value as u8, 3))
            }
        }
    } else if remaining_octets[0].is_ascii() {
        Ok((remaining_octets[0], 1))
    } else {
        Err(Error::StrNotAscii)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(name: &Name) -> u64 {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn root_has_expected_characteristics() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.label_count(), 0);
        assert_eq!(root.wire_len(), 1);
        assert_eq!(root.to_string(), ".");
    }

    #[test]
    fn from_str_canonicalizes() {
        let with_dot: Name = "www.example.com.".parse().unwrap();
        let without_dot: Name = "www.example.com".parse().unwrap();
        let doubled: Name = "www..example.com.".parse().unwrap();
        assert_eq!(with_dot, without_dot);
        assert_eq!(with_dot, doubled);
        assert_eq!(without_dot.to_string(), "www.example.com.");
        assert_eq!(with_dot.label_count(), 3);
    }

    #[test]
    fn from_str_parses_root_forms() {
        for text in ["", ".", ".."] {
            let name: Name = text.parse().unwrap();
            assert!(name.is_root(), "{:?} did not parse to the root", text);
        }
    }

    #[test]
    fn from_str_handles_escapes() {
        let name: Name = "a\\.b.c\\092\\000.".parse().unwrap();
        let labels: Vec<&[u8]> = name.labels().collect();
        assert_eq!(labels, [&b"a.b"[..], &b"c\\\x00"[..]]);
        assert_eq!(name.to_string(), "a\\.b.c\\\\\\000.");
    }

    #[test]
    fn from_str_rejects_bad_input() {
        assert_eq!("a\\25".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("a\\256.".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("ex\u{e4}mple.".parse::<Name>(), Err(Error::StrNotAscii));
    }

    #[test]
    fn from_str_accepts_long_labels() {
        // Long labels may exist in memory; encoding rejects them.
        let long = "x".repeat(64);
        let name: Name = long.parse().unwrap();
        assert_eq!(name.validate(), Err(Error::LabelTooLong));
    }

    #[test]
    fn comparison_and_hashing_are_case_insensitive() {
        let lower: Name = "adns.test.".parse().unwrap();
        let upper: Name = "ADNS.Test.".parse().unwrap();
        let other: Name = "adns.tests.".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(hash_of(&lower), hash_of(&upper));
        assert_ne!(lower, other);
    }

    #[test]
    fn from_labels_drops_empty_labels() {
        let name = Name::from_labels([&b"www"[..], &b""[..], &b"example"[..], &b"com"[..]]);
        assert_eq!(name, "www.example.com.".parse().unwrap());
        assert!(Name::from_labels([b""]).is_root());
    }

    #[test]
    fn validate_rejects_long_names() {
        let name = Name::from_labels(std::iter::repeat(b"abc").take(64));
        assert_eq!(name.wire_len(), 257);
        assert_eq!(name.validate(), Err(Error::NameTooLong));
    }
}
