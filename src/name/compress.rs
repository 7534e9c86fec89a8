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

//! Pluggable name compression for message serialization.
//!
//! [`encode_name`](super::encode_name) always writes names in full.
//! The message [`Writer`](crate::message::Writer) instead writes every
//! name through a [`Compressor`], which may replace a suffix of the
//! name with a pointer to an earlier occurrence as described in
//! [RFC 1035 § 4.1.4].
//!
//! [RFC 1035 § 4.1.4]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.4

use std::collections::HashMap;

use super::{encode_name, Error, Name};

/// The largest message offset a compression pointer can hold.
const POINTER_MAX: usize = 0x3fff;

/// A strategy for writing names into a message buffer.
///
/// Implementations assume that `out` holds the message being built
/// starting at offset 0, and that a single `Compressor` is used for
/// exactly one message.
pub trait Compressor {
    /// Appends `name` to `out`, returning the new length of `out`. On
    /// failure, `out` must be left unchanged.
    fn write_name(&mut self, name: &Name, out: &mut Vec<u8>) -> Result<usize, Error>;
}

/// A [`Compressor`] that does not compress.
#[derive(Clone, Copy, Debug, Default)]
pub struct Uncompressed;

impl Compressor for Uncompressed {
    fn write_name(&mut self, name: &Name, out: &mut Vec<u8>) -> Result<usize, Error> {
        encode_name(name, out)
    }
}

/// A [`Compressor`] that points to the longest suffix already written.
///
/// Every suffix of every name written is remembered along with its
/// offset, as long as that offset can be expressed in a pointer. Since
/// [`Name`] comparison is case-insensitive, case is not preserved in
/// compressed suffixes.
#[derive(Debug, Default)]
pub struct SuffixCompressor {
    offsets: HashMap<Name, u16>,
}

impl SuffixCompressor {
    /// Creates a new `SuffixCompressor` for a fresh message.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Compressor for SuffixCompressor {
    fn write_name(&mut self, name: &Name, out: &mut Vec<u8>) -> Result<usize, Error> {
        name.validate()?;

        let labels = name.raw_labels();
        for (skip, label) in labels.iter().enumerate() {
            let suffix = Name {
                labels: labels[skip..].to_vec(),
            };
            if let Some(&pointer) = self.offsets.get(&suffix) {
                out.extend_from_slice(&(0xc000 | pointer).to_be_bytes());
                return Ok(out.len());
            }
            if out.len() <= POINTER_MAX {
                self.offsets.insert(suffix, out.len() as u16);
            }
            out.push(label.len() as u8);
            out.extend_from_slice(label);
        }
        out.push(0);
        Ok(out.len())
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
