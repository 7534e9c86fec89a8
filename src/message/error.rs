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

//! Implementation of the [`Error`] type for the message codec.

use std::fmt;

use crate::name;

/// An error signaling that a DNS message could not be decoded or
/// encoded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The message ended before a fixed-width field, a name, or RDATA
    /// was complete.
    TruncatedMessage,

    /// A name in the message could not be decoded or encoded.
    MalformedName(name::Error),

    /// A label was longer than 63 octets.
    LabelTooLong,

    /// A value cannot be represented in its wire field. The string
    /// names the field.
    InvalidField(&'static str),

    /// The requested operation is not implemented. The string names
    /// it.
    NotImplemented(&'static str),
}

impl From<name::Error> for Error {
    fn from(err: name::Error) -> Self {
        match err {
            name::Error::UnexpectedEom => Self::TruncatedMessage,
            name::Error::LabelTooLong => Self::LabelTooLong,
            other => Self::MalformedName(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::TruncatedMessage => f.write_str("message is truncated"),
            Self::MalformedName(err) => write!(f, "malformed name: {err}"),
            Self::LabelTooLong => f.write_str("label is longer than 63 octets"),
            Self::InvalidField(field) => write!(f, "value does not fit in {field} field"),
            Self::NotImplemented(what) => write!(f, "{what} is not implemented"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedName(err) => Some(err),
            _ => None,
        }
    }
}

/// The type returned by fallible message operations.
pub type Result<T> = std::result::Result<T, Error>;
