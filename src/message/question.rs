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

//! Implementation of the [`Question`] type.

use std::fmt;

use super::fields::{Field, FieldMut, Fields, FieldsMut, WireRecord};
use crate::class::Class;
use crate::name::Name;
use crate::rr::Type;

/// The question of a DNS query.
///
/// Defined in [RFC 1035 § 4.1.2], a DNS question includes
///
/// * the QNAME, which is the domain name whose records are being
///   queried;
/// * the QTYPE, which specifies what types of records are desired; and
/// * the QCLASS, which specifies which DNS class(es) to search.
///
/// QTYPEs and QCLASSes are supersets of [`Type`]s and [`Class`]es,
/// so those types are used here as well.
///
/// While the original specification does not rule out having multiple
/// questions per message, in practice only one question per message is
/// used.
///
/// [RFC 1035 § 4.1.2]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.2
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Question {
    pub qname: Name,
    pub qtype: Type,
    pub qclass: Class,
}

impl WireRecord for Question {
    fn fields(&self) -> Fields<'_> {
        let mut fields = Fields::new();
        fields.push(Field::Name(&self.qname));
        fields.push(Field::U16(self.qtype.into()));
        fields.push(Field::U16(self.qclass.into()));
        fields
    }

    fn fields_mut(&mut self) -> FieldsMut<'_> {
        let mut fields = FieldsMut::new();
        fields.push(FieldMut::Name(&mut self.qname));
        fields.push(FieldMut::U16(self.qtype.raw_mut()));
        fields.push(FieldMut::U16(self.qclass.raw_mut()));
        fields
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.qname, self.qclass, self.qtype)
    }
}
