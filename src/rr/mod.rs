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

//! Resource record types.
//!
//! RDATA is carried as opaque octets by the message codec (see
//! [`ResourceRecord`](crate::message::ResourceRecord)), so all that
//! lives here is the [`Type`] of a record.

mod rr_type;
pub use rr_type::Type;
