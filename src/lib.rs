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

//! adns is a skeleton authoritative DNS server.
//!
//! The crate is organized bottom-up:
//!
//! * [`name`] holds the [`Name`](name::Name) type and the on-the-wire
//!   name codec, including pointer decompression and pluggable
//!   compression;
//! * [`message`] decodes and encodes whole DNS messages;
//! * [`server`] decodes each received message, hands it to an
//!   [`AnswerProducer`](server::AnswerProducer), and encodes the
//!   response; and
//! * [`io`] runs a [`Server`](server::Server) on UDP sockets (and TCP
//!   listeners) with Tokio.
//!
//! No zone data is built in. The default producer,
//! [`Echo`](server::Echo), returns each query with the QR bit set.

pub mod class;
pub mod io;
pub mod message;
pub mod name;
pub mod rr;
pub mod server;
