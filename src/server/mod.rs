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

//! The processing logic of an authoritative DNS server.
//!
//! The [`Server`] structure is the heart of this module; see its
//! documentation for details.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use log::{debug, warn};

use crate::message::{self, Message};
use crate::name::{SuffixCompressor, Uncompressed};

////////////////////////////////////////////////////////////////////////
// ANSWER PRODUCERS                                                   //
////////////////////////////////////////////////////////////////////////

/// The source of responses for a [`Server`].
///
/// An `AnswerProducer` is given each decoded query and returns the
/// message to send back. It is shared by every handler task, hence the
/// `Send + Sync` bound. Looking up records, synthesizing answers and
/// deciding RCODEs all happen behind this trait.
pub trait AnswerProducer: Send + Sync {
    /// Produces the response to `query`.
    fn produce(&self, query: Message) -> Message;
}

/// An [`AnswerProducer`] that sends every query back with the QR bit
/// set and nothing else changed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Echo;

impl AnswerProducer for Echo {
    fn produce(&self, mut query: Message) -> Message {
        query.header.qr = true;
        query
    }
}

////////////////////////////////////////////////////////////////////////
// SERVER PUBLIC API AND CORE MESSAGE-HANDLING LOGIC                  //
////////////////////////////////////////////////////////////////////////

/// An authoritative DNS server, abstracted from any underlying network
/// I/O provider or answer source.
///
/// The [`Server`] structure implements the per-message logic of the
/// server. It receives DNS messages through
/// [`Server::handle_message`], decodes them, obtains a response from
/// its [`AnswerProducer`], and encodes that response. An underlying
/// network I/O provider (see [`crate::io`]) is responsible for
/// receiving these messages from the network and sending back the
/// responses that the [`Server`] produces.
///
/// A `Server` holds no mutable state, so a single one can be shared by
/// any number of handler tasks through an [`Arc`](std::sync::Arc).
pub struct Server<P = Echo> {
    producer: P,
    compression: bool,
}

impl<P> Server<P> {
    /// Creates a new `Server` that answers with `producer`.
    ///
    /// Name compression of responses is disabled by default.
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            compression: false,
        }
    }

    /// Returns the `Server`'s answer producer.
    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Returns whether names in responses are compressed.
    pub fn compression(&self) -> bool {
        self.compression
    }

    /// Sets whether names in responses are compressed.
    pub fn set_compression(&mut self, enabled: bool) {
        self.compression = enabled;
    }
}

impl Default for Server<Echo> {
    fn default() -> Self {
        Self::new(Echo)
    }
}

impl<P> Server<P>
where
    P: AnswerProducer,
{
    /// Handles a received DNS message. This is the API through which
    /// I/O providers submit messages.
    ///
    /// `received` contains the message received, and `info` provides
    /// additional information about it (see [`ReceivedInfo`]). A
    /// [`Response`] is returned, signifying whether a response is to be
    /// sent and, if so, what it is.
    ///
    /// Nothing is sent for empty input, or if the message cannot be
    /// decoded or the response cannot be encoded. Those failures are
    /// logged; use [`Server::try_handle_message`] to get at them.
    pub fn handle_message(&self, received: &[u8], info: ReceivedInfo) -> Response {
        let query = match self.decode_query(received, info) {
            Ok(Some(query)) => query,
            Ok(None) => return Response::None,
            Err(e) => {
                debug!("dropping {} message from {}: {e}", info.transport, info.source);
                return Response::None;
            }
        };

        let response = self.producer.produce(query);
        match self.encode_response(&response) {
            Ok(octets) => Response::Single(octets),
            Err(e) => {
                warn!(
                    "failed to encode response to {} {}: {e}",
                    info.transport, info.source,
                );
                Response::None
            }
        }
    }

    /// The fallible variant of [`Server::handle_message`].
    ///
    /// This returns `Ok(None)` for empty input and the encoded response
    /// otherwise. Messages received over TCP fail with
    /// [`NotImplemented`](message::Error::NotImplemented).
    pub fn try_handle_message(
        &self,
        received: &[u8],
        info: ReceivedInfo,
    ) -> Result<Option<Vec<u8>>, message::Error> {
        match self.decode_query(received, info)? {
            Some(query) => {
                let response = self.producer.produce(query);
                self.encode_response(&response).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Decodes a received query, if there is one.
    fn decode_query(
        &self,
        received: &[u8],
        info: ReceivedInfo,
    ) -> Result<Option<Message>, message::Error> {
        if received.is_empty() {
            return Ok(None);
        }
        if info.transport == Transport::Tcp {
            return Err(message::Error::NotImplemented("DNS over TCP"));
        }
        let query = Message::from_wire(received)?;
        debug!(
            "received {} query {} from {}",
            info.transport,
            QuestionsDisplay(&query),
            info.source,
        );
        Ok(Some(query))
    }

    fn encode_response(&self, response: &Message) -> Result<Vec<u8>, message::Error> {
        if self.compression {
            response.to_wire_with(&mut SuffixCompressor::new())
        } else {
            response.to_wire_with(&mut Uncompressed)
        }
    }
}

/// Formats the question section of a message for logging.
struct QuestionsDisplay<'a>(&'a Message);

impl fmt::Display for QuestionsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06x} [", self.0.header.id)?;
        for (i, question) in self.0.questions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{question}")?;
        }
        f.write_str("]")
    }
}

////////////////////////////////////////////////////////////////////////
// RECEIVED INFO AND RESPONSES                                        //
////////////////////////////////////////////////////////////////////////

/// Provides network-related information about a received DNS message to
/// [`Server::handle_message`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReceivedInfo {
    source: SocketAddr,
    transport: Transport,
}

impl ReceivedInfo {
    /// Creates a new [`ReceivedInfo`].
    ///
    /// IPv4-mapped IPv6 addresses of the kind that dual-stack sockets
    /// produce (e.g. `::ffff:127.0.0.1`) are converted to IPv4
    /// addresses, so calling I/O code need not concern itself with
    /// this.
    pub fn new(source: SocketAddr, transport: Transport) -> Self {
        let source = match source {
            SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
                Some(v4) => SocketAddr::new(IpAddr::V4(v4), v6.port()),
                None => source,
            },
            SocketAddr::V4(_) => source,
        };
        Self { source, transport }
    }

    /// Returns the address the message came from.
    pub fn source(&self) -> SocketAddr {
        self.source
    }

    /// Returns the transport the message came over.
    pub fn transport(&self) -> Transport {
        self.transport
    }
}

/// Indicates the transport through which a DNS message was received.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("TCP"),
            Self::Udp => f.write_str("UDP"),
        }
    }
}

/// Indicates to the caller of [`Server::handle_message`] what kind of
/// response needs to be sent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Response {
    /// A single response is to be sent; these are its octets.
    Single(Vec<u8>),

    /// No response is to be sent.
    None,
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::class::Class;
    use crate::message::ResourceRecord;
    use crate::name::Name;
    use crate::rr::Type;

    /// A query for www.example.com. IN A with RD set.
    const QUERY: &[u8] = b"\x00\x01\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
                           \x03www\x07example\x03com\x00\x00\x01\x00\x01";

    /// Wraps another producer and counts how often it is called.
    #[derive(Default)]
    struct Counting<P> {
        inner: P,
        calls: AtomicUsize,
    }

    impl<P: AnswerProducer> AnswerProducer for Counting<P> {
        fn produce(&self, query: Message) -> Message {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.produce(query)
        }
    }

    impl<P> Counting<P> {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    /// Answers with an A record for the QNAME, or with a record that
    /// cannot be encoded when the QNAME is the root.
    struct Answering;

    impl AnswerProducer for Answering {
        fn produce(&self, query: Message) -> Message {
            let mut response = Message::response_to(&query);
            let name = match query.questions.first() {
                Some(question) if !question.qname.is_root() => question.qname.clone(),
                _ => Name::from_labels([[b'x'; 64]]),
            };
            response.header.aa = true;
            response.answers.push(ResourceRecord {
                name,
                rr_type: Type::A,
                class: Class::IN,
                ttl: 3600,
                rdata: Box::new([192, 0, 2, 1]),
            });
            response
        }
    }

    fn udp_info() -> ReceivedInfo {
        ReceivedInfo::new((Ipv4Addr::LOCALHOST, 5353).into(), Transport::Udp)
    }

    #[test]
    fn echo_sets_qr() {
        let server = Server::default();
        let mut expected = QUERY.to_vec();
        expected[2] |= 0x80;
        assert_eq!(
            server.handle_message(QUERY, udp_info()),
            Response::Single(expected)
        );
    }

    #[test]
    fn empty_input_is_ignored() {
        let server = Server::new(Counting::<Echo>::default());
        assert_eq!(server.handle_message(&[], udp_info()), Response::None);
        assert_eq!(server.try_handle_message(&[], udp_info()), Ok(None));
        assert_eq!(server.producer().calls(), 0);
    }

    #[test]
    fn undecodable_input_is_dropped() {
        let server = Server::new(Counting::<Echo>::default());
        let truncated = &QUERY[..QUERY.len() - 1];
        assert_eq!(server.handle_message(truncated, udp_info()), Response::None);
        assert_eq!(
            server.try_handle_message(truncated, udp_info()),
            Err(message::Error::TruncatedMessage)
        );
        assert_eq!(server.producer().calls(), 0);
    }

    #[test]
    fn unencodable_responses_are_dropped() {
        let server = Server::new(Counting {
            inner: Answering,
            calls: AtomicUsize::new(0),
        });
        let root_query = b"\x00\x02\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\
                           \x00\x00\x01\x00\x01";
        assert_eq!(server.handle_message(root_query, udp_info()), Response::None);
        assert_eq!(
            server.try_handle_message(root_query, udp_info()),
            Err(message::Error::LabelTooLong)
        );
        assert_eq!(server.producer().calls(), 2);
    }

    #[test]
    fn tcp_is_not_implemented() {
        let server = Server::default();
        let info = ReceivedInfo::new((Ipv4Addr::LOCALHOST, 5353).into(), Transport::Tcp);
        assert_eq!(server.handle_message(QUERY, info), Response::None);
        assert!(matches!(
            server.try_handle_message(QUERY, info),
            Err(message::Error::NotImplemented(_))
        ));
    }

    #[test]
    fn compression_applies_to_responses() {
        let mut server = Server::new(Answering);
        let uncompressed = server.try_handle_message(QUERY, udp_info()).unwrap().unwrap();
        server.set_compression(true);
        let compressed = server.try_handle_message(QUERY, udp_info()).unwrap().unwrap();
        assert_eq!(compressed.len() + 15, uncompressed.len());
        assert_eq!(
            Message::from_wire(&compressed),
            Message::from_wire(&uncompressed)
        );

        let response = Message::from_wire(&compressed).unwrap();
        assert!(response.header.qr && response.header.aa && response.header.rd);
        assert_eq!(response.answers.len(), 1);
    }

    #[test]
    fn received_info_constructor_canonicalizes_ipv4_mapped_ipv6_addrs() {
        let ipv4_mapped_ipv6: SocketAddr = "[::ffff:127.0.0.1]:53".parse().unwrap();
        let received_info = ReceivedInfo::new(ipv4_mapped_ipv6, Transport::Udp);
        assert_eq!(
            received_info.source(),
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 53),
        );
    }
}
