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

//! Implementation of the Tokio I/O provider.

// NOTE: In this provider, I/O errors are logged and the loop that hit
// them keeps going. Only receive errors whose kind is listed in
// TokioIoConfig::fatal_recv_errors end a loop; they are then reported
// through TokioShutdownController::wait_for_failure.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use crate::server::{AnswerProducer, ReceivedInfo, Response, Server, Transport};

/// The smallest UDP payload size a DNS server must handle.
const MIN_UDP_PAYLOAD_SIZE: usize = 512;

/// How long the TCP accept loop waits after a non-fatal error. This is
/// to prevent a persistent error from using up significant CPU time.
const ACCEPT_ERROR_DELAY: Duration = Duration::from_secs(1);

////////////////////////////////////////////////////////////////////////
// CONFIGURATION                                                      //
////////////////////////////////////////////////////////////////////////

/// Configuration options for the [`TokioIoProvider`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokioIoConfig {
    /// The size of the buffer each UDP datagram is received into. Longer
    /// datagrams are truncated by the operating system. This must be at
    /// least 512.
    pub udp_payload_size: usize,

    /// How long a handler task may spend sending its response.
    pub handler_timeout: Duration,

    /// Kinds of receive and accept errors that stop the loop that
    /// encountered them. All other errors are logged and ignored.
    pub fatal_recv_errors: Vec<io::ErrorKind>,
}

impl Default for TokioIoConfig {
    fn default() -> Self {
        Self {
            udp_payload_size: MIN_UDP_PAYLOAD_SIZE,
            handler_timeout: Duration::from_secs(5),
            fatal_recv_errors: vec![io::ErrorKind::NotConnected],
        }
    }
}

impl TokioIoConfig {
    fn validate(&self) -> io::Result<()> {
        if self.udp_payload_size < MIN_UDP_PAYLOAD_SIZE {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("the UDP payload size must be at least {MIN_UDP_PAYLOAD_SIZE}"),
            ))
        } else {
            Ok(())
        }
    }
}

////////////////////////////////////////////////////////////////////////
// PROVIDER                                                           //
////////////////////////////////////////////////////////////////////////

/// A Tokio I/O provider.
///
/// This provider uses asynchronous I/O and runs the server by spawning
/// tasks on a Tokio runtime. Each UDP socket gets a receive loop, which
/// spawns a new task for every datagram. Each TCP listener gets an
/// accept loop, but DNS over TCP is not implemented, so connections are
/// closed as soon as they are accepted.
///
/// The `TokioIoProvider` supports graceful shutdown. To initiate a
/// graceful shutdown, use the [`TokioShutdownController`] returned by
/// [`TokioIoProvider::start`].
pub struct TokioIoProvider {
    config: Arc<TokioIoConfig>,
    tcp_listeners: Vec<TcpListener>,
    udp_sockets: Vec<Arc<UdpSocket>>,
}

impl TokioIoProvider {
    /// Creates a new `TokioIoProvider`. This call binds TCP and UDP
    /// sockets in preparation, but does not start the server. This
    /// function requires that the Tokio runtime be active.
    pub async fn bind<T, U>(tcp_addrs: T, udp_addrs: U, config: TokioIoConfig) -> io::Result<Self>
    where
        T: IntoIterator<Item = SocketAddr>,
        U: IntoIterator<Item = SocketAddr>,
    {
        config.validate()?;

        let mut tcp_listeners = Vec::new();
        for addr in tcp_addrs {
            let listener = TcpListener::bind(addr).await?;
            tcp_listeners.push(listener);
        }

        let mut udp_sockets = Vec::new();
        for addr in udp_addrs {
            let socket = UdpSocket::bind(addr).await?;
            udp_sockets.push(Arc::new(socket));
        }

        Ok(Self {
            config: Arc::new(config),
            tcp_listeners,
            udp_sockets,
        })
    }

    /// Creates a new `TokioIoProvider` from sockets that are already
    /// bound, such as ones passed down by a supervisor process. The
    /// sockets are switched to non-blocking mode. This function requires
    /// that the Tokio runtime be active.
    pub fn from_std<T, U>(tcp_listeners: T, udp_sockets: U, config: TokioIoConfig) -> io::Result<Self>
    where
        T: IntoIterator<Item = std::net::TcpListener>,
        U: IntoIterator<Item = std::net::UdpSocket>,
    {
        config.validate()?;

        let mut tokio_tcp_listeners = Vec::new();
        for listener in tcp_listeners {
            listener.set_nonblocking(true)?;
            tokio_tcp_listeners.push(TcpListener::from_std(listener)?);
        }

        let mut tokio_udp_sockets = Vec::new();
        for socket in udp_sockets {
            socket.set_nonblocking(true)?;
            tokio_udp_sockets.push(Arc::new(UdpSocket::from_std(socket)?));
        }

        Ok(Self {
            config: Arc::new(config),
            tcp_listeners: tokio_tcp_listeners,
            udp_sockets: tokio_udp_sockets,
        })
    }

    /// Returns the local addresses of the TCP listeners.
    pub fn tcp_local_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.tcp_listeners.iter().map(TcpListener::local_addr).collect()
    }

    /// Returns the local addresses of the UDP sockets.
    pub fn udp_local_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.udp_sockets.iter().map(|socket| socket.local_addr()).collect()
    }

    /// Starts the server on the active Tokio runtime.
    ///
    /// This spawns tasks on the active Tokio runtime and then returns
    /// a [`TokioShutdownController`] that can be used to shut down the
    /// tasks at a later time. (The [`TokioShutdownController`] must be
    /// held as long as the server should be running, since dropping it
    /// will trigger shutdown.)
    pub fn start<P>(self, server: &Arc<Server<P>>) -> TokioShutdownController
    where
        P: AnswerProducer + 'static,
    {
        let (shutdown_controller, shutdown_handle) = make_shutdown_channels();

        // Start the TCP tasks.
        for tcp_listener in self.tcp_listeners {
            tokio::spawn(run_tcp_listener(
                shutdown_handle.clone(),
                tcp_listener,
                self.config.clone(),
            ));
        }

        // Start the UDP tasks.
        for udp_socket in self.udp_sockets {
            tokio::spawn(run_udp_receiver(
                shutdown_handle.clone(),
                server.clone(),
                udp_socket,
                self.config.clone(),
            ));
        }

        shutdown_controller
    }
}

////////////////////////////////////////////////////////////////////////
// TCP                                                                //
////////////////////////////////////////////////////////////////////////

/// The TCP listener/accept loop.
async fn run_tcp_listener(
    mut shutdown: ShutdownHandle,
    listener: TcpListener,
    config: Arc<TokioIoConfig>,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.request_receiver.recv() => return,
            res = listener.accept() => res,
        };
        match accepted {
            Ok((stream, peer)) => {
                let wait_sender = shutdown.wait_sender.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_tcp_connection(stream).await {
                        debug!("closed TCP connection from {peer}: {e}");
                    }
                    drop(wait_sender);
                });
            }
            Err(e) => {
                if stops_loop(&shutdown, &config, Transport::Tcp, e) {
                    return;
                }
                tokio::select! {
                    _ = shutdown.request_receiver.recv() => return,
                    _ = tokio::time::sleep(ACCEPT_ERROR_DELAY) => (),
                }
            }
        }
    }
}

/// Handles a TCP connection by closing it. This always returns an
/// error, since there is no DNS over TCP support to offer.
async fn handle_tcp_connection(mut stream: TcpStream) -> io::Result<()> {
    stream.shutdown().await?;
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "DNS over TCP is not implemented",
    ))
}

////////////////////////////////////////////////////////////////////////
// UDP                                                                //
////////////////////////////////////////////////////////////////////////

/// The UDP receiver loop.
async fn run_udp_receiver<P>(
    mut shutdown: ShutdownHandle,
    server: Arc<Server<P>>,
    socket: Arc<UdpSocket>,
    config: Arc<TokioIoConfig>,
) where
    P: AnswerProducer + 'static,
{
    loop {
        let mut received_buf = vec![0; config.udp_payload_size];

        // Receive a DNS message (or a shutdown request).
        let received = tokio::select! {
            _ = shutdown.request_receiver.recv() => return,
            res = socket.recv_from(&mut received_buf) => res,
        };
        let (received_len, src) = match received {
            Ok((0, _)) => continue,
            Ok(received) => received,
            Err(e) => {
                if stops_loop(&shutdown, &config, Transport::Udp, e) {
                    return;
                }
                continue;
            }
        };
        received_buf.truncate(received_len);

        // In a new Tokio task, process the DNS message and send the
        // response (if any).
        let wait_sender = shutdown.wait_sender.clone();
        let server = server.clone();
        let socket = socket.clone();
        let handler_timeout = config.handler_timeout;
        tokio::spawn(async move {
            let info = ReceivedInfo::new(src, Transport::Udp);
            if let Response::Single(response) = server.handle_message(&received_buf, info) {
                match timeout(handler_timeout, socket.send_to(&response, src)).await {
                    Ok(Ok(_)) => (),
                    Ok(Err(e)) => log_io_error(e),
                    Err(_) => warn!("timed out sending UDP response to {src}"),
                }
            }

            // This ensures that the wait sender is moved into the new
            // task.
            drop(wait_sender);
        });
    }
}

////////////////////////////////////////////////////////////////////////
// SHUTDOWN                                                           //
////////////////////////////////////////////////////////////////////////

/// Controls the shutdown of a server's Tokio tasks.
///
/// This type is used to shut down the Tokio tasks spawned by
/// [`TokioIoProvider::start`]. Use
/// [`TokioShutdownController::shut_down`] or its blocking variant,
/// [`TokioShutdownController::blocking_shut_down`], to initiate
/// shutdown and wait for its completion. Dropping the controller will
/// also trigger shutdown (but will not wait for it to complete).
///
/// The controller also receives the errors that stop a receive or
/// accept loop; see [`TokioShutdownController::wait_for_failure`].
#[must_use]
pub struct TokioShutdownController {
    request_sender: broadcast::Sender<()>,
    wait_receiver: mpsc::Receiver<()>,
    failure_receiver: mpsc::UnboundedReceiver<io::Error>,
}

impl TokioShutdownController {
    /// Requests that running server tasks shut down, and then waits for
    /// them to terminate. This includes handler tasks that are still
    /// sending responses.
    pub async fn shut_down(mut self) {
        drop(self.request_sender);
        let _ = self.wait_receiver.recv().await;
    }

    /// The blocking variant of [`TokioShutdownController::shut_down`].
    pub fn blocking_shut_down(mut self) {
        drop(self.request_sender);
        let _ = self.wait_receiver.blocking_recv();
    }

    /// Waits until a receive or accept loop stops because of a fatal
    /// error, and returns that error.
    ///
    /// If every loop has stopped without one (which only happens if
    /// there were no sockets to begin with), this returns `None`.
    pub async fn wait_for_failure(&mut self) -> Option<io::Error> {
        self.failure_receiver.recv().await
    }
}

/// A handle held by tasks to interact with the graceful shutdown
/// mechanism.
///
/// This type has three roles:
///
/// 1. It enables tasks to listen for graceful shutdown signals. This
///    is done by waiting for all senders attached to `request_receiver`
///    to close.
/// 2. It prevents graceful shutdown from completing until it is
///    dropped. This is done by holding `wait_sender`. All server tasks
///    therefore own a `ShutdownHandle` (or at least the `wait_sender`
///    component).
/// 3. It lets loops report the error that stopped them through
///    `failure_sender`.
struct ShutdownHandle {
    request_receiver: broadcast::Receiver<()>,
    wait_sender: mpsc::Sender<()>,
    failure_sender: mpsc::UnboundedSender<io::Error>,
}

impl Clone for ShutdownHandle {
    fn clone(&self) -> Self {
        // When a broadcast receiver is created through the resubscribe
        // method, the new receiver does not receive any values already
        // in the original receiver's queue. However, missing values are
        // not an issue in our case. The shutdown signal is not a value
        // being sent, but rather all senders being dropped.
        ShutdownHandle {
            request_receiver: self.request_receiver.resubscribe(),
            wait_sender: self.wait_sender.clone(),
            failure_sender: self.failure_sender.clone(),
        }
    }
}

/// Produces a [`TokioShutdownController`] and an initial
/// [`ShutdownHandle`] connected to it.
fn make_shutdown_channels() -> (TokioShutdownController, ShutdownHandle) {
    let (request_sender, request_receiver) = broadcast::channel(1);
    let (wait_sender, wait_receiver) = mpsc::channel(1);
    let (failure_sender, failure_receiver) = mpsc::unbounded_channel();
    let controller = TokioShutdownController {
        request_sender,
        wait_receiver,
        failure_receiver,
    };
    let handle = ShutdownHandle {
        request_receiver,
        wait_sender,
        failure_sender,
    };
    (controller, handle)
}

/// Handles an error from a receive or accept loop, returning whether
/// the loop must stop. Errors of a fatal kind are reported to the
/// [`TokioShutdownController`]; all others are only logged.
fn stops_loop(
    shutdown: &ShutdownHandle,
    config: &TokioIoConfig,
    transport: Transport,
    e: io::Error,
) -> bool {
    if config.fatal_recv_errors.contains(&e.kind()) {
        error!("{transport} loop is stopping: {e}");
        let _ = shutdown.failure_sender.send(e);
        true
    } else {
        log_io_error(e);
        false
    }
}

/// Logs an I/O error.
fn log_io_error(e: io::Error) {
    error!("I/O error: {e}");
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::server::Echo;

    /// A query for www.example.com. IN A with RD set.
    const QUERY: &[u8] = b"\x00\x01\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
                           \x03www\x07example\x03com\x00\x00\x01\x00\x01";

    const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

    fn localhost() -> SocketAddr {
        (Ipv4Addr::LOCALHOST, 0).into()
    }

    async fn start_udp_echo_server() -> (SocketAddr, TokioShutdownController) {
        let provider = TokioIoProvider::bind([], [localhost()], TokioIoConfig::default())
            .await
            .unwrap();
        let addr = provider.udp_local_addrs().unwrap()[0];
        let controller = provider.start(&Arc::new(Server::new(Echo)));
        (addr, controller)
    }

    async fn receive(client: &UdpSocket) -> (Vec<u8>, SocketAddr) {
        let mut buf = vec![0; 512];
        let (len, from) = timeout(RECEIVE_TIMEOUT, client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        buf.truncate(len);
        (buf, from)
    }

    fn echoed_query() -> Vec<u8> {
        let mut expected = QUERY.to_vec();
        expected[2] |= 0x80;
        expected
    }

    #[tokio::test]
    async fn udp_server_answers_queries() {
        let (addr, controller) = start_udp_echo_server().await;
        let client = UdpSocket::bind(localhost()).await.unwrap();
        client.send_to(QUERY, addr).await.unwrap();
        assert_eq!(receive(&client).await, (echoed_query(), addr));
        controller.shut_down().await;
    }

    #[tokio::test]
    async fn udp_server_skips_empty_and_malformed_datagrams() {
        let (addr, controller) = start_udp_echo_server().await;
        let client = UdpSocket::bind(localhost()).await.unwrap();
        client.send_to(&[], addr).await.unwrap();
        client.send_to(&QUERY[..5], addr).await.unwrap();
        client.send_to(QUERY, addr).await.unwrap();

        // Nothing else was answered, so the first reply is the echo.
        assert_eq!(receive(&client).await, (echoed_query(), addr));
        controller.shut_down().await;
    }

    #[tokio::test]
    async fn tcp_connections_are_closed() {
        let provider = TokioIoProvider::bind([localhost()], [], TokioIoConfig::default())
            .await
            .unwrap();
        let addr = provider.tcp_local_addrs().unwrap()[0];
        let controller = provider.start(&Arc::new(Server::new(Echo)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buf = Vec::new();
        let n_read = timeout(RECEIVE_TIMEOUT, stream.read_to_end(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n_read, 0);
        controller.shut_down().await;
    }

    #[tokio::test]
    async fn small_udp_payload_sizes_are_rejected() {
        let config = TokioIoConfig {
            udp_payload_size: 511,
            ..TokioIoConfig::default()
        };
        let result = TokioIoProvider::bind([], [localhost()], config).await;
        assert_eq!(
            result.err().map(|e| e.kind()),
            Some(io::ErrorKind::InvalidInput)
        );
    }

    #[tokio::test]
    async fn wait_for_failure_ends_without_sockets() {
        let provider = TokioIoProvider::bind([], [], TokioIoConfig::default())
            .await
            .unwrap();
        let mut controller = provider.start(&Arc::new(Server::new(Echo)));
        assert!(controller.wait_for_failure().await.is_none());
        controller.shut_down().await;
    }

    #[test]
    fn blocking_shut_down_works_outside_the_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (addr, controller) = runtime.block_on(start_udp_echo_server());
        runtime.block_on(async {
            let client = UdpSocket::bind(localhost()).await.unwrap();
            client.send_to(QUERY, addr).await.unwrap();
            assert_eq!(receive(&client).await, (echoed_query(), addr));
        });

        // The runtime must keep running the server tasks while another
        // thread blocks on their shutdown.
        let closer = std::thread::spawn(move || controller.blocking_shut_down());
        runtime.block_on(async {
            while !closer.is_finished() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });
        closer.join().unwrap();
    }

    /// Returns a listener whose descriptor is really a connected stream
    /// with data waiting, so that accepting on it fails with EINVAL.
    /// The peer is returned too, since it must outlive the test.
    #[cfg(unix)]
    fn broken_listener() -> (std::net::TcpListener, std::net::TcpStream) {
        use std::io::Write;
        use std::os::unix::io::{FromRawFd, IntoRawFd};

        let listener = std::net::TcpListener::bind(localhost()).unwrap();
        let mut peer = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (accepted, _) = listener.accept().unwrap();
        peer.write_all(b"x").unwrap();
        let broken = unsafe { std::net::TcpListener::from_raw_fd(accepted.into_raw_fd()) };
        (broken, peer)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fatal_accept_errors_are_reported() {
        let (broken, _peer) = broken_listener();
        let config = TokioIoConfig {
            fatal_recv_errors: vec![io::ErrorKind::InvalidInput],
            ..TokioIoConfig::default()
        };
        let provider = TokioIoProvider::from_std([broken], [], config).unwrap();
        let mut controller = provider.start(&Arc::new(Server::new(Echo)));
        let failure = timeout(RECEIVE_TIMEOUT, controller.wait_for_failure())
            .await
            .unwrap();
        assert_eq!(failure.map(|e| e.kind()), Some(io::ErrorKind::InvalidInput));

        // The failed loop was the only one.
        assert!(controller.wait_for_failure().await.is_none());
        controller.shut_down().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn other_accept_errors_keep_the_loop_running() {
        let (broken, _peer) = broken_listener();
        let provider = TokioIoProvider::from_std([broken], [], TokioIoConfig::default()).unwrap();
        let mut controller = provider.start(&Arc::new(Server::new(Echo)));
        let waited = timeout(Duration::from_millis(200), controller.wait_for_failure()).await;
        assert!(waited.is_err());
        controller.shut_down().await;
    }
}
