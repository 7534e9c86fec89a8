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

//! Implements the `run` command (i.e., running the server).

use std::fmt::Write;
use std::net::{TcpListener, UdpSocket};
#[cfg(unix)]
use std::os::unix::io::RawFd;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use env_logger::Env;
use log::{error, info};
#[cfg(unix)]
use nix::sys::socket::{getsockopt, sockopt, SockType};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tokio::sync::mpsc;

use adns::io::{TokioIoConfig, TokioIoProvider};
use adns::server::Echo;

use crate::args::RunArgs;
use crate::config::{self, Config};

/// The specific [`Server`](adns::server::Server) type we use.
pub type Server = adns::server::Server<Echo>;

/// Runs the server.
pub fn run(args: RunArgs) {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    if let Err(e) = try_running(args) {
        let mut message = String::from("Failed to run:");
        for (i, cause) in e.chain().enumerate() {
            // Writing to a String cannot fail.
            let _ = write!(message, "\n[{}] {}", i + 1, cause);
        }
        message.push_str("\nExiting with failure.");
        error!("{}", message);
        process::exit(1);
    }
    info!("Exiting with success.");
}

fn try_running(run_args: RunArgs) -> Result<()> {
    info!(
        "adns daemon v{}.{}.{} starting.",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        env!("CARGO_PKG_VERSION_PATCH"),
    );

    // Take ownership of any passed sockets first, so that they are
    // closed if anything below fails.
    let passed = PassedSockets::adopt(&run_args).context("failed to adopt passed sockets")?;

    // Get the configuration, either from the file system or from the
    // command line arguments, as appropriate.
    let config = if let Some(ref config_path) = run_args.config {
        info!("Loading the configuration from {}.", config_path.display());
        config::load_from_path(config_path).context("failed to load the configuration")?
    } else {
        info!("Loading the configuration from the command line.");
        config::load_from_args(&run_args)
    };

    let mut server = Server::new(Echo);
    server.set_compression(config.compress);
    let server = Arc::new(server);

    // Set up signal handling. Signals are received on a dedicated
    // thread and forwarded into the runtime.
    let mut signals = set_up_signal_handling().context("failed to set up signal handling")?;
    let signals_handle = signals.handle();
    let (signal_sender, signal_receiver) = mpsc::unbounded_channel();
    thread::spawn(move || {
        for signal in signals.forever() {
            if signal_sender.send(signal).is_err() {
                break;
            }
        }
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the Tokio runtime")?;
    let result = runtime.block_on(serve(&config, passed, &server, signal_receiver));
    signals_handle.close();
    result
}

/// Serves until a termination signal arrives or a socket loop fails.
async fn serve(
    config: &Config,
    passed: PassedSockets,
    server: &Arc<Server>,
    mut signal_receiver: mpsc::UnboundedReceiver<i32>,
) -> Result<()> {
    let io_provider = bind_provider(config, passed)
        .await
        .context("failed to bind sockets")?;

    // Start the I/O provider.
    info!("Set-up is complete; starting the server.");
    let mut shutdown_controller = io_provider.start(server);

    // Wait for a termination signal or a failure.
    let outcome = tokio::select! {
        signal = signal_receiver.recv() => {
            let name = match signal {
                Some(SIGINT) => "SIGINT",
                Some(SIGTERM) => "SIGTERM",
                _ => "end of signal stream",
            };
            info!("Received {}; shutting down.", name);
            Ok(())
        }
        failure = shutdown_controller.wait_for_failure() => match failure {
            Some(e) => Err(anyhow::Error::new(e).context("a socket loop failed")),
            None => Err(anyhow!("no sockets are being served")),
        },
    };

    // Shut down the server.
    shutdown_controller.shut_down().await;
    info!("Shutdown complete.");
    outcome
}

/// Creates the I/O provider, adopting passed sockets and binding the
/// rest.
async fn bind_provider(config: &Config, passed: PassedSockets) -> Result<TokioIoProvider> {
    let io_config = TokioIoConfig::from(&config.io);
    let tcp_addrs = config.tcp.then_some(config.bind);

    if passed.udp.is_none() && passed.tcp.is_none() {
        return TokioIoProvider::bind(tcp_addrs, Some(config.bind), io_config)
            .await
            .with_context(|| format!("failed to bind {}", config.bind));
    }

    // A passed socket replaces binding for its transport only.
    let udp_socket = match passed.udp {
        Some(socket) => socket,
        None => UdpSocket::bind(config.bind)
            .with_context(|| format!("failed to bind UDP {}", config.bind))?,
    };
    let tcp_listener = match (passed.tcp, tcp_addrs) {
        (Some(listener), _) => Some(listener),
        (None, Some(addr)) => Some(
            TcpListener::bind(addr).with_context(|| format!("failed to bind TCP {addr}"))?,
        ),
        (None, None) => None,
    };
    TokioIoProvider::from_std(tcp_listener, Some(udp_socket), io_config)
        .context("failed to register passed sockets")
}

/// Sockets handed to us by a supervisor process.
#[derive(Debug, Default)]
struct PassedSockets {
    udp: Option<UdpSocket>,
    tcp: Option<TcpListener>,
}

impl PassedSockets {
    #[cfg(unix)]
    fn adopt(args: &RunArgs) -> Result<Self> {
        use std::os::unix::io::FromRawFd;

        if args.udp_fd.is_some() && args.udp_fd == args.tcp_fd {
            return Err(anyhow!("the UDP and TCP file descriptors must differ"));
        }
        if let Some(fd) = args.udp_fd {
            check_socket_type(fd, SockType::Datagram, "UDP")?;
        }
        if let Some(fd) = args.tcp_fd {
            check_socket_type(fd, SockType::Stream, "TCP")?;
        }

        // SAFETY: the descriptors were passed to this process for its
        // exclusive use, and each is adopted exactly once.
        let udp = args.udp_fd.map(|fd| unsafe { UdpSocket::from_raw_fd(fd) });
        let tcp = args.tcp_fd.map(|fd| unsafe { TcpListener::from_raw_fd(fd) });
        for (name, socket_addr) in [
            ("UDP", udp.as_ref().map(UdpSocket::local_addr)),
            ("TCP", tcp.as_ref().map(TcpListener::local_addr)),
        ] {
            if let Some(socket_addr) = socket_addr {
                let socket_addr = socket_addr
                    .with_context(|| format!("failed to get the address of the passed {name} socket"))?;
                info!("Adopted passed {} socket bound to {}.", name, socket_addr);
            }
        }
        Ok(Self { udp, tcp })
    }

    #[cfg(not(unix))]
    fn adopt(args: &RunArgs) -> Result<Self> {
        if args.udp_fd.is_some() || args.tcp_fd.is_some() {
            Err(anyhow!(
                "passing sockets by file descriptor is only supported on Unix"
            ))
        } else {
            Ok(Self::default())
        }
    }
}

/// Checks that `fd` is a socket of the `expected` type before it is
/// adopted.
#[cfg(unix)]
fn check_socket_type(fd: RawFd, expected: SockType, name: &str) -> Result<()> {
    let actual = getsockopt(fd, sockopt::SockType)
        .with_context(|| format!("the passed {name} descriptor is not a socket"))?;
    if actual == expected {
        Ok(())
    } else {
        Err(anyhow!(
            "the passed {name} descriptor is a {actual:?} socket, not a {expected:?} socket"
        ))
    }
}

fn set_up_signal_handling() -> Result<Signals> {
    let term_signals = &[SIGINT, SIGTERM];
    let already_terminating = Arc::new(AtomicBool::new(false));

    // This sets up signal handlers to exit immediately if a second
    // termination signal arrives before the process finishes shutting
    // down gracefully.
    for sig in term_signals {
        signal_hook::flag::register_conditional_shutdown(*sig, 1, already_terminating.clone())?;
        signal_hook::flag::register(*sig, already_terminating.clone())?;
    }

    Signals::new(term_signals).map_err(Into::into)
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(all(test, unix))]
mod tests {
    use std::fs::File;
    use std::os::unix::io::AsRawFd;

    use super::*;

    fn run_args(udp_fd: Option<RawFd>, tcp_fd: Option<RawFd>) -> RunArgs {
        RunArgs {
            config: None,
            bind: None,
            ip: None,
            port: None,
            no_tcp: false,
            udp_fd,
            tcp_fd,
        }
    }

    #[test]
    fn socket_types_are_checked() {
        let tcp = TcpListener::bind("127.0.0.1:0").unwrap();
        let udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        assert!(check_socket_type(tcp.as_raw_fd(), SockType::Stream, "TCP").is_ok());
        assert!(check_socket_type(udp.as_raw_fd(), SockType::Datagram, "UDP").is_ok());
        assert!(check_socket_type(tcp.as_raw_fd(), SockType::Datagram, "UDP").is_err());
        assert!(check_socket_type(udp.as_raw_fd(), SockType::Stream, "TCP").is_err());
    }

    #[test]
    fn non_sockets_are_rejected() {
        let file = File::open("/dev/null").unwrap();
        assert!(check_socket_type(file.as_raw_fd(), SockType::Datagram, "UDP").is_err());
    }

    #[test]
    fn swapped_descriptors_are_not_adopted() {
        let tcp = TcpListener::bind("127.0.0.1:0").unwrap();
        let udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        assert!(PassedSockets::adopt(&run_args(Some(tcp.as_raw_fd()), None)).is_err());
        assert!(PassedSockets::adopt(&run_args(None, Some(udp.as_raw_fd()))).is_err());
    }
}
