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

//! Implements the server configuration file.

use std::fmt::{self, Write};
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use serde::{de, Deserialize};

use adns::io::TokioIoConfig;

use crate::args::RunArgs;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the server configuration from the file given by `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config = fs::read(path.as_ref()).context("failed to read the configuration file")?;
    let config: Config =
        toml::from_slice(&raw_config).context("failed to parse the configuration file")?;
    log_config_summary(&config);
    Ok(config)
}

/// Loads the server configuration from the parsed command line
/// arguments given by `args`.
pub fn load_from_args(args: &RunArgs) -> Config {
    let bind = args.bind.unwrap_or_else(|| {
        let ip = args.ip.unwrap_or(DEFAULT_BIND_IP);
        let port = args.port.unwrap_or(DEFAULT_BIND_PORT);
        SocketAddr::new(ip, port)
    });

    let config = Config {
        bind,
        tcp: !args.no_tcp,
        compress: false,
        io: IoConfig::default(),
    };
    log_config_summary(&config);
    config
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        // Don't compute the message if it will never be printed.
        return;
    }

    let mut message = format!(
        "Configuration loaded:\n\
         Bind address:     {}\n\
         TCP:              {}\n\
         Compression:      {}\n\
         UDP payload size: {}\n\
         Handler timeout:  {}s\n\
         Fatal errors:     ",
        config.bind,
        enabled(config.tcp),
        enabled(config.compress),
        config.io.udp_payload_size,
        config.io.handler_timeout,
    );
    if config.io.fatal_recv_errors.is_empty() {
        message.push_str("none");
    }
    for (i, kind) in config.io.fatal_recv_errors.iter().enumerate() {
        if i > 0 {
            message.push_str(", ");
        }
        // Writing to a String cannot fail.
        let _ = write!(message, "{kind}");
    }
    debug!("{}", message);
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The complete configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_tcp")]
    pub tcp: bool,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub io: IoConfig,
}

const DEFAULT_BIND_IP: IpAddr = IpAddr::V6(Ipv6Addr::LOCALHOST);
const DEFAULT_BIND_PORT: u16 = 53;

fn default_bind() -> SocketAddr {
    SocketAddr::new(DEFAULT_BIND_IP, DEFAULT_BIND_PORT)
}

fn default_tcp() -> bool {
    true
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: I/O                                         //
////////////////////////////////////////////////////////////////////////

/// Configuration for the [`TokioIoProvider`](adns::io::TokioIoProvider).
/// This mirrors [`TokioIoConfig`] and can be converted into one; its
/// purpose is basically to make the configuration deserializable and to
/// provide defaults.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoConfig {
    #[serde(default = "default_udp_payload_size")]
    pub udp_payload_size: usize,
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout: u64,
    #[serde(default = "default_fatal_recv_errors")]
    pub fatal_recv_errors: Vec<ConfigErrorKind>,
}

fn default_udp_payload_size() -> usize {
    TokioIoConfig::default().udp_payload_size
}

fn default_handler_timeout() -> u64 {
    TokioIoConfig::default().handler_timeout.as_secs()
}

fn default_fatal_recv_errors() -> Vec<ConfigErrorKind> {
    TokioIoConfig::default()
        .fatal_recv_errors
        .into_iter()
        .map(ConfigErrorKind)
        .collect()
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            udp_payload_size: default_udp_payload_size(),
            handler_timeout: default_handler_timeout(),
            fatal_recv_errors: default_fatal_recv_errors(),
        }
    }
}

impl From<&IoConfig> for TokioIoConfig {
    fn from(toml_config: &IoConfig) -> Self {
        Self {
            udp_payload_size: toml_config.udp_payload_size,
            handler_timeout: Duration::from_secs(toml_config.handler_timeout),
            fatal_recv_errors: toml_config.fatal_recv_errors.iter().map(|k| k.0).collect(),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// WRAPPERS FOR SERDE                                                 //
////////////////////////////////////////////////////////////////////////

/// The I/O error kinds that can be named in the configuration file,
/// with their names.
const ERROR_KIND_NAMES: &[(&str, io::ErrorKind)] = &[
    ("addr_in_use", io::ErrorKind::AddrInUse),
    ("addr_not_available", io::ErrorKind::AddrNotAvailable),
    ("broken_pipe", io::ErrorKind::BrokenPipe),
    ("connection_aborted", io::ErrorKind::ConnectionAborted),
    ("connection_refused", io::ErrorKind::ConnectionRefused),
    ("connection_reset", io::ErrorKind::ConnectionReset),
    ("interrupted", io::ErrorKind::Interrupted),
    ("invalid_data", io::ErrorKind::InvalidData),
    ("invalid_input", io::ErrorKind::InvalidInput),
    ("not_connected", io::ErrorKind::NotConnected),
    ("not_found", io::ErrorKind::NotFound),
    ("other", io::ErrorKind::Other),
    ("out_of_memory", io::ErrorKind::OutOfMemory),
    ("permission_denied", io::ErrorKind::PermissionDenied),
    ("timed_out", io::ErrorKind::TimedOut),
    ("unsupported", io::ErrorKind::Unsupported),
    ("would_block", io::ErrorKind::WouldBlock),
];

/// A deserializable wrapper over [`io::ErrorKind`], named in
/// `snake_case`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConfigErrorKind(pub io::ErrorKind);

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match ERROR_KIND_NAMES.iter().find(|(_, kind)| *kind == self.0) {
            Some((name, _)) => f.write_str(name),
            None => write!(f, "{:?}", self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigErrorKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_str(ConfigErrorKindVisitor)
    }
}

#[derive(Debug)]
struct ConfigErrorKindVisitor;

impl<'de> de::Visitor<'de> for ConfigErrorKindVisitor {
    type Value = ConfigErrorKind;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("I/O error kind")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        ERROR_KIND_NAMES
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, kind)| ConfigErrorKind(*kind))
            .ok_or_else(|| E::custom(format!("invalid I/O error kind: {value}")))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
