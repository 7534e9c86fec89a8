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

//! Implements command-line argument parsing.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// The adns authoritative DNS server
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the server
    Run(RunArgs),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Set the configuration file to use
    #[clap(long, conflicts_with_all = ["bind", "ip", "port", "no_tcp"], value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Set the server bind IP address and port
    #[clap(long, value_name = "IP:PORT")]
    pub bind: Option<SocketAddr>,

    /// Set the server bind IP address
    #[clap(long, conflicts_with = "bind", value_name = "IP")]
    pub ip: Option<IpAddr>,

    /// Set the server port
    #[clap(long, conflicts_with = "bind", value_name = "PORT")]
    pub port: Option<u16>,

    /// Do not listen for TCP connections
    #[clap(long)]
    pub no_tcp: bool,

    /// Serve UDP on an already-bound socket passed by file descriptor
    /// (Unix only)
    #[clap(long, value_name = "FD", value_parser = clap::value_parser!(i32).range(0..))]
    pub udp_fd: Option<i32>,

    /// Accept TCP connections on an already-listening socket passed by
    /// file descriptor (Unix only)
    #[clap(long, value_name = "FD", value_parser = clap::value_parser!(i32).range(0..))]
    pub tcp_fd: Option<i32>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse_run_args<'a>(args: impl IntoIterator<Item = &'a str>) -> clap::error::Result<RunArgs> {
        let args = ["adnsd", "run"].into_iter().chain(args);
        Args::try_parse_from(args).map(|args| match args.command {
            Command::Run(run_args) => run_args,
        })
    }

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn run_accepts_bind_and_fds() {
        let run_args =
            parse_run_args(["--bind", "127.0.0.1:5300", "--udp-fd", "3", "--no-tcp"]).unwrap();
        assert_eq!(run_args.bind, Some("127.0.0.1:5300".parse().unwrap()));
        assert_eq!(run_args.udp_fd, Some(3));
        assert_eq!(run_args.tcp_fd, None);
        assert!(run_args.no_tcp);
    }

    #[test]
    fn run_rejects_conflicting_sources() {
        assert!(parse_run_args(["--config", "adnsd.toml", "--port", "53"]).is_err());
        assert!(parse_run_args(["--bind", "[::1]:53", "--ip", "::1"]).is_err());
    }

    #[test]
    fn run_rejects_negative_fds() {
        assert!(parse_run_args(["--tcp-fd", "-1"]).is_err());
    }
}
