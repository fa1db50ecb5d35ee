//! A command-line client for SOCKS proxies.
//!
//! `socksc` reads a list of proxies from its configuration, and uses
//! them to:
//!
//! * open a tunnel to a host, send some lines, and print what comes
//!   back (`socksc connect`);
//! * ask a proxy to wait for a connection from some peer (`socksc bind`);
//! * send a UDP datagram through a proxy's relay, and print the answer
//!   (`socksc associate`);
//! * open a tunnel through every configured proxy in turn
//!   (`socksc chain`).
//!
//! This is a demo; you get no stability guarantee.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

mod cmdline;
mod demo;
mod settings;

use socks_rtcompat::SpawnBlocking;

use anyhow::Result;
use argh::FromArgs;
use tracing::Level;

#[derive(FromArgs, Debug)]
/// Connect to things through SOCKS proxies.
///
/// This is a demo; you get no stability guarantee.
struct Args {
    /// override the default location(s) for the configuration file
    #[argh(option, short = 'f')]
    rc: Vec<String>,
    /// override a configuration option (uses toml syntax)
    #[argh(option, short = 'c')]
    cfg: Vec<String>,
    /// what to do
    #[argh(subcommand)]
    cmd: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
/// The things that socksc can do.
enum Command {
    /// Open a tunnel through one proxy.
    Connect(ConnectArgs),
    /// Wait for a connection through one proxy.
    Bind(BindArgs),
    /// Send a datagram through a proxy's UDP relay.
    Associate(AssociateArgs),
    /// Open a tunnel through all the proxies.
    Chain(ChainArgs),
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "connect")]
/// Open a tunnel through the first configured proxy.
struct ConnectArgs {
    /// host to connect to
    #[argh(positional)]
    host: String,
    /// port to connect to
    #[argh(positional)]
    port: u16,
    /// a line to send once connected (may be repeated)
    #[argh(option, short = 's')]
    send: Vec<String>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "bind")]
/// Ask the first configured proxy to accept one connection for us.
struct BindArgs {
    /// the host we expect the connection from
    #[argh(positional)]
    peer: String,
    /// the port we expect the connection from (0 if unknown)
    #[argh(positional, default = "0")]
    port: u16,
    /// a line to send once the peer arrives (may be repeated)
    #[argh(option, short = 's')]
    send: Vec<String>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "associate")]
/// Send one datagram through the first configured proxy, and wait for
/// an answer.
struct AssociateArgs {
    /// host to send the datagram to
    #[argh(positional)]
    host: String,
    /// port to send the datagram to
    #[argh(positional)]
    port: u16,
    /// what to put in the datagram
    #[argh(positional)]
    payload: String,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "chain")]
/// Open a tunnel through every configured proxy.
struct ChainArgs {
    /// host to connect to
    #[argh(positional)]
    host: String,
    /// port to connect to
    #[argh(positional)]
    port: u16,
    /// a line to send once connected (may be repeated)
    #[argh(option, short = 's')]
    send: Vec<String>,
}

/// Send our logs to stderr.
fn setup_logging(config: &settings::SockscConfig) {
    let level = if config.trace() {
        Level::TRACE
    } else {
        Level::DEBUG
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let config = settings::load(settings::default_config_file(), &args.rc, &args.cfg)?;

    setup_logging(&config);

    let runtime = socks_rtcompat::tokio::create_runtime()?;
    let rt_copy = runtime.clone();
    rt_copy.block_on(demo::run(runtime, config, args.cmd))
}
