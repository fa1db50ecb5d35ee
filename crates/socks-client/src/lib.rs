//! An async client for SOCKS4, SOCKS4a, and SOCKS5 proxies.
//!
//! # Overview
//!
//! This crate opens streams through SOCKS proxies.  It supports all
//! three SOCKS commands:
//!
//!  * CONNECT, to reach a remote TCP address through the proxy
//!    ([`connect`] or [`create_connection`]);
//!  * BIND, to have the proxy accept one incoming TCP connection for us
//!    ([`connect`], then [`Bound::accept`]);
//!  * UDP_ASSOCIATE, to have the proxy relay datagrams for us
//!    ([`connect`]; datagrams are framed with [`UdpFrame`]).
//!
//! It can also build a tunnel through a chain of proxies
//! ([`connect_chain`]).
//!
//! The protocol itself lives in `socks-proto`, which does no IO.  This
//! crate runs it over streams from a [`Runtime`](socks_rtcompat::Runtime),
//! enforcing timeouts and checking options before anything is sent.
//!
//! # Example
//!
//! ```no_run
//! use socks_client::{create_connection, ProxyDescriptor, SocksClientOptions};
//! use socks_rtcompat::SpawnBlocking;
//! use futures::io::AsyncWriteExt;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = socks_rtcompat::create_runtime()?;
//! let proxy = ProxyDescriptor::new("127.0.0.1", 1080, 5);
//! let options = SocksClientOptions::new("example.com:80".parse()?, proxy);
//! runtime.block_on(async {
//!     let mut conn = create_connection(&runtime, &options).await?;
//!     conn.stream_mut().write_all(b"GET / HTTP/1.0\r\n\r\n").await?;
//!     Ok::<_, Box<dyn std::error::Error>>(())
//! })
//! # }
//! ```

#![deny(missing_docs)]
#![warn(noop_method_call)]
#![deny(unreachable_pub)]
#![deny(clippy::await_holding_lock)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![warn(clippy::rc_buffer)]
#![deny(clippy::ref_option_ref)]
#![warn(clippy::trait_duplication_in_bounds)]
#![warn(clippy::unseparated_literal_suffix)]

mod callback;
mod chain;
mod client;
mod err;
mod options;
mod stream;

pub use callback::with_callback;
pub use chain::{connect_chain, connect_chain_with_rng};
pub use client::{connect, connect_over, create_connection, Bound, Established, SocksEvent};
pub use err::{Error, ErrorContext, ErrorKind};
pub use options::{
    AuthCheckFn, AuthRequestFn, BoundTimeout, ChainOptions, Credentials, CustomAuthOptions,
    ProxyDescriptor, SocksClientOptions, DEFAULT_TIMEOUT, MAX_TIMEOUT,
};
pub use stream::SocksStream;

pub use socks_proto::{ConnectionState, RemoteHost, SocksCmd, UdpFrame};

/// A Result type for the socks-client crate.
pub type Result<T> = std::result::Result<T, Error>;
