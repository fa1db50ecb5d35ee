//! The client side of SOCKS4, SOCKS4a and SOCKS5, with no IO.
//!
//! A [`ClientHandshake`] is built from a [`SocksRequest`].  It tells
//! its caller what to write to the proxy, and turns whatever the proxy
//! writes back into an [`Action`]: how many bytes it used, what to
//! send next, and at the end a [`HandshakeEvent`] or an [`Error`].
//! Getting the bytes to and from a socket is someone else's job.
//!
//! [`UdpFrame`] handles the header that a SOCKS5 UDP relay puts in
//! front of every datagram.
//!
//! References:
//!
//!   * [RFC 1928](https://tools.ietf.org/html/rfc1928): SOCKS5.
//!   * [RFC 1929](https://tools.ietf.org/html/rfc1929): the SOCKS5
//!     username/password method.
//!   * SOCKS4 and SOCKS4a never had an RFC; the
//!     [wikipedia article](https://en.wikipedia.org/wiki/SOCKS) is as
//!     good a description as any.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]

mod err;
mod handshake;
mod msg;
mod udp;

pub use err::{Error, Stage};
pub use handshake::{Action, ClientHandshake, ConnectionState, HandshakeEvent};
pub use msg::{
    AddrType, AuthMethod, CustomAuth, RemoteHost, Socks4Status, SocksAddr, SocksAuth, SocksCmd,
    SocksHostname, SocksRequest, SocksStatus, SocksVersion,
};
pub use udp::UdpFrame;

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
