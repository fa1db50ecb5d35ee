//! Declare an error type for socks_proto
use thiserror::Error;

use crate::msg::{AuthMethod, Socks4Status, SocksStatus};
use std::fmt;

/// The point in a SOCKS exchange at which a message was malformed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Stage {
    /// Opening the transport to the proxy.
    Connecting,
    /// SOCKS5: the proxy's choice of authentication method.
    MethodSelection,
    /// SOCKS5: the proxy's answer to our authentication.
    Authentication,
    /// The proxy's answer to our request.
    Reply,
    /// BIND: the proxy's report that a peer has connected.
    IncomingConnection,
    /// A UDP relay frame.
    UdpFrame,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Connecting => "connecting",
            Stage::MethodSelection => "method selection",
            Stage::Authentication => "authentication",
            Stage::Reply => "request reply",
            Stage::IncomingConnection => "incoming connection",
            Stage::UdpFrame => "UDP frame",
        };
        f.write_str(s)
    }
}

/// An error that occurs while negotiating a SOCKS handshake with a
/// proxy, or while encoding or decoding a SOCKS message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A message was incomplete; wait for more bytes and try again.
    #[error("Message truncated; need to wait for more")]
    Truncated,

    /// The proxy didn't implement SOCKS correctly.
    #[error("SOCKS protocol syntax violation during {0}")]
    Syntax(Stage),

    /// The proxy answered with a SOCKS version number other than the
    /// one we were speaking.
    #[error("Unexpected SOCKS protocol version {0} in reply")]
    BadProtocol(u8),

    /// We were asked to send something that can't be expressed in
    /// SOCKS.
    #[error("Invalid SOCKS request: {0}")]
    BadRequest(&'static str),

    /// We were asked to use a feature that this SOCKS version doesn't
    /// have.
    #[error("SOCKS feature not supported: {0}")]
    NoSupport(&'static str),

    /// The proxy accepted none of the authentication methods we offered.
    #[error("Proxy accepted none of our authentication methods")]
    NoAcceptableMethod,

    /// The proxy picked an authentication method that we never offered.
    #[error("Proxy selected an authentication method we didn't offer: {0}")]
    UnexpectedMethod(AuthMethod),

    /// The proxy didn't accept our authentication.
    #[error("Proxy rejected our authentication")]
    AuthRejected,

    /// A SOCKS4 proxy refused our request.
    #[error("SOCKS4 proxy rejected the request: {0}")]
    Socks4Rejected(Socks4Status),

    /// A SOCKS5 proxy refused our request.
    #[error("SOCKS5 proxy rejected the request: {0}")]
    Socks5Rejected(SocksStatus),

    /// Tried to progress the SOCKS handshake when it was already
    /// finished.  This is a programming error.
    #[error("SOCKS handshake was finished; no need to call this again")]
    AlreadyFinished,

    /// Something went wrong with the programming of this module.
    #[error("Internal programming error while handling SOCKS handshake")]
    Internal,
}

impl Error {
    /// Return true if this error means that the proxy refused us,
    /// rather than that something was wrong with the conversation.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::AuthRejected | Error::Socks4Rejected(_) | Error::Socks5Rejected(_)
        )
    }
}

/// Helper: convert a decoding failure into an [`Error`] that names the
/// stage where it happened.
pub(crate) trait StageExt<T> {
    /// Map a truncation to [`Error::Truncated`], and anything else to
    /// [`Error::Syntax`] at `stage`.
    fn at(self, stage: Stage) -> Result<T, Error>;
}

impl<T> StageExt<T> for socks_bytes::Result<T> {
    fn at(self, stage: Stage) -> Result<T, Error> {
        self.map_err(|e| match e {
            socks_bytes::Error::Truncated => Error::Truncated,
            _ => Error::Syntax(stage),
        })
    }
}
