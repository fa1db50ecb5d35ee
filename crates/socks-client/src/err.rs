//! Declare error types for socks-client

use crate::options::{ChainOptions, SocksClientOptions};
use std::sync::Arc;
use thiserror::Error;

/// An error returned while talking to a SOCKS proxy.
///
/// Every error carries an [`ErrorKind`] saying what went wrong, and an
/// [`ErrorContext`] with the options of the request that failed.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct Error {
    /// What went wrong.
    kind: ErrorKind,
    /// What we were trying to do.
    context: ErrorContext,
}

/// The different ways that a SOCKS request can fail.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The options were unusable; nothing was sent.
    #[error("Invalid options: {0}")]
    Validation(String),

    /// The proxy said something that we couldn't make sense of, or
    /// picked an authentication method that we can't do.
    #[error("SOCKS negotiation failed: {0}")]
    Negotiation(socks_proto::Error),

    /// The proxy understood us, and said no.
    #[error("Request rejected: {0}")]
    Rejected(socks_proto::Error),

    /// The stream to the proxy failed.
    #[error("I/O error on proxy connection: {0}")]
    Transport(Arc<std::io::Error>),

    /// The proxy closed the stream between messages.
    #[error("Proxy closed the connection")]
    TransportClosed,

    /// We didn't finish in time.
    #[error("SOCKS negotiation timed out")]
    Timeout,

    /// The proxy sent more than we were willing to buffer.
    #[error("Receive buffer overflow: {0}")]
    Capacity(socks_bytes::Error),
}

/// The request that an [`Error`] happened on.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ErrorContext {
    /// A request through a single proxy (or one hop of a chain).
    Connection(Box<SocksClientOptions>),
    /// A request through a chain of proxies, that failed before any hop
    /// was tried.
    Chain(Box<ChainOptions>),
}

impl Error {
    /// Construct a new Error.
    pub fn new(kind: ErrorKind, context: ErrorContext) -> Self {
        Error { kind, context }
    }

    /// Return what went wrong.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Return the request that failed.
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Consume this error and return its kind.
    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }
}

impl ErrorKind {
    /// Attach the options of a single-proxy request to this error.
    pub(crate) fn on(self, options: &SocksClientOptions) -> Error {
        Error::new(self, ErrorContext::Connection(Box::new(options.clone())))
    }

    /// Attach the options of a chain request to this error.
    pub(crate) fn on_chain(self, options: &ChainOptions) -> Error {
        Error::new(self, ErrorContext::Chain(Box::new(options.clone())))
    }
}

impl From<socks_proto::Error> for ErrorKind {
    fn from(e: socks_proto::Error) -> ErrorKind {
        if e.is_rejection() {
            ErrorKind::Rejected(e)
        } else {
            ErrorKind::Negotiation(e)
        }
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(e: std::io::Error) -> ErrorKind {
        ErrorKind::Transport(Arc::new(e))
    }
}
