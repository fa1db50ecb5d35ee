//! Types to implement the client side of a SOCKS handshake.

use crate::err::{Stage, StageExt};
use crate::msg::{
    AuthMethod, RemoteHost, SocksAddr, SocksCmd, SocksRequest, SocksStatus, SocksVersion,
    Socks4Status,
};
use crate::{Error, Result};

use socks_bytes::Reader;

use std::fmt;
use std::net::Ipv4Addr;

/// An ongoing SOCKS handshake with a proxy.
///
/// To perform a handshake, call [`ClientHandshake::begin_connect`] when
/// starting to open the transport, and [`ClientHandshake::connected`]
/// once it is open; send the resulting reply to the proxy.  Then call
/// [`ClientHandshake::handshake`] repeatedly with the bytes that the
/// proxy has sent, until the resulting [`Action`] carries an event
/// or an error comes back.
///
/// The handshake never does any IO of its own.
#[derive(Clone, Debug)]
pub struct ClientHandshake {
    /// What we're asking the proxy for.
    request: SocksRequest,
    /// Current state of the handshake. Each completed message
    /// advances the state.
    state: ConnectionState,
    /// SOCKS5: the authentication method the proxy chose.
    method: Option<AuthMethod>,
}

/// Possible states for a connection to a SOCKS proxy.
///
/// The states only move forward.  Once in [`ConnectionState::Error`] or
/// [`ConnectionState::Closed`], a connection stays there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Nothing has happened yet.
    Created,
    /// We're opening the transport to the proxy.
    Connecting,
    /// The transport is open.
    Connected,
    /// We've sent our SOCKS4 request or SOCKS5 greeting.
    SentInitialHandshake,
    /// SOCKS5: the proxy has chosen an authentication method.
    ReceivedInitialHandshakeResponse,
    /// SOCKS5: we've sent our authentication.
    SentAuthentication,
    /// SOCKS5: the proxy has accepted our authentication.
    ReceivedAuthenticationResponse,
    /// SOCKS5: we've sent our command request.
    SentFinalHandshake,
    /// The proxy has granted our request.
    ReceivedFinalResponse,
    /// BIND: the proxy is listening, and we're waiting for a peer to
    /// connect to it.
    BoundWaitingForConnection,
    /// The tunnel (or UDP association) is ready.
    Established,
    /// Something went wrong.
    Error,
    /// The connection was shut down deliberately.
    Closed,
}

impl ConnectionState {
    /// Return true if no further transition is possible out of this
    /// state except for closing.
    fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Established | ConnectionState::Error | ConnectionState::Closed
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Something that happened during a handshake that the caller needs to
/// hear about.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum HandshakeEvent {
    /// BIND: the proxy is listening at this address for a peer to
    /// connect.  More input will follow.
    Bound(RemoteHost),
    /// The handshake is done.
    ///
    /// For CONNECT, there is no address.  For UDP_ASSOCIATE, the address
    /// is where the proxy relays datagrams.  For BIND, it is the address
    /// of the peer that connected.
    Established(Option<RemoteHost>),
}

/// An action to take in response to a SOCKS handshake message.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct Action {
    /// If nonzero, this many bytes should be drained from the
    /// proxy's inputs.
    pub drain: usize,
    /// If nonempty, this message should be sent to the proxy.
    pub reply: Vec<u8>,
    /// If present, the caller has reached a milestone.
    pub event: Option<HandshakeEvent>,
}

impl ClientHandshake {
    /// Construct a new ClientHandshake in its initial state
    pub fn new(request: SocksRequest) -> Self {
        ClientHandshake {
            request,
            state: ConnectionState::Created,
            method: None,
        }
    }

    /// Return the request that this handshake is trying to make.
    pub fn request(&self) -> &SocksRequest {
        &self.request
    }

    /// Return the current state of this handshake.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Return true if this handshake is over, successfully or not.
    ///
    /// A BIND that is waiting for its peer isn't over.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Note that the transport to the proxy is being opened.
    pub fn begin_connect(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Created => {
                self.state = ConnectionState::Connecting;
                Ok(())
            }
            s if s.is_terminal() => Err(Error::AlreadyFinished),
            _ => Err(Error::Internal),
        }
    }

    /// Note that the transport to the proxy is open, and return the
    /// first message to send.
    pub fn connected(&mut self) -> Result<Action> {
        match self.state {
            ConnectionState::Connecting => {}
            s if s.is_terminal() => return Err(Error::AlreadyFinished),
            _ => return Err(Error::Internal),
        }
        self.state = ConnectionState::Connected;

        let reply = match self.request.version() {
            SocksVersion::V4 => self.request.s4_request(),
            SocksVersion::V5 => self.request.s5_greeting(),
        };
        self.state = ConnectionState::SentInitialHandshake;
        Ok(Action {
            reply,
            ..Action::default()
        })
    }

    /// Try to advance a ClientHandshake, given some proxy input in
    /// `input`.
    ///
    /// If there isn't enough input, gives [`Error::Truncated`]: call
    /// again once more bytes have arrived.  Other errors indicate a
    /// failure, and leave the handshake in [`ConnectionState::Error`].
    ///
    /// On success, return an Action describing what to tell the proxy,
    /// and how much of its input to consume.
    pub fn handshake(&mut self, input: &[u8]) -> Result<Action> {
        use ConnectionState as S;
        use SocksVersion::*;
        if self.state.is_terminal() {
            return Err(Error::AlreadyFinished);
        }
        if input.is_empty() {
            return Err(Error::Truncated);
        }

        let result = match (self.state, self.request.version()) {
            (S::SentInitialHandshake, V4) => self.s4_reply(input),
            (S::SentInitialHandshake, V5) => self.s5_method(input),
            (S::SentAuthentication, V5) => self.s5_auth(input),
            (S::SentFinalHandshake, V5) => self.s5_reply(input),
            (S::BoundWaitingForConnection, V4) => self.s4_incoming(input),
            (S::BoundWaitingForConnection, V5) => self.s5_incoming(input),
            (_, _) => Err(Error::Internal),
        };

        match result {
            Err(Error::Truncated) => Err(Error::Truncated),
            Err(e) => {
                self.state = ConnectionState::Error;
                Err(e)
            }
            ok => ok,
        }
    }

    /// Move this handshake into the error state because of `err`,
    /// which came from outside the handshake (a transport failure, or a
    /// timeout).
    ///
    /// Returns `err` if this is the first way that the handshake ended,
    /// and None if it had already ended.
    pub fn fail<E>(&mut self, err: E) -> Option<E> {
        if self.state.is_terminal() {
            None
        } else {
            self.state = ConnectionState::Error;
            Some(err)
        }
    }

    /// Move this handshake into the closed state.
    ///
    /// Returns true if the handshake was not already in an error or
    /// closed state.
    pub fn close(&mut self) -> bool {
        match self.state {
            ConnectionState::Error | ConnectionState::Closed => false,
            _ => {
                self.state = ConnectionState::Closed;
                true
            }
        }
    }

    /// Return the error that describes a transport that closed while
    /// a partial message was waiting in our input.
    pub fn truncated(&self) -> Error {
        Error::Syntax(self.stage())
    }

    /// Return the stage of the exchange that we're in, for use in
    /// error messages.
    pub fn stage(&self) -> Stage {
        use ConnectionState as S;
        match (self.state, self.request.version()) {
            (S::Created, _) | (S::Connecting, _) | (S::Connected, _) => Stage::Connecting,
            (S::SentInitialHandshake, SocksVersion::V5) => Stage::MethodSelection,
            (S::ReceivedInitialHandshakeResponse, _) | (S::SentAuthentication, _) => {
                Stage::Authentication
            }
            (S::BoundWaitingForConnection, _) => Stage::IncomingConnection,
            (_, _) => Stage::Reply,
        }
    }

    /// Handle the single SOCKS4 reply to our request.
    fn s4_reply(&mut self, input: &[u8]) -> Result<Action> {
        let (host, drain) = self.s4_parse(input, Stage::Reply)?;
        self.state = ConnectionState::ReceivedFinalResponse;

        let event = if self.request.command() == SocksCmd::BIND {
            let host = self.request.reported_host(host.0, host.1, true);
            self.state = ConnectionState::BoundWaitingForConnection;
            HandshakeEvent::Bound(host)
        } else {
            self.state = ConnectionState::Established;
            HandshakeEvent::Established(None)
        };
        Ok(Action {
            drain,
            reply: Vec::new(),
            event: Some(event),
        })
    }

    /// SOCKS4 BIND: handle the second reply, telling us that a peer
    /// arrived.
    fn s4_incoming(&mut self, input: &[u8]) -> Result<Action> {
        let (host, drain) = self.s4_parse(input, Stage::IncomingConnection)?;
        let host = self.request.reported_host(host.0, host.1, false);
        self.state = ConnectionState::Established;
        Ok(Action {
            drain,
            reply: Vec::new(),
            event: Some(HandshakeEvent::Established(Some(host))),
        })
    }

    /// Decode a SOCKS4 reply, failing unless it grants our request.
    ///
    /// The first byte is ignored: it should be zero, but proxies
    /// disagree.
    fn s4_parse(&self, input: &[u8], stage: Stage) -> Result<((SocksAddr, u16), usize)> {
        let mut r = Reader::from_slice(input);
        let _version = r.take_u8().at(stage)?;
        let status: Socks4Status = r.take_u8().at(stage)?.into();
        let port = r.take_u16().at(stage)?;
        let ip: Ipv4Addr = r.extract().at(stage)?;
        if status != Socks4Status::GRANTED {
            return Err(Error::Socks4Rejected(status));
        }
        Ok(((SocksAddr::Ip(ip.into()), port), r.consumed()))
    }

    /// SOCKS5: handle the proxy's choice of authentication method.
    fn s5_method(&mut self, input: &[u8]) -> Result<Action> {
        let stage = Stage::MethodSelection;
        let mut r = Reader::from_slice(input);
        let version = r.take_u8().at(stage)?;
        if version != 5 {
            return Err(Error::BadProtocol(version));
        }
        let method: AuthMethod = r.take_u8().at(stage)?.into();
        r.should_be_exhausted().at(stage)?;
        self.state = ConnectionState::ReceivedInitialHandshakeResponse;

        if method == AuthMethod::NO_ACCEPTABLE {
            return Err(Error::NoAcceptableMethod);
        }
        if !self.request.auth().offered_methods().contains(&method) {
            return Err(Error::UnexpectedMethod(method));
        }
        self.method = Some(method);

        let reply = if method == AuthMethod::NO_AUTH {
            self.state = ConnectionState::SentFinalHandshake;
            self.request.s5_request()
        } else if method == AuthMethod::USERNAME_PASSWORD {
            self.state = ConnectionState::SentAuthentication;
            self.request.s5_userpass()
        } else {
            let custom = self.request.auth().custom().ok_or(Error::Internal)?;
            self.state = ConnectionState::SentAuthentication;
            custom.request()
        };

        Ok(Action {
            drain: r.consumed(),
            reply,
            event: None,
        })
    }

    /// SOCKS5: handle the proxy's answer to our authentication.
    fn s5_auth(&mut self, input: &[u8]) -> Result<Action> {
        let stage = Stage::Authentication;
        let mut r = Reader::from_slice(input);
        let accepted = match self.method {
            Some(AuthMethod::USERNAME_PASSWORD) => {
                let _version = r.take_u8().at(stage)?;
                let status = r.take_u8().at(stage)?;
                status == 0
            }
            Some(m) if m.is_private() => {
                let custom = self.request.auth().custom().ok_or(Error::Internal)?;
                let response = r.take(custom.response_len()).at(stage)?;
                custom.check(response)
            }
            _ => return Err(Error::Internal),
        };
        r.should_be_exhausted().at(stage)?;
        if !accepted {
            return Err(Error::AuthRejected);
        }
        self.state = ConnectionState::ReceivedAuthenticationResponse;

        let reply = self.request.s5_request();
        self.state = ConnectionState::SentFinalHandshake;
        Ok(Action {
            drain: r.consumed(),
            reply,
            event: None,
        })
    }

    /// SOCKS5: handle the reply to our command request.
    fn s5_reply(&mut self, input: &[u8]) -> Result<Action> {
        let (addr, port, drain) = s5_parse(input, Stage::Reply)?;
        self.state = ConnectionState::ReceivedFinalResponse;

        let event = match self.request.command() {
            SocksCmd::BIND => {
                self.state = ConnectionState::BoundWaitingForConnection;
                HandshakeEvent::Bound(self.request.reported_host(addr, port, true))
            }
            SocksCmd::UDP_ASSOCIATE => {
                self.state = ConnectionState::Established;
                let relay = self.request.reported_host(addr, port, true);
                HandshakeEvent::Established(Some(relay))
            }
            _ => {
                self.state = ConnectionState::Established;
                HandshakeEvent::Established(None)
            }
        };
        Ok(Action {
            drain,
            reply: Vec::new(),
            event: Some(event),
        })
    }

    /// SOCKS5 BIND: handle the second reply, telling us that a peer
    /// arrived.
    fn s5_incoming(&mut self, input: &[u8]) -> Result<Action> {
        let (addr, port, drain) = s5_parse(input, Stage::IncomingConnection)?;
        let host = self.request.reported_host(addr, port, true);
        self.state = ConnectionState::Established;
        Ok(Action {
            drain,
            reply: Vec::new(),
            event: Some(HandshakeEvent::Established(Some(host))),
        })
    }
}

/// Decode a SOCKS5 reply, failing unless it grants our request.
///
/// Returns the address, the port, and the length of the reply.
fn s5_parse(input: &[u8], stage: Stage) -> Result<(SocksAddr, u16, usize)> {
    let mut r = Reader::from_slice(input);
    let version = r.take_u8().at(stage)?;
    if version != 5 {
        return Err(Error::BadProtocol(version));
    }
    let status: SocksStatus = r.take_u8().at(stage)?.into();
    if status != SocksStatus::SUCCEEDED {
        return Err(Error::Socks5Rejected(status));
    }
    let _reserved = r.take_u8().at(stage)?;
    let addr: SocksAddr = r.extract().at(stage)?;
    let port = r.take_u16().at(stage)?;
    Ok((addr, port, r.consumed()))
}
