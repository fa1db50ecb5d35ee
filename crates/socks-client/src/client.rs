//! Drive a [`ClientHandshake`] over a real (or mock) stream.

use crate::err::ErrorKind;
use crate::options::{BoundTimeout, SocksClientOptions, ALL_COMMANDS};
use crate::stream::SocksStream;
use crate::Result;

use socks_bytes::ReceiveBuffer;
use socks_proto::{ClientHandshake, ConnectionState, HandshakeEvent, RemoteHost, SocksCmd, SocksRequest};
use socks_rtcompat::{Runtime, SleepProvider, SleepProviderExt, TcpProvider};

use futures::future::{self, Future};
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::io::Result as IoResult;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, trace};

/// How many bytes we ask for with each read from the proxy.
const READ_CHUNK: usize = 1024;

/// The successful outcome of a request to a SOCKS proxy.
#[allow(clippy::exhaustive_enums)]
pub enum SocksEvent<R, S> {
    /// The request is done.  For CONNECT, there's now a tunnel to the
    /// destination; for UDP_ASSOCIATE, the proxy is ready to relay
    /// datagrams.
    Established(Established<S>),
    /// A BIND request was granted: the proxy is listening, and a peer
    /// can now connect to it.
    Bound(Bound<R, S>),
}

impl<R, S> SocksEvent<R, S> {
    /// Return the [`Established`] in this event, if there is one.
    pub fn into_established(self) -> Option<Established<S>> {
        match self {
            SocksEvent::Established(e) => Some(e),
            SocksEvent::Bound(_) => None,
        }
    }

    /// Return the [`Bound`] in this event, if there is one.
    pub fn into_bound(self) -> Option<Bound<R, S>> {
        match self {
            SocksEvent::Established(_) => None,
            SocksEvent::Bound(b) => Some(b),
        }
    }
}

/// A stream through a proxy, ready to use.
pub struct Established<S> {
    /// The stream to the proxy.  For CONNECT and BIND, it carries the
    /// tunneled data.  For UDP_ASSOCIATE, it must stay open for as long
    /// as the relay is in use.
    stream: SocksStream<S>,
    /// For BIND, the peer that connected; for UDP_ASSOCIATE, the
    /// address where the proxy relays datagrams.
    remote_host: Option<RemoteHost>,
}

impl<S> Established<S> {
    /// Return the address that the proxy gave us, if any.
    ///
    /// After a BIND, this is the peer that connected.  After a
    /// UDP_ASSOCIATE, this is where to send datagrams.  After a
    /// CONNECT, there is none.
    pub fn remote_host(&self) -> Option<&RemoteHost> {
        self.remote_host.as_ref()
    }

    /// Return a reference to the stream.
    pub fn stream(&self) -> &SocksStream<S> {
        &self.stream
    }

    /// Return a mutable reference to the stream.
    pub fn stream_mut(&mut self) -> &mut SocksStream<S> {
        &mut self.stream
    }

    /// Consume this object, and return its stream.
    pub fn into_stream(self) -> SocksStream<S> {
        self.stream
    }

    /// Consume this object, and return its stream and address.
    pub fn into_parts(self) -> (SocksStream<S>, Option<RemoteHost>) {
        (self.stream, self.remote_host)
    }
}

/// A granted BIND request, waiting for a peer to connect to the proxy.
///
/// Tell the peer about [`Bound::remote_host`], then call
/// [`Bound::accept`].
pub struct Bound<R, S> {
    /// Runtime to use for the timeout, if there is one.
    runtime: R,
    /// The handshake, which isn't done yet.
    negotiation: Negotiation<S>,
    /// Where the proxy is listening.
    remote_host: RemoteHost,
    /// When we give up on the peer, if ever.
    deadline: Option<Instant>,
    /// The request we made, for error reports.
    options: SocksClientOptions,
}

impl<R, S> Bound<R, S>
where
    R: Runtime,
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Return the address where the proxy is listening for our peer.
    pub fn remote_host(&self) -> &RemoteHost {
        &self.remote_host
    }

    /// Return the state of the handshake.
    pub fn state(&self) -> ConnectionState {
        self.negotiation.handshake.state()
    }

    /// Wait for the proxy to tell us that the peer has connected.
    ///
    /// The returned [`Established`] names the peer.
    pub async fn accept(self) -> Result<Established<S>> {
        let Bound {
            runtime,
            mut negotiation,
            remote_host,
            deadline,
            options,
        } = self;
        let outcome = match deadline {
            Some(when) => runtime
                .deadline(when, negotiation.advance())
                .await
                .unwrap_or(Err(ErrorKind::Timeout)),
            None => negotiation.advance().await,
        };
        match outcome {
            Ok(HandshakeEvent::Established(peer)) => {
                debug!(
                    "Peer {} connected to bound address {}",
                    DisplayHost(peer.as_ref()),
                    remote_host
                );
                negotiation.finish(peer).map_err(|k| k.on(&options))
            }
            Ok(HandshakeEvent::Bound(_)) => {
                let kind = ErrorKind::Negotiation(socks_proto::Error::Internal);
                Err(negotiation.abort(kind).on(&options))
            }
            Err(kind) => Err(negotiation.abort(kind).on(&options)),
        }
    }

    /// Stop waiting for a peer, and close the stream to the proxy.
    pub fn close(mut self) {
        if self.negotiation.handshake.close() {
            debug!("Closing bound connection at {}", self.remote_host);
        }
        self.negotiation.stream = None;
    }
}

/// One handshake in progress, with the stream that it runs over.
struct Negotiation<S> {
    /// The protocol state machine.
    handshake: ClientHandshake,
    /// Bytes from the proxy that the handshake hasn't used yet.
    inbuf: ReceiveBuffer,
    /// The stream to the proxy, once it's open; None again after a
    /// failure or after it was handed off.
    stream: Option<SocksStream<S>>,
}

impl<S> Negotiation<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Make a new Negotiation for `request`.
    fn new(request: SocksRequest) -> Self {
        Negotiation {
            handshake: ClientHandshake::new(request),
            inbuf: ReceiveBuffer::new(),
            stream: None,
        }
    }

    /// Open the stream with `open`, send our first message, and run
    /// until the first event.
    async fn start<F>(&mut self, open: F) -> std::result::Result<HandshakeEvent, ErrorKind>
    where
        F: Future<Output = IoResult<SocksStream<S>>>,
    {
        self.handshake.begin_connect()?;
        self.stream = Some(open.await?);
        let action = self.handshake.connected()?;
        trace!(
            "Sending {} bytes to open {} handshake",
            action.reply.len(),
            self.handshake.request().version()
        );
        self.send(&action.reply).await?;
        self.advance().await
    }

    /// Write `msg` to the proxy.
    async fn send(&mut self, msg: &[u8]) -> std::result::Result<(), ErrorKind> {
        if msg.is_empty() {
            return Ok(());
        }
        let stream = self.stream.as_mut().ok_or(ErrorKind::TransportClosed)?;
        stream.write_all(msg).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Feed the proxy's bytes to the handshake, sending whatever it
    /// tells us to, until it reports an event.
    async fn advance(&mut self) -> std::result::Result<HandshakeEvent, ErrorKind> {
        loop {
            if !self.inbuf.is_empty() {
                let input = self
                    .inbuf
                    .peek(self.inbuf.len())
                    .map_err(ErrorKind::Capacity)?;
                match self.handshake.handshake(input) {
                    Err(socks_proto::Error::Truncated) => {}
                    Err(e) => return Err(e.into()),
                    Ok(action) => {
                        trace!(
                            "SOCKS handshake now {}; used {} bytes",
                            self.handshake.state(),
                            action.drain
                        );
                        self.inbuf.get(action.drain).map_err(ErrorKind::Capacity)?;
                        self.send(&action.reply).await?;
                        if let Some(event) = action.event {
                            return Ok(event);
                        }
                        continue;
                    }
                }
            }

            let mut chunk = [0_u8; READ_CHUNK];
            let stream = self.stream.as_mut().ok_or(ErrorKind::TransportClosed)?;
            let n = stream.read(&mut chunk[..]).await?;
            if n == 0 {
                return Err(if self.inbuf.is_empty() {
                    ErrorKind::TransportClosed
                } else {
                    self.handshake.truncated().into()
                });
            }
            self.inbuf.append(&chunk[..n]).map_err(ErrorKind::Capacity)?;
        }
    }

    /// Hand the stream off to the caller, with any bytes that came in
    /// after the proxy's last reply.
    fn finish(
        mut self,
        remote_host: Option<RemoteHost>,
    ) -> std::result::Result<Established<S>, ErrorKind> {
        let mut stream = self.stream.take().ok_or(ErrorKind::TransportClosed)?;
        let rest = self
            .inbuf
            .get(self.inbuf.len())
            .map_err(ErrorKind::Capacity)?;
        if !rest.is_empty() {
            trace!("Keeping {} bytes that followed the final reply", rest.len());
        }
        stream.unread(&rest[..]);
        Ok(Established {
            stream,
            remote_host,
        })
    }

    /// Give up because of `kind`: drop the stream, and put the handshake
    /// in its error state if nothing else has.
    fn abort(&mut self, kind: ErrorKind) -> ErrorKind {
        // Dropping the stream closes it.
        self.stream = None;
        if self.handshake.state() == ConnectionState::Error {
            debug!("SOCKS handshake failed: {}", kind);
            return kind;
        }
        match self.handshake.fail(kind) {
            Some(kind) => {
                debug!("SOCKS handshake failed: {}", kind);
                kind
            }
            None => ErrorKind::Negotiation(socks_proto::Error::AlreadyFinished),
        }
    }
}

/// Helper: display an optional host.
struct DisplayHost<'a>(Option<&'a RemoteHost>);

impl std::fmt::Display for DisplayHost<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(h) => write!(f, "{}", h),
            None => write!(f, "(unknown)"),
        }
    }
}

/// Return a future that opens a TCP connection to `addr`.
pub(crate) fn dial<R: Runtime>(
    runtime: &R,
    addr: SocketAddr,
) -> impl Future<Output = IoResult<SocksStream<R::TcpStream>>> + Send {
    let runtime = runtime.clone();
    async move {
        debug!("Connecting to SOCKS proxy at {}", addr);
        runtime.connect(&addr).await.map(SocksStream::new)
    }
}

/// Run one request through one proxy, over the stream that `open`
/// gives us.
///
/// The timeout covers `open` as well as the handshake.
pub(crate) async fn run<R, S, F>(
    runtime: &R,
    options: &SocksClientOptions,
    request: SocksRequest,
    open: F,
) -> Result<SocksEvent<R, S>>
where
    R: Runtime,
    S: AsyncRead + AsyncWrite + Send + Unpin,
    F: Future<Output = IoResult<SocksStream<S>>>,
{
    let deadline = runtime.now() + options.timeout();
    let mut negotiation = Negotiation::new(request);

    let outcome = runtime.deadline(deadline, negotiation.start(open)).await;
    let event = match outcome {
        Ok(Ok(event)) => event,
        Ok(Err(kind)) => return Err(negotiation.abort(kind).on(options)),
        Err(_) => return Err(negotiation.abort(ErrorKind::Timeout).on(options)),
    };

    match event {
        HandshakeEvent::Established(remote_host) => {
            debug!(
                "SOCKS {} to {} established via {}",
                options.command(),
                options.destination(),
                options.proxy().remote_host()
            );
            let established = negotiation
                .finish(remote_host)
                .map_err(|k| k.on(options))?;
            Ok(SocksEvent::Established(established))
        }
        HandshakeEvent::Bound(remote_host) => {
            debug!(
                "SOCKS proxy {} is listening at {}",
                options.proxy().remote_host(),
                remote_host
            );
            let deadline = match options.bound_timeout() {
                BoundTimeout::Cancel => None,
                BoundTimeout::Keep => Some(deadline),
                BoundTimeout::Rearm => Some(runtime.now() + options.timeout()),
            };
            Ok(SocksEvent::Bound(Bound {
                runtime: runtime.clone(),
                negotiation,
                remote_host,
                deadline,
                options: options.clone(),
            }))
        }
    }
}

/// Make a request through the proxy in `options`, opening a new TCP
/// connection to it.
///
/// Any command is allowed.  Only BIND gives a [`SocksEvent::Bound`].
pub async fn connect<R: Runtime>(
    runtime: &R,
    options: &SocksClientOptions,
) -> Result<SocksEvent<R, R::TcpStream>> {
    let request = options.validate(ALL_COMMANDS).map_err(|k| k.on(options))?;
    let addr = options.proxy().socket_addr().map_err(|k| k.on(options))?;
    run(runtime, options, request, dial(runtime, addr)).await
}

/// Make a request through the proxy in `options`, over `stream`, which
/// must already be connected to it.
pub async fn connect_over<R, S>(
    runtime: &R,
    options: &SocksClientOptions,
    stream: S,
) -> Result<SocksEvent<R, S>>
where
    R: Runtime,
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    let request = options.validate(ALL_COMMANDS).map_err(|k| k.on(options))?;
    run(runtime, options, request, future::ready(Ok(SocksStream::new(stream)))).await
}

/// Open a tunnel to the destination in `options`, with a CONNECT
/// request.
///
/// Options with any other command are refused.
pub async fn create_connection<R: Runtime>(
    runtime: &R,
    options: &SocksClientOptions,
) -> Result<Established<R::TcpStream>> {
    let request = options
        .validate(&[SocksCmd::CONNECT])
        .map_err(|k| k.on(options))?;
    let addr = options.proxy().socket_addr().map_err(|k| k.on(options))?;
    run(runtime, options, request, dial(runtime, addr))
        .await?
        .into_established()
        .ok_or_else(|| ErrorKind::Negotiation(socks_proto::Error::Internal).on(options))
}
