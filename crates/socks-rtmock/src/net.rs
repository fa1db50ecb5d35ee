//! A pretend network of hosts that can open TCP streams to each other.
//!
//! Streams are [`LocalStream`] pairs.  There is no packet loss, no
//! delay, no DNS and no UDP: just enough to put a scripted proxy on one
//! host and a client on another.

use super::io::{stream_pair, LocalStream};
use super::MockRuntime;
use socks_rtcompat::{TcpListener, TcpProvider};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::lock::Mutex as AsyncMutex;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// An incoming connection, as seen by a listener: the stream, and the
/// address it came from.
type Incoming = (LocalStream, SocketAddr);

/// First port that we hand out when nobody asked for a particular one.
const FIRST_EPHEMERAL_PORT: u16 = 49152;

/// The network itself: a table of who is listening where.
///
/// Hosts on the network are [`MockNetProvider`]s, made with
/// [`MockNetwork::builder`].
pub struct MockNetwork {
    /// For each listening address, where to send new connections.
    listeners: Mutex<HashMap<SocketAddr, mpsc::Sender<Incoming>>>,
}

/// One host on a [`MockNetwork`], with its own addresses.
///
/// Implements [`TcpProvider`], so it can stand in for the real network
/// in code that is generic over a runtime.
#[derive(Clone)]
pub struct MockNetProvider {
    /// State shared between clones of this host.
    host: Arc<Host>,
}

/// The state of one host.
struct Host {
    /// The addresses that belong to this host.
    addrs: Vec<IpAddr>,
    /// The network the host lives on.
    net: Arc<MockNetwork>,
    /// The next ephemeral port to hand out.
    ///
    /// Wider than a port, so that running out is detectable.
    next_port: AtomicU32,
}

/// A listening socket on a [`MockNetProvider`].
pub struct MockNetListener {
    /// Where we're listening.
    addr: SocketAddr,
    /// New connections arrive here.
    incoming: AsyncMutex<mpsc::Receiver<Incoming>>,
}

/// Configures a new host before it joins a [`MockNetwork`].
pub struct ProviderBuilder {
    /// Addresses for the new host.
    addrs: Vec<IpAddr>,
    /// The network to join.
    net: Arc<MockNetwork>,
}

impl MockNetwork {
    /// Make a new network, with nobody on it.
    pub fn new() -> Arc<Self> {
        Arc::new(MockNetwork {
            listeners: Mutex::new(HashMap::new()),
        })
    }

    /// Start building a new host on this network.
    ///
    /// # Examples
    ///
    /// ```
    /// # use socks_rtmock::net::MockNetwork;
    /// let net = MockNetwork::new();
    /// let proxy = net.builder()
    ///       .add_address("192.0.2.1".parse().unwrap())
    ///       .add_address("2001:db8::1".parse().unwrap())
    ///       .provider();
    /// ```
    pub fn builder(self: &Arc<Self>) -> ProviderBuilder {
        ProviderBuilder {
            addrs: Vec::new(),
            net: Arc::clone(self),
        }
    }

    /// Hand `stream`, coming from `from`, to whoever listens at `to`.
    async fn deliver(&self, from: SocketAddr, to: SocketAddr, stream: LocalStream) -> IoResult<()> {
        let sender = self.table().get(&to).cloned();
        match sender {
            Some(mut sender) => sender
                .send((stream, from))
                .await
                .map_err(|_| err(ErrorKind::ConnectionRefused, "listener was closed")),
            None => Err(err(ErrorKind::ConnectionRefused, "nobody is listening")),
        }
    }

    /// Start listening at `addr`.
    fn register(&self, addr: SocketAddr) -> IoResult<mpsc::Receiver<Incoming>> {
        let mut table = self.table();
        if table.contains_key(&addr) {
            return Err(err(ErrorKind::AddrInUse, "address already in use"));
        }
        let (sender, receiver) = mpsc::channel(16);
        table.insert(addr, sender);
        Ok(receiver)
    }

    /// Lock and return the listener table.
    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<SocketAddr, mpsc::Sender<Incoming>>> {
        self.listeners.lock().expect("mock network lock poisoned")
    }
}

impl ProviderBuilder {
    /// Give the new host the address `addr`.
    pub fn add_address(&mut self, addr: IpAddr) -> &mut Self {
        self.addrs.push(addr);
        self
    }

    /// Finish the host, and wrap it in a [`MockRuntime`] with its own
    /// simulated clock.
    pub fn runtime(&self) -> MockRuntime {
        MockRuntime::new(self.provider())
    }

    /// Finish the host.
    pub fn provider(&self) -> MockNetProvider {
        MockNetProvider {
            host: Arc::new(Host {
                addrs: self.addrs.clone(),
                net: Arc::clone(&self.net),
                next_port: AtomicU32::new(FIRST_EPHEMERAL_PORT.into()),
            }),
        }
    }
}

impl MockNetProvider {
    /// Return our first address in the same family as `ip`.
    fn local_ip_like(&self, ip: IpAddr) -> IoResult<IpAddr> {
        self.host
            .addrs
            .iter()
            .copied()
            .find(|a| a.is_ipv4() == ip.is_ipv4())
            .ok_or_else(|| err(ErrorKind::AddrNotAvailable, "no address in that family"))
    }

    /// Return a port number that we haven't handed out before.
    fn ephemeral_port(&self) -> IoResult<u16> {
        let port = self.host.next_port.fetch_add(1, Ordering::Relaxed);
        u16::try_from(port).map_err(|_| err(ErrorKind::AddrNotAvailable, "out of ports"))
    }

    /// Decide which address a listener asked to bind `requested` should get.
    ///
    /// An unspecified IP means our own address in that family; port 0
    /// means an ephemeral port.  Anything else has to be ours already.
    fn bind_addr(&self, requested: &SocketAddr) -> IoResult<SocketAddr> {
        let ip = if requested.ip().is_unspecified() {
            self.local_ip_like(requested.ip())?
        } else if self.host.addrs.contains(&requested.ip()) {
            requested.ip()
        } else {
            return Err(err(ErrorKind::AddrNotAvailable, "not one of our addresses"));
        };
        let port = match requested.port() {
            0 => self.ephemeral_port()?,
            p => p,
        };
        Ok(SocketAddr::new(ip, port))
    }
}

#[async_trait]
impl TcpProvider for MockNetProvider {
    type TcpStream = LocalStream;
    type TcpListener = MockNetListener;

    async fn connect(&self, addr: &SocketAddr) -> IoResult<LocalStream> {
        let from = SocketAddr::new(self.local_ip_like(addr.ip())?, self.ephemeral_port()?);
        let (mine, theirs) = stream_pair();
        self.host.net.deliver(from, *addr, theirs).await?;
        Ok(mine)
    }

    async fn listen(&self, addr: &SocketAddr) -> IoResult<MockNetListener> {
        let addr = self.bind_addr(addr)?;
        let incoming = AsyncMutex::new(self.host.net.register(addr)?);
        Ok(MockNetListener { addr, incoming })
    }
}

#[async_trait]
impl TcpListener for MockNetListener {
    type TcpStream = LocalStream;

    async fn accept(&self) -> IoResult<(LocalStream, SocketAddr)> {
        self.incoming
            .lock()
            .await
            .next()
            .await
            .ok_or_else(|| err(ErrorKind::BrokenPipe, "network is gone"))
    }

    fn local_addr(&self) -> IoResult<SocketAddr> {
        Ok(self.addr)
    }
}

/// Why an operation on a [`MockNetwork`] failed.
#[derive(Clone, Debug, Error)]
#[error("mock network: {0}")]
pub struct MockNetError(&'static str);

/// Make an [`std::io::Error`] of kind `kind`, explained by `why`.
fn err(kind: ErrorKind, why: &'static str) -> IoError {
    IoError::new(kind, MockNetError(why))
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::executor::block_on;
    use futures::io::{AsyncReadExt, AsyncWriteExt};

    /// A network with a client at 192.0.2.55 and a proxy at 192.0.2.1.
    fn client_and_proxy() -> (MockNetProvider, MockNetProvider) {
        let net = MockNetwork::new();
        let client = net
            .builder()
            .add_address("192.0.2.55".parse().unwrap())
            .provider();
        let proxy = net
            .builder()
            .add_address("192.0.2.1".parse().unwrap())
            .provider();
        (client, proxy)
    }

    #[test]
    fn connect_and_talk() {
        let (client, proxy) = client_and_proxy();
        block_on(async {
            let lis = proxy.listen(&"0.0.0.0:1080".parse().unwrap()).await.unwrap();
            let addr = lis.local_addr().unwrap();
            assert_eq!(addr, "192.0.2.1:1080".parse().unwrap());

            let ((), ()) = futures::join!(
                async {
                    let mut conn = client.connect(&addr).await.unwrap();
                    conn.write_all(&[5, 1, 0]).await.unwrap();
                    let mut reply = [0_u8; 2];
                    conn.read_exact(&mut reply).await.unwrap();
                    assert_eq!(reply, [5, 0]);
                },
                async {
                    let (mut conn, from) = lis.accept().await.unwrap();
                    assert_eq!(from.ip(), "192.0.2.55".parse::<IpAddr>().unwrap());
                    assert!(from.port() >= FIRST_EPHEMERAL_PORT);
                    let mut greeting = [0_u8; 3];
                    conn.read_exact(&mut greeting).await.unwrap();
                    assert_eq!(greeting, [5, 1, 0]);
                    conn.write_all(&[5, 0]).await.unwrap();
                }
            );
        });
    }

    #[test]
    fn refused() {
        let (client, _proxy) = client_and_proxy();
        block_on(async {
            let e = client
                .connect(&"192.0.2.1:1080".parse().unwrap())
                .await
                .err()
                .unwrap();
            assert_eq!(e.kind(), ErrorKind::ConnectionRefused);
            assert_eq!(e.to_string(), "mock network: nobody is listening");

            // No IPv6 address to connect from.
            let e = client
                .connect(&"[2001:db8::1]:1080".parse().unwrap())
                .await
                .err()
                .unwrap();
            assert_eq!(e.kind(), ErrorKind::AddrNotAvailable);
        });
    }

    #[test]
    fn listener_addresses() {
        let net = MockNetwork::new();
        let ip4: IpAddr = "192.0.2.1".parse().unwrap();
        let ip6: IpAddr = "2001:db8::1".parse().unwrap();
        let host = net.builder().add_address(ip4).add_address(ip6).provider();

        let a = host.bind_addr(&"0.0.0.0:1080".parse().unwrap()).unwrap();
        assert_eq!(a, SocketAddr::new(ip4, 1080));
        let a = host.bind_addr(&"[::]:1080".parse().unwrap()).unwrap();
        assert_eq!(a, SocketAddr::new(ip6, 1080));
        let a = host.bind_addr(&"192.0.2.1:0".parse().unwrap()).unwrap();
        let b = host.bind_addr(&"0.0.0.0:0".parse().unwrap()).unwrap();
        assert_eq!(a.ip(), ip4);
        assert_eq!(a.port(), FIRST_EPHEMERAL_PORT);
        assert_eq!(b.port(), FIRST_EPHEMERAL_PORT + 1);

        assert!(host.bind_addr(&"192.0.2.2:1080".parse().unwrap()).is_err());
        assert!(host.bind_addr(&"[2001:db8::2]:0".parse().unwrap()).is_err());
    }

    #[test]
    fn out_of_ports() {
        let (client, _) = client_and_proxy();
        client.host.next_port.store(65535, Ordering::Relaxed);
        assert_eq!(client.ephemeral_port().unwrap(), 65535);
        assert!(client.ephemeral_port().is_err());
    }

    #[test]
    fn addr_in_use() {
        let (_, proxy) = client_and_proxy();
        block_on(async {
            let _lis = proxy.listen(&"0.0.0.0:1080".parse().unwrap()).await.unwrap();
            let e = proxy.listen(&"192.0.2.1:1080".parse().unwrap()).await;
            assert_eq!(e.err().unwrap().kind(), ErrorKind::AddrInUse);
        });
    }
}
