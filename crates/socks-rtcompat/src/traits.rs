//! Declarations for traits that we need our runtimes to implement.
use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite, Future};
use std::io::Result as IoResult;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A runtime that we can use to talk to SOCKS proxies.
///
/// Every runtime is a [`TcpProvider`] (to reach the proxy), a
/// [`SleepProvider`] (to enforce timeouts), and a [`SpawnBlocking`]
/// (so that synchronous code can wait for a result).
pub trait Runtime:
    Send + Sync + Clone + 'static + SpawnBlocking + SleepProvider + TcpProvider
{
}

impl<T> Runtime for T where
    T: Send + Sync + Clone + 'static + SpawnBlocking + SleepProvider + TcpProvider
{
}

/// Trait for a runtime that can wait until a timer has expired.
pub trait SleepProvider {
    /// A future returned by [`SleepProvider::sleep()`]
    type SleepFuture: Future<Output = ()> + Send + 'static;
    /// Return a future that will be ready after `duration` has
    /// elapsed.
    fn sleep(&self, duration: Duration) -> Self::SleepFuture;

    /// Return the runtime's view of the current time.
    ///
    /// Mock runtimes override this so that deadlines follow simulated
    /// time.
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Trait for a runtime that can block on a future.
pub trait SpawnBlocking {
    /// Run `future` until it finishes, and return its output.
    fn block_on<F: Future>(&self, future: F) -> F::Output;
}

/// Trait for a runtime that can open TCP connections, and listen for them.
///
/// Listening is only needed by tests and demos that play the proxy.
#[async_trait]
pub trait TcpProvider {
    /// The type for the TCP connections returned by [`Self::connect()`].
    type TcpStream: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static;
    /// The type for the TCP listeners returned by [`Self::listen()`].
    type TcpListener: TcpListener<TcpStream = Self::TcpStream> + Send + Sync + Unpin + 'static;

    /// Launch a TCP connection to a given socket address.
    async fn connect(&self, addr: &SocketAddr) -> IoResult<Self::TcpStream>;

    /// Open a TCP listener on a given socket address.
    async fn listen(&self, addr: &SocketAddr) -> IoResult<Self::TcpListener>;
}

/// Trait for a local socket that accepts incoming TCP streams.
#[async_trait]
pub trait TcpListener {
    /// The type of TCP connections returned by [`Self::accept()`].
    type TcpStream: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static;

    /// Wait for an incoming stream; return it along with its address.
    async fn accept(&self) -> IoResult<(Self::TcpStream, SocketAddr)>;

    /// Return the local address that this listener is bound to.
    fn local_addr(&self) -> IoResult<SocketAddr>;
}
