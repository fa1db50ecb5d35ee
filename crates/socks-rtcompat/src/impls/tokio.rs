//! Implementations of our runtime traits for tokio.
//!
//! Tokio speaks its own `AsyncRead`/`AsyncWrite`; we expose the
//! `futures` flavor of those traits everywhere, so streams are wrapped
//! with `tokio_util::compat`.

/// Types used for networking (tokio implementation)
pub(crate) mod net {
    use crate::traits;
    use async_trait::async_trait;

    use tokio_crate::net::{TcpListener as TokioTcpListener, TcpStream as TokioTcpStream};
    use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

    use std::io::Result as IoResult;
    use std::net::SocketAddr;

    /// A TCP stream from tokio, adapted to the `futures` io traits.
    #[allow(unreachable_pub)] // reachable as an associated type.
    pub type TcpStream = Compat<TokioTcpStream>;

    /// Wrap a tokio listener so that it yields [`TcpStream`]s.
    #[allow(unreachable_pub)] // reachable as an associated type.
    pub struct TcpListener {
        /// The underlying listener.
        pub(super) lis: TokioTcpListener,
    }

    #[async_trait]
    impl traits::TcpListener for TcpListener {
        type TcpStream = TcpStream;
        async fn accept(&self) -> IoResult<(Self::TcpStream, SocketAddr)> {
            let (stream, addr) = self.lis.accept().await?;
            Ok((stream.compat(), addr))
        }
        fn local_addr(&self) -> IoResult<SocketAddr> {
            self.lis.local_addr()
        }
    }

    /// Open a TCP connection and wrap it.
    pub(super) async fn connect(addr: &SocketAddr) -> IoResult<TcpStream> {
        let s = TokioTcpStream::connect(addr).await?;
        Ok(s.compat())
    }

    /// Bind a listener and wrap it.
    pub(super) async fn listen(addr: &SocketAddr) -> IoResult<TcpListener> {
        let lis = TokioTcpListener::bind(*addr).await?;
        Ok(TcpListener { lis })
    }
}

// ==============================

use crate::traits::*;
use async_trait::async_trait;
use futures::Future;
use std::io::Result as IoResult;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Handle to a tokio runtime, implementing our [`Runtime`](crate::Runtime)
/// traits.
///
/// If this handle was made by [`create_runtime`], it keeps the runtime
/// alive; otherwise it just refers to a runtime that somebody else owns.
#[derive(Clone, Debug)]
pub struct TokioRuntimeHandle {
    /// Handle used to reach the runtime's reactor and timer.
    handle: tokio_crate::runtime::Handle,
    /// The runtime itself, if we are the ones who built it.
    owned: Option<Arc<tokio_crate::runtime::Runtime>>,
}

impl TokioRuntimeHandle {
    /// Wrap a handle to an existing tokio runtime.
    pub fn new(handle: tokio_crate::runtime::Handle) -> Self {
        TokioRuntimeHandle {
            handle,
            owned: None,
        }
    }
}

impl From<tokio_crate::runtime::Handle> for TokioRuntimeHandle {
    fn from(handle: tokio_crate::runtime::Handle) -> Self {
        Self::new(handle)
    }
}

/// Create and return a new multithreaded tokio runtime.
pub(crate) fn create_runtime() -> IoResult<TokioRuntimeHandle> {
    let runtime = tokio_crate::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(TokioRuntimeHandle {
        handle: runtime.handle().clone(),
        owned: Some(Arc::new(runtime)),
    })
}

impl SleepProvider for TokioRuntimeHandle {
    type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
    fn sleep(&self, duration: Duration) -> Self::SleepFuture {
        // tokio timers attach to whichever runtime is current when
        // they're made.
        let _guard = self.handle.enter();
        Box::pin(tokio_crate::time::sleep(duration))
    }
}

impl SpawnBlocking for TokioRuntimeHandle {
    fn block_on<F: Future>(&self, f: F) -> F::Output {
        match &self.owned {
            Some(rt) => rt.block_on(f),
            None => self.handle.block_on(f),
        }
    }
}

#[async_trait]
impl TcpProvider for TokioRuntimeHandle {
    type TcpStream = net::TcpStream;
    type TcpListener = net::TcpListener;

    async fn connect(&self, addr: &SocketAddr) -> IoResult<Self::TcpStream> {
        net::connect(addr).await
    }
    async fn listen(&self, addr: &SocketAddr) -> IoResult<Self::TcpListener> {
        net::listen(addr).await
    }
}
