//! A stream through a SOCKS proxy.

use futures::io::{AsyncRead, AsyncWrite};
use pin_project::pin_project;
use std::io::Result as IoResult;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream to a proxy, with any bytes that arrived right behind the
/// proxy's last reply.
///
/// A proxy is allowed to start relaying data as soon as it has sent
/// its reply, so the read that finishes a handshake can pick up the
/// first bytes from the far end too.  Those bytes are returned by
/// the first reads from this stream, before anything else is read from
/// the underlying transport.
#[pin_project]
#[derive(Debug)]
pub struct SocksStream<S> {
    /// Bytes already read from `inner`, that our reader hasn't seen.
    pending: Vec<u8>,
    /// The underlying transport.
    #[pin]
    inner: S,
}

impl<S> SocksStream<S> {
    /// Wrap `inner`, with nothing pending.
    pub fn new(inner: S) -> Self {
        SocksStream {
            pending: Vec::new(),
            inner,
        }
    }

    /// Return the bytes that will be read before any more are read from
    /// the transport.
    pub fn pending(&self) -> &[u8] {
        &self.pending[..]
    }

    /// Return a reference to the underlying transport.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Return a mutable reference to the underlying transport.
    ///
    /// Reading from it directly skips any pending bytes.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume this stream, and return the transport along with any
    /// pending bytes.
    pub fn into_parts(self) -> (S, Vec<u8>) {
        (self.inner, self.pending)
    }

    /// Put `bytes` back in front of whatever is already pending.
    pub(crate) fn unread(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut v = Vec::with_capacity(bytes.len() + self.pending.len());
        v.extend_from_slice(bytes);
        v.extend_from_slice(&self.pending[..]);
        self.pending = v;
    }
}

impl<S: AsyncRead> AsyncRead for SocksStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<IoResult<usize>> {
        let this = self.project();
        if !this.pending.is_empty() && !buf.is_empty() {
            let n = std::cmp::min(buf.len(), this.pending.len());
            buf[..n].copy_from_slice(&this.pending[..n]);
            this.pending.drain(..n);
            return Poll::Ready(Ok(n));
        }
        this.inner.poll_read(cx, buf)
    }
}

impl<S: AsyncWrite> AsyncWrite for SocksStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<IoResult<usize>> {
        self.project().inner.poll_write(cx, buf)
    }
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        self.project().inner.poll_flush(cx)
    }
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        self.project().inner.poll_close(cx)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::executor::block_on;
    use futures::io::{AsyncReadExt, AsyncWriteExt};
    use socks_rtmock::io::stream_pair;

    #[test]
    fn pending_first() {
        let (a, mut b) = stream_pair();
        let mut s = SocksStream::new(a);
        s.unread(b"lo wo");
        s.unread(b"hel");
        assert_eq!(s.pending(), b"hello wo");

        block_on(async {
            b.write_all(b"rld").await.unwrap();
            b.close().await.unwrap();
            let mut buf = [0_u8; 3];
            s.read_exact(&mut buf[..]).await.unwrap();
            assert_eq!(&buf, b"hel");
            let mut rest = Vec::new();
            s.read_to_end(&mut rest).await.unwrap();
            assert_eq!(&rest[..], b"lo world");
        });
    }

    #[test]
    fn writes_pass_through() {
        let (a, mut b) = stream_pair();
        let mut s = SocksStream::new(a);
        block_on(async {
            s.write_all(b"ping").await.unwrap();
            s.close().await.unwrap();
            let mut v = Vec::new();
            b.read_to_end(&mut v).await.unwrap();
            assert_eq!(&v[..], b"ping");
        });
        let (_inner, pending) = s.into_parts();
        assert!(pending.is_empty());
    }
}
