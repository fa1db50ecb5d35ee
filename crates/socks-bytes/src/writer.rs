//! Internal: Declare the Writer type for socks-bytes

use crate::Writeable;

/// Something we can append the bytes of a SOCKS message to.
///
/// Appending can't fail, so this is not a replacement for
/// `std::io::Write`: messages are built in memory, then sent.
///
/// Implementors only need to provide [`write_all`](Writer::write_all).
/// `Vec<u8>` and [`bytes::BytesMut`] already do.
///
/// # Example
///
/// A SOCKS4 CONNECT request:
///
/// ```
/// use socks_bytes::Writer;
/// use std::net::Ipv4Addr;
/// let mut w: Vec<u8> = Vec::new();
/// w.write_u8(4);
/// w.write_u8(1);
/// w.write_u16(80);
/// w.write(&Ipv4Addr::new(192, 0, 2, 9));
/// w.write_nul_terminated(b"bob");
/// assert_eq!(w, b"\x04\x01\x00\x50\xc0\x00\x02\x09bob\x00");
/// ```
pub trait Writer {
    /// Append every byte of `b`.
    fn write_all(&mut self, b: &[u8]);

    /// Append one byte.
    fn write_u8(&mut self, x: u8) {
        self.write_all(&[x]);
    }
    /// Append a big-endian u16.
    fn write_u16(&mut self, x: u16) {
        self.write_all(&x.to_be_bytes());
    }
    /// Append a big-endian u32.
    fn write_u32(&mut self, x: u32) {
        self.write_all(&x.to_be_bytes());
    }
    /// Append `b` and then a NUL byte, the way SOCKS4 sends user IDs and
    /// SOCKS4a sends hostnames.
    ///
    /// `b` must not contain a NUL of its own; that is for the caller to
    /// check.
    fn write_nul_terminated(&mut self, b: &[u8]) {
        self.write_all(b);
        self.write_u8(0);
    }
    /// Append the encoding of `e`.
    fn write<E: Writeable + ?Sized>(&mut self, e: &E) {
        e.write_onto(self);
    }
}
