//! Internal: Declare the Reader type for socks-bytes

use crate::{Error, Readable, Result};
use arrayref::array_ref;

/// A cursor over a complete, in-memory SOCKS message.
///
/// Every `take_*` method either consumes exactly what it returns, or
/// fails with [`Error::Truncated`] and consumes nothing.  Nothing here
/// can panic, unless a [`Readable`] implementation passed to
/// [`extract`](Reader::extract) does.
///
/// # Example
///
/// Picking apart a SOCKS4 reply:
///
/// ```
/// use socks_bytes::{Reader,Result};
/// use std::net::Ipv4Addr;
/// let reply = [ 0x00, 0x5A, 0x1f, 0x90, 0x7f, 0x00, 0x00, 0x01 ];
/// let mut r = Reader::from_slice(&reply[..]);
/// r.advance(1)?; // SOCKS4 replies carry a version byte nobody checks.
/// assert_eq!(r.take_u8()?, 0x5A);
/// assert_eq!(r.take_u16()?, 8080);
/// let ip: Ipv4Addr = r.extract()?;
/// assert_eq!(ip, Ipv4Addr::LOCALHOST);
/// assert_eq!(r.consumed(), 8);
/// r.should_be_exhausted()?;
/// # Result::Ok(())
/// ```
pub struct Reader<'a> {
    /// The message.
    msg: &'a [u8],
    /// How much of `msg` we have consumed.
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `msg`.
    pub fn from_slice(msg: &'a [u8]) -> Self {
        Reader { msg, pos: 0 }
    }
    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.msg.len() - self.pos
    }
    /// Number of bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }
    /// Skip over `n` bytes.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }
    /// Fail with [`Error::ExtraneousBytes`] unless every byte has been
    /// consumed.
    pub fn should_be_exhausted(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            _ => Err(Error::ExtraneousBytes),
        }
    }
    /// Return the next `n` bytes without consuming them.
    pub fn peek(&self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::Truncated)?;
        self.msg.get(self.pos..end).ok_or(Error::Truncated)
    }
    /// Consume and return the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self.peek(n)?;
        self.pos += n;
        Ok(bytes)
    }
    /// Consume and return the next 4 bytes as an array.
    pub(crate) fn take_array4(&mut self) -> Result<[u8; 4]> {
        let b = self.take(4)?;
        Ok(*array_ref![b, 0, 4])
    }
    /// Consume and return the next 16 bytes as an array.
    pub(crate) fn take_array16(&mut self) -> Result<[u8; 16]> {
        let b = self.take(16)?;
        Ok(*array_ref![b, 0, 16])
    }
    /// Consume one byte.
    pub fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
    /// Consume a big-endian u16: a port number, in most SOCKS messages.
    pub fn take_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes(*array_ref![b, 0, 2]))
    }
    /// Consume a length byte and then that many bytes, returning the
    /// latter.
    ///
    /// SOCKS5 uses this encoding for hostnames, usernames and passwords.
    /// If the bytes aren't all there, the length byte is not consumed
    /// either.
    ///
    /// ```
    /// use socks_bytes::{Reader,Result};
    /// let m = b"\x0bexample.com\x00\x50";
    /// let mut r = Reader::from_slice(m);
    /// assert_eq!(r.take_u8_prefixed()?, b"example.com");
    /// assert_eq!(r.take_u16()?, 80);
    /// # Result::Ok(())
    /// ```
    pub fn take_u8_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = *self.peek(1)?.first().ok_or(Error::Truncated)?;
        let body = self.peek(1 + usize::from(len))?;
        self.pos += body.len();
        Ok(&body[1..])
    }
    /// Decode a `T`, consuming the bytes it used.
    ///
    /// If decoding fails, the reader is left where it was.
    pub fn extract<T: Readable>(&mut self) -> Result<T> {
        let start = self.pos;
        T::take_from(self).map_err(|e| {
            self.pos = start;
            e
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn socks5_reply_fields() {
        let reply = hex!("05 00 00 03 0b 6578616d706c652e636f6d 01bb");
        let mut r = Reader::from_slice(&reply[..]);

        assert_eq!(r.peek(3).unwrap(), &hex!("05 00 00")[..]);
        assert_eq!(r.consumed(), 0);
        assert_eq!(r.take_u8().unwrap(), 5);
        assert_eq!(r.take_u8().unwrap(), 0);
        r.advance(1).unwrap();
        assert_eq!(r.take_u8().unwrap(), 3);
        assert_eq!(r.take_u8_prefixed().unwrap(), &b"example.com"[..]);
        assert_eq!(r.remaining(), 2);
        assert_eq!(r.should_be_exhausted(), Err(Error::ExtraneousBytes));
        assert_eq!(r.take_u16().unwrap(), 443);
        assert_eq!(r.should_be_exhausted(), Ok(()));
    }

    #[test]
    fn short_reads_consume_nothing() {
        let mut r = Reader::from_slice(&hex!("5a 1f")[..]);
        assert_eq!(r.take(3), Err(Error::Truncated));
        assert_eq!(r.peek(usize::MAX), Err(Error::Truncated));
        assert_eq!(r.advance(3), Err(Error::Truncated));
        assert_eq!(r.take_array4(), Err(Error::Truncated));
        assert_eq!(r.consumed(), 0);

        assert_eq!(r.take_u16().unwrap(), 0x5a1f);
        assert_eq!(r.take_u8(), Err(Error::Truncated));
        assert_eq!(r.take_u8_prefixed(), Err(Error::Truncated));
        assert_eq!(r.peek(0).unwrap(), &b""[..]);
    }

    #[test]
    fn credentials() {
        let mut r = Reader::from_slice(&b"\x05alice\x06secret\x09short"[..]);
        assert_eq!(r.take_u8_prefixed().unwrap(), &b"alice"[..]);
        assert_eq!(r.take_u8_prefixed().unwrap(), &b"secret"[..]);

        let before = r.consumed();
        assert_eq!(r.take_u8_prefixed(), Err(Error::Truncated));
        assert_eq!(r.consumed(), before);

        let mut r = Reader::from_slice(&b"\x00"[..]);
        assert_eq!(r.take_u8_prefixed().unwrap(), &b""[..]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn failed_extract_rewinds() {
        /// A hostname and port, as SOCKS5 encodes them.
        #[derive(Debug)]
        struct Dest(Vec<u8>, u16);
        impl Readable for Dest {
            fn take_from(r: &mut Reader<'_>) -> Result<Self> {
                let host = r.take_u8_prefixed()?.into();
                let port = r.take_u16()?;
                Ok(Dest(host, port))
            }
        }

        let mut r = Reader::from_slice(&b"\x03foo\x00\x50\x03bar\x01"[..]);
        let d: Dest = r.extract().unwrap();
        assert_eq!(&d.0[..], &b"foo"[..]);
        assert_eq!(d.1, 80);

        // "bar" is there, but the port is cut short.
        assert_eq!(r.extract::<Dest>().unwrap_err(), Error::Truncated);
        assert_eq!(r.consumed(), 6);
        assert_eq!(r.remaining(), 5);
    }
}
