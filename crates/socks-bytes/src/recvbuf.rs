//! Internal: Declare the ReceiveBuffer type for socks-bytes

use crate::{Error, Result};

/// A bounded, growable buffer for bytes that arrive from a stream.
///
/// Stream reads hand us data in whatever chunks the network felt like
/// delivering.  A `ReceiveBuffer` collects those chunks until there are
/// enough bytes to make sense of, and then lets the caller look at
/// ([`peek`](ReceiveBuffer::peek)) or remove ([`get`](ReceiveBuffer::get))
/// a prefix of them.
///
/// The buffer knows nothing about message framing.  It starts at an
/// initial size, grows geometrically when it must, and refuses to grow
/// past a maximum.
///
/// # Example
///
/// ```
/// use socks_bytes::{ReceiveBuffer, Result};
/// let mut buf = ReceiveBuffer::with_capacity(4, 64);
/// buf.append(b"\x05")?;
/// assert!(buf.peek(2).is_err()); // not enough yet.
/// buf.append(b"\x00\x05\x00")?;
/// assert_eq!(buf.get(2)?, vec![0x05, 0x00]);
/// assert_eq!(buf.len(), 2);
/// # Result::Ok(())
/// ```
#[derive(Clone, Debug)]
pub struct ReceiveBuffer {
    /// Backing storage.  Its length is the current capacity; only the
    /// first `used` bytes hold data.
    buf: Vec<u8>,
    /// Number of bytes at the start of `buf` that hold unconsumed data.
    used: usize,
    /// The largest that `buf` is ever allowed to become.
    max_size: usize,
}

impl ReceiveBuffer {
    /// The initial size of a buffer made with [`ReceiveBuffer::new`].
    pub const DEFAULT_SIZE: usize = 4096;

    /// Construct a new ReceiveBuffer of [`DEFAULT_SIZE`](Self::DEFAULT_SIZE)
    /// bytes, which is also its maximum.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_SIZE, Self::DEFAULT_SIZE)
    }

    /// Construct a new ReceiveBuffer that starts at `size` bytes and may
    /// grow up to `max_size` bytes.
    ///
    /// If `max_size` is smaller than `size`, then `size` is used as the
    /// maximum.
    pub fn with_capacity(size: usize, max_size: usize) -> Self {
        ReceiveBuffer {
            buf: vec![0_u8; size],
            used: 0,
            max_size: std::cmp::max(size, max_size),
        }
    }

    /// Return the number of buffered bytes that have not been consumed.
    pub fn len(&self) -> usize {
        self.used
    }

    /// Return true if no unconsumed bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Return the current size of the internal storage.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Return the largest size that the internal storage may grow to.
    pub fn max_capacity(&self) -> usize {
        self.max_size
    }

    /// Copy `data` onto the end of this buffer, growing it if needed.
    ///
    /// Returns the number of buffered bytes afterwards.  If holding
    /// `data` would take more than the maximum capacity, returns
    /// [`Error::Capacity`] and leaves the buffer unchanged.
    pub fn append(&mut self, data: &[u8]) -> Result<usize> {
        let needed = self.used + data.len();
        if needed > self.buf.len() {
            if needed > self.max_size {
                return Err(Error::Capacity {
                    needed,
                    max: self.max_size,
                });
            }
            let new_size = std::cmp::max(self.buf.len() * 2, needed);
            let new_size = std::cmp::min(new_size, self.max_size);
            self.buf.resize(new_size, 0);
        }

        self.buf[self.used..needed].copy_from_slice(data);
        self.used = needed;
        Ok(self.used)
    }

    /// Return the first `n` buffered bytes, without consuming them.
    ///
    /// Returns [`Error::Truncated`] if fewer than `n` bytes are buffered.
    pub fn peek(&self, n: usize) -> Result<&[u8]> {
        if n > self.used {
            return Err(Error::Truncated);
        }
        Ok(&self.buf[..n])
    }

    /// Remove and return the first `n` buffered bytes.
    ///
    /// The remaining bytes move to the front of the buffer.  Returns
    /// [`Error::Truncated`] if fewer than `n` bytes are buffered.
    pub fn get(&mut self, n: usize) -> Result<Vec<u8>> {
        if n > self.used {
            return Err(Error::Truncated);
        }
        let data = self.buf[..n].to_vec();
        self.buf.copy_within(n..self.used, 0);
        self.used -= n;
        Ok(data)
    }

    /// Discard all buffered bytes.
    ///
    /// The internal storage keeps its current size.
    pub fn clear(&mut self) {
        self.used = 0;
    }
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let b = ReceiveBuffer::new();
        assert_eq!(b.capacity(), 4096);
        assert_eq!(b.max_capacity(), 4096);
        assert_eq!(b.len(), 0);
        assert!(b.is_empty());

        let b = ReceiveBuffer::with_capacity(1024, 10);
        assert_eq!(b.capacity(), 1024);
        assert_eq!(b.max_capacity(), 1024);
    }

    #[test]
    fn empty_reads_fail() {
        let mut b = ReceiveBuffer::new();
        assert_eq!(b.peek(10), Err(Error::Truncated));
        assert_eq!(b.get(10), Err(Error::Truncated));
        // Zero-length reads are fine.
        assert_eq!(b.peek(0), Ok(&b""[..]));
    }

    #[test]
    fn peek_and_get() {
        let mut b = ReceiveBuffer::new();
        assert_eq!(b.append(b"hello").unwrap(), 5);

        assert_eq!(b.peek(5).unwrap(), &b"hello"[..]);
        assert_eq!(b.len(), 5);

        assert_eq!(b.get(2).unwrap(), b"he".to_vec());
        assert_eq!(b.len(), 3);
        assert_eq!(b.peek(3).unwrap(), &b"llo"[..]);
        assert_eq!(b.get(4), Err(Error::Truncated));
        assert_eq!(b.get(3).unwrap(), b"llo".to_vec());
        assert!(b.is_empty());
    }

    #[test]
    fn grows() {
        let mut b = ReceiveBuffer::with_capacity(10, 1000);
        let first = b"heeeeeeee";
        let longer = b"eellllllllllooooooooooo";
        b.append(&first[..]).unwrap();
        assert_eq!(b.capacity(), 10);

        b.append(&longer[..]).unwrap();
        let total = first.len() + longer.len();
        assert!(b.capacity() >= total);
        assert!(b.capacity() >= 20);

        let mut expected = first.to_vec();
        expected.extend_from_slice(&longer[..]);
        assert_eq!(b.get(total).unwrap(), expected);
    }

    #[test]
    fn grows_no_further_than_max() {
        let mut b = ReceiveBuffer::with_capacity(8, 12);
        b.append(b"0123456789").unwrap();
        assert_eq!(b.capacity(), 12);
        b.append(b"ab").unwrap();
        assert_eq!(b.len(), 12);

        let e = b.append(b"c");
        assert_eq!(e, Err(Error::Capacity { needed: 13, max: 12 }));
        // Nothing was lost or added.
        assert_eq!(b.peek(12).unwrap(), &b"0123456789ab"[..]);
    }

    #[test]
    fn consume_then_reuse() {
        let mut b = ReceiveBuffer::with_capacity(4, 4);
        b.append(b"abcd").unwrap();
        assert!(b.append(b"e").is_err());
        b.get(3).unwrap();
        b.append(b"efg").unwrap();
        assert_eq!(b.peek(4).unwrap(), &b"defg"[..]);

        b.clear();
        assert!(b.is_empty());
        assert_eq!(b.capacity(), 4);
        assert_eq!(b.peek(1), Err(Error::Truncated));
    }
}
