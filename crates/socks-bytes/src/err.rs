//! Internal: Declare an Error type for socks-bytes

use thiserror::Error;

/// Error type for decoding SOCKS objects from bytes, or for buffering
/// them.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Tried to read more bytes than are present.
    ///
    /// For a [`Reader`](crate::Reader), the object is truncated (or not
    /// fully present yet).  For a [`ReceiveBuffer`](crate::ReceiveBuffer),
    /// the caller asked for more bytes than have been buffered.
    #[error("object truncated (or not fully present)")]
    Truncated,
    /// There were bytes left over after an object was decoded.
    #[error("extra bytes at end of object")]
    ExtraneousBytes,
    /// The object was well-sized but its contents made no sense.
    #[error("bad object: {0}")]
    BadMessage(&'static str),
    /// A [`ReceiveBuffer`](crate::ReceiveBuffer) would have had to grow
    /// beyond its configured maximum.
    #[error("receive buffer can't hold {needed} bytes (maximum is {max})")]
    Capacity {
        /// How many bytes the buffer would have had to hold.
        needed: usize,
        /// The maximum the buffer is allowed to hold.
        max: usize,
    },
}
