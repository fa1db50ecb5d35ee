//! `socks-bytes`: the byte-level layer under the SOCKS client.
//!
//! # Overview
//!
//! A SOCKS message is a few big-endian integers, an address in one of
//! three encodings, and maybe a string with a length byte in front or
//! a NUL behind.  Building and parsing those by hand with slices gets
//! error-prone fast; this crate gives the rest of the workspace a
//! small vocabulary for it.
//!
//! Nothing here does IO.  Messages are built into memory with a
//! [`Writer`] and written out by someone else; bytes read from a
//! socket are collected in a [`ReceiveBuffer`] until a whole message
//! can be decoded with a [`Reader`].
//!
//! # Contents
//!
//! * [`Reader`]: a cursor for decoding one message from a slice.
//! * [`Writer`]: a byte sink that can't fail (`Vec<u8>` is one).
//! * [`Readable`] and [`Writeable`]: things that [`Reader::extract`]
//!   and [`Writer::write`] know how to handle.
//! * [`ReceiveBuffer`]: a capped buffer for bytes that arrive in
//!   whatever chunks the network likes.

#![deny(missing_docs)]
#![warn(noop_method_call)]
#![deny(unreachable_pub)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::cast_lossless)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::implicit_clone)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![deny(clippy::unnecessary_wraps)]

mod err;
mod impls;
mod reader;
mod recvbuf;
mod writer;

pub use err::Error;
pub use reader::Reader;
pub use recvbuf::ReceiveBuffer;
pub use writer::Writer;

/// Result type returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A value that knows how to append its own encoding to a [`Writer`].
///
/// Callers usually go through [`Writer::write`] rather than calling
/// [`write_onto`](Writeable::write_onto) themselves.
///
/// # Example
///
/// ```
/// use socks_bytes::{Writeable, Writer};
/// /// A SOCKS5 greeting.
/// struct Greeting(Vec<u8>);
///
/// impl Writeable for Greeting {
///     fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
///         b.write_u8(5);
///         b.write_u8(self.0.len() as u8);
///         b.write_all(&self.0[..]);
///     }
/// }
///
/// let mut out: Vec<u8> = Vec::new();
/// out.write(&Greeting(vec![0x00, 0x02]));
/// assert_eq!(out, &[0x05, 0x02, 0x00, 0x02]);
/// ```
pub trait Writeable {
    /// Append the encoding of `self` to `b`.
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B);
}

/// A value that can be decoded from the front of a [`Reader`].
///
/// Callers usually go through [`Reader::extract`], which also rewinds
/// the reader when decoding fails.
///
/// # Example
///
/// ```
/// use socks_bytes::{Readable,Reader,Result};
/// /// The proxy's answer to a SOCKS5 greeting.
/// #[derive(Debug, Eq, PartialEq)]
/// struct Choice(u8);
///
/// impl Readable for Choice {
///     fn take_from(r: &mut Reader<'_>) -> Result<Self> {
///         r.advance(1)?;
///         Ok(Choice(r.take_u8()?))
///     }
/// }
///
/// let mut r = Reader::from_slice(&[0x05, 0x02]);
/// assert_eq!(r.extract::<Choice>()?, Choice(2));
/// r.should_be_exhausted()?;
/// # Result::Ok(())
/// ```
pub trait Readable: Sized {
    /// Decode a `Self` from `r`.
    fn take_from(r: &mut Reader<'_>) -> Result<Self>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writer() {
        let mut v: Vec<u8> = Vec::new();
        v.write_u8(0x05);
        v.write_u8(0x01);
        v.write_u8(0x00);
        v.write_u8(0x01);
        v.write_u32(0x7f00_0001);
        v.write_u16(8080);
        assert_eq!(&v[..], &hex_literal::hex!("05 01 00 01 7f000001 1f90")[..]);
    }
}
