//! Writer implementations for the buffer types we use, and
//! Readable/Writeable for the primitive values inside SOCKS messages.

use super::*;
use std::net::{Ipv4Addr, Ipv6Addr};

impl Writer for Vec<u8> {
    fn write_all(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
    fn write_u8(&mut self, byte: u8) {
        self.push(byte);
    }
}

impl Writer for bytes::BytesMut {
    fn write_all(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl Writeable for [u8] {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
        b.write_all(self);
    }
}

impl Writeable for Vec<u8> {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
        self[..].write_onto(b);
    }
}

impl Writeable for u8 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
        b.write_u8(*self);
    }
}

impl Readable for u8 {
    fn take_from(r: &mut Reader<'_>) -> Result<Self> {
        r.take_u8()
    }
}

/// Ports.
impl Writeable for u16 {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
        b.write_u16(*self);
    }
}

impl Readable for u16 {
    fn take_from(r: &mut Reader<'_>) -> Result<Self> {
        r.take_u16()
    }
}

// Addresses go on the wire as raw octets, network order.

impl Writeable for Ipv4Addr {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
        b.write_all(&self.octets());
    }
}

impl Readable for Ipv4Addr {
    fn take_from(r: &mut Reader<'_>) -> Result<Self> {
        r.take_array4().map(Ipv4Addr::from)
    }
}

impl Writeable for Ipv6Addr {
    fn write_onto<B: Writer + ?Sized>(&self, b: &mut B) {
        b.write_all(&self.octets());
    }
}

impl Readable for Ipv6Addr {
    fn take_from(r: &mut Reader<'_>) -> Result<Self> {
        r.take_array16().map(Ipv6Addr::from)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn socks5_ipv4_destination() {
        let mut v = Vec::new();
        v.write(&Ipv4Addr::new(198, 51, 100, 2));
        v.write(&1080_u16);
        assert_eq!(&v[..], &hex!("c6336402 0438")[..]);

        let mut r = Reader::from_slice(&v[..]);
        assert_eq!(r.extract::<Ipv4Addr>().unwrap(), Ipv4Addr::new(198, 51, 100, 2));
        assert_eq!(r.extract::<u16>().unwrap(), 1080);
        assert_eq!(r.extract::<u8>(), Err(Error::Truncated));
    }

    #[test]
    fn socks5_ipv6_destination() {
        let ip: Ipv6Addr = "2001:db8::1:0".parse().unwrap();
        let mut v = vec![0x04];
        v.write(&ip);
        assert_eq!(&v[..], &hex!("04 20010db8 00000000 00000000 00010000")[..]);

        let mut r = Reader::from_slice(&v[..]);
        assert_eq!(r.extract::<u8>().unwrap(), 4);
        assert_eq!(r.extract::<Ipv6Addr>().unwrap(), ip);

        // One octet short: nothing is consumed.
        let mut r = Reader::from_slice(&v[1..16]);
        assert_eq!(r.extract::<Ipv6Addr>(), Err(Error::Truncated));
        assert_eq!(r.remaining(), 15);
    }
}
