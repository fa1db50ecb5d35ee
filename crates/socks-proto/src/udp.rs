//! Framing for datagrams sent through a SOCKS5 UDP relay.
//!
//! Every datagram that goes to or comes from the relay starts with a
//! small header naming the remote host:
//!
//! ```text
//!   +----+------+------+----------+----------+----------+
//!   |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
//!   +----+------+------+----------+----------+----------+
//!   | 2  |  1   |  1   | Variable |    2     | Variable |
//!   +----+------+------+----------+----------+----------+
//! ```

use crate::err::Stage;
use crate::msg::{RemoteHost, SocksAddr};
use crate::{Error, Result};

use socks_bytes::Result as BytesResult;
use socks_bytes::{Readable, Reader, Writer};

/// One datagram, with the header that a SOCKS5 UDP relay expects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpFrame {
    /// Fragment number.  Zero means "not fragmented", which is all that
    /// most relays support.
    frame_number: u8,
    /// Where the datagram is going to, or where it came from.
    remote_host: RemoteHost,
    /// The datagram itself.
    payload: Vec<u8>,
}

impl UdpFrame {
    /// Construct a new unfragmented UdpFrame.
    pub fn new(remote_host: RemoteHost, payload: impl Into<Vec<u8>>) -> Self {
        UdpFrame {
            frame_number: 0,
            remote_host,
            payload: payload.into(),
        }
    }

    /// Set the fragment number of this frame.
    pub fn with_frame_number(mut self, frame_number: u8) -> Self {
        self.frame_number = frame_number;
        self
    }

    /// Return the fragment number of this frame.
    pub fn frame_number(&self) -> u8 {
        self.frame_number
    }

    /// Return the remote end of this datagram.
    pub fn remote_host(&self) -> &RemoteHost {
        &self.remote_host
    }

    /// Return the datagram carried in this frame.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..]
    }

    /// Consume this frame and return its datagram.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Encode this frame for sending to a relay.
    ///
    /// Fails only if the remote host can't be encoded in SOCKS5.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let addr = self.remote_host.addr()?;
        let mut w = Vec::with_capacity(self.payload.len() + 32);
        w.write_u16(0); // reserved.
        w.write_u8(self.frame_number);
        w.write(&addr);
        w.write_u16(self.remote_host.port());
        w.write_all(&self.payload[..]);
        Ok(w)
    }

    /// Decode a frame received from a relay.
    ///
    /// The reserved bytes are not checked.  Everything after the port
    /// is payload.  A datagram is never "not fully present yet", so a
    /// short frame is a syntax error.
    pub fn decode(bytes: &[u8]) -> Result<UdpFrame> {
        Reader::from_slice(bytes)
            .extract()
            .map_err(|_| Error::Syntax(Stage::UdpFrame))
    }
}

impl Readable for UdpFrame {
    fn take_from(r: &mut Reader<'_>) -> BytesResult<UdpFrame> {
        let _reserved = r.take_u16()?;
        let frame_number = r.take_u8()?;
        let addr: SocksAddr = r.extract()?;
        let port = r.take_u16()?;
        let payload = r.take(r.remaining())?.to_vec();
        Ok(UdpFrame {
            frame_number,
            remote_host: RemoteHost::new(addr.to_string(), port),
            payload,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn encode() {
        let f = UdpFrame::new(RemoteHost::new("1.2.3.4", 53), &b"hi"[..]);
        assert_eq!(f.frame_number(), 0);
        assert_eq!(f.encode().unwrap(), hex!("0000 00 01 01020304 0035 6869"));

        let f = UdpFrame::new(RemoteHost::new("ab.c", 7), Vec::new()).with_frame_number(3);
        assert_eq!(f.encode().unwrap(), hex!("0000 03 03 04 61622e63 0007"));

        let f = UdpFrame::new(RemoteHost::new("::1", 443), &b"x"[..]);
        assert_eq!(
            f.encode().unwrap(),
            hex!("0000 00 04 00000000000000000000000000000001 01bb 78")
        );

        let f = UdpFrame::new(RemoteHost::new("", 443), &b"x"[..]);
        assert!(f.encode().is_err());
    }

    #[test]
    fn inverse() {
        let frames = vec![
            UdpFrame::new(RemoteHost::new("192.0.2.44", 9999), &b"ipv4 payload"[..]),
            UdpFrame::new(RemoteHost::new("2001:db8::5", 1), &b"ipv6"[..]).with_frame_number(1),
            UdpFrame::new(RemoteHost::new("dns.example.org", 65535), Vec::new()),
        ];
        for f in frames {
            let encoded = f.encode().unwrap();
            assert_eq!(UdpFrame::decode(&encoded).unwrap(), f);
        }
    }

    #[test]
    fn decode_bad() {
        // Unknown address type.
        let e = UdpFrame::decode(&hex!("0000 00 09 01020304 0035"));
        assert_eq!(e, Err(Error::Syntax(Stage::UdpFrame)));
        // Too short for its address.
        let e = UdpFrame::decode(&hex!("0000 00 01 010203"));
        assert_eq!(e, Err(Error::Syntax(Stage::UdpFrame)));
        let e = UdpFrame::decode(&hex!("0000 00 03 08 6162"));
        assert_eq!(e, Err(Error::Syntax(Stage::UdpFrame)));
        // The reserved bytes are ignored.
        let f = UdpFrame::decode(&hex!("ffff 00 01 01020304 0035 00")).unwrap();
        assert_eq!(f.remote_host(), &RemoteHost::new("1.2.3.4", 53));
        assert_eq!(f.into_payload(), vec![0]);
    }
}
