#![no_main]
use libfuzzer_sys::fuzz_target;

use socks_proto::{ClientHandshake, RemoteHost, SocksAuth, SocksCmd, SocksRequest, SocksVersion};

fuzz_target!(|data: (bool, u8, Vec<Vec<u8>>)| {
    let (v5, cmd, inputs) = data;
    let version = if v5 { SocksVersion::V5 } else { SocksVersion::V4 };
    let request = match SocksRequest::new(
        version,
        SocksCmd::from(cmd % 4),
        RemoteHost::new("example.com", 80),
        [127, 0, 0, 1].into(),
        SocksAuth::new().with_credentials(&b"user"[..], &b"pass"[..]),
    ) {
        Ok(r) => r,
        Err(_) => return,
    };
    let mut hs = ClientHandshake::new(request);
    let _ = hs.begin_connect();
    let _ = hs.connected();
    for d in inputs {
        let _ = hs.handshake(&d);
    }
});
