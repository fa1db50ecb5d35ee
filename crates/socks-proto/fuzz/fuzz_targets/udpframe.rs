#![no_main]
use libfuzzer_sys::fuzz_target;

use socks_proto::UdpFrame;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = UdpFrame::decode(data) {
        let _ = frame.encode();
    }
});
