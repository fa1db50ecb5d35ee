//! Build tunnels through more than one scripted proxy.

use socks_client::{
    connect_chain, connect_chain_with_rng, ChainOptions, ErrorContext, ErrorKind,
    ProxyDescriptor, RemoteHost, SocksCmd,
};
use socks_proto::SocksStatus;
use socks_rtcompat::{SpawnBlocking, TcpListener, TcpProvider};
use socks_rtmock::io::LocalStream;
use socks_rtmock::net::{MockNetProvider, MockNetwork};
use socks_rtmock::MockRuntime;

use futures::io::{AsyncReadExt, AsyncWriteExt};
use hex_literal::hex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::net::SocketAddr;

/// Build a client runtime, and one host with the addresses of both
/// proxies.
fn setup() -> (MockRuntime, MockNetProvider) {
    let net = MockNetwork::new();
    let client = net
        .builder()
        .add_address("192.0.2.55".parse().unwrap())
        .runtime();
    let proxies = net
        .builder()
        .add_address("192.0.2.1".parse().unwrap())
        .add_address("198.51.100.2".parse().unwrap())
        .provider();
    (client, proxies)
}

fn first() -> ProxyDescriptor {
    ProxyDescriptor::new("192.0.2.1", 1080, 5)
}

fn second() -> ProxyDescriptor {
    ProxyDescriptor::new("198.51.100.2", 1080, 4)
}

fn sockaddr(p: &ProxyDescriptor) -> SocketAddr {
    format!("{}:{}", p.address, p.port).parse().unwrap()
}

async fn expect(conn: &mut LocalStream, expected: &[u8]) {
    let mut buf = vec![0_u8; expected.len()];
    conn.read_exact(&mut buf[..]).await.unwrap();
    assert_eq!(&buf[..], expected);
}

fn cat(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

/// Play the SOCKS5 proxy at 192.0.2.1, then the SOCKS4a proxy at
/// 198.51.100.2 behind it, on a single stream.
async fn two_proxies(conn: &mut LocalStream) {
    expect(conn, &hex!("05 01 00")).await;
    conn.write_all(&hex!("05 00")).await.unwrap();
    expect(conn, &hex!("05 01 00 01 c6336402 0438")).await;
    conn.write_all(&hex!("05 00 00 01 00000000 0000")).await.unwrap();

    expect(
        conn,
        &cat(&[&hex!("04 01 0050 00000001 00"), b"example.com", &[0]]),
    )
    .await;
    conn.write_all(&cat(&[&hex!("00 5A 0000 00000000"), b"hi"]))
        .await
        .unwrap();
}

#[test]
fn two_hops() {
    let (rt, proxies) = setup();
    let chain = ChainOptions::new(RemoteHost::new("example.com", 80), vec![first(), second()]);
    rt.block_on(async {
        let lis = proxies.listen(&sockaddr(&first())).await.unwrap();
        let (greeting, ()) = futures::join!(
            async {
                let est = connect_chain(&rt, &chain).await.unwrap();
                assert!(est.remote_host().is_none());
                let mut stream = est.into_stream();
                let mut buf = [0_u8; 2];
                stream.read_exact(&mut buf[..]).await.unwrap();
                buf
            },
            async {
                let (mut conn, _) = lis.accept().await.unwrap();
                two_proxies(&mut conn).await;
            }
        );
        assert_eq!(&greeting, b"hi");
    });
}

#[test]
fn first_hop_rejected() {
    let (rt, proxies) = setup();
    let chain = ChainOptions::new(RemoteHost::new("example.com", 80), vec![first(), second()]);
    rt.block_on(async {
        let lis = proxies.listen(&sockaddr(&first())).await.unwrap();
        let (r, ()) = futures::join!(connect_chain(&rt, &chain), async {
            let (mut conn, _) = lis.accept().await.unwrap();
            expect(&mut conn, &hex!("05 01 00")).await;
            conn.write_all(&hex!("05 00")).await.unwrap();
            expect(&mut conn, &hex!("05 01 00 01 c6336402 0438")).await;
            conn.write_all(&hex!("05 02 00 01 00000000 0000"))
                .await
                .unwrap();
            // Nothing is ever sent to the second proxy.
            let mut rest = Vec::new();
            conn.read_to_end(&mut rest).await.unwrap();
            assert!(rest.is_empty());
        });
        let e = r.err().unwrap();
        assert!(matches!(
            e.kind(),
            ErrorKind::Rejected(socks_proto::Error::Socks5Rejected(SocksStatus::NOT_ALLOWED))
        ));
        match e.context() {
            ErrorContext::Connection(hop) => {
                assert_eq!(hop.proxy().remote_host(), first().remote_host());
                assert_eq!(hop.destination(), &second().remote_host());
            }
            other => panic!("{:?}", other),
        }
    });
}

#[test]
fn bad_chains() {
    let (rt, _) = setup();
    rt.block_on(async {
        let chain = ChainOptions::new(RemoteHost::new("example.com", 80), vec![first()]);
        let e = connect_chain(&rt, &chain).await.err().unwrap();
        assert!(matches!(e.kind(), ErrorKind::Validation(_)));
        assert!(matches!(e.context(), ErrorContext::Chain(_)));

        let chain = ChainOptions::new(RemoteHost::new("example.com", 80), vec![first(), second()])
            .with_command(SocksCmd::BIND);
        let e = connect_chain(&rt, &chain).await.err().unwrap();
        assert!(matches!(e.kind(), ErrorKind::Validation(_)));
    });
}

#[test]
fn random_order() {
    let seed = 1234;
    // Shuffling depends only on the length and the generator, so this
    // tells us which proxy will be asked first.
    let mut order = vec![0_usize, 1];
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let all = vec![first(), second()];
    let entry = all[order[0]].clone();
    let exit = all[order[1]].clone();

    let (rt, proxies) = setup();
    let chain = ChainOptions::new(RemoteHost::new("198.51.100.80", 80), all).with_randomize(true);
    rt.block_on(async {
        let lis = proxies.listen(&sockaddr(&entry)).await.unwrap();
        let (r, ()) = futures::join!(
            async {
                let mut rng = StdRng::seed_from_u64(seed);
                connect_chain_with_rng(&rt, &chain, &mut rng)
                    .await
                    .map(|est| est.remote_host().cloned())
            },
            async {
                let (mut conn, _) = lis.accept().await.unwrap();
                let port = hex!("0438");
                let ip = if exit.address == "192.0.2.1" {
                    hex!("c0000201")
                } else {
                    hex!("c6336402")
                };
                // First hop: a CONNECT to the exit proxy.
                if entry.version == 5 {
                    expect(&mut conn, &hex!("05 01 00")).await;
                    conn.write_all(&hex!("05 00")).await.unwrap();
                    expect(&mut conn, &cat(&[&hex!("05 01 00 01"), &ip, &port])).await;
                    conn.write_all(&hex!("05 00 00 01 00000000 0000"))
                        .await
                        .unwrap();
                } else {
                    expect(&mut conn, &cat(&[&hex!("04 01"), &port, &ip, &[0]])).await;
                    conn.write_all(&hex!("00 5A 0000 00000000")).await.unwrap();
                }
                // Second hop: a CONNECT to the destination.
                if exit.version == 5 {
                    expect(&mut conn, &hex!("05 01 00")).await;
                    conn.write_all(&hex!("05 00")).await.unwrap();
                    expect(&mut conn, &hex!("05 01 00 01 c6336450 0050")).await;
                    conn.write_all(&hex!("05 00 00 01 00000000 0000"))
                        .await
                        .unwrap();
                } else {
                    expect(&mut conn, &hex!("04 01 0050 c6336450 00")).await;
                    conn.write_all(&hex!("00 5A 0000 00000000")).await.unwrap();
                }
                let mut rest = Vec::new();
                conn.read_to_end(&mut rest).await.unwrap();
            }
        );
        assert_eq!(r.unwrap(), None);
    });
}
