//! Run the subcommands of `socksc`.

use crate::settings::SockscConfig;
use crate::{AssociateArgs, BindArgs, ChainArgs, Command, ConnectArgs};

use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio_crate::net::UdpSocket;
use tracing::{debug, info};

use socks_client::{RemoteHost, SocksCmd, UdpFrame};
use socks_rtcompat::{Runtime, SleepProviderExt};

use anyhow::{anyhow, Context, Result};

/// Run `cmd` using `runtime`.
pub(crate) async fn run<R: Runtime>(runtime: R, config: SockscConfig, cmd: Command) -> Result<()> {
    match cmd {
        Command::Connect(args) => connect(&runtime, &config, args).await,
        Command::Bind(args) => bind(&runtime, &config, args).await,
        Command::Associate(args) => associate(&runtime, &config, args).await,
        Command::Chain(args) => chain(&runtime, &config, args).await,
    }
}

/// `socksc connect`
async fn connect<R: Runtime>(runtime: &R, config: &SockscConfig, args: ConnectArgs) -> Result<()> {
    let options = config.options(SocksCmd::CONNECT, RemoteHost::new(args.host, args.port))?;
    let est = socks_client::create_connection(runtime, &options)
        .await
        .with_context(|| format!("Couldn't connect to {}", options.destination()))?;
    info!(
        "Connected to {} via {}",
        options.destination(),
        options.proxy().remote_host()
    );
    converse(est.into_stream(), &args.send).await
}

/// `socksc bind`
async fn bind<R: Runtime>(runtime: &R, config: &SockscConfig, args: BindArgs) -> Result<()> {
    let options = config.options(SocksCmd::BIND, RemoteHost::new(args.peer, args.port))?;
    let bound = socks_client::connect(runtime, &options)
        .await
        .context("Couldn't ask the proxy to listen")?
        .into_bound()
        .ok_or_else(|| anyhow!("Proxy accepted BIND without telling us where it listens"))?;

    // Whoever is going to connect needs to know this.
    println!("Listening at {}", bound.remote_host());

    let est = bound.accept().await.context("No connection arrived")?;
    match est.remote_host() {
        Some(peer) => info!("Connection from {}", peer),
        None => info!("Connection from an unknown peer"),
    }
    converse(est.into_stream(), &args.send).await
}

/// `socksc associate`
async fn associate<R: Runtime>(
    runtime: &R,
    config: &SockscConfig,
    args: AssociateArgs,
) -> Result<()> {
    // We don't know what address our datagrams will come from.
    let options = config.options(SocksCmd::UDP_ASSOCIATE, RemoteHost::new("0.0.0.0", 0))?;
    let est = socks_client::connect(runtime, &options)
        .await
        .context("Couldn't ask the proxy for a UDP relay")?
        .into_established()
        .ok_or_else(|| anyhow!("Proxy gave an unexpected answer to UDP ASSOCIATE"))?;
    let relay = est
        .remote_host()
        .ok_or_else(|| anyhow!("Proxy didn't say where its UDP relay is"))?;
    let relay_ip: IpAddr = relay
        .host()
        .parse()
        .with_context(|| format!("UDP relay address {} isn't an IP address", relay))?;
    let relay_addr = SocketAddr::new(relay_ip, relay.port());
    info!("UDP relay is at {}", relay_addr);

    let local: SocketAddr = match relay_ip {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local).await?;

    let frame = UdpFrame::new(RemoteHost::new(args.host, args.port), args.payload.into_bytes());
    let out = frame.encode()?;
    socket.send_to(&out[..], relay_addr).await?;
    debug!("Sent {} bytes to {}", out.len(), relay_addr);

    let mut buf = vec![0_u8; 65536];
    let (n, from) = runtime
        .timeout(options.timeout(), socket.recv_from(&mut buf[..]))
        .await
        .context("No answer from the UDP relay")??;
    let answer = UdpFrame::decode(&buf[..n])?;
    println!(
        "{} bytes from {} (relayed by {}): {}",
        answer.payload().len(),
        answer.remote_host(),
        from,
        String::from_utf8_lossy(answer.payload())
    );

    // The relay only lasts as long as the TCP connection.
    drop(est);
    Ok(())
}

/// `socksc chain`
async fn chain<R: Runtime>(runtime: &R, config: &SockscConfig, args: ChainArgs) -> Result<()> {
    let chain = config.chain(RemoteHost::new(args.host, args.port));
    let est = socks_client::connect_chain(runtime, &chain)
        .await
        .with_context(|| format!("Couldn't build a chain to {}", chain.destination()))?;
    info!(
        "Connected to {} through {} proxies",
        chain.destination(),
        chain.proxies().len()
    );
    converse(est.into_stream(), &args.send).await
}

/// Send each of `lines` over `stream`, then copy everything that comes
/// back to stdout until the stream is closed.
async fn converse<S>(mut stream: S, lines: &[String]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for line in lines {
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
    }
    stream.flush().await?;

    let stdout = std::io::stdout();
    let mut buf = [0_u8; 1024];
    loop {
        let n = stream
            .read(&mut buf[..])
            .await
            .context("Error while reading from the tunnel")?;
        if n == 0 {
            break;
        }
        let mut out = stdout.lock();
        out.write_all(&buf[..n])?;
        out.flush()?;
    }
    Ok(())
}
