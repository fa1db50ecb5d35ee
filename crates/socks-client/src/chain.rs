//! Tunnel through several proxies, one inside the other.
//!
//! The first proxy is reached over TCP.  Each later proxy is reached by
//! a CONNECT through the proxies before it, and the last proxy
//! connects to the destination.

use crate::client::{dial, run, Established};
use crate::err::ErrorKind;
use crate::options::{ChainOptions, ProxyDescriptor};
use crate::Result;

use socks_proto::SocksCmd;
use socks_rtcompat::Runtime;

use futures::future;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Open a tunnel through every proxy in `chain`.
///
/// If the chain asks for a random order, it comes from the thread RNG.
/// The first hop to fail ends the attempt, and its error is returned
/// as it was.
pub async fn connect_chain<R: Runtime>(
    runtime: &R,
    chain: &ChainOptions,
) -> Result<Established<R::TcpStream>> {
    let proxies = {
        let mut rng = rand::thread_rng();
        hop_order(chain, &mut rng)
    };
    run_chain(runtime, chain, proxies).await
}

/// Like [`connect_chain`], but takes the random order (if any) from
/// `rng`.
pub async fn connect_chain_with_rng<R, G>(
    runtime: &R,
    chain: &ChainOptions,
    rng: &mut G,
) -> Result<Established<R::TcpStream>>
where
    R: Runtime,
    G: Rng + ?Sized,
{
    let proxies = hop_order(chain, rng);
    run_chain(runtime, chain, proxies).await
}

/// Return the proxies of `chain` in the order we'll use them.
fn hop_order<G: Rng + ?Sized>(chain: &ChainOptions, rng: &mut G) -> Vec<ProxyDescriptor> {
    let mut proxies = chain.proxies().to_vec();
    if chain.randomize() {
        proxies.shuffle(rng);
    }
    proxies
}

/// Build the tunnel through `proxies`, in order.
async fn run_chain<R: Runtime>(
    runtime: &R,
    chain: &ChainOptions,
    proxies: Vec<ProxyDescriptor>,
) -> Result<Established<R::TcpStream>> {
    chain.validate().map_err(|k| k.on_chain(chain))?;

    let n_hops = proxies.len();
    let mut tunnel: Option<Established<R::TcpStream>> = None;
    for (idx, proxy) in proxies.iter().enumerate() {
        let target = match proxies.get(idx + 1) {
            Some(next) => next.remote_host(),
            None => chain.destination().clone(),
        };
        let options = chain.hop(proxy, target);
        let request = options
            .validate(&[SocksCmd::CONNECT])
            .map_err(|k| k.on(&options))?;
        debug!(
            "Chain hop {}/{}: {} to {}",
            idx + 1,
            n_hops,
            proxy.remote_host(),
            options.destination()
        );

        let event = match tunnel.take() {
            None => {
                let addr = proxy.socket_addr().map_err(|k| k.on(&options))?;
                run(runtime, &options, request, dial(runtime, addr)).await?
            }
            Some(prev) => {
                let stream = prev.into_stream();
                run(runtime, &options, request, future::ready(Ok(stream))).await?
            }
        };
        let established = event
            .into_established()
            .ok_or_else(|| ErrorKind::Negotiation(socks_proto::Error::Internal).on(&options))?;
        tunnel = Some(established);
    }

    tunnel.ok_or_else(|| ErrorKind::Negotiation(socks_proto::Error::Internal).on_chain(chain))
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use socks_proto::RemoteHost;

    fn chain(randomize: bool) -> ChainOptions {
        let proxies = (1..=6)
            .map(|i| ProxyDescriptor::new(format!("192.0.2.{}", i), 1080, 5))
            .collect();
        ChainOptions::new(RemoteHost::new("example.com", 80), proxies).with_randomize(randomize)
    }

    fn addrs(v: &[ProxyDescriptor]) -> Vec<String> {
        v.iter().map(|p| p.address.clone()).collect()
    }

    #[test]
    fn fixed_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let c = chain(false);
        for _ in 0..5 {
            assert_eq!(addrs(&hop_order(&c, &mut rng)), addrs(c.proxies()));
        }
    }

    #[test]
    fn shuffled_order() {
        let c = chain(true);
        let original = addrs(c.proxies());

        let mut rng = StdRng::seed_from_u64(12345);
        let mut seen_different = false;
        for _ in 0..20 {
            let mut order = addrs(&hop_order(&c, &mut rng));
            if order != original {
                seen_different = true;
            }
            // Always a permutation.
            order.sort();
            let mut sorted = original.clone();
            sorted.sort();
            assert_eq!(order, sorted);
        }
        assert!(seen_different);

        // The same seed gives the same order.
        let a = hop_order(&c, &mut StdRng::seed_from_u64(99));
        let b = hop_order(&c, &mut StdRng::seed_from_u64(99));
        assert_eq!(addrs(&a), addrs(&b));
    }
}
