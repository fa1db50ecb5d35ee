//! The runtime that tests hand to the SOCKS client.

use crate::io::LocalStream;
use crate::net::{MockNetListener, MockNetProvider};
use crate::time::MockSleepProvider;
use socks_rtcompat::{SleepProvider, SpawnBlocking, TcpProvider};

use async_trait::async_trait;
use futures::Future;
use std::io::Result as IoResult;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A [`Runtime`](socks_rtcompat::Runtime) made entirely of mocks.
///
/// Network calls go to a [`MockNetProvider`]; time-related calls go
/// to a [`MockSleepProvider`], so timeouts only fire when a test calls
/// [`advance`](Self::advance).  Blocking uses a plain
/// `futures::executor`.
#[derive(Clone)]
pub struct MockRuntime {
    /// Our view of the simulated network.
    net: MockNetProvider,
    /// Our simulated clock.
    sleep: MockSleepProvider,
}

impl MockRuntime {
    /// Create a new runtime that uses `net` for the network, and a new
    /// [`MockSleepProvider`] for time.
    pub fn new(net: MockNetProvider) -> Self {
        MockRuntime {
            net,
            sleep: MockSleepProvider::new(),
        }
    }

    /// The clock.
    pub fn mock_sleep(&self) -> &MockSleepProvider {
        &self.sleep
    }

    /// Our host on the simulated network.
    pub fn mock_net(&self) -> &MockNetProvider {
        &self.net
    }

    /// Move the clock forward; see [`MockSleepProvider::advance()`].
    pub async fn advance(&self, dur: Duration) {
        self.sleep.advance(dur).await;
    }
}

impl SpawnBlocking for MockRuntime {
    fn block_on<F: Future>(&self, future: F) -> F::Output {
        futures::executor::block_on(future)
    }
}

#[async_trait]
impl TcpProvider for MockRuntime {
    type TcpStream = LocalStream;
    type TcpListener = MockNetListener;

    async fn connect(&self, addr: &SocketAddr) -> IoResult<Self::TcpStream> {
        self.net.connect(addr).await
    }
    async fn listen(&self, addr: &SocketAddr) -> IoResult<Self::TcpListener> {
        self.net.listen(addr).await
    }
}

impl SleepProvider for MockRuntime {
    type SleepFuture = <MockSleepProvider as SleepProvider>::SleepFuture;
    fn sleep(&self, dur: Duration) -> Self::SleepFuture {
        self.sleep.sleep(dur)
    }
    fn now(&self) -> Instant {
        self.sleep.now()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::net::MockNetwork;
    use socks_rtcompat::{SleepProviderExt, TimeoutError};

    #[test]
    fn timeout_follows_simulated_time() {
        let rt = MockNetwork::new()
            .builder()
            .add_address("192.0.2.1".parse().unwrap())
            .runtime();
        let rt2 = rt.clone();
        let start = rt.now();
        rt.block_on(async {
            let (outcome, ()) = futures::join!(
                rt2.timeout(Duration::from_secs(30), futures::future::pending::<()>()),
                rt2.advance(Duration::from_secs(31)),
            );
            assert_eq!(outcome, Err(TimeoutError));
        });
        assert_eq!(rt.now(), start + Duration::from_secs(31));
    }
}
