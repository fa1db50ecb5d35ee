//! Exercise the tokio runtime through our traits only.
use crate::tokio::test_with_runtime;
use crate::traits::*;
use crate::{SleepProviderExt, TimeoutError};

use futures::future::pending;
use futures::io::{AsyncReadExt, AsyncWriteExt};
use std::io::Result as IoResult;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

#[test]
fn sleep_takes_time() {
    test_with_runtime(|rt| async move {
        let before = rt.now();
        rt.sleep(Duration::from_millis(3)).await;
        assert!(rt.now() - before >= Duration::from_millis(3));
    });
}

#[test]
fn timeouts() {
    test_with_runtime(|rt| async move {
        let ready = rt.timeout(Duration::from_secs(3600), async { "done" });
        assert_eq!(ready.await, Ok("done"));

        let stuck = rt.timeout(Duration::from_millis(1), pending::<()>()).await;
        assert_eq!(stuck, Err(TimeoutError));
        assert_eq!(TimeoutError.to_string(), "Timeout expired");
    });
}

#[test]
fn deadlines() {
    test_with_runtime(|rt| async move {
        let start = rt.now();
        rt.sleep(Duration::from_millis(2)).await;
        let missed = rt.deadline(start, pending::<()>()).await;
        assert_eq!(missed, Err(TimeoutError));

        // Already-finished work beats an expired deadline.
        assert_eq!(rt.deadline(start, async { 7_u8 }).await, Ok(7));
    });
}

// Needs IPv4 localhost.
#[test]
fn loopback_greeting() -> IoResult<()> {
    let any_port = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    test_with_runtime(|rt| async move {
        let listener = rt.listen(&any_port).await?;
        let addr = listener.local_addr()?;

        let proxy = async {
            let (mut conn, peer) = listener.accept().await?;
            assert_eq!(peer.ip(), addr.ip());
            let mut greeting = [0_u8; 3];
            conn.read_exact(&mut greeting[..]).await?;
            conn.write_all(&[5, 0]).await?;
            conn.flush().await?;
            IoResult::Ok(greeting)
        };
        let client = async {
            let mut conn = rt.connect(&addr).await?;
            conn.write_all(&[5, 1, 0]).await?;
            conn.flush().await?;
            let mut choice = [0_u8; 2];
            conn.read_exact(&mut choice[..]).await?;
            IoResult::Ok(choice)
        };

        let (greeting, choice) = futures::join!(proxy, client);
        assert_eq!(greeting?, [5, 1, 0]);
        assert_eq!(choice?, [5, 0]);
        Ok(())
    })
}

#[test]
fn handle_to_current_runtime() {
    assert!(crate::tokio::current_runtime().is_err());
    test_with_runtime(|_rt| async {
        let rt = crate::tokio::current_runtime().expect("inside tokio");
        let outcome = rt.timeout(Duration::from_secs(60), async { 1_u8 }).await;
        assert_eq!(outcome, Ok(1));
    });
}
