//! The few things the SOCKS client needs from an async runtime.
//!
//! The client never names tokio directly.  It is generic over
//! `R: `[`Runtime`], which bundles:
//!
//! * [`TcpProvider`]: reach a proxy (and, for tests, listen like one);
//! * [`SleepProvider`]: a clock, for timeouts and deadlines;
//! * [`SpawnBlocking`]: drive a future from synchronous code.
//!
//! That keeps the handshake code testable against a simulated network
//! and clock, which lives in `socks-rtmock`.
//!
//! The `tokio` feature (on by default) provides the real runtime.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::await_holding_lock)]
#![warn(clippy::needless_borrow)]

pub(crate) mod impls;
mod timer;
mod traits;

#[cfg(all(test, feature = "tokio"))]
mod test;

pub use timer::{SleepProviderExt, Timeout, TimeoutError};
pub use traits::{Runtime, SleepProvider, SpawnBlocking, TcpListener, TcpProvider};

#[cfg(feature = "tokio")]
pub mod tokio;

#[cfg(feature = "tokio")]
pub use crate::tokio::create_runtime;
