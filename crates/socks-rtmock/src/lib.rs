//! A fake runtime for testing SOCKS code without sockets or waiting.
//!
//! * [`time`]: a clock that moves only when the test says so.
//! * [`io`]: in-memory stream pairs.
//! * [`net`]: a pretend network of hosts, where listeners and
//!   connections are matched up by address.
//!
//! [`MockRuntime`] puts a host and a clock together, and implements
//! [`Runtime`](socks_rtcompat::Runtime).
//!
//! Not for use outside tests.

#![deny(missing_docs)]
#![deny(clippy::await_holding_lock)]
#![warn(clippy::needless_borrow)]

pub mod io;
pub mod net;
pub mod time;

mod runtime;
pub use runtime::MockRuntime;
