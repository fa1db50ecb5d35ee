//! Different implementations of a common async API for use by the
//! SOCKS client.
//!
//! Currently only tokio is provided.

#[cfg(feature = "tokio")]
pub(crate) mod tokio;
