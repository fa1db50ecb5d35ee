//! Adapter for callers that want a callback instead of a future.

use futures::Future;

/// Run `future`, then hand its output to `callback`.
///
/// ```
/// use socks_client::with_callback;
/// let mut got = None;
/// futures::executor::block_on(with_callback(async { 7 }, |v| got = Some(v)));
/// assert_eq!(got, Some(7));
/// ```
pub async fn with_callback<F, C>(future: F, callback: C)
where
    F: Future,
    C: FnOnce(F::Output),
{
    callback(future.await);
}
