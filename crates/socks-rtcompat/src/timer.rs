//! Timeouts and deadlines on top of any [`SleepProvider`].

use crate::traits::SleepProvider;
use futures::Future;
use pin_project::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// The time given to a [`Timeout`] ran out first.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(clippy::exhaustive_structs)]
pub struct TimeoutError;

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Timeout expired")
    }
}

impl std::error::Error for TimeoutError {}

/// Race futures against a [`SleepProvider`]'s clock.
pub trait SleepProviderExt: SleepProvider {
    /// Run `future` for at most `duration`.
    ///
    /// Yields `Ok` with the future's output, or `Err(TimeoutError)` if
    /// the sleep finished first.
    fn timeout<F: Future>(&self, duration: Duration, future: F) -> Timeout<F, Self::SleepFuture> {
        Timeout {
            inner: future,
            alarm: self.sleep(duration),
        }
    }

    /// Run `future` until this provider's clock reaches `when`.
    ///
    /// If `when` has already passed, `future` still gets one poll.
    fn deadline<F: Future>(&self, when: Instant, future: F) -> Timeout<F, Self::SleepFuture> {
        self.timeout(when.saturating_duration_since(self.now()), future)
    }
}

impl<T: SleepProvider> SleepProviderExt for T {}

/// Future returned by [`SleepProviderExt::timeout`] and
/// [`SleepProviderExt::deadline`].
#[pin_project]
pub struct Timeout<F, S> {
    /// What we're waiting for.
    #[pin]
    inner: F,
    /// When it fires, we give up.
    #[pin]
    alarm: S,
}

impl<F, S> Future for Timeout<F, S>
where
    F: Future,
    S: Future<Output = ()>,
{
    type Output = Result<F::Output, TimeoutError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        // The inner future wins ties.
        match this.inner.poll(cx) {
            Poll::Ready(v) => Poll::Ready(Ok(v)),
            Poll::Pending => this.alarm.poll(cx).map(|()| Err(TimeoutError)),
        }
    }
}
