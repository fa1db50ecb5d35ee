//! A clock that only moves when a test tells it to.
//!
//! [`MockSleepProvider`] implements [`SleepProvider`] with a simulated
//! `Instant`.  Sleeps and timeouts taken from it complete when the test
//! calls [`MockSleepProvider::advance`] far enough, and never because
//! real time went by.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use futures::Future;

use socks_rtcompat::SleepProvider;

/// A [`SleepProvider`] with a simulated clock.
///
/// Clones share the same clock.  The clock starts at the real time of
/// creation, and after that only moves forward through
/// [`advance`](Self::advance).
#[derive(Clone)]
pub struct MockSleepProvider {
    /// The clock, and the timers that are waiting on it.
    clock: Arc<Mutex<Clock>>,
}

/// The shared state of a [`MockSleepProvider`].
struct Clock {
    /// What time we pretend it is.
    now: Instant,
    /// Pending timers, soonest on top.
    ///
    /// The sequence number keeps the heap ordered without comparing
    /// wakers.
    timers: BinaryHeap<Reverse<(Instant, u64)>>,
    /// The waker for each entry in `timers`, by sequence number.
    wakers: Vec<(u64, Waker)>,
    /// The sequence number for the next timer.
    next_seq: u64,
}

impl Clock {
    /// Remember to wake `waker` at `when`.
    fn schedule(&mut self, when: Instant, waker: Waker) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Reverse((when, seq)));
        self.wakers.push((seq, waker));
    }

    /// Wake every timer whose time has come.
    fn fire(&mut self) {
        while let Some(Reverse((when, seq))) = self.timers.peek().copied() {
            if when > self.now {
                break;
            }
            self.timers.pop();
            if let Some(pos) = self.wakers.iter().position(|(s, _)| *s == seq) {
                let (_, waker) = self.wakers.swap_remove(pos);
                waker.wake();
            }
        }
    }
}

/// A future returned by [`MockSleepProvider::sleep`].
pub struct Sleeping {
    /// When we become ready.
    when: Instant,
    /// True once we have a timer on the clock.
    scheduled: bool,
    /// The clock to check.  If it's gone, we never finish.
    clock: Weak<Mutex<Clock>>,
}

impl MockSleepProvider {
    /// Make a new clock, starting at the current time.
    pub fn new() -> Self {
        MockSleepProvider {
            clock: Arc::new(Mutex::new(Clock {
                now: Instant::now(),
                timers: BinaryHeap::new(),
                wakers: Vec::new(),
                next_seq: 0,
            })),
        }
    }

    /// Lock the clock.
    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().expect("mock clock lock poisoned")
    }

    /// Move the clock forward by `dur`, wake the timers that are due,
    /// and yield once so that they get polled.
    pub async fn advance(&self, dur: Duration) {
        self.advance_noyield(dur);
        YieldNow { yielded: false }.await;
    }

    /// Move the clock forward by `dur`, and wake the timers that are
    /// due, without yielding.
    ///
    /// Woken futures won't run until the current task yields; usually
    /// you want [`advance`](Self::advance).
    pub fn advance_noyield(&self, dur: Duration) {
        let mut clock = self.lock();
        clock.now += dur;
        clock.fire();
    }

    /// Return how long until the next pending timer is due, or None if
    /// there are no pending timers.
    ///
    /// A timer counts as pending once its future has been polled.
    pub fn time_until_next_timeout(&self) -> Option<Duration> {
        let clock = self.lock();
        clock
            .timers
            .peek()
            .map(|Reverse((when, _))| when.saturating_duration_since(clock.now))
    }
}

impl Default for MockSleepProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SleepProvider for MockSleepProvider {
    type SleepFuture = Sleeping;

    fn sleep(&self, duration: Duration) -> Sleeping {
        Sleeping {
            when: self.lock().now + duration,
            scheduled: false,
            clock: Arc::downgrade(&self.clock),
        }
    }

    fn now(&self) -> Instant {
        self.lock().now
    }
}

impl Future for Sleeping {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let clock = match self.clock.upgrade() {
            Some(c) => c,
            None => return Poll::Pending,
        };
        let mut clock = clock.lock().expect("mock clock lock poisoned");
        if clock.now >= self.when {
            return Poll::Ready(());
        }
        if !self.scheduled {
            clock.schedule(self.when, cx.waker().clone());
            self.scheduled = true;
        }
        Poll::Pending
    }
}

/// A future that is pending exactly once, and wakes itself.
///
/// Awaiting it lets the other branches of a `join!` see the timers
/// that just fired.
struct YieldNow {
    /// True once we've returned Pending.
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use futures::task::noop_waker;

    #[test]
    fn clock_moves_only_when_told() {
        let sp = MockSleepProvider::new();
        let start = sp.now();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(sp.now(), start);

        sp.advance_noyield(Duration::from_secs(90));
        assert_eq!(sp.now(), start + Duration::from_secs(90));
        assert_eq!(sp.clone().now(), sp.now());
        assert_eq!(sp.time_until_next_timeout(), None);
    }

    #[test]
    fn timers_fire_in_order() {
        let sp = MockSleepProvider::new();
        let secs = Duration::from_secs;
        let (tx_short, rx_short) = oneshot::channel();
        let (tx_long, mut rx_long) = oneshot::channel();
        let real_start = Instant::now();

        block_on(async {
            futures::join!(
                async {
                    sp.sleep(secs(30)).await;
                    tx_short.send(sp.now()).unwrap();
                },
                async {
                    sp.sleep(secs(3600)).await;
                    tx_long.send(sp.now()).unwrap();
                },
                async {
                    let start = sp.now();
                    sp.advance(secs(31)).await;
                    assert_eq!(rx_short.await.unwrap(), start + secs(31));
                    assert_eq!(rx_long.try_recv().unwrap(), None);

                    sp.advance(secs(3600)).await;
                    assert_eq!(rx_long.await.unwrap(), start + secs(3631));
                }
            );
        });
        assert!(real_start.elapsed() < secs(30));
    }

    #[test]
    fn pending_timers() {
        let sp = MockSleepProvider::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut late = Box::pin(sp.sleep(Duration::from_secs(30)));
        let mut soon = Box::pin(sp.sleep(Duration::from_secs(10)));
        // Not pending until polled.
        assert_eq!(sp.time_until_next_timeout(), None);
        assert!(late.as_mut().poll(&mut cx).is_pending());
        assert!(soon.as_mut().poll(&mut cx).is_pending());
        assert!(soon.as_mut().poll(&mut cx).is_pending());
        assert_eq!(sp.time_until_next_timeout(), Some(Duration::from_secs(10)));

        sp.advance_noyield(Duration::from_secs(12));
        assert_eq!(sp.time_until_next_timeout(), Some(Duration::from_secs(18)));
        assert!(soon.as_mut().poll(&mut cx).is_ready());
        assert!(late.as_mut().poll(&mut cx).is_pending());

        sp.advance_noyield(Duration::from_secs(18));
        assert_eq!(sp.time_until_next_timeout(), None);
        assert!(late.as_mut().poll(&mut cx).is_ready());
    }

    #[test]
    fn clock_gone() {
        let sp = MockSleepProvider::new();
        let mut sleep = Box::pin(sp.sleep(Duration::from_secs(1)));
        drop(sp);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(sleep.as_mut().poll(&mut cx).is_pending());
    }
}
