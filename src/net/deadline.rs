//! Absolute I/O deadlines.
//!
//! QUIC streams have no native deadline support, so streams keep one
//! [`Deadline`] per direction and consult it before every poll.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::time::{sleep_until, Instant, Sleep};

/// A re-armable point in time after which I/O in one direction fails.
///
/// Arming requires a running Tokio runtime with the time driver enabled.
#[derive(Debug, Default)]
pub struct Deadline {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Deadline {
    /// Arm, re-arm or (with `None`) clear the deadline.
    pub fn set(&mut self, at: Option<Instant>) {
        match (at, self.sleep.as_mut()) {
            (Some(at), Some(sleep)) => sleep.as_mut().reset(at),
            (Some(at), None) => self.sleep = Some(Box::pin(sleep_until(at))),
            (None, _) => self.sleep = None,
        }
    }

    /// The armed instant, if any.
    pub fn instant(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|sleep| sleep.deadline())
    }

    /// Ready once the deadline has passed.
    ///
    /// While pending, the task is registered to be woken when it fires.
    pub fn poll_elapsed(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        match self.sleep.as_mut() {
            // The timer wheel rounds up to the next tick; an instant that has
            // already passed must fire on this poll.
            Some(sleep) if Instant::now() >= sleep.deadline() => Poll::Ready(()),
            Some(sleep) => sleep.as_mut().poll(cx),
            None => Poll::Pending,
        }
    }

    /// Fail with `TimedOut` if the deadline has passed, otherwise arrange a
    /// wake-up for when it does.
    pub fn poll_check(&mut self, cx: &mut Context<'_>) -> io::Result<()> {
        match self.poll_elapsed(cx) {
            Poll::Ready(()) => Err(timed_out()),
            Poll::Pending => Ok(()),
        }
    }
}

/// The error every expired deadline produces.
pub fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "i/o deadline exceeded")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn unset_deadline_never_fires() {
        let mut deadline = Deadline::default();
        let fired = std::future::poll_fn(|cx| Poll::Ready(deadline.poll_check(cx))).await;
        assert!(fired.is_ok());
        assert_eq!(deadline.instant(), None);
    }

    #[tokio::test]
    async fn past_deadline_fires_immediately() {
        let mut deadline = Deadline::default();
        deadline.set(Some(Instant::now()));

        let err = std::future::poll_fn(|cx| Poll::Ready(deadline.poll_check(cx)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn rearm_and_clear() {
        let mut deadline = Deadline::default();
        deadline.set(Some(Instant::now()));
        let later = Instant::now() + Duration::from_secs(60);
        deadline.set(Some(later));
        assert_eq!(deadline.instant(), Some(later));

        let fired = std::future::poll_fn(|cx| Poll::Ready(deadline.poll_check(cx))).await;
        assert!(fired.is_ok());

        deadline.set(None);
        assert_eq!(deadline.instant(), None);
    }

    #[tokio::test]
    async fn wakes_when_deadline_passes() {
        let mut deadline = Deadline::default();
        deadline.set(Some(Instant::now() + Duration::from_millis(20)));

        std::future::poll_fn(|cx| deadline.poll_elapsed(cx)).await;
        assert!(Instant::now() >= deadline.instant().unwrap());
    }
}
