//! Cooperative stop signal shared by all workers of a run.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// A write-once broadcast of the first fatal error in a run.
///
/// Any worker may send on the signal, but only the first error is recorded. Sending never blocks
/// and does not depend on anyone listening. Workers check for a received stop with the
/// non-blocking [`StopSignal::received`] between iterations.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    token: CancellationToken,
    reason: Mutex<Option<Arc<anyhow::Error>>>,
}

impl StopSignal {
    /// Creates a signal that has not been sent yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends the stop signal with the given reason.
    ///
    /// Returns `true` if this call recorded the reason, `false` if the signal had already been
    /// sent, in which case `reason` is dropped.
    pub fn send(&self, reason: anyhow::Error) -> bool {
        {
            let mut slot = self
                .inner
                .reason
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.is_some() {
                return false;
            }
            *slot = Some(Arc::new(reason));
        }

        self.inner.token.cancel();
        true
    }

    /// Returns the reason of the stop, if the signal has been sent.
    pub fn received(&self) -> Option<Arc<anyhow::Error>> {
        if !self.inner.token.is_cancelled() {
            return None;
        }

        self.inner
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Completes once the signal has been sent.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("reason", &self.received())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::anyhow;

    use super::*;

    #[test]
    fn first_sender_wins() {
        let stop = StopSignal::new();
        assert!(stop.received().is_none());

        assert!(stop.send(anyhow!("first")));
        assert!(!stop.send(anyhow!("second")));

        let reason = stop.received().unwrap();
        assert_eq!(reason.to_string(), "first");
    }

    #[test]
    fn clones_share_the_signal() {
        let stop = StopSignal::new();
        let sibling = stop.clone();

        sibling.send(anyhow!("sibling failed"));
        assert_eq!(stop.received().unwrap().to_string(), "sibling failed");
    }

    #[tokio::test]
    async fn wakes_waiters() {
        let stop = StopSignal::new();
        let waiter = tokio::spawn({
            let stop = stop.clone();
            async move { stop.cancelled().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        stop.send(anyhow!("done"));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
