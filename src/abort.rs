//! Operator-driven cancellation

use std::{
    sync::Arc,
    time::Duration,
};
use tokio::sync::watch;

/// A latch raised when the operator wants the run to stop
///
/// Clones share the latch. Once raised it stays raised for the rest of the run.
#[derive(Clone, Debug)]
pub struct AbortSignal
{
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortSignal
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl AbortSignal
{
    pub fn new() -> Self
    {
        let (tx, _rx) = watch::channel(false);

        Self {
            tx: Arc::new(tx),
        }
    }

    pub fn raise(&self)
    {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool
    {
        *self.tx.borrow()
    }

    /// Completes once the signal is raised
    ///
    /// # Cancel Safety
    /// Cancel safe. Nothing is consumed while waiting.
    pub async fn raised(&self)
    {
        let mut rx = self.tx.subscribe();

        if rx.wait_for(|raised| *raised).await.is_err() {
            // unreachable while `self` holds the sender
            std::future::pending::<()>().await
        }
    }

    /// Sleeps for `duration` unless the signal is raised first
    ///
    /// Returns `false` when the wait was cut short.
    pub async fn sleep(&self, duration: Duration) -> bool
    {
        if self.is_raised() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.raised() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::AbortSignal;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_when_not_raised()
    {
        let signal = AbortSignal::new();
        assert!(signal.sleep(Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn raising_cuts_sleep_short()
    {
        let signal = AbortSignal::new();
        let remote = signal.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            remote.raise();
        });

        let started = tokio::time::Instant::now();
        assert!(!signal.sleep(Duration::from_secs(60)).await);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(signal.is_raised());
    }
}
