//! One-shot cooperative cancellation signal.
//!
//! A [`CancellationToken`] is created fresh for every coaching session and
//! never reused.  Every suspension point of the session checks it before
//! committing an externally visible effect.

use std::future::Future;

/// Cooperative, idempotent cancellation signal shared by cheap clones.
///
/// Thin wrapper over [`tokio_util::sync::CancellationToken`] that narrows
/// the surface to what a session needs: signal, query, wait.
///
/// ```
/// use photo_coach::session::CancellationToken;
///
/// let token = CancellationToken::new();
/// let waiter = token.clone();
/// token.signal();
/// token.signal(); // idempotent
/// assert!(waiter.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled and wake every current and future waiter.
    pub fn signal(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once [`signal`](Self::signal) has been called.  Resolves
    /// immediately if it already was.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }

    /// Run `fut` unless the token fires first.
    ///
    /// Returns `None` when cancelled, including the case where `fut`
    /// finished but the token was signalled before the result could be
    /// handed back: a late result is discarded rather than applied.
    pub async fn guard<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.inner.cancelled() => None,
            out = fut => (!self.is_cancelled()).then_some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_token_is_not_cancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn signal_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.signal();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn signal_wakes_all_waiters() {
        let token = CancellationToken::new();
        let a = tokio::spawn({
            let t = token.clone();
            async move { t.cancelled().await }
        });
        let b = tokio::spawn({
            let t = token.clone();
            async move { t.cancelled().await }
        });

        tokio::task::yield_now().await;
        token.signal();

        tokio::time::timeout(Duration::from_secs(1), async {
            a.await.unwrap();
            b.await.unwrap();
        })
        .await
        .expect("waiters should wake");
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_after_signal() {
        let token = CancellationToken::new();
        token.signal();
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .expect("already-signalled token resolves at once");
    }

    #[tokio::test]
    async fn guard_returns_output_when_not_cancelled() {
        let token = CancellationToken::new();
        assert_eq!(token.guard(async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn guard_aborts_pending_future() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.signal();
        });

        let out = token.guard(std::future::pending::<u32>()).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn guard_discards_late_result() {
        let token = CancellationToken::new();
        let inner = token.clone();
        // The future completes, but only after signalling the token itself.
        let out = token
            .guard(async move {
                inner.signal();
                "late"
            })
            .await;
        assert_eq!(out, None);
    }
}
