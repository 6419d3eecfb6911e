// src/health/context.rs
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Cancelled,
}

/// Deadline and cancellation handed to every probe invocation.
///
/// Probes are expected to wrap their I/O in [`CheckContext::run`] so that a
/// caller timing out or cancelling stops them promptly.
#[derive(Debug, Clone)]
pub struct CheckContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CheckContext {
    /// A context with no deadline that is never cancelled.
    pub fn new() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().timeout(timeout)
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            deadline: None,
            cancel,
        }
    }

    /// Tightens the deadline to `now + timeout`. An earlier existing deadline is kept.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Applies `timeout` only when no deadline is set yet.
    pub fn or_timeout(self, timeout: Duration) -> Self {
        if self.deadline.is_some() {
            self
        } else {
            self.timeout(timeout)
        }
    }

    pub fn get_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drives `fut` until it completes, the deadline passes or the context is cancelled.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, CheckError>
    where
        F: Future,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CheckError::Cancelled),
            _ = deadline => Err(CheckError::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}

impl Default for CheckContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let ctx = CheckContext::with_timeout(Duration::from_secs(1));
        let result = ctx.run(async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_run_deadline_exceeded() {
        let ctx = CheckContext::with_timeout(Duration::from_millis(20));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(result, Err(CheckError::DeadlineExceeded));
        assert_eq!(
            CheckError::DeadlineExceeded.to_string(),
            "context deadline exceeded"
        );
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let token = CancellationToken::new();
        let ctx = CheckContext::with_cancellation(token.clone());
        token.cancel();

        let result = ctx.run(async { 1 }).await;
        assert_eq!(result, Err(CheckError::Cancelled));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_only_tightens() {
        let ctx = CheckContext::with_timeout(Duration::from_millis(50));
        let first = ctx.get_deadline().unwrap();

        let ctx = ctx.timeout(Duration::from_secs(10));
        assert_eq!(ctx.get_deadline(), Some(first));

        let ctx = ctx.or_timeout(Duration::from_millis(1));
        assert_eq!(ctx.get_deadline(), Some(first));

        let untimed = CheckContext::new();
        assert!(untimed.remaining().is_none());
        assert!(untimed.or_timeout(Duration::from_secs(1)).remaining().is_some());
    }
}
