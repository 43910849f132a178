//! Request-scoped cancellation and deadlines.
//!
//! Every service operation takes a [`RequestContext`]. Storage calls are raced
//! against it with [`RequestContext::run`], so a stalled backend or a client
//! that went away cannot hold a request open past its deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::Result;

#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fails if the context was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AppError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drives `fut` to completion unless the context is cancelled or times
    /// out first, in which case `fut` is dropped.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(AppError::Cancelled),
            _ = expired => Err(AppError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
