//! Caller-controlled cancellation and deadlines for blocking operations.
//!
//! Waiting for exit and streaming over the attach channel have no natural end
//! other than the container finishing. A [`Cancellation`] lets the caller bound
//! them with a token, a deadline, or both.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ContainerError, WorkcellError};

/// Cancellation token plus optional deadline threaded through blocking calls.
///
/// The default value never cancels and has no deadline. Clones share the
/// same token, so cancelling one cancels every operation observing it.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    deadline: Option<Duration>,
}

impl Cancellation {
    /// Create a cancellation observing an existing token.
    #[must_use]
    pub const fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Bound each operation observing this value by `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Return the underlying token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Return the configured deadline.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Cancel every operation observing this token.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Run `operation` until it completes, the token fires, or the deadline
    /// passes, whichever happens first.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "false positive triggered inside tokio::select! expansion"
    )]
    pub(super) async fn run<T, F>(
        &self,
        operation: &'static str,
        container_id: &str,
        future: F,
    ) -> Result<T, WorkcellError>
    where
        F: Future<Output = Result<T, WorkcellError>>,
    {
        let bounded = async {
            match self.deadline {
                Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| {
                    WorkcellError::from(ContainerError::TimedOut {
                        operation,
                        container_id: String::from(container_id),
                        deadline: limit,
                    })
                })?,
                None => future.await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(WorkcellError::from(ContainerError::Cancelled {
                operation,
                container_id: String::from(container_id),
            })),
            result = bounded => result,
        }
    }
}
