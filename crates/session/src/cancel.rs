use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-owned stop signal: a cancellation token plus an optional deadline.
///
/// Every network operation takes one. Clones share the token, so cancelling
/// any clone stops every operation holding one.
#[derive(Debug, Clone, Default)]
pub struct Cancel {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that also fires once `timeout` has elapsed from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A signal that also fires at `deadline`. An earlier existing deadline
    /// wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |current| current.min(deadline)));
        self
    }

    /// A signal cancelled along with this one, that can also be cancelled
    /// on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `true` once cancelled or past the deadline.
    pub fn fired(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Resolves when the signal fires.
    pub async fn fired_wait(&self) {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => {},
                () = tokio::time::sleep_until(deadline) => {},
            },
            None => self.token.cancelled().await,
        }
    }

    /// Drives `future` unless the signal fires first, in which case the
    /// future is dropped and `None` is returned.
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        if self.fired() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.fired_wait() => None,
            output = future => Some(output),
        }
    }

    /// Sleeps for `duration`. Returns `false` if the signal fired first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.run(tokio::time::sleep(duration)).await.is_some()
    }
}
