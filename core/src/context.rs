//! Cancellation and deadline handle threaded through to the transport.
//!
//! The builder never acts on a `Context` itself. It is copied into every
//! `HttpRequest` and the transport decides what cancellation and deadlines
//! mean for its network call.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline.
///
/// Clones share one token, so cancelling a clone cancels every request that
/// carries it. Derived contexts (`with_deadline`, `with_timeout`, `child`)
/// get a child token: cancelling the parent cancels them, cancelling them
/// leaves the parent alone.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derived context with the same deadline that can be cancelled on its
    /// own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
        }
    }

    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The underlying token, e.g. to hand to async code that selects on
    /// `cancelled()`.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, `Some(ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}
