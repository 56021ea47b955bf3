//! Select-first-of-N against a deadline.

use std::{
    future::{poll_fn, Future},
    task::{Context, Poll},
};

use futures::{future::BoxFuture, FutureExt};
use tokio::time::{self, Instant};

/// Result of one [`DeadlineRacer::race`] call.
#[derive(Debug)]
pub enum Outcome<K, T, E> {
    /// An operation resolved successfully.
    Completed { tag: K, value: T },
    /// An operation resolved with an error.
    Failed { tag: K, error: E },
    /// The deadline passed before any operation resolved.
    DeadlineElapsed,
}

struct Pending<K, T, E> {
    tag: K,
    op: BoxFuture<'static, Result<T, E>>,
}

/// A mutable set of in-flight operations that can be raced against a deadline
/// any number of times.
///
/// Operations that resolve are removed from the set and reported once. An
/// operation that is ready but not reported because the deadline won stays in
/// the set and is reported by the next call. Removing an operation from the set
/// drops its future, which is the only cancellation signal it ever receives.
pub struct DeadlineRacer<K, T, E> {
    pending: Vec<Pending<K, T, E>>,
}

impl<K, T, E> Default for DeadlineRacer<K, T, E> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<K, T, E> DeadlineRacer<K, T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operation to the race, tagged with `tag`.
    pub fn push<F>(&mut self, tag: K, op: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.pending.push(Pending {
            tag,
            op: op.boxed(),
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Iterates over the tags of operations still in the race.
    pub fn tags(&self) -> impl Iterator<Item = &K> {
        self.pending.iter().map(|p| &p.tag)
    }

    /// Stops waiting on every operation still in the race and returns their tags.
    pub fn abandon_all(&mut self) -> Vec<K> {
        self.pending.drain(..).map(|p| p.tag).collect()
    }

    /// Waits until the first operation resolves or `deadline` passes.
    ///
    /// If both happen in the same poll the deadline wins. With an empty set
    /// this simply sleeps until the deadline.
    pub async fn race(&mut self, deadline: Instant) -> Outcome<K, T, E> {
        let sleep = time::sleep_until(deadline);
        tokio::pin!(sleep);

        tokio::select! {
            biased;

            _ = &mut sleep => Outcome::DeadlineElapsed,
            (tag, result) = poll_fn(|cx| self.poll_settled(cx)) => match result {
                Ok(value) => Outcome::Completed { tag, value },
                Err(error) => Outcome::Failed { tag, error },
            },
        }
    }

    /// Polls in registration order so the earliest-registered operation wins
    /// a tie.
    fn poll_settled(&mut self, cx: &mut Context<'_>) -> Poll<(K, Result<T, E>)> {
        let ready = self
            .pending
            .iter_mut()
            .enumerate()
            .find_map(|(idx, p)| match p.op.poll_unpin(cx) {
                Poll::Ready(result) => Some((idx, result)),
                Poll::Pending => None,
            });

        match ready {
            Some((idx, result)) => {
                let settled = self.pending.remove(idx);
                Poll::Ready((settled.tag, result))
            }
            None => Poll::Pending,
        }
    }
}
