use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::{Stream, StreamExt};

/// Offset and limit applied to the results of a query (not to the raw rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBounds {
    pub offset: usize,
    pub limit: usize,
}

impl RowBounds {
    pub const NO_ROW_OFFSET: usize = 0;
    pub const NO_ROW_LIMIT: usize = usize::MAX;

    #[must_use]
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    #[must_use]
    pub fn limit(limit: usize) -> Self {
        Self::new(Self::NO_ROW_OFFSET, limit)
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.offset == Self::NO_ROW_OFFSET && self.limit == Self::NO_ROW_LIMIT
    }
}

impl Default for RowBounds {
    fn default() -> Self {
        Self::new(Self::NO_ROW_OFFSET, Self::NO_ROW_LIMIT)
    }
}

/// Counts emitted results against the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBudget {
    pub limit: usize,
    pub consumed: usize,
}

impl RowBudget {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit, consumed: 0 }
    }

    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.consumed >= self.limit
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn consume(&mut self) {
        self.consumed += 1;
    }
}

/// Applies [`RowBounds`] to a stream of results.
///
/// Once the budget is spent the inner stream is never polled again, so no further rows are
/// pulled from the driver. The stream also ends after the first error.
#[derive(Debug)]
pub struct BoundedStream<S> {
    inner: S,
    skip: usize,
    budget: RowBudget,
    done: bool,
}

impl<S> BoundedStream<S> {
    pub fn new(inner: S, bounds: RowBounds) -> Self {
        Self {
            inner,
            skip: bounds.offset,
            budget: RowBudget::new(bounds.limit),
            done: false,
        }
    }

    #[must_use]
    pub fn budget(&self) -> RowBudget {
        self.budget
    }
}

impl<S, T, E> Stream for BoundedStream<S>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.done || this.budget.exhausted() {
                this.done = true;
                return Poll::Ready(None);
            }
            match ready!(this.inner.poll_next_unpin(cx)) {
                None => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Some(Err(err)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Some(Ok(_)) if this.skip > 0 => {
                    this.skip -= 1;
                }
                Some(Ok(item)) => {
                    this.budget.consume();
                    return Poll::Ready(Some(Ok(item)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn stops_pulling_once_the_limit_is_reached() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let source = stream::iter(0..100)
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .map(Ok::<_, ()>);
        let items: Vec<_> = BoundedStream::new(source, RowBounds::new(2, 3))
            .collect()
            .await;
        assert_eq!(items, vec![Ok(2), Ok(3), Ok(4)]);
        assert_eq!(pulled.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn ends_after_an_error() {
        let source = stream::iter(vec![Ok(1), Err("boom"), Ok(2)]);
        let items: Vec<_> = BoundedStream::new(source, RowBounds::default())
            .collect()
            .await;
        assert_eq!(items, vec![Ok(1), Err("boom")]);
    }

    #[tokio::test]
    async fn zero_limit_never_polls() {
        let source = stream::iter(vec![Ok::<_, ()>(1)]);
        let mut bounded = BoundedStream::new(source, RowBounds::limit(0));
        assert!(bounded.next().await.is_none());
        assert_eq!(bounded.budget().remaining(), 0);
    }
}
