//! Rate limiting for snapshot streams

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Emit at most once per `period`.
    ///
    /// Latest wins: items arriving between two emissions replace each other,
    /// so a slow observer always sees the most recent joint snapshot.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Stream returned by [`ThrottleExt::throttle`]
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
        exhausted: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, period: Duration) -> Self {
        let mut interval = interval(period);
        // Don't burst after a slow consumer
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, pending: None, exhausted: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        while !*this.exhausted {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.exhausted = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_none() {
            return if *this.exhausted { Poll::Ready(None) } else { Poll::Pending };
        }

        ready!(this.interval.poll_tick(cx));
        Poll::Ready(this.pending.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    #[tokio::test]
    async fn burst_collapses_to_latest() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut throttled =
            Box::pin(UnboundedReceiverStream::new(rx).throttle(Duration::from_millis(20)));

        // First tick fires immediately
        tx.send(0).unwrap();
        assert_eq!(throttled.next().await, Some(0));

        for i in 1..=5 {
            tx.send(i).unwrap();
        }
        assert_eq!(throttled.next().await, Some(5));
    }

    #[tokio::test]
    async fn waits_for_items_instead_of_ending() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut throttled =
            Box::pin(UnboundedReceiverStream::new(rx).throttle(Duration::from_millis(5)));

        let idle = tokio::time::timeout(Duration::from_millis(30), throttled.next()).await;
        assert!(idle.is_err(), "an idle source keeps the stream open");

        tx.send(7).unwrap();
        assert_eq!(throttled.next().await, Some(7));

        drop(tx);
        assert_eq!(throttled.next().await, None);
    }

    #[tokio::test]
    async fn item_before_end_is_still_delivered() {
        let mut throttled =
            Box::pin(futures::stream::iter(vec![1, 2, 3]).throttle(Duration::from_millis(5)));
        assert_eq!(throttled.next().await, Some(3));
        assert_eq!(throttled.next().await, None);
    }
}
