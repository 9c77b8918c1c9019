use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::trace;

/// Buffered deliveries per subscriber before it starts lagging
const SIGNAL_CAPACITY: usize = 64;

/// Multi-subscriber notification source emitted by host collaborators
///
/// Every subscriber gets its own [`Subscription`]; dropping it unsubscribes.
/// A signal never blocks the emitter: with no subscribers an emission is
/// simply discarded.
#[derive(Debug)]
pub struct Signal<T: Clone + Send + 'static> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Send + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Signal<T> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { sender }
    }

    /// Deliver `value` to every live subscriber, returning how many got it
    pub fn emit(&self, value: T) -> usize {
        self.sender.send(value).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            stream: BroadcastStream::new(self.sender.subscribe()),
        }
    }

    /// Number of subscriptions currently bound to this signal
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription to a [`Signal`]
///
/// Subscriptions are taken before the action that triggers the signal so no
/// emission can slip between the two. Dropping the subscription (or the
/// future awaiting it) is the cancel operation.
pub struct Subscription<T: Clone + Send + 'static> {
    stream: BroadcastStream<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Wait for the next emission; `None` once the signal itself is gone
    pub async fn recv(&mut self) -> Option<T> {
        while let Some(item) = self.stream.next().await {
            match item {
                Ok(value) => return Some(value),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    trace!("Subscription lagged, skipped {} emissions", skipped);
                }
            }
        }
        None
    }

    /// One-shot delivery: resolve with the first emission and unsubscribe
    pub async fn once(mut self) -> Option<T> {
        self.recv().await
    }

    /// One-shot delivery restricted by `filter`
    ///
    /// Emissions rejected by the filter are ignored and keep the subscription
    /// bound; the first accepted one resolves the future and unsubscribes.
    pub async fn once_where<F>(mut self, mut filter: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        while let Some(value) = self.recv().await {
            if filter(&value) {
                return Some(value);
            }
        }
        None
    }
}
