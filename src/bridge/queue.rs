//! Queue between a transport callback and the merge loop.
//!
//! Deltas travel through a bounded channel and are dropped when it is full.
//! Terminal events travel through an unbounded channel and are never dropped.
//! The receiver drains pending deltas before surfacing a terminal event, so a
//! single producer's ordering is preserved.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use super::BridgeEvent;

/// Result of handing an event to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Delta dropped because the queue was full.
    Dropped,
    /// The consumer is gone.
    Closed,
}

/// Create a queue holding up to `capacity` undelivered deltas (minimum 1).
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (delta_tx, delta_rx) = mpsc::channel(capacity.max(1));
    let (terminal_tx, terminal_rx) = mpsc::unbounded_channel();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            deltas: delta_tx,
            terminal: terminal_tx,
            dropped: Arc::clone(&dropped),
        },
        EventReceiver {
            deltas: delta_rx,
            terminal: terminal_rx,
            held_terminal: None,
            dropped,
        },
    )
}

/// Producer half. Never blocks, so it is safe to call from a foreign callback.
#[derive(Debug, Clone)]
pub struct EventSender {
    deltas: mpsc::Sender<String>,
    terminal: mpsc::UnboundedSender<BridgeEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    pub fn send(&self, event: BridgeEvent) -> Delivery {
        match event {
            BridgeEvent::Delta(text) => match self.deltas.try_send(text) {
                Ok(()) => Delivery::Delivered,
                Err(TrySendError::Full(_)) => {
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(dropped_total = total, "Event queue full, dropping delta");
                    Delivery::Dropped
                }
                Err(TrySendError::Closed(_)) => Delivery::Closed,
            },
            terminal => match self.terminal.send(terminal) {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            },
        }
    }

    /// Deltas dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.terminal.is_closed()
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct EventReceiver {
    deltas: mpsc::Receiver<String>,
    terminal: mpsc::UnboundedReceiver<BridgeEvent>,
    /// Terminal event waiting for the deltas sent before it.
    held_terminal: Option<BridgeEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Next event, deltas first. `None` once every sender is gone and both
    /// channels are empty.
    ///
    /// A terminal event is only surfaced once no delta remains queued, so a
    /// delta sent before it is never overtaken.
    pub async fn recv(&mut self) -> Option<BridgeEvent> {
        if self.held_terminal.is_some() {
            return match self.deltas.try_recv() {
                Ok(text) => Some(BridgeEvent::Delta(text)),
                Err(_) => self.held_terminal.take(),
            };
        }
        tokio::select! {
            biased;
            Some(text) = self.deltas.recv() => Some(BridgeEvent::Delta(text)),
            event = self.terminal.recv() => match event {
                Some(event) => match self.deltas.try_recv() {
                    Ok(text) => {
                        self.held_terminal = Some(event);
                        Some(BridgeEvent::Delta(text))
                    }
                    Err(_) => Some(event),
                },
                // Terminal side closed: flush whatever deltas remain.
                None => self.deltas.recv().await.map(BridgeEvent::Delta),
            },
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn into_stream(self) -> impl Stream<Item = BridgeEvent> + Send + 'static {
        futures::stream::unfold(self, |mut receiver| async move {
            let event = receiver.recv().await?;
            Some((event, receiver))
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn overflow_drops_deltas_but_keeps_terminal() {
        let (tx, rx) = event_queue(2);
        assert_eq!(tx.send(BridgeEvent::Delta("a".into())), Delivery::Delivered);
        assert_eq!(tx.send(BridgeEvent::Delta("b".into())), Delivery::Delivered);
        assert_eq!(tx.send(BridgeEvent::Delta("c".into())), Delivery::Dropped);
        assert_eq!(tx.send(BridgeEvent::Idle), Delivery::Delivered);
        assert_eq!(tx.dropped(), 1);
        drop(tx);

        let events: Vec<_> = rx.into_stream().collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], BridgeEvent::Delta(t) if t == "a"));
        assert!(matches!(&events[1], BridgeEvent::Delta(t) if t == "b"));
        assert!(matches!(events[2], BridgeEvent::Idle));
    }

    #[tokio::test]
    async fn send_after_consumer_drop_reports_closed() {
        let (tx, rx) = event_queue(4);
        drop(rx);
        assert_eq!(tx.send(BridgeEvent::Delta("a".into())), Delivery::Closed);
        assert_eq!(tx.send(BridgeEvent::Idle), Delivery::Closed);
        assert!(tx.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn delta_sent_just_before_terminal_is_delivered_first() {
        for _ in 0..2_000 {
            let (tx, mut rx) = event_queue(64);
            let producer = std::thread::spawn(move || {
                tx.send(BridgeEvent::Delta("d".into()));
                tx.send(BridgeEvent::Idle);
            });

            let first = rx.recv().await;
            let second = rx.recv().await;
            producer.join().expect("producer thread");

            assert!(matches!(&first, Some(BridgeEvent::Delta(t)) if t == "d"), "got {first:?}");
            assert!(matches!(&second, Some(BridgeEvent::Idle)), "got {second:?}");
        }
    }
}
