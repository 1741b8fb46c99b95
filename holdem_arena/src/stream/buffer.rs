use chrono::Utc;
use log::{debug, warn};
use serde_json::Value;
use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::events::{EventName, StreamEvent};

/// Default number of events retained per buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 500;

/// Default per-subscriber delivery queue size.
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 64;

struct BufferInner {
    events: VecDeque<StreamEvent>,
    next_id: u64,
    subscribers: Vec<(u64, mpsc::Sender<StreamEvent>)>,
    next_subscriber_id: u64,
    closed: bool,
}

/// A live subscription: the buffered backlog plus a queue of events
/// published after the backlog was taken.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub owner: String,
    pub backlog: Vec<StreamEvent>,
    pub receiver: mpsc::Receiver<StreamEvent>,
}

/// Bounded ring of events for one session or table with live fan-out.
pub struct EventBuffer {
    owner: String,
    capacity: usize,
    queue_capacity: usize,
    inner: Mutex<BufferInner>,
}

impl EventBuffer {
    pub fn new(owner: impl Into<String>, capacity: usize, queue_capacity: usize) -> Self {
        Self {
            owner: owner.into(),
            capacity: capacity.max(1),
            queue_capacity: queue_capacity.max(1),
            inner: Mutex::new(BufferInner {
                events: VecDeque::with_capacity(capacity.max(1)),
                next_id: 1,
                subscribers: Vec::new(),
                next_subscriber_id: 1,
                closed: false,
            }),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn lock(&self) -> MutexGuard<'_, BufferInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event and deliver it to every subscriber without blocking.
    /// Returns the assigned id, or `None` once the buffer is closed.
    pub fn publish(&self, name: EventName, payload: Value) -> Option<u64> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let event = StreamEvent {
            id,
            name,
            owner: self.owner.clone(),
            timestamp: Utc::now(),
            payload,
        };

        if inner.events.len() == self.capacity {
            inner.events.pop_front();
        }
        inner.events.push_back(event.clone());

        inner.subscribers.retain(|(sub_id, sender)| {
            match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Subscriber {sub_id} on {} is full, dropping event {id} ({name})",
                        self.owner
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscriber {sub_id} on {} disconnected", self.owner);
                    false
                }
            }
        });

        Some(id)
    }

    /// Buffered events after `last_id`. An empty or unparseable id returns
    /// the whole buffer.
    pub fn replay_after(&self, last_id: Option<&str>) -> Vec<StreamEvent> {
        let inner = self.lock();
        Self::collect_after(&inner, last_id)
    }

    fn collect_after(inner: &BufferInner, last_id: Option<&str>) -> Vec<StreamEvent> {
        match last_id.map(str::trim).and_then(|raw| raw.parse::<u64>().ok()) {
            Some(last) => inner.events.iter().filter(|e| e.id > last).cloned().collect(),
            None => inner.events.iter().cloned().collect(),
        }
    }

    /// Take the backlog after `last_id` and register a live queue in one
    /// step, so no event falls between the two. On a closed buffer the
    /// receiver ends right after the backlog.
    pub fn subscribe(&self, last_id: Option<&str>) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let mut inner = self.lock();
        let backlog = Self::collect_after(&inner, last_id);

        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        if !inner.closed {
            inner.subscribers.push((id, sender));
        }

        Subscription {
            id,
            owner: self.owner.clone(),
            backlog,
            receiver,
        }
    }

    /// Close the buffer and end every subscriber queue. Returns `true` only
    /// for the call that performed the close.
    pub fn close(&self) -> bool {
        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        inner.closed = true;
        inner.subscribers.clear();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of the newest buffered event.
    pub fn last_id(&self) -> Option<u64> {
        self.lock().events.back().map(|e| e.id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn buffer(capacity: usize) -> EventBuffer {
        EventBuffer::new("owner", capacity, 4)
    }

    #[test]
    fn test_ids_strictly_increase() {
        let buf = buffer(10);
        let a = buf.publish(EventName::Ping, json!(1)).unwrap();
        let b = buf.publish(EventName::Ping, json!(2)).unwrap();
        assert!(b > a);
        assert_eq!(buf.last_id(), Some(b));
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let buf = buffer(3);
        for i in 0..5 {
            buf.publish(EventName::StateSnapshot, json!(i));
        }
        let ids: Vec<u64> = buf.replay_after(None).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn test_replay_after_fails_open() {
        let buf = buffer(10);
        for i in 0..4 {
            buf.publish(EventName::TurnStarted, json!(i));
        }
        assert_eq!(buf.replay_after(Some("2")).len(), 2);
        assert_eq!(buf.replay_after(Some("")).len(), 4);
        assert_eq!(buf.replay_after(Some("not-a-number")).len(), 4);
        assert_eq!(buf.replay_after(Some("99")).len(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_sees_backlog_then_live() {
        let buf = buffer(10);
        buf.publish(EventName::SessionJoined, json!({}));
        let mut sub = buf.subscribe(None);
        assert_eq!(sub.backlog.len(), 1);

        buf.publish(EventName::TurnStarted, json!({}));
        let live = sub.receiver.recv().await.unwrap();
        assert_eq!(live.name, EventName::TurnStarted);
        assert_eq!(live.id, 2);
    }

    #[tokio::test]
    async fn test_full_subscriber_drops_without_blocking() {
        let buf = EventBuffer::new("owner", 100, 2);
        let mut sub = buf.subscribe(None);
        for i in 0..5 {
            assert!(buf.publish(EventName::StateSnapshot, json!(i)).is_some());
        }
        assert_eq!(buf.subscriber_count(), 1);
        assert_eq!(sub.receiver.recv().await.unwrap().id, 1);
        assert_eq!(sub.receiver.recv().await.unwrap().id, 2);
        assert!(sub.receiver.try_recv().is_err());
        assert_eq!(buf.len(), 5);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let buf = buffer(10);
        let sub = buf.subscribe(None);
        drop(sub);
        buf.publish(EventName::Ping, json!(null));
        assert_eq!(buf.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_ends_queues() {
        let buf = buffer(10);
        let mut sub = buf.subscribe(None);
        assert!(buf.close());
        assert!(!buf.close());
        assert!(sub.receiver.recv().await.is_none());
        assert!(buf.publish(EventName::Ping, json!(null)).is_none());

        let mut late = buf.subscribe(None);
        assert!(late.backlog.is_empty());
        assert!(late.receiver.recv().await.is_none());
    }
}
