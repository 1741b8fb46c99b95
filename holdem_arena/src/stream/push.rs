use async_trait::async_trait;
use log::debug;
use std::{future::Future, time::Duration};
use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};

use super::{buffer::Subscription, events::StreamEvent};

/// Default keep-alive interval for push streams.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink closed")]
    Closed,
    #[error("write failed: {0}")]
    Write(String),
}

/// Where a push stream writes events. Transports implement this over
/// their connection.
#[async_trait]
pub trait EventSink: Send {
    async fn send(&mut self, event: &StreamEvent) -> Result<(), SinkError>;
}

#[async_trait]
impl EventSink for mpsc::Sender<StreamEvent> {
    async fn send(&mut self, event: &StreamEvent) -> Result<(), SinkError> {
        mpsc::Sender::send(self, event.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// Why a push stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The caller disconnected
    Cancelled,
    /// The buffer was closed at table teardown
    BufferClosed,
    /// Writing an event or keep-alive failed
    WriteFailed,
}

/// Deliver the backlog, then live events, until `cancel` resolves, the
/// buffer closes, or a write fails. A `ping` is written on every
/// keep-alive tick.
pub async fn run_push_stream<S, C>(
    subscription: Subscription,
    sink: &mut S,
    keepalive: Duration,
    cancel: C,
) -> StreamEnd
where
    S: EventSink + ?Sized,
    C: Future<Output = ()>,
{
    let Subscription {
        id,
        owner,
        backlog,
        mut receiver,
    } = subscription;

    for event in &backlog {
        if sink.send(event).await.is_err() {
            return StreamEnd::WriteFailed;
        }
    }

    tokio::pin!(cancel);
    let mut ticker = interval(keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let end = loop {
        tokio::select! {
            biased;
            () = &mut cancel => break StreamEnd::Cancelled,
            next = receiver.recv() => match next {
                Some(event) => {
                    if sink.send(&event).await.is_err() {
                        break StreamEnd::WriteFailed;
                    }
                }
                None => break StreamEnd::BufferClosed,
            },
            _ = ticker.tick() => {
                if sink.send(&StreamEvent::ping(&owner)).await.is_err() {
                    break StreamEnd::WriteFailed;
                }
            }
        }
    };
    debug!("Push stream {id} for {owner} ended: {end:?}");
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{EventBuffer, EventName};
    use serde_json::json;
    use std::future::pending;
    use tokio::sync::oneshot;

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn send(&mut self, _event: &StreamEvent) -> Result<(), SinkError> {
            Err(SinkError::Write("broken pipe".into()))
        }
    }

    #[tokio::test]
    async fn test_stream_ends_when_buffer_closes() {
        let buffer = EventBuffer::new("s1", 10, 8);
        buffer.publish(EventName::SessionJoined, json!({}));
        let sub = buffer.subscribe(None);
        buffer.close();

        let (mut tx, mut rx) = mpsc::channel(16);
        let end = run_push_stream(sub, &mut tx, DEFAULT_KEEPALIVE, pending()).await;
        assert_eq!(end, StreamEnd::BufferClosed);
        assert_eq!(rx.recv().await.unwrap().name, EventName::SessionJoined);
    }

    #[tokio::test]
    async fn test_stream_cancel() {
        let buffer = EventBuffer::new("s1", 10, 8);
        let sub = buffer.subscribe(None);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let (mut tx, _rx) = mpsc::channel(16);

        let task = tokio::spawn(async move {
            run_push_stream(sub, &mut tx, DEFAULT_KEEPALIVE, async {
                let _ = cancel_rx.await;
            })
            .await
        });
        cancel_tx.send(()).unwrap();
        assert_eq!(task.await.unwrap(), StreamEnd::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_pings() {
        let buffer = EventBuffer::new("s1", 10, 8);
        let sub = buffer.subscribe(None);
        let (mut tx, mut rx) = mpsc::channel(16);

        let task = tokio::spawn(async move {
            run_push_stream(sub, &mut tx, Duration::from_secs(15), pending()).await
        });
        let ping = rx.recv().await.unwrap();
        assert_eq!(ping.name, EventName::Ping);
        assert_eq!(ping.id, 0);
        task.abort();
    }

    #[tokio::test]
    async fn test_write_failure_ends_stream() {
        let buffer = EventBuffer::new("s1", 10, 8);
        buffer.publish(EventName::SessionJoined, json!({}));
        let sub = buffer.subscribe(None);
        let end = run_push_stream(sub, &mut FailingSink, DEFAULT_KEEPALIVE, pending()).await;
        assert_eq!(end, StreamEnd::WriteFailed);
    }
}
