//! Live event delivery.
//!
//! Every session and every table owns an [`EventBuffer`]: a bounded ring of
//! recent events with best-effort fan-out to subscribers. Push streams
//! replay the backlog after a client's last-seen id and then follow live
//! events via [`run_push_stream`].

pub mod buffer;
pub mod events;
pub mod push;

pub use buffer::{DEFAULT_BUFFER_CAPACITY, DEFAULT_SUBSCRIBER_QUEUE, EventBuffer, Subscription};
pub use events::{EventName, StreamEvent};
pub use push::{DEFAULT_KEEPALIVE, EventSink, SinkError, StreamEnd, run_push_stream};
