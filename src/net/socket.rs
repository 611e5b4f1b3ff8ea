use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};
use url::Url;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket connect failed: {0}")]
    Connect(String),
    #[error("channel closed")]
    Closed,
}

/// Outbound half of the persistent duplex connection. Sends may fail once the
/// connection is gone; callers decide whether that matters (the liveness loop
/// swallows it).
pub trait Channel {
    fn send(&self, message: &str) -> Result<(), ChannelError>;
}

/// Named event delivered by the server over the push channel.
#[derive(Debug, Clone)]
pub struct SocketEvent {
    pub name: String,
    pub data: Option<Value>,
}

/// Registration table mapping event name to handler, mirroring the `events`
/// object the channel is constructed with.
#[derive(Default)]
pub struct EventTable {
    handlers: HashMap<String, Box<dyn FnMut(Option<Value>)>>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, name: &str, handler: F)
    where
        F: FnMut(Option<Value>) + 'static,
    {
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    /// Returns false when no handler is registered for the event.
    pub fn dispatch(&mut self, name: &str, data: Option<Value>) -> bool {
        match self.handlers.get_mut(name) {
            Some(handler) => {
                handler(data);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub url: Url,
    /// Version counter the server uses to resume/replay missed events.
    pub version: u64,
}

#[derive(Debug, Deserialize)]
struct ServerFrame {
    t: String,
    #[serde(default)]
    d: Option<Value>,
    #[serde(default)]
    v: Option<u64>,
}

fn parse_frame(raw: &str) -> Option<ServerFrame> {
    serde_json::from_str(raw).ok()
}

/// Websocket-backed push channel for one page view. Incoming frames are
/// turned into [`SocketEvent`]s on the supplied sender; outbound messages are
/// framed as `{"t": message}`. Reconnection is the embedder's concern.
pub struct PageSocket {
    outgoing: mpsc::UnboundedSender<String>,
    version: Arc<AtomicU64>,
}

impl PageSocket {
    pub async fn connect(
        config: SocketConfig,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Result<Self, ChannelError> {
        let mut url = config.url.clone();
        url.query_pairs_mut()
            .append_pair("v", &config.version.to_string());

        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|err| ChannelError::Connect(err.to_string()))?;
        let (mut write, mut read) = stream.split();

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(payload) = outgoing_rx.recv().await {
                if write.send(Message::text(payload)).await.is_err() {
                    break;
                }
            }
        });

        let version = Arc::new(AtomicU64::new(config.version));
        let reader_version = Arc::clone(&version);
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                match parse_frame(&text) {
                    Some(frame) => {
                        if let Some(v) = frame.v {
                            reader_version.store(v, Ordering::SeqCst);
                        }
                        trace!(target: "socket", event = %frame.t, "push event");
                        let event = SocketEvent {
                            name: frame.t,
                            data: frame.d,
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    None => {
                        debug!(target: "socket", raw = %&*text, "ignoring unparseable frame");
                    }
                }
            }
        });

        Ok(Self { outgoing, version })
    }

    /// Latest version seen from the server, for resuming after teardown.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl Channel for PageSocket {
    fn send(&self, message: &str) -> Result<(), ChannelError> {
        let payload = json!({ "t": message }).to_string();
        self.outgoing
            .send(payload)
            .map_err(|_| ChannelError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_with_data_and_version() {
        let frame = parse_frame(r#"{"t":"reload","d":{"id":"abc"},"v":7}"#).expect("frame");
        assert_eq!(frame.t, "reload");
        assert_eq!(frame.v, Some(7));
        assert!(frame.d.is_some());
    }

    #[test]
    fn parses_bare_event_frame() {
        let frame = parse_frame(r#"{"t":"reload"}"#).expect("frame");
        assert_eq!(frame.t, "reload");
        assert_eq!(frame.d, None);
        assert_eq!(frame.v, None);
    }

    #[test]
    fn rejects_garbage_frames() {
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame(r#"{"d":{}}"#).is_none());
    }

    #[test]
    fn event_table_dispatches_registered_handlers_only() {
        let mut table = EventTable::new();
        let counter = std::rc::Rc::new(std::cell::Cell::new(0));
        let handle = std::rc::Rc::clone(&counter);
        table.on("reload", move |_| handle.set(handle.get() + 1));

        assert!(table.dispatch("reload", None));
        assert!(table.dispatch("reload", Some(json!({"x": 1}))));
        assert!(!table.dispatch("ping", None));
        assert_eq!(counter.get(), 2);
    }
}
