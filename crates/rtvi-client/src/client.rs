use crate::types::{RtviMessage, SessionEvent};
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

mod config;
mod consts;

pub use config::{Config, ConfigBuilder};

type ClientTx = tokio::sync::mpsc::Sender<RtviMessage>;
type EventTx = tokio::sync::broadcast::Sender<SessionEvent>;
pub type EventRx = tokio::sync::broadcast::Receiver<SessionEvent>;

// Live connection state: the outgoing message channel and the reader task.
// `id` lets a finished reader clear its own slot without touching a newer
// connection.
struct Connection {
    id: u64,
    c_tx: ClientTx,
    reader: JoinHandle<()>,
}

type ConnectionSlot = Arc<Mutex<Option<Connection>>>;

/// A WebSocket RTVI session.
///
/// The event channel exists before the first connect so subscribers never
/// miss the `connecting` transition.
pub struct Client {
    config: Config,
    e_tx: EventTx,
    connection: ConnectionSlot,
    next_id: AtomicU64,
    mic_enabled: AtomicBool,
}

impl Client {
    pub fn new(config: Config) -> Self {
        let (e_tx, _) = tokio::sync::broadcast::channel(config.capacity());
        let mic_enabled = AtomicBool::new(config.mic_enabled());
        Self {
            config,
            e_tx,
            connection: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
            mic_enabled,
        }
    }

    /// Subscribe to session events.
    pub fn events(&self) -> EventRx {
        self.e_tx.subscribe()
    }

    /// True while a connection is open. A connection whose reader has
    /// stopped (the server closed the socket) no longer counts.
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .map(|guard| {
                guard
                    .as_ref()
                    .is_some_and(|connection| !connection.reader.is_finished())
            })
            .unwrap_or(false)
    }

    pub fn mic_enabled(&self) -> bool {
        self.mic_enabled.load(Ordering::SeqCst)
    }

    pub fn enable_mic(&self, enabled: bool) {
        let previous = self.mic_enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::debug!("microphone {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine; nobody is watching yet.
        let _ = self.e_tx.send(event);
    }

    pub async fn connect(&self, url: &str) -> Result<()> {
        match self.connection.lock() {
            Ok(mut guard) => {
                if guard
                    .as_ref()
                    .is_some_and(|connection| !connection.reader.is_finished())
                {
                    return Err(anyhow::anyhow!("already connected"));
                }
                // Drop whatever the server left behind.
                guard.take();
            }
            Err(_) => return Err(anyhow::anyhow!("connection state poisoned")),
        }

        self.emit(SessionEvent::transport("connecting"));

        let attempt =
            tokio::time::timeout(self.config.connect_timeout(), tokio_tungstenite::connect_async(url))
                .await;
        let ws_stream = match attempt {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => {
                self.emit(SessionEvent::transport("failed"));
                return Err(anyhow::anyhow!("failed to connect to {url}: {e}"));
            }
            Err(_) => {
                self.emit(SessionEvent::transport("failed"));
                return Err(anyhow::anyhow!(
                    "timed out connecting to {url} after {:?}",
                    self.config.connect_timeout()
                ));
            }
        };
        tracing::info!("connected to {}", url);

        let (mut write, mut read) = ws_stream.split();
        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<RtviMessage>(self.config.capacity());

        // Writer: serialize outgoing messages; a closed channel closes the socket.
        tokio::spawn(async move {
            while let Some(message) = c_rx.recv().await {
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize message: {}", e);
                    }
                }
            }
            if let Err(e) = write.send(Message::Close(None)).await {
                tracing::debug!("failed to send close frame: {}", e);
            }
        });

        // Reader: decode RTVI messages and broadcast the events they carry.
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let slot = Arc::clone(&self.connection);
        let e_tx = self.e_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = e_tx.send(SessionEvent::new(
                            crate::types::EventKind::Error,
                            serde_json::json!({ "message": e.to_string() }),
                        ));
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<RtviMessage>(&text) {
                        Ok(message) => {
                            tracing::debug!("received message: {:?}", message.message_type());
                            if let Some(event) = message.into_session_event() {
                                let _ = e_tx.send(event);
                            }
                        }
                        Err(e) => {
                            tracing::warn!("failed to deserialize message: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        break;
                    }
                    _ => {}
                }
            }
            // Free the slot before announcing the close so a listener that
            // reconnects right away is not refused.
            if let Ok(mut guard) = slot.lock() {
                if guard.as_ref().is_some_and(|connection| connection.id == id) {
                    guard.take();
                }
            }
            let _ = e_tx.send(SessionEvent::transport("closed"));
            let _ = e_tx.send(SessionEvent::bare(crate::types::EventKind::Disconnected));
        });

        if let Ok(mut guard) = self.connection.lock() {
            *guard = Some(Connection {
                id,
                c_tx: c_tx.clone(),
                reader,
            });
        }

        self.emit(SessionEvent::transport("connected"));
        self.emit(SessionEvent::bare(crate::types::EventKind::Connected));

        c_tx.send(RtviMessage::client_ready())
            .await
            .map_err(|e| anyhow::anyhow!("failed to send client-ready: {e}"))?;
        Ok(())
    }

    /// Close the session. Disconnecting an idle client is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        let connection = match self.connection.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => return Err(anyhow::anyhow!("connection state poisoned")),
        };
        let Some(connection) = connection else {
            return Ok(());
        };

        let sent = connection.c_tx.send(RtviMessage::disconnect_bot()).await;
        // Dropping the sender ends the writer, which closes the socket.
        drop(connection.c_tx);
        connection.reader.abort();

        self.emit(SessionEvent::transport("disconnected"));
        self.emit(SessionEvent::bare(crate::types::EventKind::Disconnected));

        sent.map_err(|e| anyhow::anyhow!("failed to send disconnect-bot: {e}"))
    }

    /// Send a raw protocol message.
    pub async fn send(&self, message: RtviMessage) -> Result<()> {
        let c_tx = match self.connection.lock() {
            Ok(guard) => guard.as_ref().map(|connection| connection.c_tx.clone()),
            Err(_) => None,
        };
        match c_tx {
            Some(tx) => {
                tx.send(message).await?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn next_kind(rx: &mut EventRx) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event should arrive")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_connect_emits_transport_events_and_forwards_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // A bot that waits for client-ready, then reports ready and one transcript.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let first = ws.next().await.unwrap().unwrap();
            let hello: RtviMessage = serde_json::from_str(first.to_text().unwrap()).unwrap();
            assert_eq!(hello.message_type(), &crate::types::MessageType::ClientReady);
            ws.send(Message::Text(
                r#"{"label":"rtvi-ai","type":"bot-ready","data":{}}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"label":"rtvi-ai","type":"bot-transcription","data":{"text":"Bienvenidos"}}"#
                    .to_string(),
            ))
            .await
            .unwrap();
            // Drain until the client goes away.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client = Client::new(Config::default());
        let mut rx = client.events();
        client.connect(&format!("ws://{addr}")).await.unwrap();
        assert!(client.is_connected());

        assert_eq!(next_kind(&mut rx).await, SessionEvent::transport("connecting"));
        assert_eq!(next_kind(&mut rx).await, SessionEvent::transport("connected"));
        assert_eq!(next_kind(&mut rx).await.kind(), EventKind::Connected);
        assert_eq!(next_kind(&mut rx).await, SessionEvent::transport("ready"));
        let transcript = next_kind(&mut rx).await;
        assert_eq!(transcript.kind(), EventKind::BotTranscript);
        assert_eq!(transcript.data()["text"], "Bienvenidos");

        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
        assert_eq!(next_kind(&mut rx).await, SessionEvent::transport("disconnected"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_after_server_closes_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // First session: hang up right after client-ready. Second: stay open.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.next().await.unwrap().unwrap();
            ws.close(None).await.unwrap();
            drop(ws);

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client = Client::new(Config::default());
        let mut rx = client.events();
        let url = format!("ws://{addr}");
        client.connect(&url).await.unwrap();

        loop {
            if next_kind(&mut rx).await == SessionEvent::transport("closed") {
                break;
            }
        }
        assert_eq!(next_kind(&mut rx).await.kind(), EventKind::Disconnected);
        assert!(!client.is_connected());

        client.connect(&url).await.unwrap();
        assert!(client.is_connected());
        assert_eq!(next_kind(&mut rx).await, SessionEvent::transport("connecting"));
        assert_eq!(next_kind(&mut rx).await, SessionEvent::transport("connected"));

        client.disconnect().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_reports_failed_transport() {
        // Bind then drop so the port refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::new(Config::default());
        let mut rx = client.events();
        assert!(client.connect(&format!("ws://{addr}")).await.is_err());
        assert!(!client.is_connected());
        assert_eq!(next_kind(&mut rx).await, SessionEvent::transport("connecting"));
        assert_eq!(next_kind(&mut rx).await, SessionEvent::transport("failed"));
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_is_noop() {
        let client = Client::new(Config::default());
        assert!(client.disconnect().await.is_ok());
        assert!(client.send(RtviMessage::client_ready()).await.is_err());
    }

    #[test]
    fn test_mic_toggle() {
        let client = Client::new(Config::builder().with_mic_enabled(false).build());
        assert!(!client.mic_enabled());
        client.enable_mic(true);
        assert!(client.mic_enabled());
    }
}
