//! DDP client over WebSocket
//!
//! One socket carries every remote call and the message subscription. A
//! reader task correlates `result`/`ready`/`nosub` frames with pending
//! requests by id and forwards `changed` notifications to the active streams;
//! a writer task owns the sink.

use super::{BackendTransport, Credentials, StreamItem};
use crate::error::{StreamFault, TransportError, TransportResult};
use crate::protocol::{
    collections, methods, streams, DdpMessage, LoginRequest, LoginResult, MethodError, StreamEvent,
};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel buffer size for outgoing frames
const OUTGOING_BUFFER_SIZE: usize = 100;

/// DDP client configuration
#[derive(Debug, Clone)]
pub struct DdpClientConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:3000/websocket`
    pub url: String,
    /// Time allowed for the socket + DDP handshake
    pub handshake_timeout: Duration,
    /// Buffer between the reader task and the stream consumer
    pub stream_buffer: usize,
}

impl DdpClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for DdpClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/websocket".to_string(),
            handshake_timeout: Duration::from_secs(10),
            stream_buffer: 1024,
        }
    }
}

/// Request awaiting its reply frame
enum Pending {
    Call(oneshot::Sender<TransportResult<Value>>),
    Sub(oneshot::Sender<TransportResult<()>>),
}

/// State shared between the client and its reader task
#[derive(Default)]
struct Shared {
    pending: DashMap<String, Pending>,
    /// Active subscriptions by subscription id
    streams: DashMap<String, mpsc::Sender<StreamItem>>,
    /// Cleared by the reader task when the socket goes away
    alive: AtomicBool,
}

impl Shared {
    async fn handle_frame(&self, frame: DdpMessage, outgoing: &mpsc::Sender<DdpMessage>) {
        match frame {
            DdpMessage::Ping { id } => {
                let _ = outgoing.send(DdpMessage::pong(id)).await;
            }
            DdpMessage::MethodResult { id, result, error } => {
                if let Some((_, Pending::Call(tx))) = self.pending.remove(&id) {
                    let reply = match error {
                        Some(error) => Err(TransportError::Method(error)),
                        None => Ok(result.unwrap_or(Value::Null)),
                    };
                    let _ = tx.send(reply);
                }
            }
            DdpMessage::Ready { subs } => {
                for id in subs {
                    if let Some((_, Pending::Sub(tx))) = self.pending.remove(&id) {
                        let _ = tx.send(Ok(()));
                    }
                }
            }
            DdpMessage::Nosub { id, error } => {
                let error = error.unwrap_or_else(|| MethodError::new("nosub", "subscription stopped"));
                if let Some((_, Pending::Sub(tx))) = self.pending.remove(&id) {
                    let _ = tx.send(Err(TransportError::SubscriptionRejected(error)));
                } else if let Some((_, stream)) = self.streams.remove(&id) {
                    tracing::warn!(subscription = %id, error = %error, "Subscription ended by backend");
                    let _ = stream
                        .send(Err(StreamFault::SubscriptionRejected(error.to_string())))
                        .await;
                }
            }
            DdpMessage::Changed {
                collection,
                fields: Some(fields),
                ..
            } if collection == collections::ROOM_MESSAGES => match StreamEvent::from_fields(fields) {
                Ok((_, event)) => self.publish(Ok(event)).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Undecodable stream message, skipping");
                }
            },
            DdpMessage::ProtocolError { reason, .. } => {
                tracing::error!(reason = %reason, "Backend reported a protocol error");
                self.publish(Err(StreamFault::Protocol(reason))).await;
            }
            other => {
                tracing::trace!(frame = %other, "Ignoring frame");
            }
        }
    }

    async fn publish(&self, item: StreamItem) {
        let targets: Vec<mpsc::Sender<StreamItem>> =
            self.streams.iter().map(|entry| entry.value().clone()).collect();

        for target in targets {
            if target.send(item.clone()).await.is_err() {
                tracing::debug!("Stream consumer gone, dropping notification");
            }
        }
    }

    /// Fail everything in flight after the link is lost
    async fn fail_all(&self, reason: &str) {
        let ids: Vec<String> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            match self.pending.remove(&id) {
                Some((_, Pending::Call(tx))) => {
                    let _ = tx.send(Err(TransportError::Disconnected));
                }
                Some((_, Pending::Sub(tx))) => {
                    let _ = tx.send(Err(TransportError::Disconnected));
                }
                None => {}
            }
        }

        let subs: Vec<String> = self.streams.iter().map(|entry| entry.key().clone()).collect();
        for id in subs {
            if let Some((_, stream)) = self.streams.remove(&id) {
                let _ = stream
                    .send(Err(StreamFault::Disconnected(reason.to_string())))
                    .await;
            }
        }
    }
}

/// Removes an entry from one of the shared maps when dropped while armed
///
/// A request future dropped mid-flight (a timed-out call) would otherwise
/// leave its reply slot behind forever.
struct EntryGuard<'a, V> {
    map: &'a DashMap<String, V>,
    id: String,
    armed: bool,
}

impl<'a, V> EntryGuard<'a, V> {
    fn new(map: &'a DashMap<String, V>, id: &str) -> Self {
        Self {
            map,
            id: id.to_string(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<V> Drop for EntryGuard<'_, V> {
    fn drop(&mut self) {
        if self.armed {
            self.map.remove(&self.id);
        }
    }
}

/// Live socket and its tasks
struct Link {
    session: String,
    outgoing: mpsc::Sender<DdpMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Meteor DDP client for the chat backend's realtime API
pub struct DdpClient {
    config: DdpClientConfig,
    shared: Arc<Shared>,
    link: Mutex<Option<Link>>,
    next_id: AtomicU64,
}

impl DdpClient {
    pub fn new(config: DdpClientConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::default()),
            link: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// DDP session id of the current link
    pub fn session_id(&self) -> Option<String> {
        self.link.lock().as_ref().map(|link| link.session.clone())
    }

    /// Check if a link is up
    pub fn is_connected(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst) && self.link.lock().is_some()
    }

    fn next_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn outgoing(&self) -> TransportResult<mpsc::Sender<DdpMessage>> {
        if !self.shared.alive.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        self.link
            .lock()
            .as_ref()
            .map(|link| link.outgoing.clone())
            .ok_or(TransportError::Disconnected)
    }

    /// Send a request frame and wait for the reply registered under `id`
    async fn request<T>(
        &self,
        id: String,
        frame: DdpMessage,
        pending: impl FnOnce(oneshot::Sender<TransportResult<T>>) -> Pending,
    ) -> TransportResult<T> {
        let outgoing = self.outgoing()?;
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id.clone(), pending(tx));
        let _slot = EntryGuard::new(&self.shared.pending, &id);

        outgoing
            .send(frame)
            .await
            .map_err(|_| TransportError::Disconnected)?;

        rx.await.map_err(|_| TransportError::Disconnected)?
    }

    /// Open the socket and complete the DDP handshake
    async fn handshake(&self) -> TransportResult<(WsStream, String)> {
        let (mut ws, _) = tokio_tungstenite::connect_async(self.config.url.as_str()).await?;
        ws.send(Message::Text(DdpMessage::connect().to_json()?)).await?;

        loop {
            let frame = match ws.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(TransportError::Handshake("socket closed during handshake".to_string()));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            };

            match DdpMessage::from_json(&frame) {
                Ok(DdpMessage::Connected { session }) => return Ok((ws, session)),
                Ok(DdpMessage::Failed { version }) => {
                    return Err(TransportError::Handshake(format!(
                        "backend requires protocol version {version}"
                    )));
                }
                Ok(DdpMessage::Ping { id }) => {
                    ws.send(Message::Text(DdpMessage::pong(id).to_json()?)).await?;
                }
                Ok(other) => tracing::trace!(frame = %other, "Ignoring frame during handshake"),
                Err(_) => tracing::trace!("Ignoring non-DDP frame during handshake"),
            }
        }
    }

    async fn read_loop(
        mut stream: SplitStream<WsStream>,
        shared: Arc<Shared>,
        outgoing: mpsc::Sender<DdpMessage>,
    ) {
        let reason = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match DdpMessage::from_json(&text) {
                    Ok(frame) => shared.handle_frame(frame, &outgoing).await,
                    Err(e) => tracing::trace!(error = %e, "Ignoring non-DDP frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    break frame.map_or_else(|| "closed by backend".to_string(), |f| f.reason.to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break e.to_string(),
                None => break "connection ended".to_string(),
            }
        };

        tracing::warn!(reason = %reason, "Backend link lost");
        shared.alive.store(false, Ordering::SeqCst);
        shared.fail_all(&reason).await;
    }

    async fn write_loop(
        mut sink: SplitSink<WsStream, Message>,
        mut outgoing: mpsc::Receiver<DdpMessage>,
    ) {
        while let Some(frame) = outgoing.recv().await {
            match frame.to_json() {
                Ok(json) => {
                    if sink.send(Message::Text(json)).await.is_err() {
                        tracing::warn!("Failed to write frame to backend");
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, frame = %frame, "Failed to encode frame"),
            }
        }

        let _ = sink.close().await;
    }
}

#[async_trait]
impl BackendTransport for DdpClient {
    async fn connect(&self) -> TransportResult<()> {
        let previous = self.link.lock().take();
        if let Some(previous) = previous {
            previous.abort();
        }

        let (ws, session) = tokio::time::timeout(self.config.handshake_timeout, self.handshake())
            .await
            .map_err(|_| TransportError::Timeout(self.config.handshake_timeout))??;

        self.shared.alive.store(true, Ordering::SeqCst);
        let (sink, stream) = ws.split();
        let (tx, rx) = mpsc::channel(OUTGOING_BUFFER_SIZE);

        let writer = tokio::spawn(Self::write_loop(sink, rx));
        let reader = tokio::spawn(Self::read_loop(stream, self.shared.clone(), tx.clone()));

        tracing::info!(url = %self.config.url, session = %session, "Connected to backend");

        *self.link.lock() = Some(Link {
            session,
            outgoing: tx,
            reader,
            writer,
        });

        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> TransportResult<String> {
        let request = serde_json::to_value(LoginRequest::new(
            credentials.username.as_str(),
            credentials.password.as_str(),
        ))?;
        let result: LoginResult =
            serde_json::from_value(self.call(methods::LOGIN, vec![request]).await?)?;

        tracing::info!(username = %credentials.username, user_id = %result.id, "Logged in");
        Ok(result.id)
    }

    async fn subscribe_to_messages(&self) -> TransportResult<mpsc::Receiver<StreamItem>> {
        let id = self.next_id();
        let frame = DdpMessage::sub(
            id.clone(),
            streams::ROOM_MESSAGES,
            vec![Value::from(streams::MY_MESSAGES), Value::Bool(false)],
        );

        // Register the stream before subscribing so no notification is missed
        let (tx, rx) = mpsc::channel(self.config.stream_buffer);
        self.shared.streams.insert(id.clone(), tx);
        let stream_slot = EntryGuard::new(&self.shared.streams, &id);

        self.request(id.clone(), frame, Pending::Sub).await?;
        stream_slot.disarm();

        tracing::debug!(subscription = %id, "Subscribed to room messages");
        Ok(rx)
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> TransportResult<Value> {
        let id = self.next_id();
        let frame = DdpMessage::method(id.clone(), method, params);

        tracing::trace!(method = %method, id = %id, "Calling remote method");
        self.request(id, frame, Pending::Call).await
    }

    async fn disconnect(&self) {
        let link = self.link.lock().take();
        if let Some(link) = link {
            link.abort();
            self.shared.alive.store(false, Ordering::SeqCst);
            self.shared.fail_all("disconnected by client").await;
            tracing::info!(session = %link.session, "Disconnected from backend");
        }
    }
}

impl Drop for DdpClient {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.abort();
        }
    }
}

impl std::fmt::Debug for DdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DdpClient")
            .field("url", &self.config.url)
            .field("pending", &self.shared.pending.len())
            .field("streams", &self.shared.streams.len())
            .finish()
    }
}
