//! Test helpers for integration tests
//!
//! `MockTransport` stands in for the chat backend: it answers the livechat
//! remote methods, records every call, and lets tests push events and faults
//! onto the message stream.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use livechat_core::{GuestDetails, LivechatMessage, MessageMeta, RoomKey};
use livechat_gateway::protocol::{methods, MethodError};
use livechat_gateway::{
    BackendTransport, ConnectStage, Credentials, GatewayOptions, LivechatGateway, MessageHandler, RetryPolicy,
    StreamEvent, StreamFault, StreamFilter, StreamItem, TransportError, TransportResult,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::fixtures::{initial_data, BOT_USER_ID};

/// A remote call as received by the mock backend
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct MockState {
    stream: Option<mpsc::Sender<StreamItem>>,
    calls: Vec<RecordedCall>,
    /// Visitor token to (user id, username)
    visitors: HashMap<String, (String, String)>,
    failing_methods: HashMap<String, MethodError>,
    hanging_methods: HashSet<String>,
    failing_stage: Option<ConnectStage>,
}

/// In-memory backend
pub struct MockTransport {
    state: Mutex<MockState>,
    initial_data: Value,
    latency: Duration,
    guest_seq: AtomicUsize,
    connects: AtomicUsize,
    subscribes: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Self::with_latency(Duration::ZERO)
    }

    /// Every remote call takes at least `latency`
    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Self::build(initial_data(), latency)
    }

    /// Answer `getInitialData` with `data`
    pub fn with_initial_data(data: Value) -> Arc<Self> {
        Self::build(data, Duration::ZERO)
    }

    fn build(initial_data: Value, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState::default()),
            initial_data,
            latency,
            guest_seq: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            subscribes: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        })
    }

    /// Make a remote method fail until cleared
    pub fn fail_method(&self, method: &str, error: MethodError) {
        self.state.lock().failing_methods.insert(method.to_string(), error);
    }

    /// Make a remote method never answer
    pub fn hang_method(&self, method: &str) {
        self.state.lock().hanging_methods.insert(method.to_string());
    }

    /// Make a connect step fail until cleared
    pub fn fail_stage(&self, stage: Option<ConnectStage>) {
        self.state.lock().failing_stage = stage;
    }

    /// Push an event onto the current subscription
    pub async fn push_event(&self, event: StreamEvent) -> Result<()> {
        self.push(Ok(event)).await
    }

    /// Push a fault onto the current subscription
    pub async fn push_fault(&self, fault: StreamFault) -> Result<()> {
        self.push(Err(fault)).await
    }

    async fn push(&self, item: StreamItem) -> Result<()> {
        let stream = self
            .state
            .lock()
            .stream
            .clone()
            .ok_or_else(|| anyhow!("no active subscription"))?;
        stream
            .send(item)
            .await
            .map_err(|_| anyhow!("subscription receiver dropped"))
    }

    /// All calls of `method`, oldest first
    pub fn calls(&self, method: &str) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    fn stage_failure(&self, stage: ConnectStage) -> TransportResult<()> {
        if self.state.lock().failing_stage == Some(stage) {
            return Err(TransportError::Method(MethodError::new(
                "error-injected",
                format!("{stage} failure"),
            )));
        }
        Ok(())
    }

    fn register_guest(&self, details: &Value) -> TransportResult<Value> {
        let n = self.guest_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let user_id = format!("guest-{n}");
        let username = format!("guest-{n}");
        let token = details["token"]
            .as_str()
            .ok_or_else(|| TransportError::Method(MethodError::new(400, "Missing token")))?
            .to_string();

        self.state
            .lock()
            .visitors
            .insert(token.clone(), (user_id.clone(), username.clone()));

        let emails: Vec<Value> = details["email"]
            .as_str()
            .map(|address| vec![json!({ "address": address })])
            .unwrap_or_default();

        Ok(json!({
            "userId": user_id,
            "visitor": {
                "name": details["name"],
                "token": token,
                "username": username,
                "visitorEmails": emails
            }
        }))
    }

    fn send_message(&self, message: &Value) -> TransportResult<Value> {
        let token = message["token"].as_str().unwrap_or_default();
        let (user_id, username) = self
            .state
            .lock()
            .visitors
            .get(token)
            .cloned()
            .ok_or_else(|| TransportError::Method(MethodError::new(403, "Invalid token")))?;

        Ok(json!({
            "_id": message["_id"],
            "rid": message["rid"],
            "msg": message["msg"],
            "token": token,
            "ts": { "$date": Utc::now().timestamp_millis() },
            "u": { "_id": user_id, "username": username },
            "_updatedAt": { "$date": Utc::now().timestamp_millis() },
            "newRoom": true,
            "showConnecting": false
        }))
    }
}

#[async_trait]
impl BackendTransport for MockTransport {
    async fn connect(&self) -> TransportResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.stage_failure(ConnectStage::Transport)
    }

    async fn login(&self, credentials: &Credentials) -> TransportResult<String> {
        self.stage_failure(ConnectStage::Login)?;
        if credentials.username.is_empty() {
            return Err(TransportError::Method(MethodError::new(403, "User not found")));
        }
        Ok(BOT_USER_ID.to_string())
    }

    async fn subscribe_to_messages(&self) -> TransportResult<mpsc::Receiver<StreamItem>> {
        self.stage_failure(ConnectStage::Subscribe)?;
        self.subscribes.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(64);
        self.state.lock().stream = Some(tx);
        Ok(rx)
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> TransportResult<Value> {
        let (failure, hangs) = {
            let mut state = self.state.lock();
            state.calls.push(RecordedCall {
                method: method.to_string(),
                params: params.clone(),
            });
            (
                state.failing_methods.get(method).cloned(),
                state.hanging_methods.contains(method),
            )
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if hangs {
            std::future::pending::<()>().await;
        }
        if let Some(error) = failure {
            return Err(TransportError::Method(error));
        }

        let first = params.first().cloned().unwrap_or(Value::Null);
        match method {
            methods::GET_INITIAL_DATA => {
                self.stage_failure(ConnectStage::InitialData)?;
                Ok(self.initial_data.clone())
            }
            methods::REGISTER_GUEST => self.register_guest(&first),
            methods::SEND_MESSAGE => self.send_message(&first),
            other => Err(TransportError::Method(MethodError::new(
                404,
                format!("Method '{other}' not found"),
            ))),
        }
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.state.lock().stream = None;
    }
}

/// Options used by most tests: "Sales" department, short timeouts, fast retries
pub fn test_options() -> GatewayOptions {
    GatewayOptions {
        department: Some("Sales".to_string()),
        call_timeout: Duration::from_millis(500),
        session_idle_timeout: None,
        reaper_interval: Duration::from_millis(20),
        retry: RetryPolicy::new(3, Duration::from_millis(10)),
        filter: StreamFilter::livechat(),
    }
}

/// Build a gateway over `transport` without connecting it
pub fn gateway_with(transport: &Arc<MockTransport>, options: GatewayOptions) -> LivechatGateway {
    LivechatGateway::new(transport.clone(), Credentials::new("bot", "secret"), options)
}

/// Build and connect a gateway with [`test_options`]
pub async fn connected_gateway() -> Result<(LivechatGateway, Arc<MockTransport>)> {
    connected_gateway_with(MockTransport::new(), test_options()).await
}

/// Build and connect a gateway
pub async fn connected_gateway_with(
    transport: Arc<MockTransport>,
    options: GatewayOptions,
) -> Result<(LivechatGateway, Arc<MockTransport>)> {
    let gateway = gateway_with(&transport, options);
    gateway.connect().await?;
    Ok((gateway, transport))
}

/// Register a guest whose messages land in the returned channel
pub async fn register_channel_guest(
    gateway: &LivechatGateway,
    name: &str,
) -> Result<(RoomKey, mpsc::UnboundedReceiver<StreamEvent>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let room_key = gateway
        .register_guest(GuestDetails::new(name), tx)
        .await?;
    Ok((room_key, rx))
}

/// Handler that ignores every message
pub fn noop_handler() -> impl MessageHandler {
    |_: &LivechatMessage, _: &MessageMeta| {}
}

/// Backend user id of the guest behind `room_key`
pub fn guest_user_id(gateway: &LivechatGateway, room_key: &RoomKey) -> Result<String> {
    gateway
        .registry()
        .get(room_key.as_str())
        .map(|session| session.guest().user_id.clone())
        .ok_or_else(|| anyhow!("no session for {room_key}"))
}

/// Wait for the next delivered event
pub async fn recv_event(rx: &mut mpsc::UnboundedReceiver<StreamEvent>) -> Result<StreamEvent> {
    match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => bail!("handler channel closed"),
        Err(_) => bail!("no event delivered within 2s"),
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(condition: impl Fn() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not met within 2s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}
