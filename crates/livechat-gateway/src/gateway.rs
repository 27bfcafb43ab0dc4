//! Livechat gateway
//!
//! The public surface: connect once, register guests, send on their behalf.
//! Construct one instance at startup and pass it to whatever needs it.

use crate::connection::ConnectionSession;
use crate::error::{GatewayError, GatewayResult};
use crate::handler::MessageHandler;
use crate::protocol::methods;
use crate::registry::GuestRegistry;
use crate::router::{MessageRouter, RetryPolicy, StreamSupervisor};
use crate::transport::{BackendTransport, Credentials, DdpClient, DdpClientConfig, StreamFilter};
use livechat_common::{AppConfig, LivechatConfig};
use livechat_core::{generate_id, DomainError, GuestDetails, GuestIdentity, InitialData, LivechatMessage, RoomKey};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use validator::Validate;

/// Default interval between idle-session sweeps
const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// Gateway tuning
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Department name resolved at connect time
    pub department: Option<String>,
    /// Bound on every remote call
    pub call_timeout: Duration,
    /// Expire guest sessions idle this long; `None` keeps them until closed
    pub session_idle_timeout: Option<Duration>,
    pub reaper_interval: Duration,
    pub retry: RetryPolicy,
    pub filter: StreamFilter,
}

impl GatewayOptions {
    /// Build options from the livechat section of the configuration
    pub fn from_config(config: &LivechatConfig) -> Self {
        let session_idle_timeout = config.session_idle_timeout();
        Self {
            department: config.department.clone(),
            call_timeout: config.call_timeout(),
            session_idle_timeout,
            reaper_interval: session_idle_timeout
                .map_or(DEFAULT_REAPER_INTERVAL, |idle| idle.min(DEFAULT_REAPER_INTERVAL)),
            retry: RetryPolicy::new(config.resubscribe_attempts, config.resubscribe_delay()),
            filter: StreamFilter::livechat(),
        }
    }
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self::from_config(&LivechatConfig::default())
    }
}

/// Livechat gateway
pub struct LivechatGateway {
    session: Arc<ConnectionSession>,
    registry: Arc<GuestRegistry>,
    options: GatewayOptions,
    /// Set once a connect has fully succeeded; cleared by a failed stream
    connected: Arc<AtomicBool>,
    /// Held for the duration of a `connect` call
    connecting: AtomicBool,
    shutdown: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<GatewayResult<()>>>>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl LivechatGateway {
    pub fn new(transport: Arc<dyn BackendTransport>, credentials: Credentials, options: GatewayOptions) -> Self {
        let session = ConnectionSession::new(
            transport,
            credentials,
            options.department.clone(),
            options.call_timeout,
            options.filter.clone(),
        );
        let (shutdown, _) = watch::channel(false);

        Self {
            session: Arc::new(session),
            registry: GuestRegistry::new_shared(),
            options,
            connected: Arc::new(AtomicBool::new(false)),
            connecting: AtomicBool::new(false),
            shutdown,
            supervisor: Mutex::new(None),
            reaper: Mutex::new(None),
        }
    }

    /// Build a gateway talking DDP to the configured backend
    pub fn from_config(config: &AppConfig) -> Self {
        let options = GatewayOptions::from_config(&config.livechat);
        let transport = DdpClient::new(DdpClientConfig {
            url: config.backend.websocket_url(),
            handshake_timeout: options.call_timeout,
            ..DdpClientConfig::default()
        });
        let credentials = Credentials::new(&config.backend.username, &config.backend.password);

        Self::new(Arc::new(transport), credentials, options)
    }

    /// Connect, start routing the message stream, and load the livechat
    /// configuration
    ///
    /// Guests can only be registered once this returns. On failure nothing
    /// keeps running and `connect` may be retried.
    pub async fn connect(&self) -> GatewayResult<()> {
        if self.connected.load(Ordering::SeqCst) || self.connecting.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::AlreadyConnected);
        }

        let result = self.start().await;
        match &result {
            Ok(()) => {
                self.connected.store(true, Ordering::SeqCst);
                // The stream may already have failed while initial data loaded
                let stopped = self
                    .supervisor
                    .lock()
                    .as_ref()
                    .map_or(true, JoinHandle::is_finished);
                if stopped {
                    self.connected.store(false, Ordering::SeqCst);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Gateway connect failed");
                self.stop_tasks();
                self.session.close().await;
            }
        }

        self.connecting.store(false, Ordering::SeqCst);
        result
    }

    async fn start(&self) -> GatewayResult<()> {
        let stream = self.session.open_stream().await?;

        self.shutdown.send_replace(false);
        let supervisor = StreamSupervisor::new(
            self.session.clone(),
            MessageRouter::new(self.registry.clone()),
            self.options.retry,
            self.shutdown.subscribe(),
        );
        let connected = self.connected.clone();
        let supervised = async move {
            let result = supervisor.run(stream).await;
            if result.is_err() {
                connected.store(false, Ordering::SeqCst);
            }
            result
        };
        *self.supervisor.lock() = Some(tokio::spawn(supervised));

        self.session.load_initial_data().await?;

        if let Some(max_idle) = self.options.session_idle_timeout {
            let reaper = self.registry.spawn_reaper(max_idle, self.options.reaper_interval);
            *self.reaper.lock() = Some(reaper);
        }

        tracing::info!(
            user_id = ?self.session.user_id(),
            department_id = ?self.session.department_id(),
            "Livechat gateway connected"
        );

        Ok(())
    }

    /// Register a guest and bind `handler` to its room
    ///
    /// Missing token and department are filled in: a fresh token, and the
    /// department resolved at connect time (if any). Returns the room key used
    /// to address the session afterwards.
    pub async fn register_guest<H>(&self, details: GuestDetails, handler: H) -> GatewayResult<RoomKey>
    where
        H: MessageHandler,
    {
        self.ensure_connected()?;
        details.validate().map_err(DomainError::from)?;

        let mut details = details;
        if details.token.as_deref().map_or(true, str::is_empty) {
            details.token = Some(generate_id(None));
        }
        if details.department.as_deref().map_or(true, str::is_empty) {
            details.department = self.session.department_id();
        }

        let params = vec![serde_json::to_value(&details).map_err(DomainError::from)?];
        let guest: GuestIdentity = self
            .session
            .call_as(methods::REGISTER_GUEST, params)
            .await
            .map_err(GatewayError::Registration)?;

        let room_key = RoomKey::generate();
        tracing::info!(
            name = %details.name,
            username = %guest.username(),
            room = %room_key,
            department = ?details.department,
            "Registered guest"
        );
        self.registry.insert(room_key.clone(), guest, Arc::new(handler));

        Ok(room_key)
    }

    /// Send `text` into the room as its guest
    ///
    /// Fails with [`GatewayError::UnknownSession`] before any remote call when
    /// the room key is not registered. The text is forwarded as given.
    pub async fn send_message(&self, room_key: &RoomKey, text: &str) -> GatewayResult<LivechatMessage> {
        let session = self
            .registry
            .get(room_key.as_str())
            .ok_or_else(|| GatewayError::UnknownSession(room_key.clone()))?;

        self.ensure_connected()?;

        let params = vec![json!({
            "_id": generate_id(None),
            "rid": room_key,
            "msg": text,
            "token": session.guest().token(),
        })];
        let sent: LivechatMessage = self
            .session
            .call_as(methods::SEND_MESSAGE, params)
            .await
            .map_err(GatewayError::Send)?;

        session.touch();
        tracing::debug!(room = %room_key, message_id = %sent.id, "Message sent");

        Ok(sent)
    }

    /// End a guest session; its handler receives nothing afterwards
    pub fn close_session(&self, room_key: &RoomKey) -> bool {
        let closed = self.registry.remove(room_key.as_str()).is_some();
        if closed {
            tracing::info!(room = %room_key, "Guest session closed");
        }
        closed
    }

    /// Wait for the stream supervisor to end
    ///
    /// Returns `Ok(())` after [`shutdown`](Self::shutdown) and the fatal fault
    /// otherwise. The gateway reports itself disconnected as soon as the
    /// supervisor fails, whether or not anyone waits here. Only the first
    /// caller waits; later calls return immediately.
    pub async fn closed(&self) -> GatewayResult<()> {
        let handle = self.supervisor.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(GatewayError::Internal(e.to_string()))
            }
        }
    }

    /// Stop routing, drop all sessions and close the link
    pub async fn shutdown(&self) {
        self.stop_tasks();
        let dropped = self.registry.clear();
        self.session.close().await;
        self.connected.store(false, Ordering::SeqCst);

        tracing::info!(sessions = dropped, "Livechat gateway shut down");
    }

    fn stop_tasks(&self) {
        self.shutdown.send_replace(true);
        if let Some(reaper) = self.reaper.lock().take() {
            reaper.abort();
        }
    }

    fn ensure_connected(&self) -> GatewayResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::NotConnected)
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Department id resolved at connect time
    pub fn department_id(&self) -> Option<String> {
        self.session.department_id()
    }

    /// Livechat configuration fetched at connect time
    pub fn initial_data(&self) -> Option<Arc<InitialData>> {
        self.session.initial_data()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &Arc<GuestRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }
}

impl std::fmt::Debug for LivechatGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivechatGateway")
            .field("connected", &self.is_connected())
            .field("session", &self.session)
            .field("registry", &self.registry)
            .finish()
    }
}
