//! Connection session
//!
//! Drives the connect sequence (transport, login, subscribe), fetches the
//! initial livechat configuration, and funnels every remote call through one
//! timeout-bounded path.

use crate::error::{ConnectStage, GatewayError, GatewayResult, TransportError, TransportResult};
use crate::protocol::methods;
use crate::transport::{BackendTransport, Credentials, MessageStream, StreamFilter, StreamItem};
use livechat_core::{generate_id, InitialData};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// State learned while connecting
#[derive(Debug, Default)]
struct SessionState {
    user_id: Option<String>,
    initial_data: Option<Arc<InitialData>>,
    department_id: Option<String>,
}

/// The gateway's authenticated link to the backend
pub struct ConnectionSession {
    transport: Arc<dyn BackendTransport>,
    credentials: Credentials,
    /// Department name to resolve after connect
    department: Option<String>,
    call_timeout: Duration,
    filter: StreamFilter,
    state: RwLock<SessionState>,
}

impl ConnectionSession {
    pub fn new(
        transport: Arc<dyn BackendTransport>,
        credentials: Credentials,
        department: Option<String>,
        call_timeout: Duration,
        filter: StreamFilter,
    ) -> Self {
        Self {
            transport,
            credentials,
            department: department.filter(|name| !name.is_empty()),
            call_timeout,
            filter,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Connect, log in and subscribe, returning the filtered message stream
    pub async fn open_stream(&self) -> GatewayResult<MessageStream> {
        let (user_id, receiver) = self.establish().await?;
        Ok(MessageStream::new(receiver, self.filter.clone(), user_id))
    }

    /// Re-run the connect sequence and attach the new subscription to `stream`
    pub async fn reopen_stream(&self, stream: &mut MessageStream) -> GatewayResult<()> {
        let (user_id, receiver) = self.establish().await?;
        stream.resume(receiver, user_id);
        Ok(())
    }

    async fn establish(&self) -> GatewayResult<(String, mpsc::Receiver<StreamItem>)> {
        self.timed(self.transport.connect())
            .await
            .map_err(GatewayError::connect(ConnectStage::Transport))?;

        let user_id = self
            .timed(self.transport.login(&self.credentials))
            .await
            .map_err(GatewayError::connect(ConnectStage::Login))?;

        let receiver = self
            .timed(self.transport.subscribe_to_messages())
            .await
            .map_err(GatewayError::connect(ConnectStage::Subscribe))?;

        self.state.write().user_id = Some(user_id.clone());

        tracing::debug!(user_id = %user_id, "Message stream opened");
        Ok((user_id, receiver))
    }

    /// Fetch the initial livechat configuration and resolve the department
    ///
    /// A configured department name with no exact match leaves the gateway
    /// without a department; that is not an error.
    pub async fn load_initial_data(&self) -> GatewayResult<Arc<InitialData>> {
        let data: InitialData = self
            .call_as(methods::GET_INITIAL_DATA, vec![Value::from(generate_id(None))])
            .await
            .map_err(GatewayError::connect(ConnectStage::InitialData))?;

        let department_id = self.department.as_deref().and_then(|name| {
            match data.find_department(name) {
                Some(department) => {
                    tracing::info!(
                        department = %name,
                        department_id = %department.id,
                        agents = department.num_agents,
                        "Department resolved"
                    );
                    Some(department.id.clone())
                }
                None => {
                    tracing::warn!(
                        department = %name,
                        available = data.departments.len(),
                        "Department not found, registering guests without one"
                    );
                    None
                }
            }
        });

        let data = Arc::new(data);
        let mut state = self.state.write();
        state.initial_data = Some(data.clone());
        state.department_id = department_id;

        Ok(data)
    }

    /// Invoke a remote method within the call timeout
    pub async fn call(&self, method: &str, params: Vec<Value>) -> TransportResult<Value> {
        self.timed(self.transport.call(method, params)).await
    }

    /// Invoke a remote method and decode its result
    pub async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> TransportResult<T> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn timed<T>(&self, fut: impl Future<Output = TransportResult<T>>) -> TransportResult<T> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| TransportError::Timeout(self.call_timeout))?
    }

    /// Drop the link and forget everything learned while connected
    pub async fn close(&self) {
        self.transport.disconnect().await;
        *self.state.write() = SessionState::default();
    }

    /// Id of the logged-in bot user
    pub fn user_id(&self) -> Option<String> {
        self.state.read().user_id.clone()
    }

    /// Resolved department id, if the configured department was found
    pub fn department_id(&self) -> Option<String> {
        self.state.read().department_id.clone()
    }

    pub fn initial_data(&self) -> Option<Arc<InitialData>> {
        self.state.read().initial_data.clone()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ConnectionSession")
            .field("username", &self.credentials.username)
            .field("department", &self.department)
            .field("user_id", &state.user_id)
            .field("department_id", &state.department_id)
            .finish()
    }
}
