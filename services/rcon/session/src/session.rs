//! Per-server session state machine.
//!
//! Each tracked server owns one [`SessionSlot`]. The slot serializes every
//! operation on its connection through a FIFO async mutex around the
//! [`Session`], and mirrors the liveness flags into atomics so snapshots never
//! wait behind network I/O.
//!
//! State transitions:
//!
//! ```text
//! Disconnected -> Connecting -> Authenticating -> Live
//!       ^                                          |
//!       +------------- any detected failure -------+
//! ```

use crate::client::{ClientError, Connector, RconClient};
use crate::error::SessionError;
use crate::heartbeat::{self, HeartbeatHandle};
use crate::manager::ManagerConfig;
use crate::outcome::CommandOutcome;
use rcon_storage::{ServerId, ServerRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable connection
    Disconnected,
    /// Opening the transport
    Connecting,
    /// Transport open, waiting for the auth response
    Authenticating,
    /// Authenticated and probed by a heartbeat
    Live,
}

/// Shared collaborators of every session
pub(crate) struct SessionContext {
    pub connector: Arc<dyn Connector>,
    pub config: ManagerConfig,
}

/// Mutable connection state, only reachable through the slot's mutex
pub(crate) struct Session {
    /// Record used for reconnects
    pub record: ServerRecord,
    pub client: Option<Box<dyn RconClient>>,
    pub state: SessionState,
    /// Bumped whenever a connection is torn down or established
    pub generation: u64,
    pub heartbeat: Option<HeartbeatHandle>,
}

impl Session {
    fn new(record: ServerRecord) -> Self {
        Self {
            record,
            client: None,
            state: SessionState::Disconnected,
            generation: 0,
            heartbeat: None,
        }
    }

    /// Live and the transport still agrees
    pub fn is_live(&self) -> bool {
        self.state == SessionState::Live
            && self.client.as_ref().is_some_and(|client| {
                client.is_connected() && client.is_authenticated() && client.is_writable()
            })
    }
}

#[derive(Debug, Default)]
struct LivenessFlags {
    connected: AtomicBool,
    authenticated: AtomicBool,
}

impl LivenessFlags {
    fn set(&self, connected: bool, authenticated: bool) {
        self.connected.store(connected, Ordering::Release);
        self.authenticated.store(authenticated, Ordering::Release);
    }
}

/// One tracked server
pub(crate) struct SessionSlot {
    id: ServerId,
    session: Mutex<Session>,
    flags: LivenessFlags,
    /// Cancelled on delete; heartbeat tokens are children of it
    retired: CancellationToken,
    ctx: Arc<SessionContext>,
}

impl SessionSlot {
    pub(crate) fn new(record: ServerRecord, ctx: Arc<SessionContext>) -> Arc<Self> {
        Arc::new(Self {
            id: record.id,
            session: Mutex::new(Session::new(record)),
            flags: LivenessFlags::default(),
            retired: CancellationToken::new(),
            ctx,
        })
    }

    pub(crate) fn id(&self) -> ServerId {
        self.id
    }

    pub(crate) fn config(&self) -> &ManagerConfig {
        &self.ctx.config
    }

    /// Cached flag, never blocks
    pub(crate) fn connected(&self) -> bool {
        self.flags.connected.load(Ordering::Acquire)
    }

    /// Cached flag, never blocks
    pub(crate) fn authenticated(&self) -> bool {
        self.flags.authenticated.load(Ordering::Acquire)
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.is_cancelled()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    /// Stop every heartbeat of this slot without waiting for its lock
    pub(crate) fn retire(&self) {
        self.retired.cancel();
    }

    /// Replace the record (when given) and reconnect
    pub(crate) async fn connect(
        self: &Arc<Self>,
        record: Option<ServerRecord>,
    ) -> Result<(), SessionError> {
        let mut session = self.lock().await;
        if let Some(record) = record {
            session.record = record;
        }
        self.reconnect_locked(&mut session).await
    }

    pub(crate) async fn disconnect(&self) {
        let mut session = self.lock().await;
        self.teardown_locked(&mut session).await;
    }

    /// Run one command, reconnecting first when the session is not live
    pub(crate) async fn execute(self: &Arc<Self>, command: &str) -> CommandOutcome {
        let mut session = self.lock().await;
        if self.is_retired() {
            return CommandOutcome::NoConnection;
        }

        if !self.ensure_live(&mut session).await {
            error!(server_id = %self.id, "Cannot execute command, no valid connection");
            return CommandOutcome::NoConnection;
        }

        let command_timeout = self.ctx.config.command_timeout;
        let client = match session.client.as_mut() {
            Some(client) => client,
            None => return CommandOutcome::NoConnection,
        };

        let result = timeout(command_timeout, client.execute(command)).await;
        match result {
            Ok(Ok(text)) => CommandOutcome::Success(text),
            Ok(Err(e)) => {
                error!(server_id = %self.id, "Command failed: {}", e);
                // The heartbeat stays scheduled and recovers the connection
                self.close_locked(&mut session).await;
                CommandOutcome::NoConnection
            }
            Err(_) => {
                warn!(
                    server_id = %self.id,
                    "No response to '{}' within {:?}",
                    command, command_timeout
                );
                CommandOutcome::SoftTimeout
            }
        }
    }

    /// Reconnect unless the session is already live; true when live afterwards
    pub(crate) async fn ensure_live(self: &Arc<Self>, session: &mut Session) -> bool {
        if session.is_live() {
            return true;
        }

        info!(server_id = %self.id, "Connection not live, reconnecting");
        match self.reconnect_locked(session).await {
            Ok(()) => session.is_live(),
            Err(e) => {
                warn!(server_id = %self.id, "Reconnect failed: {}", e);
                false
            }
        }
    }

    /// Tear down then connect with the current record. The close is bounded
    /// by `close_timeout`; the connect always gets a full `connect_timeout`.
    pub(crate) async fn reconnect_locked(
        self: &Arc<Self>,
        session: &mut Session,
    ) -> Result<(), SessionError> {
        self.teardown_locked(session).await;

        if self.is_retired() {
            return Err(SessionError::Retired(self.id));
        }
        let deadline = Instant::now() + self.ctx.config.connect_timeout;
        self.connect_locked(session, deadline).await
    }

    async fn connect_locked(
        self: &Arc<Self>,
        session: &mut Session,
        deadline: Instant,
    ) -> Result<(), SessionError> {
        let record = session.record.clone();
        info!(server_id = %self.id, "Connecting to {}", record.address());
        session.state = SessionState::Connecting;

        let connector = Arc::clone(&self.ctx.connector);
        let attempt = async {
            let mut client = connector.open(&record.host, record.port).await?;
            session.state = SessionState::Authenticating;
            client.authenticate(&record.secret).await?;
            Ok::<_, ClientError>(client)
        };

        // Dropping the attempt on timeout also drops any late auth success
        let result = timeout_at(deadline, attempt).await;
        session.state = SessionState::Disconnected;

        let mut client = match result {
            Ok(Ok(client)) => client,
            Ok(Err(ClientError::AuthRejected)) => {
                error!(server_id = %self.id, "Authentication rejected by {}", record.address());
                return Err(SessionError::AuthRejected(self.id));
            }
            Ok(Err(e)) => {
                error!(server_id = %self.id, "Connection to {} failed: {}", record.address(), e);
                return Err(SessionError::Connect {
                    id: self.id,
                    source: e,
                });
            }
            Err(_) => {
                error!(server_id = %self.id, "Authentication with {} timed out", record.address());
                return Err(SessionError::ConnectTimeout {
                    id: self.id,
                    timeout: self.ctx.config.connect_timeout,
                });
            }
        };

        if self.is_retired() {
            debug!(server_id = %self.id, "Session deleted while connecting, dropping connection");
            self.close_client(client.as_mut()).await;
            return Err(SessionError::Retired(self.id));
        }

        if !(client.is_connected() && client.is_authenticated()) {
            self.close_client(client.as_mut()).await;
            return Err(SessionError::NotAuthenticated(self.id));
        }

        session.client = Some(client);
        session.state = SessionState::Live;
        session.generation += 1;
        self.flags.set(true, true);
        session.heartbeat = Some(heartbeat::spawn(
            Arc::clone(self),
            self.retired.child_token(),
            session.generation,
        ));
        info!(server_id = %self.id, "RCON authenticated with {}", record.address());
        Ok(())
    }

    /// Cancel the heartbeat and close the transport
    async fn teardown_locked(&self, session: &mut Session) {
        if session.client.is_none() && session.heartbeat.is_none() {
            return;
        }

        if let Some(heartbeat) = session.heartbeat.take() {
            heartbeat.cancel();
        }
        session.generation += 1;
        self.close_locked(session).await;
        info!(server_id = %self.id, "Disconnected");
    }

    async fn close_locked(&self, session: &mut Session) {
        session.state = SessionState::Disconnected;
        self.flags.set(false, false);
        if let Some(mut client) = session.client.take() {
            self.close_client(client.as_mut()).await;
        }
    }

    /// Close a transport, giving up after `close_timeout`. A peer that never
    /// acknowledges the close is abandoned; the client is dropped afterwards.
    async fn close_client(&self, client: &mut dyn RconClient) {
        let close_timeout = self.ctx.config.close_timeout;
        match timeout(close_timeout, client.close()).await {
            Ok(Ok(())) => debug!(server_id = %self.id, "Transport closed"),
            Ok(Err(e)) => debug!(server_id = %self.id, "Transport closed with error: {}", e),
            Err(_) => warn!(
                server_id = %self.id,
                "Transport close not acknowledged within {:?}, dropping it",
                close_timeout
            ),
        }
    }
}
