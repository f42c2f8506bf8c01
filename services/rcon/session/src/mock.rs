//! Scriptable in-process connector for session tests.

use crate::client::{ClientError, Connector, RconClient};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Knobs applied to the next opens and commands
#[derive(Debug, Default)]
pub(crate) struct MockBehavior {
    pub reject_auth: bool,
    pub hang_open: bool,
    pub open_delay: Option<Duration>,
    pub hang_commands: bool,
    pub command_delay: Option<Duration>,
    /// `close` is counted but never completes
    pub hang_close: bool,
    /// Number of upcoming commands that fail with a broken transport
    pub fail_commands: usize,
    pub responses: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct MockStats {
    opens: usize,
    closes: usize,
    commands: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// One fake game server, addressed by port
#[derive(Debug, Default)]
pub(crate) struct MockServer {
    behavior: Mutex<MockBehavior>,
    stats: Mutex<MockStats>,
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl MockServer {
    pub fn set<F: FnOnce(&mut MockBehavior)>(&self, f: F) {
        f(&mut self.behavior.lock().unwrap());
    }

    pub fn respond(&self, command: &str, text: &str) {
        self.set(|b| {
            b.responses.insert(command.to_string(), text.to_string());
        });
    }

    /// Make the most recently opened transport report unwritable
    pub fn break_current_transport(&self) {
        if let Some(writable) = self.current.lock().unwrap().as_ref() {
            writable.store(false, Ordering::SeqCst);
        }
    }

    pub fn opens(&self) -> usize {
        self.stats.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.stats.lock().unwrap().closes
    }

    pub fn commands(&self) -> Vec<String> {
        self.stats.lock().unwrap().commands.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.stats.lock().unwrap().max_in_flight
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockConnector {
    servers: Mutex<HashMap<u16, Arc<MockServer>>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn server(&self, port: u16) -> Arc<MockServer> {
        self.servers
            .lock()
            .unwrap()
            .entry(port)
            .or_default()
            .clone()
    }

    pub fn total_opens(&self) -> usize {
        self.servers
            .lock()
            .unwrap()
            .values()
            .map(|server| server.opens())
            .sum()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _host: &str, port: u16) -> Result<Box<dyn RconClient>, ClientError> {
        let server = self.server(port);
        let (hang, delay) = {
            let behavior = server.behavior.lock().unwrap();
            (behavior.hang_open, behavior.open_delay)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        server.stats.lock().unwrap().opens += 1;
        let writable = Arc::new(AtomicBool::new(true));
        *server.current.lock().unwrap() = Some(writable.clone());

        Ok(Box::new(MockClient {
            server,
            writable,
            connected: true,
            authenticated: false,
        }))
    }
}

struct MockClient {
    server: Arc<MockServer>,
    writable: Arc<AtomicBool>,
    connected: bool,
    authenticated: bool,
}

struct InFlight(Arc<MockServer>);

impl InFlight {
    fn enter(server: &Arc<MockServer>) -> Self {
        let mut stats = server.stats.lock().unwrap();
        stats.in_flight += 1;
        stats.max_in_flight = stats.max_in_flight.max(stats.in_flight);
        InFlight(server.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.stats.lock().unwrap().in_flight -= 1;
    }
}

#[async_trait]
impl RconClient for MockClient {
    async fn authenticate(&mut self, _secret: &str) -> Result<(), ClientError> {
        let reject = self.server.behavior.lock().unwrap().reject_auth;
        if reject {
            return Err(ClientError::AuthRejected);
        }
        self.authenticated = true;
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<String, ClientError> {
        let (hang, fail, delay, canned) = {
            let mut behavior = self.server.behavior.lock().unwrap();
            let fail = behavior.fail_commands > 0;
            if fail {
                behavior.fail_commands -= 1;
            }
            (
                behavior.hang_commands,
                fail,
                behavior.command_delay,
                behavior.responses.get(command).cloned(),
            )
        };

        self.server
            .stats
            .lock()
            .unwrap()
            .commands
            .push(command.to_string());
        let _in_flight = InFlight::enter(&self.server);

        if fail {
            self.writable.store(false, Ordering::SeqCst);
            self.connected = false;
            return Err(ClientError::Closed);
        }
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(canned.unwrap_or_else(|| format!("ok: {}", command)))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn is_writable(&self) -> bool {
        self.connected && self.writable.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.server.stats.lock().unwrap().closes += 1;
        self.connected = false;
        self.authenticated = false;
        let hang = self.server.behavior.lock().unwrap().hang_close;
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
