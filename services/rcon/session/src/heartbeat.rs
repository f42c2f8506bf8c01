//! Periodic liveness probe for live sessions.
//!
//! A heartbeat is spawned every time a session goes live and is tied to that
//! connection by a cancellation token and the session generation. It never
//! outlives the connection it was spawned for: teardown cancels the token,
//! and a probe that raced with a teardown sees a newer generation once it
//! gets the session lock.

use crate::session::{Session, SessionSlot};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle owned by the session; dropping it stops the heartbeat
pub(crate) struct HeartbeatHandle {
    token: CancellationToken,
    _task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Request cancellation. The task is not aborted, it exits at its next
    /// check, so a probe holding the session lock finishes cleanly.
    pub(crate) fn cancel(self) {
        self.token.cancel();
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

enum Probe {
    Healthy,
    NotLive,
    Failed(String),
}

/// Start probing `slot` for the connection of `generation`
pub(crate) fn spawn(
    slot: Arc<SessionSlot>,
    token: CancellationToken,
    generation: u64,
) -> HeartbeatHandle {
    let task = tokio::spawn(run(slot, token.clone(), generation));
    HeartbeatHandle { token, _task: task }
}

async fn run(slot: Arc<SessionSlot>, token: CancellationToken, generation: u64) {
    let config = slot.config();
    let period = config.heartbeat_interval;
    let probe_timeout = config.heartbeat_timeout;
    let command = config.heartbeat_command.clone();

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(server_id = %slot.id(), "Heartbeat stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let mut session = slot.lock().await;
        if token.is_cancelled() || session.generation != generation {
            debug!(server_id = %slot.id(), "Heartbeat superseded");
            return;
        }

        match probe(&mut session, &command, probe_timeout).await {
            Probe::Healthy => {
                debug!(server_id = %slot.id(), "Heartbeat ok");
                continue;
            }
            Probe::NotLive => {
                info!(server_id = %slot.id(), "Connection not writable, reconnecting");
            }
            Probe::Failed(reason) => {
                warn!(server_id = %slot.id(), "Heartbeat failed ({}), reconnecting", reason);
            }
        }

        // A delete may have landed while the probe was in flight
        if token.is_cancelled() {
            return;
        }

        // The new connection gets its own heartbeat; this one retires
        if let Err(e) = slot.reconnect_locked(&mut session).await {
            warn!(server_id = %slot.id(), "Heartbeat reconnect failed: {}", e);
        }
        return;
    }
}

async fn probe(session: &mut Session, command: &str, probe_timeout: Duration) -> Probe {
    if !session.is_live() {
        return Probe::NotLive;
    }

    let client = match session.client.as_mut() {
        Some(client) => client,
        None => return Probe::NotLive,
    };

    match timeout(probe_timeout, client.execute(command)).await {
        Ok(Ok(_)) => Probe::Healthy,
        Ok(Err(e)) => Probe::Failed(e.to_string()),
        Err(_) => Probe::Failed(format!("no response within {:?}", probe_timeout)),
    }
}
