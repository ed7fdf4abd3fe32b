//! Production `HubTransport`.
//!
//! LIFECYCLE
//! =========
//! 1. `start` negotiates a link and spawns the supervisor
//! 2. Supervisor dispatches inbound frames: invocations → events,
//!    completions → pending invokes, pings keep the link alive
//! 3. Link lost → `Reconnecting`, retry on the backoff schedule →
//!    `Reconnected`, or `Closed(error)` once the schedule is exhausted
//! 4. `stop` aborts the supervisor, fails pending invokes, emits `Closed`
//!
//! A link counts as lost when the reader ends, a transport error arrives, the
//! hub sends a reconnectable close, or nothing arrives for `server_timeout`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use frames::{Frame, FrameKind};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::link::{self, Link};
use super::{HubTransport, TransportError};
use crate::config::HubConfig;
use crate::events::{EventDispatcher, EventKind, EventSink, HubEvent};

type Pending = HashMap<String, oneshot::Sender<Result<(), TransportError>>>;

/// How a link ended.
enum LinkEnd {
    /// The hub closed without allowing reconnect.
    Closed(Option<String>),
    /// The link dropped; reconnect.
    Lost(String),
}

#[derive(Default)]
struct Shared {
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,
    pending: Mutex<Pending>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn set_outbound(&self, sender: Option<mpsc::Sender<Frame>>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = sender;
    }

    fn outbound(&self) -> Option<mpsc::Sender<Frame>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn register(&self, id: String) -> oneshot::Receiver<Result<(), TransportError>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).insert(id, tx);
        rx
    }

    fn forget(&self, id: &str) {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
    }

    fn complete(&self, id: &str, error: Option<String>) {
        let waiter = self.pending.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(error.map_or(Ok(()), |e| Err(TransportError::Hub(e))));
            }
            None => debug!(invocation_id = id, "completion for unknown invocation"),
        }
    }

    fn fail_pending(&self) {
        let drained: Vec<_> = self.pending.lock().unwrap_or_else(PoisonError::into_inner).drain().collect();
        for (_, tx) in drained {
            let _ = tx.send(Err(TransportError::Closed));
        }
    }
}

/// Hub connection with automatic reconnect.
pub struct HubConnection {
    config: HubConfig,
    http: reqwest::Client,
    events: EventDispatcher,
    shared: Arc<Shared>,
}

impl HubConnection {
    /// Validate `config` and prepare an unstarted connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails [`HubConfig::validate`] or the
    /// HTTP client fails to build.
    pub fn new(config: HubConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.handshake_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            events: EventDispatcher::new(),
            shared: Arc::new(Shared::default()),
        })
    }

    fn supervisor_running(&self) -> bool {
        self.shared
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for HubConnection {
    fn drop(&mut self) {
        if let Some(task) = self.shared.supervisor.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

#[async_trait::async_trait]
impl HubTransport for HubConnection {
    async fn start(&self) -> Result<(), TransportError> {
        if self.supervisor_running() {
            return Err(TransportError::AlreadyStarted);
        }

        let link = link::open_preferred(&self.config, &self.http).await?;
        self.shared.set_outbound(Some(link.sender()));

        let task = tokio::spawn(supervise(
            link,
            self.config.clone(),
            self.http.clone(),
            self.events.clone(),
            Arc::clone(&self.shared),
        ));
        *self.shared.supervisor.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let task = self.shared.supervisor.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(task) = task else {
            return Ok(());
        };

        task.abort();
        let _ = task.await;

        self.shared.set_outbound(None);
        self.shared.fail_pending();
        self.events.emit(&HubEvent::Closed { error: None });
        info!("hub connection stopped");
        Ok(())
    }

    async fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<(), TransportError> {
        let outbound = self.shared.outbound().ok_or(TransportError::NotActive)?;
        let id = uuid::Uuid::new_v4().to_string();
        let completion = self.shared.register(id.clone());

        if outbound
            .send(Frame::invocation(Some(id.clone()), method, arguments))
            .await
            .is_err()
        {
            self.shared.forget(&id);
            return Err(TransportError::Closed);
        }

        match tokio::time::timeout(self.config.server_timeout, completion).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.shared.forget(&id);
                Err(TransportError::InvocationTimeout)
            }
        }
    }

    fn subscribe(&self, kind: EventKind, sink: EventSink) {
        self.events.subscribe(kind, sink);
    }
}

async fn supervise(
    mut link: Link,
    config: HubConfig,
    http: reqwest::Client,
    events: EventDispatcher,
    shared: Arc<Shared>,
) {
    loop {
        let reason = match run_link(&mut link, &config, &events, &shared).await {
            LinkEnd::Closed(error) => {
                info!(error = ?error, "hub closed the connection");
                shared.set_outbound(None);
                shared.fail_pending();
                events.emit(&HubEvent::Closed { error });
                return;
            }
            LinkEnd::Lost(reason) => reason,
        };

        warn!(transport = %link.kind, reason = %reason, "hub link lost; reconnecting");
        shared.set_outbound(None);
        shared.fail_pending();
        events.emit(&HubEvent::Reconnecting { error: Some(reason.clone()) });

        match reconnect(&config, &http).await {
            Some(next) => {
                link = next;
                shared.set_outbound(Some(link.sender()));
                info!(transport = %link.kind, "hub reconnected");
                events.emit(&HubEvent::Reconnected);
            }
            None => {
                warn!(attempts = config.reconnect_delays.len(), "reconnect attempts exhausted");
                events.emit(&HubEvent::Closed { error: Some(reason) });
                return;
            }
        }
    }
}

async fn run_link(link: &mut Link, config: &HubConfig, events: &EventDispatcher, shared: &Shared) -> LinkEnd {
    let outbound = link.sender();
    let mut keepalive = tokio::time::interval_at(Instant::now() + config.keepalive_interval, config.keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut deadline = Instant::now() + config.server_timeout;

    loop {
        tokio::select! {
            _ = keepalive.tick() => {
                if outbound.send(Frame::ping()).await.is_err() {
                    return LinkEnd::Lost("send queue closed".into());
                }
            }
            () = tokio::time::sleep_until(deadline) => {
                return LinkEnd::Lost(format!(
                    "server timeout elapsed without receiving a message ({}s)",
                    config.server_timeout.as_secs()
                ));
            }
            next = link.recv() => {
                let frame = match next {
                    None => return LinkEnd::Lost("transport closed".into()),
                    Some(Err(e)) => return LinkEnd::Lost(e.to_string()),
                    Some(Ok(frame)) => frame,
                };
                deadline = Instant::now() + config.server_timeout;
                if let Some(end) = dispatch_frame(frame, events, shared) {
                    return end;
                }
            }
        }
    }
}

fn dispatch_frame(frame: Frame, events: &EventDispatcher, shared: &Shared) -> Option<LinkEnd> {
    match frame.kind {
        FrameKind::Invocation => {
            let target = frame.target.as_deref().unwrap_or_default();
            match HubEvent::from_invocation(target, &frame.arguments) {
                Some(event) => {
                    events.emit(&event);
                }
                None => warn!(method = target, "ignoring unrecognized hub invocation"),
            }
            None
        }
        FrameKind::Completion => {
            if let Some(id) = frame.invocation_id.as_deref() {
                shared.complete(id, frame.error);
            }
            None
        }
        FrameKind::Ping | FrameKind::Handshake => None,
        FrameKind::Close if frame.allow_reconnect => Some(LinkEnd::Lost(
            frame.error.unwrap_or_else(|| "hub requested reconnect".to_owned()),
        )),
        FrameKind::Close => Some(LinkEnd::Closed(frame.error)),
    }
}

async fn reconnect(config: &HubConfig, http: &reqwest::Client) -> Option<Link> {
    for (attempt, delay) in config.reconnect_delays.iter().enumerate() {
        tokio::time::sleep(*delay).await;
        match link::open_preferred(config, http).await {
            Ok(link) => return Some(link),
            Err(e) => warn!(attempt = attempt + 1, error = %e, "reconnect attempt failed"),
        }
    }
    None
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
