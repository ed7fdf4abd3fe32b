//! A single open link to the hub, independent of transport kind.
//!
//! Each link runs a reader and a writer task. Frames go out through a
//! bounded queue and come back in through another; dropping the link aborts
//! both tasks.

use std::time::Duration;

use frames::{Frame, FrameKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{TransportError, sse, ws};
use crate::config::{HubConfig, TransportKind};

pub(super) const LINK_QUEUE_CAPACITY: usize = 256;

pub(super) type Inbound = Result<Frame, TransportError>;

pub(super) struct Link {
    pub(super) kind: TransportKind,
    outbound: mpsc::Sender<Frame>,
    inbound: mpsc::Receiver<Inbound>,
    tasks: Vec<JoinHandle<()>>,
}

impl Link {
    pub(super) fn new(
        kind: TransportKind,
        outbound: mpsc::Sender<Frame>,
        inbound: mpsc::Receiver<Inbound>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self { kind, outbound, inbound, tasks }
    }

    /// Sender for frames bound to the hub.
    pub(super) fn sender(&self) -> mpsc::Sender<Frame> {
        self.outbound.clone()
    }

    pub(super) async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }

    /// Announce the protocol and wait for the hub's handshake reply.
    async fn handshake(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.outbound
            .send(Frame::handshake(frames::PROTOCOL))
            .await
            .map_err(|_| TransportError::Closed)?;

        let reply = tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| TransportError::Handshake(format!("no reply within {}s", timeout.as_secs())))?
            .ok_or(TransportError::Closed)??;

        match (reply.kind, reply.error) {
            (FrameKind::Handshake, None) => Ok(()),
            (FrameKind::Handshake, Some(error)) => Err(TransportError::Handshake(error)),
            (FrameKind::Close, error) => Err(TransportError::Handshake(
                error.unwrap_or_else(|| "hub closed the connection".to_owned()),
            )),
            (other, _) => Err(TransportError::Handshake(format!("unexpected {other:?} frame"))),
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Open one transport kind and complete the handshake.
async fn open(kind: TransportKind, config: &HubConfig, http: &reqwest::Client) -> Result<Link, TransportError> {
    let attempt = async {
        let mut link = match kind {
            TransportKind::WebSockets => ws::open(&config.ws_url()?).await?,
            TransportKind::ServerSentEvents => sse::open(http, &config.hub_url()).await?,
        };
        link.handshake(config.handshake_timeout).await?;
        Ok::<Link, TransportError>(link)
    };

    tokio::time::timeout(config.handshake_timeout, attempt)
        .await
        .map_err(|_| TransportError::Handshake(format!("{kind} did not open within {}s", config.handshake_timeout.as_secs())))?
}

/// Try each configured transport in preference order.
pub(super) async fn open_preferred(config: &HubConfig, http: &reqwest::Client) -> Result<Link, TransportError> {
    let mut failures = Vec::with_capacity(config.transports.len());
    for &kind in &config.transports {
        match open(kind, config, http).await {
            Ok(link) => {
                info!(transport = %kind, url = %config.hub_url(), "hub link established");
                return Ok(link);
            }
            Err(e) => {
                warn!(transport = %kind, error = %e, "hub transport failed; trying next");
                failures.push(format!("{kind}: {e}"));
            }
        }
    }
    Err(TransportError::NoTransport(failures.join("; ")))
}
