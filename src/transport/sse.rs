//! Server-sent-events link: JSON frames pushed by the hub over a long-lived
//! GET, outbound frames POSTed to the same endpoint.
//!
//! Both requests carry `?id=<connection id>` so the hub can pair them.

use frames::Frame;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio::sync::mpsc;
use tracing::debug;

use super::TransportError;
use super::link::{Inbound, LINK_QUEUE_CAPACITY, Link};
use crate::config::TransportKind;

pub(super) async fn open(http: &reqwest::Client, hub_url: &str) -> Result<Link, TransportError> {
    let connection_id = uuid::Uuid::new_v4();
    let url = format!("{hub_url}?id={connection_id}");

    let response = http
        .get(&url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?
        .error_for_status()?;

    let (out_tx, mut out_rx) = mpsc::channel::<Frame>(LINK_QUEUE_CAPACITY);
    let (in_tx, in_rx) = mpsc::channel::<Inbound>(LINK_QUEUE_CAPACITY);

    let post_errors = in_tx.clone();
    let http = http.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let result = match frames::encode_json(&frame) {
                Ok(body) => post_frame(&http, &url, body).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                debug!(error = %e, "sse send failed");
                let _ = post_errors.send(Err(e)).await;
                break;
            }
        }
    });

    let reader = tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = in_tx.send(Err(e.into())).await;
                    return;
                }
            };
            for data in decoder.push(&chunk) {
                let item = frames::decode_json(&data).map_err(TransportError::from);
                let fatal = item.is_err();
                if in_tx.send(item).await.is_err() || fatal {
                    return;
                }
            }
        }
    });

    Ok(Link::new(TransportKind::ServerSentEvents, out_tx, in_rx, vec![writer, reader]))
}

async fn post_frame(http: &reqwest::Client, url: &str, body: String) -> Result<(), TransportError> {
    http.post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

/// Incremental `text/event-stream` parser yielding each event's data.
#[derive(Debug, Default)]
pub(super) struct SseDecoder {
    buffer: String,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk; returns the data of every event completed by it.
    pub(super) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_owned());
            }
        }
        events
    }
}

#[cfg(test)]
#[path = "sse_test.rs"]
mod tests;
