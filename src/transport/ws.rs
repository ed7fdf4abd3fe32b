//! WebSocket link: protobuf binary frames over a full-duplex socket.

use frames::Frame;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::TransportError;
use super::link::{Inbound, LINK_QUEUE_CAPACITY, Link};
use crate::config::TransportKind;

pub(super) async fn open(url: &str) -> Result<Link, TransportError> {
    let (stream, _) = connect_async(url).await?;
    let (mut sink, mut source) = stream.split();

    let (out_tx, mut out_rx) = mpsc::channel::<Frame>(LINK_QUEUE_CAPACITY);
    let (in_tx, in_rx) = mpsc::channel::<Inbound>(LINK_QUEUE_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let bytes = frames::encode_frame(&frame);
            if let Err(e) = sink.send(Message::Binary(bytes.into())).await {
                debug!(error = %e, "ws send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader = tokio::spawn(async move {
        while let Some(msg) = source.next().await {
            let item = match msg {
                Ok(Message::Binary(bytes)) => frames::decode_frame(&bytes).map_err(TransportError::from),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => Err(TransportError::from(e)),
            };
            let fatal = item.is_err();
            if in_tx.send(item).await.is_err() || fatal {
                break;
            }
        }
    });

    Ok(Link::new(TransportKind::WebSockets, out_tx, in_rx, vec![writer, reader]))
}
