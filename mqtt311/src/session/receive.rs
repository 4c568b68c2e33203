//! Receive task.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tracing::{debug, trace, warn};

use super::link::Link;
use crate::error::{Error, Result};
use crate::protocol::{self, Frame, PINGRESP, PUBLISH};
use crate::types::MessageHandler;

pub(crate) type HandlerSlot = Arc<RwLock<Option<Arc<dyn MessageHandler>>>>;

/// Frames inbound packets until shutdown or EOF.
///
/// Packets over `max_packet_size` are skipped. The link is closed on exit
/// either way. A read error that arrives after shutdown was requested is not
/// reported.
pub(crate) async fn run<S>(
    link: Arc<Link<S>>,
    mut reader: ReadHalf<S>,
    handler: HandlerSlot,
    max_packet_size: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    debug!("receive task started");

    let result = loop {
        let frame = tokio::select! {
            _ = link.shutdown.cancelled() => break Ok(()),
            res = protocol::read_frame(&mut reader, max_packet_size) => res,
        };

        match frame {
            Ok(frame) => dispatch(&link, &handler, frame).await,
            Err(_) if link.shutdown.is_cancelled() => break Ok(()),
            // read_frame already consumed the body.
            Err(Error::TooLarge { size, max }) => warn!(size, max, "dropping oversized packet"),
            Err(e) => {
                warn!("receive failed: {}", e);
                break Err(e);
            }
        }
    };

    link.close().await;
    debug!("receive task stopped");
    result
}

async fn dispatch<S>(link: &Link<S>, handler: &HandlerSlot, frame: Frame)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    match frame.packet_type() {
        PUBLISH => match protocol::decode_publish(frame.as_bytes()) {
            Ok(msg) => {
                trace!(topic = %msg.topic, len = msg.payload.len(), "PUBLISH received");
                let handler = handler.read().clone();
                match handler {
                    Some(h) => h.on_message(msg),
                    None => debug!(topic = %msg.topic, "no handler, message dropped"),
                }
            }
            Err(e) => warn!("dropping malformed PUBLISH: {}", e),
        },
        PINGRESP => {
            if !link.lock().await.resolve_pong() {
                trace!("unsolicited PINGRESP");
            }
        }
        other => trace!(packet_type = other, "ignoring packet"),
    }
}
