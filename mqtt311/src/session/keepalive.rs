//! Keepalive task.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use super::link::Link;
use crate::error::Result;
use crate::protocol::Packet;

/// Sends PINGREQ every `period` and waits up to `pong_timeout` for PINGRESP.
///
/// `pong_timeout` should be shorter than `period`; a longer wait delays the
/// next tick.
///
/// A missed PINGRESP is only logged. A failed write cancels the session.
pub(crate) async fn run<S>(link: Arc<Link<S>>, period: Duration, pong_timeout: Duration) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    debug!(period_secs = period.as_secs(), "keepalive task started");
    let ping = Packet::pingreq();

    // First PINGREQ one period after subscribing.
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = link.shutdown.cancelled() => {
                trace!("keepalive task stopping");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let pong = {
            let mut wire = link.lock().await;
            let pong = wire.arm_pong();
            if let Err(e) = wire.write_packet(&ping).await {
                wire.disarm_pong();
                drop(wire);
                warn!("keepalive ping failed: {}", e);
                link.shutdown.cancel();
                return Err(e);
            }
            pong
        };
        trace!("PINGREQ sent");

        tokio::select! {
            _ = link.shutdown.cancelled() => return Ok(()),
            res = time::timeout(pong_timeout, pong) => match res {
                Ok(Ok(())) => trace!("PINGRESP received"),
                // Sender dropped: the link closed while we were waiting.
                Ok(Err(_)) => {}
                Err(_) => {
                    link.lock().await.disarm_pong();
                    warn!(timeout_ms = pong_timeout.as_millis() as u64, "PINGRESP not received");
                }
            },
        }
    }
}
