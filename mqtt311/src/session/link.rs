//! The single socket shared by the session and its background tasks.
//!
//! Every write goes through [`Link::send`], which holds the wire lock for the
//! whole packet so packets never interleave. Handshake reads also go through
//! the wire lock. Once subscribed, the receive task takes the read half out
//! of the wire and owns it.
//!
//! The pending-pong token lives inside the wire, so arming the pong gate and
//! writing PINGREQ happen under one lock acquisition. The receive task
//! resolves the token when it frames a PINGRESP.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{oneshot, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::{self, Packet};

/// Socket state guarded by the wire lock.
pub(crate) struct Wire<S> {
    writer: WriteHalf<S>,
    reader: Option<ReadHalf<S>>,
    pending_pong: Option<oneshot::Sender<()>>,
}

impl<S> Wire<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub(crate) async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        self.writer.write_all(&packet.to_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub(crate) async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let reader = self.reader.as_mut().ok_or(Error::MalformedPacket("read half already taken"))?;
        reader.read_exact(buf).await.map_err(Error::from_read)?;
        Ok(())
    }

    pub(crate) async fn read_remaining_length(&mut self) -> Result<usize> {
        let reader = self.reader.as_mut().ok_or(Error::MalformedPacket("read half already taken"))?;
        protocol::read_remaining_length(reader).await
    }

    pub(crate) fn take_reader(&mut self) -> Option<ReadHalf<S>> {
        self.reader.take()
    }

    /// Arm the pong gate. The returned receiver fires when PINGRESP arrives.
    pub(crate) fn arm_pong(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.pending_pong = Some(tx);
        rx
    }

    /// Hand a PINGRESP to the waiting keepalive task.
    ///
    /// Returns false when no PINGREQ was outstanding.
    pub(crate) fn resolve_pong(&mut self) -> bool {
        match self.pending_pong.take() {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub(crate) fn disarm_pong(&mut self) {
        self.pending_pong = None;
    }

    #[cfg(test)]
    pub(crate) fn is_awaiting_pong(&self) -> bool {
        self.pending_pong.is_some()
    }
}

/// Shared handle to the wire plus the session-wide shutdown signal.
pub(crate) struct Link<S> {
    wire: Mutex<Wire<S>>,
    pub(crate) shutdown: CancellationToken,
    closed: AtomicBool,
}

impl<S> Link<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub(crate) fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            wire: Mutex::new(Wire {
                writer,
                reader: Some(reader),
                pending_pong: None,
            }),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Exclusive access to the socket.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Wire<S>> {
        self.wire.lock().await
    }

    /// Write one packet under the wire lock.
    pub(crate) async fn send(&self, packet: &Packet) -> Result<()> {
        trace!(control = packet.fixed_header()[0], len = packet.len(), "send");
        self.lock().await.write_packet(packet).await
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Cancel the background tasks and shut the write side down. Idempotent.
    pub(crate) async fn close(&self) {
        self.shutdown.cancel();
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut wire = self.lock().await;
        wire.disarm_pong();
        if let Err(e) = wire.writer.shutdown().await {
            debug!("socket shutdown: {}", e);
        }
        debug!("link closed");
    }
}
