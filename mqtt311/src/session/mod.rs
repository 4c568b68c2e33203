//! Connection session.
//!
//! A [`Session`] walks one socket through the MQTT 3.1.1 handshake:
//!
//! ```text
//! Disconnected --connect--> Connecting --CONNACK--> Connected
//!     --subscribe--> Subscribing --SUBACK--> Subscribed --disconnect/EOF--> Closed
//! ```
//!
//! Once subscribed, a keepalive task and a receive task run alongside the
//! caller. All three write through the same wire lock; see [`link`].

mod keepalive;
mod link;
mod receive;

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use self::link::Link;
use self::receive::HandlerSlot;
use crate::config::ConnectOptions;
use crate::error::{Error, Result};
use crate::protocol::{self, Packet, CONNACK, SUBACK};
use crate::types::{MessageHandler, QoS, SessionState};

/// The single active subscription.
#[derive(Debug, Clone)]
struct Subscription {
    topic: String,
    qos: QoS,
}

/// MQTT 3.1.1 session over a single stream.
pub struct Session<S = TcpStream> {
    addr: Option<String>,
    options: ConnectOptions,
    link: Arc<Link<S>>,
    state: Mutex<SessionState>,
    subscription: Mutex<Option<Subscription>>,
    handler: HandlerSlot,
    next_pkid: AtomicU16,
    tasks: Mutex<Vec<JoinHandle<Result<()>>>>,
}

impl Session<TcpStream> {
    /// Dial `host:port` over TCP.
    ///
    /// No MQTT traffic is exchanged until [`Session::connect`].
    pub async fn init(host: &str, port: u16, options: ConnectOptions) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        debug!("dialing {}", addr);

        let stream = TcpStream::connect(&addr).await?;
        stream.set_nodelay(true)?;

        let mut session = Self::with_stream(stream, options);
        session.addr = Some(addr);
        Ok(session)
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Adopt an already open stream.
    pub fn with_stream(stream: S, options: ConnectOptions) -> Self {
        Self {
            addr: None,
            options,
            link: Arc::new(Link::new(stream)),
            state: Mutex::new(SessionState::Disconnected),
            subscription: Mutex::new(None),
            handler: Arc::new(RwLock::new(None)),
            next_pkid: AtomicU16::new(1),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Remote address, when the session was created by [`Session::init`].
    pub fn addr(&self) -> Option<&str> {
        self.addr.as_deref()
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Current state. A session whose link shut down reports `Closed`.
    pub fn state(&self) -> SessionState {
        if self.link.shutdown.is_cancelled() {
            return SessionState::Closed;
        }
        *self.state.lock()
    }

    /// True while subscribed and not shut down.
    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Subscribed
    }

    /// Install the handler that receives inbound PUBLISH messages.
    ///
    /// May be called at any time; the receive task picks up the latest one.
    pub fn set_handler<H: MessageHandler + 'static>(&self, handler: H) {
        self.install_handler(Arc::new(handler));
    }

    pub(crate) fn install_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Send CONNECT and validate CONNACK.
    ///
    /// Returns the broker's session-present flag.
    pub async fn connect(&self) -> Result<bool> {
        self.transition(SessionState::Disconnected, SessionState::Connecting)?;
        debug!(client_id = %self.options.client_id, "connecting");

        let packet = Packet::connect(&self.options)?;
        match self.handshake_connack(&packet).await {
            Ok(session_present) => {
                self.set_state(SessionState::Connected);
                info!(session_present, "connected");
                Ok(session_present)
            }
            Err(e) => {
                warn!("connect failed: {}", e);
                self.fail().await;
                Err(e)
            }
        }
    }

    async fn handshake_connack(&self, packet: &Packet) -> Result<bool> {
        let mut wire = self.link.lock().await;
        wire.write_packet(packet).await?;

        let mut control = [0u8; 1];
        wire.read_exact(&mut control).await?;
        if control[0] != CONNACK {
            return Err(Error::ConnAckNotReceived(control[0]));
        }

        let mut rest = [0u8; 3];
        wire.read_exact(&mut rest).await?;
        protocol::check_connack(rest)
    }

    async fn handshake_suback(&self, packet: &Packet, qos: QoS) -> Result<ReadHalf<S>> {
        let mut wire = self.link.lock().await;
        wire.write_packet(packet).await?;

        let mut control = [0u8; 1];
        wire.read_exact(&mut control).await?;
        if control[0] != SUBACK {
            return Err(Error::SubAckNotReceived(control[0]));
        }

        let len = wire.read_remaining_length().await?;
        if len > self.options.max_packet_size {
            return Err(Error::TooLarge { size: len, max: self.options.max_packet_size });
        }
        let mut body = vec![0u8; len];
        wire.read_exact(&mut body).await?;
        protocol::check_suback(&body, qos)?;

        wire.take_reader().ok_or(Error::InvalidState {
            expected: SessionState::Connected,
            actual: SessionState::Subscribed,
        })
    }

    /// Send SUBSCRIBE, validate SUBACK, then start the background tasks.
    ///
    /// A SUBACK that echoes the wrong packet identifier or QoS leaves the
    /// session `Connected`. Any other failure leaves the stream mid-packet
    /// and closes the session.
    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        let packet = Packet::subscribe(topic, qos)?;
        self.transition(SessionState::Connected, SessionState::Subscribing)?;
        debug!(topic, %qos, "subscribing");

        let reader = match self.handshake_suback(&packet, qos).await {
            Ok(reader) => reader,
            Err(e @ (Error::PacketIdMismatch { .. } | Error::QosMismatch { .. })) => {
                warn!("subscribe rejected: {}", e);
                self.set_state(SessionState::Connected);
                return Err(e);
            }
            Err(e) => {
                warn!("subscribe failed: {}", e);
                self.fail().await;
                return Err(e);
            }
        };

        *self.subscription.lock() = Some(Subscription { topic: topic.to_string(), qos });
        self.set_state(SessionState::Subscribed);
        info!(topic, %qos, "subscribed");

        let mut tasks = self.tasks.lock();
        if self.options.keep_alive > 0 {
            tasks.push(tokio::spawn(keepalive::run(
                Arc::clone(&self.link),
                Duration::from_secs(self.options.keep_alive as u64),
                self.options.pong_timeout,
            )));
        }
        tasks.push(tokio::spawn(receive::run(
            Arc::clone(&self.link),
            reader,
            Arc::clone(&self.handler),
            self.options.max_packet_size,
        )));

        Ok(())
    }

    /// Publish `message` on the subscribed topic with the subscribed QoS.
    ///
    /// Fire and forget: no acknowledgement is awaited.
    pub async fn publish(&self, message: &[u8]) -> Result<()> {
        self.expect_state(SessionState::Subscribed)?;
        let Some(sub) = self.subscription.lock().clone() else {
            return Err(Error::InvalidState {
                expected: SessionState::Subscribed,
                actual: self.state(),
            });
        };

        let pkid = match sub.qos {
            QoS::AtMostOnce => 0,
            _ => self.next_packet_id(),
        };
        let packet = Packet::publish(&sub.topic, message, false, sub.qos, pkid)?;
        self.link.send(&packet).await
    }

    /// Send DISCONNECT and close the socket. Calling it again is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        if self.link.is_closed() {
            return Ok(());
        }

        let mut result = Ok(());
        if !self.link.shutdown.is_cancelled() {
            debug!("disconnecting");
            result = self.link.send(&Packet::disconnect()).await;
        }

        self.link.close().await;
        self.set_state(SessionState::Closed);
        info!("disconnected");
        result
    }

    /// Wait until the session shuts down, for whatever reason.
    pub async fn closed(&self) {
        self.link.shutdown.cancelled().await
    }

    /// Wait for the background tasks to finish.
    ///
    /// Returns the first task error, if any.
    pub async fn join(&self) -> Result<()> {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let mut result = Ok(());
        for task in tasks {
            let outcome = match task.await {
                Ok(r) => r,
                Err(e) => Err(Error::Io(std::io::Error::other(e))),
            };
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    }

    #[cfg(test)]
    pub(crate) async fn is_awaiting_pong(&self) -> bool {
        self.link.lock().await.is_awaiting_pong()
    }

    fn next_packet_id(&self) -> u16 {
        loop {
            let id = self.next_pkid.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        let actual = self.state();
        if actual != expected {
            return Err(Error::InvalidState { expected, actual });
        }
        Ok(())
    }

    /// Check the current state and move to `next` under one lock.
    fn transition(&self, expected: SessionState, next: SessionState) -> Result<()> {
        let mut state = self.state.lock();
        let actual = if self.link.shutdown.is_cancelled() {
            SessionState::Closed
        } else {
            *state
        };
        if actual != expected {
            return Err(Error::InvalidState { expected, actual });
        }
        *state = next;
        Ok(())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    async fn fail(&self) {
        self.set_state(SessionState::Closed);
        self.link.close().await;
    }
}

impl<S> Drop for Session<S> {
    fn drop(&mut self) {
        self.link.shutdown.cancel();
    }
}
