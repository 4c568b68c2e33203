//! Client trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::session::Session;
use crate::types::{MessageHandler, QoS, SessionState};

/// Common interface for an MQTT 3.1.1 client session.
#[async_trait]
pub trait Client: Send + Sync {
    /// Performs the CONNECT/CONNACK handshake.
    /// Returns the broker's session-present flag.
    async fn connect(&self) -> Result<bool>;

    /// Performs the SUBSCRIBE/SUBACK handshake and starts the background tasks.
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()>;

    /// Publishes a message on the subscribed topic.
    async fn publish(&self, message: &[u8]) -> Result<()>;

    /// Sends DISCONNECT and closes the connection.
    async fn disconnect(&self) -> Result<()>;

    /// Installs the inbound message handler.
    fn set_handler(&self, handler: Box<dyn MessageHandler>);

    /// Returns the current session state.
    fn state(&self) -> SessionState;
}

#[async_trait]
impl<S> Client for Session<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    async fn connect(&self) -> Result<bool> {
        Session::connect(self).await
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        Session::subscribe(self, topic, qos).await
    }

    async fn publish(&self, message: &[u8]) -> Result<()> {
        Session::publish(self, message).await
    }

    async fn disconnect(&self) -> Result<()> {
        Session::disconnect(self).await
    }

    fn set_handler(&self, handler: Box<dyn MessageHandler>) {
        self.install_handler(Arc::from(handler))
    }

    fn state(&self) -> SessionState {
        Session::state(self)
    }
}
