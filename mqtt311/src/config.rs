//! Connect options.
//!
//! [`ConnectOptions`] fully determines the CONNECT packet (connect flags and
//! payload) and the keepalive cadence of a session. It is handed to the
//! session by value and never changes afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::MAX_PACKET_SIZE;
use crate::types::QoS;

/// Default keepalive in seconds.
pub const DEFAULT_KEEP_ALIVE: u16 = 60;

/// Default time the keepalive task waits for PINGRESP.
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(1);

/// Last will and testament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Will {
    /// Topic the broker publishes the will on.
    pub topic: String,
    /// Will message body.
    pub message: String,
    /// QoS of the will message.
    #[serde(default)]
    pub qos: QoS,
    /// Retain flag of the will message.
    #[serde(default)]
    pub retain: bool,
}

/// Connect options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Client ID.
    pub client_id: String,
    /// Username for authentication.
    pub username: Option<String>,
    /// Password for authentication. Only sent together with a username.
    pub password: Option<String>,
    /// Clean session flag.
    pub clean_session: bool,
    /// Keep alive interval in seconds. Zero disables the keepalive task.
    pub keep_alive: u16,
    /// Will message, if any.
    pub will: Option<Will>,
    /// How long to wait for PINGRESP after each PINGREQ.
    #[serde(rename = "pong_timeout_ms", with = "millis")]
    pub pong_timeout: Duration,
    /// Maximum inbound packet size.
    pub max_packet_size: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new("")
    }
}

impl ConnectOptions {
    /// Create connect options with defaults (clean session, 60s keepalive).
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            username: None,
            password: None,
            clean_session: true,
            keep_alive: DEFAULT_KEEP_ALIVE,
            will: None,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            max_packet_size: MAX_PACKET_SIZE,
        }
    }

    /// Set credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set username only.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set keep alive interval.
    pub fn with_keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive = seconds;
        self
    }

    /// Set clean session flag.
    pub fn with_clean_session(mut self, clean: bool) -> Self {
        self.clean_session = clean;
        self
    }

    /// Set the will message.
    pub fn with_will(
        mut self,
        topic: impl Into<String>,
        message: impl Into<String>,
        qos: QoS,
        retain: bool,
    ) -> Self {
        self.will = Some(Will {
            topic: topic.into(),
            message: message.into(),
            qos,
            retain,
        });
        self
    }

    /// Set how long the keepalive task waits for PINGRESP.
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Set the maximum inbound packet size.
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Username and password as they go on the wire.
    ///
    /// Empty strings count as absent, and a password without a username is
    /// never sent.
    pub fn credentials(&self) -> Option<(&str, Option<&str>)> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty());
        Some((username, password))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
