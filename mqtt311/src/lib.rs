//! Minimal MQTT 3.1.1 client.
//!
//! One TCP connection, one subscription, and a byte-exact packet codec:
//!
//! - **Codec**: remaining-length varint plus CONNECT, SUBSCRIBE, PUBLISH,
//!   PINGREQ and DISCONNECT builders, and CONNACK/SUBACK/PUBLISH decoding.
//! - **Session**: CONNECT/CONNACK and SUBSCRIBE/SUBACK handshakes, then a
//!   keepalive task and a receive task that share the socket with the caller.
//!
//! ## Example
//!
//! ```no_run
//! use giztoy_mqtt311::{ConnectOptions, MessageData, QoS, Session};
//!
//! #[tokio::main]
//! async fn main() -> giztoy_mqtt311::Result<()> {
//!     let options = ConnectOptions::new("sensor-1").with_keep_alive(30);
//!     let session = Session::init("127.0.0.1", 1883, options).await?;
//!
//!     session.connect().await?;
//!     session.set_handler(|msg: MessageData| {
//!         println!("{}: {:?}", msg.topic, msg.payload_str());
//!     });
//!     session.subscribe("sensors/temp", QoS::AtMostOnce).await?;
//!     session.publish(b"23.5").await?;
//!
//!     session.disconnect().await?;
//!     session.join().await
//! }
//! ```

mod client;
mod config;
mod error;
pub mod protocol;
mod session;
mod types;

pub use client::Client;
pub use config::{ConnectOptions, Will, DEFAULT_KEEP_ALIVE, DEFAULT_PONG_TIMEOUT};
pub use error::*;
pub use session::Session;
pub use types::{ConnectReturnCode, MessageData, MessageHandler, QoS, SessionState};
