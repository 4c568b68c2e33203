//! mqtt311 - a minimal MQTT 3.1.1 command line client.
//!
//! Connects, subscribes to one topic, prints every message received on it and
//! publishes each line read from stdin to the same topic. Ctrl-C disconnects.

use anyhow::Context as _;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use giztoy_mqtt311::{Client, ConnectOptions, MessageData, QoS, Session};

mod config;

use config::{load_config, mask_secret, Config};

const DEFAULT_PORT: u16 = 1883;

/// mqtt311 - a minimal MQTT 3.1.1 command line client.
///
/// Flags take precedence over values from the config file.
#[derive(Parser, Debug)]
#[command(name = "mqtt311")]
#[command(about = "MQTT 3.1.1 client: subscribe, print, publish stdin")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.giztoy/mqtt311/config.yaml)
    #[arg(long)]
    pub config: Option<String>,

    /// Broker host
    #[arg(long)]
    pub host: Option<String>,

    /// Broker port [default: 1883]
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Client identifier
    #[arg(short = 'i', long)]
    pub client_id: Option<String>,

    /// Username
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Password (only sent together with a username)
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// Keepalive in seconds, 0 disables pings
    #[arg(short = 'k', long)]
    pub keep_alive: Option<u16>,

    /// Topic to subscribe and publish on
    #[arg(short = 't', long)]
    pub topic: Option<String>,

    /// QoS for the subscription and published messages (0, 1 or 2)
    #[arg(short = 'q', long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub qos: Option<u8>,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Fully resolved run settings.
#[derive(Debug)]
struct Settings {
    host: String,
    port: u16,
    topic: String,
    qos: QoS,
    options: ConnectOptions,
}

impl Settings {
    fn resolve(cli: Cli, file: Config) -> anyhow::Result<Self> {
        let host = cli
            .host
            .or(file.host)
            .context("no broker host: pass --host or set `host` in the config file")?;
        let topic = cli
            .topic
            .or(file.topic)
            .context("no topic: pass --topic or set `topic` in the config file")?;
        let qos = match cli.qos {
            Some(q) => QoS::try_from(q)?,
            None => file.qos.unwrap_or_default(),
        };

        let mut options = file.connect;
        if let Some(id) = cli.client_id {
            options.client_id = id;
        }
        if options.client_id.is_empty() {
            options.client_id = format!("mqtt311-{}", std::process::id());
        }
        if cli.username.is_some() {
            options.username = cli.username;
        }
        if cli.password.is_some() {
            options.password = cli.password;
        }
        if let Some(k) = cli.keep_alive {
            options.keep_alive = k;
        }

        Ok(Self {
            host,
            port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
            topic,
            qos,
            options,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let file = load_config(cli.config.as_deref())?;
    if let Some(path) = file.path() {
        debug!("loaded config from {}", path.display());
    }
    let settings = Settings::resolve(cli, file)?;

    info!(
        host = %settings.host,
        port = settings.port,
        client_id = %settings.options.client_id,
        username = settings.options.username.as_deref().unwrap_or(""),
        password = %settings.options.password.as_deref().map(mask_secret).unwrap_or_default(),
        "starting"
    );

    let session = Session::init(&settings.host, settings.port, settings.options)
        .await
        .with_context(|| format!("dial {}:{}", settings.host, settings.port))?;

    let result = run(&session, &settings.topic, settings.qos).await;

    if let Err(e) = session.disconnect().await {
        warn!("disconnect: {}", e);
    }
    if let Err(e) = session.join().await {
        debug!("session ended: {}", e);
    }

    result
}

async fn run(session: &Session, topic: &str, qos: QoS) -> anyhow::Result<()> {
    let client: &dyn Client = session;

    client.connect().await.context("connect")?;
    client.set_handler(Box::new(print_message));
    client.subscribe(topic, qos).await.context("subscribe")?;
    info!(topic, %qos, "ready, type lines to publish");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, disconnecting");
                return Ok(());
            }
            _ = session.closed() => {
                warn!("connection closed");
                return Ok(());
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => client.publish(line.as_bytes()).await.context("publish")?,
                None => {
                    debug!("stdin closed, still receiving");
                    stdin_open = false;
                }
            },
        }
    }
}

fn print_message(msg: MessageData) {
    match msg.payload_str() {
        Some(text) => println!("{} {}", msg.topic, text),
        None => println!("{} <{} bytes>", msg.topic, msg.payload.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mqtt311").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_file() {
        let file: Config = serde_yaml::from_str(
            "host: file-host\nport: 1884\ntopic: file/topic\nqos: 1\nconnect:\n  client_id: file-id\n  keep_alive: 30\n",
        )
        .unwrap();
        let cli = parse(&["--host", "cli-host", "-q", "0", "-k", "5"]);

        let s = Settings::resolve(cli, file).unwrap();
        assert_eq!(s.host, "cli-host");
        assert_eq!(s.port, 1884);
        assert_eq!(s.topic, "file/topic");
        assert_eq!(s.qos, QoS::AtMostOnce);
        assert_eq!(s.options.client_id, "file-id");
        assert_eq!(s.options.keep_alive, 5);
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--host", "localhost", "--topic", "t"]);
        let s = Settings::resolve(cli, Config::default()).unwrap();
        assert_eq!(s.port, DEFAULT_PORT);
        assert_eq!(s.qos, QoS::AtMostOnce);
        assert!(s.options.client_id.starts_with("mqtt311-"));
        assert_eq!(s.options.keep_alive, giztoy_mqtt311::DEFAULT_KEEP_ALIVE);
    }

    #[test]
    fn test_missing_host() {
        let cli = parse(&["--topic", "t"]);
        assert!(Settings::resolve(cli, Config::default()).is_err());
    }

    #[test]
    fn test_qos_range() {
        assert!(Cli::try_parse_from(["mqtt311", "-q", "3"]).is_err());
    }
}
