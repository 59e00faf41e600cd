//! Qiscus realtime command line client
//!
//! Watch realtime traffic, publish raw payloads and decode captured messages
//! without writing any code.

use clap::{Parser, Subcommand, ValueEnum};
use qiscus_realtime::client::RealtimeClient;
use qiscus_realtime::config::RealtimeConfig;
use qiscus_realtime::observability::init_default_logging;
use qiscus_realtime::protocol::DecodedEvent;
use qiscus_realtime::sink::{ChannelSink, SinkNotification};
use qiscus_realtime::transport::mqtt::EventRouter;
use qiscus_realtime::transport::{ConnectionState, MqttTransport};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Qiscus realtime client
#[derive(Parser)]
#[command(name = "qiscus-realtime")]
#[command(about = "Monitor, publish and decode Qiscus realtime MQTT traffic")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to topic filters and print decoded events until Ctrl-C
    Monitor {
        /// Topic filter, repeatable (e.g. `token/c`, `r/42/+/+/t`)
        #[arg(short, long = "topic", required = true)]
        topics: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        format: OutputFormat,
    },
    /// Publish one raw payload once connected
    Publish { topic: String, payload: String },
    /// Decode a topic and payload offline and print the result as JSON
    Decode { topic: String, payload: String },
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

/// Output formatting options
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Color-coded, human-readable with timestamps
    Pretty,
    /// Single line per event
    Compact,
    /// One JSON object per line
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_default_logging();

    let result = match cli.command {
        Commands::Decode { topic, payload } => decode(&topic, &payload),
        command => match load_configuration(&cli.config) {
            Ok(config) => run_command(command, config).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run_command(
    command: Commands,
    config: RealtimeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Monitor { topics, format } => monitor(config, topics, format).await,
        Commands::Publish { topic, payload } => publish(config, &topic, &payload).await,
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Decode { topic, payload } => decode(&topic, &payload),
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<RealtimeConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(RealtimeConfig::load_from_file(path)?);
    }

    for path_str in ["realtime.toml", "config/realtime.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(RealtimeConfig::load_from_file(&path)?);
        }
    }

    Err("No configuration file found. Provide one with -c/--config or create realtime.toml".into())
}

type Client = RealtimeClient<MqttTransport>;

async fn start_client(
    config: &RealtimeConfig,
) -> Result<(Client, UnboundedReceiver<SinkNotification>), Box<dyn std::error::Error>> {
    let client_id = config.client_id();
    let transport = MqttTransport::new(&client_id, config.mqtt.clone())?;
    let (sink, notifications) = ChannelSink::new();
    let mut client = RealtimeClient::new(transport, Arc::new(sink));

    info!(client_id = %client_id, broker = %config.mqtt.broker_url, "Starting realtime client");
    client.connect(config.credentials()?).await?;
    Ok((client, notifications))
}

async fn monitor(
    config: RealtimeConfig,
    topics: Vec<String>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut client, mut notifications) = start_client(&config).await?;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            notification = notifications.recv() => {
                let Some(notification) = notification else { break };

                // Subscriptions are not replayed by the client; re-issue on every connect
                if notification == SinkNotification::ConnectionState(ConnectionState::Connected) {
                    for topic in &topics {
                        if let Err(e) = client.subscribe(topic).await {
                            warn!(topic = %topic, "Subscribe failed: {}", e);
                        }
                    }
                }

                println!("{}", render(&notification, format));
            }
        }
    }

    client.disconnect().await?;
    Ok(())
}

async fn publish(
    config: RealtimeConfig,
    topic: &str,
    payload: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut client, mut notifications) = start_client(&config).await?;

    let wait_connected = async {
        while let Some(notification) = notifications.recv().await {
            if notification == SinkNotification::ConnectionState(ConnectionState::Connected) {
                return true;
            }
        }
        false
    };

    match tokio::time::timeout(CONNECT_TIMEOUT, wait_connected).await {
        Ok(true) => {}
        _ => {
            client.disconnect().await?;
            return Err(format!("Not connected after {}s", CONNECT_TIMEOUT.as_secs()).into());
        }
    }

    client.publish(topic, payload).await?;
    info!(topic, "Published");
    client.disconnect().await?;
    Ok(())
}

fn decode(topic: &str, payload: &str) -> Result<(), Box<dyn std::error::Error>> {
    let event = EventRouter::route(topic, payload);
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

fn handle_config_command(
    config: &RealtimeConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

const RESET: &str = "\x1b[0m";

fn color_code(notification: &SinkNotification) -> &'static str {
    match notification {
        SinkNotification::ConnectionState(_) => "\x1b[1;33m", // Yellow
        SinkNotification::Event(DecodedEvent::Comment { .. }) => "\x1b[1;32m", // Green
        SinkNotification::Event(DecodedEvent::Typing(_)) => "\x1b[1;36m", // Cyan
        SinkNotification::Event(DecodedEvent::Online(_)) => "\x1b[1;35m", // Magenta
        SinkNotification::Event(_) => "\x1b[1;34m", // Blue
    }
}

fn label(notification: &SinkNotification) -> String {
    match notification {
        SinkNotification::ConnectionState(_) => "CONNECTION".to_string(),
        SinkNotification::Event(event) => event.kind().to_string().to_uppercase(),
    }
}

fn summary(notification: &SinkNotification) -> String {
    match notification {
        SinkNotification::ConnectionState(state) => format!("state={state}"),
        SinkNotification::Event(DecodedEvent::Comment { body }) => body.clone(),
        SinkNotification::Event(DecodedEvent::Typing(t)) => {
            format!("room={} user={} typing={}", t.room_id, t.user_email, t.is_typing)
        }
        SinkNotification::Event(DecodedEvent::Online(p)) => {
            format!("user={} online={} at={}", p.user_email, p.is_online, p.timestamp_utc)
        }
        SinkNotification::Event(DecodedEvent::Read(r) | DecodedEvent::Delivery(r)) => format!(
            "room={} comment={} unique={}",
            r.room_id, r.comment_id, r.comment_unique_id
        ),
        SinkNotification::Event(DecodedEvent::Undefined) => String::new(),
    }
}

fn render(notification: &SinkNotification, format: OutputFormat) -> String {
    let now = chrono::Local::now();

    match format {
        OutputFormat::Json => {
            let body = match notification {
                SinkNotification::ConnectionState(state) => {
                    serde_json::json!({ "kind": "connection", "state": state })
                }
                SinkNotification::Event(event) => {
                    serde_json::to_value(event).unwrap_or(serde_json::Value::Null)
                }
            };
            serde_json::json!({ "timestamp": now.to_rfc3339(), "event": body }).to_string()
        }
        OutputFormat::Compact => format!(
            "[{}] {} {}",
            now.format("%H:%M:%S"),
            label(notification),
            summary(notification)
        ),
        OutputFormat::Pretty => {
            let details = match notification {
                // Comment bodies are JSON documents; show them indented when they parse
                SinkNotification::Event(DecodedEvent::Comment { body }) => {
                    serde_json::from_str::<serde_json::Value>(body)
                        .and_then(|v| serde_json::to_string_pretty(&v))
                        .unwrap_or_else(|_| body.clone())
                }
                other => summary(other),
            };
            format!(
                "{}[{}] {}{}\n  {}",
                color_code(notification),
                now.format("%Y-%m-%d %H:%M:%S"),
                label(notification),
                RESET,
                details.replace('\n', "\n  ")
            )
        }
    }
}
