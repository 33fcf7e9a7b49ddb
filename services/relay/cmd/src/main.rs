//! Relay hub binary.
//!
//! Loads routes and colors from the store, optionally attaches the local
//! console as a chat channel with admin commands, and keeps every configured
//! relay connected with exponential backoff.

use async_trait::async_trait;
use clap::Parser;
use relay_routing::{Hop, HopType, MessageEmitter, MessageHub, MessageReceiver, RoutableEnvelope};
use relay_session::{ChunkSweeper, RelayLink, RelayLinkConfig, WebsocketTransport};
use relay_storage::open_store;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod admin;
mod config;
mod logging;

use config::{RelayConfig, RelayEntry};
use logging::RelayLogFormatter;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Chat relay hub
#[derive(Parser, Debug)]
#[command(name = "relay-hub", version, about = "Routes chat between channels and relays")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "relay.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Attach stdin/stdout as the `console` channel
    #[arg(long)]
    console: bool,

    /// How long to wait for links to say goodbye on shutdown
    #[arg(long, default_value = "5s")]
    shutdown_grace: humantime::Duration,
}

/// Prints everything routed to `console`
struct ConsoleReceiver {
    hub: Weak<MessageHub>,
    hop: Hop,
}

#[async_trait]
impl MessageReceiver for ConsoleReceiver {
    async fn receive(&self, envelope: RoutableEnvelope, _destination: &str) -> bool {
        let Some(hub) = self.hub.upgrade() else {
            return false;
        };
        match hub.render_message(&envelope, &self.hop).await {
            Some(line) => {
                println!("{}", line);
                true
            }
            None => false,
        }
    }
}

struct ConsoleEmitter;

impl MessageEmitter for ConsoleEmitter {
    fn description(&self) -> String {
        "Local console".to_string()
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut env_filter = EnvFilter::new("info");
    for target in [
        "relay_hub",
        "relay_routing",
        "relay_session",
        "relay_storage",
        "relay_wire",
    ] {
        env_filter = env_filter.add_directive(format!("{}={}", target, args.log_level).parse()?);
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .event_format(RelayLogFormatter::new("relay"))
        .init();

    info!("Starting relay hub v{}", env!("CARGO_PKG_VERSION"));

    let config = RelayConfig::load_from_file(&args.config)?;
    let store = open_store(config.storage_mode()).await?;
    let hub = Arc::new(MessageHub::new(store));
    hub.set_default_colors(&config.colors.tag, &config.colors.text)
        .await?;
    let loaded = hub.load_from_store().await?;
    info!(component = "hub", "{} route(s) active", loaded);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Arc::new(ChunkSweeper::start(config.sweep_interval()?));
    let link_config = config.link_config()?;

    let mut links = Vec::new();
    for entry in config.relays.clone() {
        let hub = hub.clone();
        let sweeper = sweeper.clone();
        let shutdown = shutdown_rx.clone();
        links.push(tokio::spawn(async move {
            if let Err(e) = supervise_relay(entry, hub, link_config, sweeper, shutdown).await {
                warn!(component = "link", "Relay gave up: {:#}", e);
            }
        }));
    }

    if args.console {
        attach_console(hub.clone())?;
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    sweeper.stop();

    let grace: Duration = args.shutdown_grace.into();
    for handle in links {
        if tokio::time::timeout(grace, handle).await.is_err() {
            warn!(component = "link", "Relay did not stop within {:?}", grace);
        }
    }

    let stats = hub.stats().await;
    info!(
        component = "hub",
        "Delivered {} envelope(s), suppressed {}, unmatched {}",
        stats.delivered,
        stats.suppressed,
        stats.no_match
    );
    Ok(())
}

/// Register the console channel and spawn the stdin reader
fn attach_console(hub: Arc<MessageHub>) -> anyhow::Result<()> {
    let hop = Hop::new(HopType::Console, None);
    hub.register_receiver(
        &hop.channel(),
        Arc::new(ConsoleReceiver {
            hub: Arc::downgrade(&hub),
            hop: hop.clone(),
        }),
        false,
    )?;
    hub.register_emitter(&hop.channel(), Arc::new(ConsoleEmitter), false)?;

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(component = "console", "stdin read failed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            if admin::is_command(&line) {
                match admin::execute(&hub, &line).await {
                    Ok(reply) => println!("{}", reply),
                    Err(e) => println!("Error: {:#}", e),
                }
                continue;
            }

            let envelope = RoutableEnvelope::message(hop.clone(), &line);
            let result = hub.handle(envelope).await;
            debug!(component = "console", "console message: {:?}", result);
        }
        debug!(component = "console", "stdin closed");
    });
    Ok(())
}

/// Keep one relay connected until shutdown
async fn supervise_relay(
    entry: RelayEntry,
    hub: Arc<MessageHub>,
    link_config: RelayLinkConfig,
    sweeper: Arc<ChunkSweeper>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let link = RelayLink::new(&entry.name, hub, link_config)?;
    let stack_config = entry.stack_config()?;
    let mut backoff = Duration::from_secs(1);

    while !*shutdown.borrow() {
        info!(component = "link", "{}: connecting to {}", link.hop(), entry.url);

        let connected = tokio::select! {
            result = WebsocketTransport::connect(&entry.name, &entry.url) => result,
            _ = shutdown.changed() => break,
        };

        let pause = match connected {
            Ok(transport) => {
                backoff = Duration::from_secs(1);
                let stack = stack_config.build()?;
                match link
                    .run(transport, stack, sweeper.subscribe(), shutdown.clone())
                    .await
                {
                    Ok(()) => break,
                    Err(e) => warn!(component = "link", "{}: session ended: {}", link.hop(), e),
                }
                Duration::from_secs(1)
            }
            Err(e) => {
                warn!(
                    component = "link",
                    "{}: failed to connect: {}; retrying in {:?}",
                    link.hop(),
                    e,
                    backoff
                );
                let pause = backoff;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                pause
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown.changed() => break,
        }
    }
    Ok(())
}
