//! CLI for livefeed
//!
//! Subcommands:
//! - `server`: run the WebSocket server, the hub and the broker bridge
//! - `watch`: connect as a viewer of one match and print what arrives
//! - `history`: dump the durable log of one match

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info, warn};

use livefeed::bridge::BrokerBridge;
use livefeed::config::{Settings, load_config};
use livefeed::event::{MatchEventData, MatchEventKind, MatchId, MatchStatus};
use livefeed::hub::Hub;
use livefeed::persistence::{EventLog, SledCache, SledEventLog, open_db};
use livefeed::publisher::EventPublisher;
use livefeed::pubsub::LocalPubSub;
use livefeed::transport::start_websocket_server;
use livefeed::utils::{logging, shutdown};

#[derive(Parser)]
#[command(name = "livefeed")]
enum Command {
    /// Start the WebSocket server
    Server {
        /// Publish a scripted feed for this match id (useful for smoke tests)
        #[arg(long)]
        demo_match: Option<MatchId>,
    },
    /// Watch one match and print every event received
    Watch {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        #[arg(long)]
        match_id: MatchId,
        /// Viewer identity sent with the subscription
        #[arg(long)]
        viewer: Option<String>,
    },
    /// Print the durable event log of a match
    History {
        #[arg(long)]
        match_id: MatchId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    let config = load_config().context("failed to load configuration")?;
    logging::init(&config.log.level);

    let result = match cmd {
        Command::Server { demo_match } => run_server(config, demo_match).await,
        Command::Watch {
            url,
            match_id,
            viewer,
        } => run_watch(&url, match_id, viewer.as_deref()).await,
        Command::History { match_id } => run_history(&config, match_id).await,
    };

    if let Err(e) = &result {
        error!("livefeed failed: {e:#}");
    }
    result
}

async fn run_server(config: Settings, demo_match: Option<MatchId>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let db = open_db(&config.storage.path)
        .with_context(|| format!("failed to open storage at {}", config.storage.path))?;
    let log = Arc::new(SledEventLog::new(
        db.clone(),
        config.storage.max_events_per_match,
    ));
    let cache = Arc::new(SledCache::new(&db)?);
    let pubsub = Arc::new(LocalPubSub::default());
    let hub = Arc::new(Hub::new());
    let (intake_tx, intake_rx) = Hub::intake_channel(config.hub.intake_capacity);
    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    tokio::spawn(hub.clone().run(intake_rx, shutdown_rx.clone()));

    let bridge = BrokerBridge::new(
        pubsub.clone(),
        intake_tx,
        &config.bridge.channel_prefix,
        Duration::from_millis(config.bridge.retry_backoff_ms),
    );
    tokio::spawn(bridge.run(shutdown_rx.clone()));

    if let Some(match_id) = demo_match {
        let publisher = EventPublisher::new(log, pubsub, cache, &config.bridge.channel_prefix);
        tokio::spawn(run_demo_feed(publisher, match_id, shutdown_rx.clone()));
    }

    tokio::select! {
        served = start_websocket_server(&addr, hub.clone(), config.hub.clone(), shutdown_rx) => {
            served.with_context(|| format!("WebSocket server on {addr} failed"))?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    let _ = shutdown_tx.send(true);
    db.flush_async().await?;
    Ok(())
}

/// Scripted match used by `server --demo-match`.
const DEMO_SCRIPT: [(u16, MatchEventKind); 8] = [
    (3, MatchEventKind::Shot),
    (9, MatchEventKind::Corner),
    (10, MatchEventKind::Goal),
    (21, MatchEventKind::Foul),
    (22, MatchEventKind::YellowCard),
    (37, MatchEventKind::ShotOnTarget),
    (58, MatchEventKind::Substitution),
    (71, MatchEventKind::Goal),
];

async fn run_demo_feed(
    publisher: EventPublisher,
    match_id: MatchId,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let mut home_score = 0;

    if let Err(e) = publisher.publish_match_status(match_id, MatchStatus::Live).await {
        warn!(match_id = %match_id, error = %e, "demo feed could not start");
        return;
    }

    for (minute, kind) in DEMO_SCRIPT {
        tokio::select! {
            _ = shutdown::signalled(&mut shutdown_rx) => return,
            _ = ticker.tick() => {}
        }

        let is_goal = kind == MatchEventKind::Goal;
        let outcome = publisher
            .publish_match_event(match_id, MatchEventData::new(kind, minute))
            .await;
        if let Err(e) = outcome {
            warn!(match_id = %match_id, error = %e, "demo event not published");
            continue;
        }
        if is_goal {
            home_score += 1;
            if let Err(e) = publisher.publish_score_update(match_id, home_score, 0).await {
                warn!(match_id = %match_id, error = %e, "demo score not published");
            }
        }
        publisher.invalidate_match_cache(match_id).await;
    }

    if let Err(e) = publisher.publish_match_status(match_id, MatchStatus::Finished).await {
        warn!(match_id = %match_id, error = %e, "demo feed could not finish");
    }
}

async fn run_watch(url: &str, match_id: MatchId, viewer: Option<&str>) -> anyhow::Result<()> {
    let mut endpoint = format!("{}/ws/matches/{match_id}", url.trim_end_matches('/'));
    if let Some(viewer) = viewer {
        endpoint.push_str(&format!("?viewer={viewer}"));
    }

    let (mut ws_stream, _response) = connect_async(endpoint.as_str())
        .await
        .with_context(|| format!("failed to connect to {endpoint}"))?;
    info!("Watching match {match_id} at {endpoint}");

    loop {
        let frame = tokio::select! {
            frame = ws_stream.next() => frame,
            _ = tokio::signal::ctrl_c() => break,
        };
        match frame {
            Some(Ok(WsMessage::Text(text))) => println!("{}", text.as_str()),
            Some(Ok(WsMessage::Close(frame))) => {
                info!("Server closed the subscription: {frame:?}");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => break,
        }
    }
    Ok(())
}

async fn run_history(config: &Settings, match_id: MatchId) -> anyhow::Result<()> {
    let log = SledEventLog::open(&config.storage.path, config.storage.max_events_per_match)
        .with_context(|| format!("failed to open storage at {}", config.storage.path))?;

    for entry in log.read(match_id).await? {
        println!("{}", serde_json::to_string(&entry)?);
    }
    Ok(())
}
