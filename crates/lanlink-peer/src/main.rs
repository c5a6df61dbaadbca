//! LanLink console peer entry point.
//!
//! Wires together the configuration, the local identity, the rendezvous
//! service, and a line-oriented console front end.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML config, defaults on first run
//!  └─ local_identity()         -- LAN address + session port
//!  └─ RendezvousService::run() -- spawned; owns all sockets and timers
//!  └─ console loop
//!       ├─ stdin line            -> PeerHandle::send_message / retry / cancel
//!       ├─ UiEvent from service  -> println!
//!       └─ Ctrl-C or EOF         -> PeerHandle::shutdown
//! ```
//!
//! Logs go to stderr so they do not interleave with chat lines on stdout.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lanlink_peer::infrastructure::network::identity::local_identity;
use lanlink_peer::infrastructure::storage::config::{config_file_path, load_config, save_config};
use lanlink_peer::{ChannelNotifier, PeerHandle, RendezvousConfig, RendezvousService, UiEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.peer.log_level)),
        )
        .init();

    // First run: write the defaults out so the user has a file to edit.
    match config_file_path() {
        Ok(path) if !path.exists() => match save_config(&config) {
            Ok(written) => info!("default configuration written to {}", written.display()),
            Err(e) => warn!("could not write default configuration: {e}"),
        },
        Ok(_) => {}
        Err(e) => warn!("no configuration directory: {e}"),
    }

    let identity = local_identity(&config.network);
    info!("LanLink peer starting as {identity}");

    let (notifier, mut ui_rx) = ChannelNotifier::new();
    let (service, handle) = RendezvousService::new(
        RendezvousConfig::from_app_config(&config),
        identity,
        Arc::new(notifier),
    );
    let service_task = tokio::spawn(service.run());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut awaiting_retry = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if awaiting_retry {
                    awaiting_retry = false;
                    answer_retry(&handle, &line).await?;
                } else if !line.trim().is_empty() {
                    handle.send_message(line).await?;
                }
            }
            Some(event) = ui_rx.recv() => {
                if event == UiEvent::SearchTimedOut {
                    awaiting_retry = true;
                }
                print_event(&event);
            }
        }
    }

    // The service may already be gone if it stopped on its own.
    let _ = handle.shutdown().await;
    service_task.await.context("rendezvous service panicked")?;
    Ok(())
}

async fn answer_retry(handle: &PeerHandle, answer: &str) -> anyhow::Result<()> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "r" | "retry" => handle.retry().await?,
        _ => handle.cancel().await?,
    }
    Ok(())
}

fn print_event(event: &UiEvent) {
    match event {
        UiEvent::Status(status) => println!("* {status}"),
        UiEvent::PeerConnected(peer) => println!("* Connected to {peer}"),
        UiEvent::Message(line) => println!("{line}"),
        UiEvent::SearchTimedOut => println!("* No peer found. Type r to retry, anything else to stop."),
    }
}
