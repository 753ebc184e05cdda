mod config;
mod dispatch_loop;
mod event;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sessionkit_core::registry::SessionRegistry;

use crate::event::DemoEvent;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = config::Args::parse();
    let resolved = config::resolve(args)?;

    logging::init(resolved.verbose);

    tracing::info!(
        suspend_timeout_ms = resolved.suspend_timeout_ms,
        "sessionkit-cli starting"
    );

    let registry = Arc::new(SessionRegistry::<DemoEvent>::new());
    let (tx, rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    seed_demo_events(&tx).await;
    drop(tx);

    let outcomes = dispatch_loop::run(
        registry,
        rx,
        cancel,
        Duration::from_millis(resolved.suspend_timeout_ms),
    )
    .await;
    tracing::info!(events_dispatched = outcomes.len(), "sessionkit-cli finished");

    Ok(())
}

/// Feeds a handful of scripted events so running the binary demonstrates
/// the session lifecycle without needing a real event source wired up —
/// there is no wire protocol in scope for this crate.
async fn seed_demo_events(tx: &mpsc::Sender<DemoEvent>) {
    let _ = tx.send(DemoEvent::Text { user: 1, body: "hello".into() }).await;
    let _ = tx.send(DemoEvent::Command { user: 2, name: "wait".into() }).await;
    let _ = tx.send(DemoEvent::Text { user: 2, body: "here's the reply".into() }).await;
    let _ = tx.send(DemoEvent::Notice { user: 3, text: "user joined".into() }).await;
}
