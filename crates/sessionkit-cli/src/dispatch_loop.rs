//! The demo dispatch loop: events arrive on an in-memory channel (no real
//! network or process I/O — that's out of scope for this crate) and are
//! routed through the session registry one at a time.
//!
//! Grounded on the teacher's `atm-daemon/src/daemon/event_loop.rs`
//! structure: a `tokio::select!` over a shutdown signal and an inbound
//! channel, `tracing::info_span!` per iteration, graceful drain on
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use sessionkit_core::dispatch::dispatch_and_invoke;
use sessionkit_core::registry::SessionRegistry;
use sessionkit_core::session::Session;

use crate::event::{same_user_rule, DemoEvent};

/// Outcome of one dispatched event, for tests to assert on; the binary
/// itself only logs these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// A session ran the handler; `true` if it had suspended and a later
    /// event woke it back up within this call.
    Ran { woke: bool },
    /// The registry resolved the event without handing back a session to
    /// run (it woke a Suspended session's waiter instead).
    WokeOther,
}

/// Runs until `cancel` fires or the channel closes, dispatching each
/// event through `registry`.
///
/// Each event is handled on its own spawned task rather than awaited
/// inline: a handler that suspends (waiting for a follow-up reply) must
/// not block this loop from picking up that reply's event and waking it
/// back up, exactly the deadlock the registry's suspended-session scan
/// exists to avoid. One task per in-flight event is the same shape the
/// teacher's event loop uses for per-plugin dispatch.
pub async fn run(
    registry: Arc<SessionRegistry<DemoEvent>>,
    mut events: mpsc::Receiver<DemoEvent>,
    cancel: CancellationToken,
    suspend_timeout: Duration,
) -> Vec<EventOutcome> {
    // Built once and cloned per event: the registry partitions sessions by
    // the `Arc`'s pointer identity, so a fresh rule per event would put
    // every event in its own bucket and no two events would ever share a
    // session.
    let rule = same_user_rule();
    let mut in_flight = Vec::new();

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                info!("dispatch loop cancelled, shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    info!("event channel closed, shutting down");
                    break;
                }
            },
        };

        let span = info_span!("dispatch", user = event.user());
        let registry = registry.clone();
        let rule = rule.clone();
        in_flight.push(tokio::spawn(
            async move { handle_event(&registry, event, rule, suspend_timeout).await }
                .instrument(span),
        ));
    }

    let mut outcomes = Vec::with_capacity(in_flight.len());
    for task in in_flight {
        if let Ok(outcome) = task.await {
            outcomes.push(outcome);
        }
    }
    outcomes
}

async fn handle_event(
    registry: &SessionRegistry<DemoEvent>,
    event: DemoEvent,
    rule: Arc<dyn sessionkit_core::rule::ErasedRule<DemoEvent>>,
    suspend_timeout: Duration,
) -> EventOutcome {
    let keep = matches!(event, DemoEvent::Command { .. });

    let ran = dispatch_and_invoke(registry, event, Some(rule), true, keep, |session| {
        run_handler(session, suspend_timeout)
    })
    .await;

    match ran {
        Some(woke) => EventOutcome::Ran { woke },
        None => {
            info!("event resolved without a session to run (woke a suspended one)");
            EventOutcome::WokeOther
        }
    }
}

async fn run_handler(session: Arc<Session<DemoEvent>>, suspend_timeout: Duration) -> bool {
    match session.event() {
        DemoEvent::Command { name, .. } if name == "wait" => {
            info!("command requested a reply, suspending");
            // Handlers reach for the free-function form, which pulls the
            // session out of the dispatch-bound context rather than
            // threading a handle through every call site.
            let woke = sessionkit_core::suspend::<DemoEvent>(Some(suspend_timeout))
                .await
                .unwrap_or(false);
            if woke {
                info!(reply = ?session.event(), "resumed after reply");
            } else {
                info!("suspend timed out waiting for a reply");
            }
            woke
        }
        DemoEvent::Text { body, .. } => {
            info!(%body, "handled text event");
            false
        }
        DemoEvent::Command { name, .. } => {
            info!(%name, "handled command event");
            false
        }
        DemoEvent::Notice { text, .. } => {
            info!(%text, "handled notice event");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatches_text_event_without_error() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        tx.send(DemoEvent::Text { user: 1, body: "hi".into() }).await.unwrap();
        drop(tx);

        let outcomes = run(registry, rx, cancel, Duration::from_millis(50)).await;
        assert_eq!(outcomes, vec![EventOutcome::Ran { woke: false }]);
    }

    #[tokio::test]
    async fn suspend_then_reply_resolves_within_one_dispatch_loop() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        tx.send(DemoEvent::Command { user: 2, name: "wait".into() }).await.unwrap();
        let tx2 = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx2.send(DemoEvent::Text { user: 2, body: "pong".into() }).await;
        });
        drop(tx);

        let outcomes = run(registry, rx, cancel, Duration::from_millis(200)).await;
        // The "wait" command suspends and is woken by the later "pong" text
        // event before the loop's suspend_timeout elapses; the reply event
        // itself resolves the wake rather than starting its own session.
        assert_eq!(
            outcomes,
            vec![EventOutcome::Ran { woke: true }, EventOutcome::WokeOther]
        );
    }
}
