//! Idempotent process-wide logging init.
//!
//! Grounded on the teacher's `agent_team_mail_core::logging`: a
//! `OnceLock` guard so repeated calls (e.g. from tests) don't panic on
//! double-init, an env var controlling the level, `tracing_subscriber`'s
//! `fmt` layer with targets suppressed for terser demo output.

use std::sync::OnceLock;

use tracing::Level;

static INIT: OnceLock<()> = OnceLock::new();

const LEVEL_VAR: &str = "SESSIONKIT_LOG";

/// Initialize the global `tracing` subscriber once per process. Safe to
/// call more than once; only the first call takes effect.
///
/// `verbose` forces `DEBUG` regardless of the environment; otherwise the
/// level comes from `SESSIONKIT_LOG`, falling back to `INFO`.
pub fn init(verbose: bool) {
    INIT.get_or_init(|| {
        let level = if verbose {
            Level::DEBUG
        } else {
            std::env::var(LEVEL_VAR)
                .ok()
                .and_then(|v| v.parse::<Level>().ok())
                .unwrap_or(Level::INFO)
        };

        let _ = tracing_subscriber::fmt().with_max_level(level).with_target(false).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(false);
        init(false);
    }
}
