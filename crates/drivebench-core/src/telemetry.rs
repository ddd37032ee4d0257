//! Log output for `drivebench` runs.
//!
//! Logs always go to stderr so that `assess --json` and `split --json`
//! print their results alone on stdout. With `json` set, each lifecycle
//! event from [`crate::obs`] becomes one JSON line carrying `run_id` and
//! `agent_name` from the run span. `RUST_LOG` overrides the level, e.g.
//! `RUST_LOG=drivebench_core=debug` to also see dataset and driver detail.
//! Repeat calls, as from tests, are no-ops.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber; `level` applies when `RUST_LOG` is unset.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
