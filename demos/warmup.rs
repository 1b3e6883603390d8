//! # Example: warmup
//!
//! Loads warmer policies from TOML, starts the engine and waits until every
//! required warmer has stopped (or Ctrl-C).
//!
//! ## Flow
//! ```text
//! EngineConfig::load(path) ──► Engine::start()
//!     ├─► TaskRunner × concurrency (per [[warmers]] record)
//!     ├─► Watcher (timeouts, stats every log_interval)
//!     └─► poll is_warm() ─► Engine::stop()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example warmup
//! WARMVISOR_CONFIG=my.toml RUST_LOG=debug cargo run --example warmup --features http
//! ```

use std::time::Duration;

use tracing::{info, warn};
use warmvisor::{Engine, EngineConfig, WarmerRegistry};

const DEFAULT_CONFIG: &str = "demos/warmup.toml";

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warmvisor=info,warmup=info".into()),
        )
        .init();

    // config path: WARMVISOR_CONFIG env > demos/warmup.toml
    let path = std::env::var("WARMVISOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let cfg = EngineConfig::load(&path)?;
    info!(%path, warmers = cfg.warmers.len(), "config loaded");

    let engine = Engine::new(cfg, WarmerRegistry::with_builtin());
    engine.start();

    let mut poll = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = poll.tick() => {
                if engine.is_warm() {
                    info!("service is warm");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, stopping warm-up");
                break;
            }
        }
    }

    engine.stop();
    for status in engine.warmers() {
        info!(
            warmer = %status.name,
            iteration = status.iteration,
            failures = status.failed_rounds,
            completed = status.completed,
            "final status"
        );
    }
    Ok(())
}
