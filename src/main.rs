//! Timed Map demo
//!
//! Stores two keys with different lifetimes and prints them on a timer until
//! both have expired.

use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timed_map::{Config, TimedMap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timed_map=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: sweep_interval={:?}, poll_interval={:?}, poll_rounds={}",
        config.sweep_interval, config.poll_interval, config.poll_rounds
    );

    let map = TimedMap::with_sweep_interval(config.sweep_interval).await?;
    map.set_with_callback("hey", "ho", Duration::from_secs(3), on_expire);
    map.set_with_callback(
        "whats",
        "up",
        Duration::from_secs(5) - Duration::from_millis(100),
        on_expire,
    );

    for _ in 0..config.poll_rounds {
        print_entry(&map, "hey");
        print_entry(&map, "whats");
        tokio::time::sleep(config.poll_interval).await;
    }

    map.stop_sweeper().await;
    info!("Demo finished, {} entries left", map.len());
    Ok(())
}

fn print_entry(map: &TimedMap<&'static str, &'static str>, key: &str) {
    info!("{:>5} - {:?}", key, map.get(key));
}

fn on_expire(value: &'static str) {
    info!("{} expired", value);
}
