//! Exercises a live hlld server end to end.
//!
//! Usage: `cargo run --example basic -- [host[:port]]` (defaults to
//! `localhost:4553`). Logs go to stderr; tune them with `RUST_LOG`.

use std::env;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use hlld_client::{HlldClient, HlldConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let server = env::args()
        .nth(1)
        .unwrap_or_else(|| "localhost:4553".to_string());
    let config = HlldConfig {
        server,
        timeout: Some(Duration::from_secs(5)),
        ..HlldConfig::default()
    };
    let client = HlldClient::with_config(config)?;

    let visitors = client.create_set("demo_visitors")?;
    visitors.add("alice")?;
    visitors.bulk(&["bob", "carol", "alice"])?;

    let info = visitors.info()?;
    println!(
        "demo_visitors: ~{} unique keys in {} bytes (eps {})",
        info.size, info.bytes, info.eps
    );

    let mut pipe = visitors.pipeline();
    pipe.add("dave").add("erin").info();
    for (idx, result) in pipe.execute()?.iter().enumerate() {
        println!("pipeline[{idx}]: {result:?}");
    }

    for (name, stats) in client.list_sets()? {
        println!("{name}: size={} precision={}", stats.size, stats.precision);
    }

    visitors.delete()?;
    Ok(())
}
