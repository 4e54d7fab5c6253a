//! Basic control example.
//!
//! Connects to a receiver at a known address, powers it on, nudges the
//! volume, and selects the FM tuner.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p avrlib --example power_control -- 192.168.0.23
//! ```

use avrlib::eiscp::EiscpClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.0.23".to_string());

    let client = EiscpClient::new(host);

    // The first command connects on demand.
    let power = client.power_on().await?;
    println!("Power: {power}");

    let volume = client.volume_up().await?;
    println!("Volume: {volume}");

    let source = client.set_source("FM").await?;
    println!("Source: {source}");

    let state = client.state().await;
    println!(
        "Cached state -- power: {:?}, volume: {:?}, source: {:?}",
        state.power(),
        state.master_volume(),
        state.source()
    );

    client.disconnect().await?;
    Ok(())
}
