//! LAN discovery example.
//!
//! Broadcasts eISCP discovery requests and prints every receiver that
//! answers, then connects to the first one and queries its power state.
//!
//! # Requirements
//!
//! - An eISCP-capable receiver on the same subnet
//! - UDP port 60128 not blocked by a firewall
//!
//! # Usage
//!
//! ```sh
//! cargo run -p avrlib --example discover
//! ```

use avrlib::eiscp::{Discovery, DiscoveryOptions, EiscpClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Searching for receivers on the LAN...\n");

    let mut discovery = Discovery::bind(DiscoveryOptions::default()).await?;
    let device = match discovery.discover_first().await {
        Ok(device) => device,
        Err(e) => {
            println!("No receiver found: {e}");
            println!("\nTroubleshooting:");
            println!("  - Verify the receiver is powered (or in network standby)");
            println!("  - Check that UDP port 60128 is not blocked by a firewall");
            println!("  - Ensure this machine is on the same subnet as the receiver");
            return Ok(());
        }
    };

    println!("Found: {device}");
    println!("  model:      {}", device.model);
    println!("  area:       {}", device.area);
    println!("  identifier: {}", device.identifier);

    println!("\nConnecting and querying power state...");
    let client = EiscpClient::from_detected(&device);
    let power = client.power_state().await?;
    println!("Power: {power}");

    client.disconnect().await?;
    Ok(())
}
