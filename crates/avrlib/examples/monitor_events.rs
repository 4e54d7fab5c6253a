//! Event monitoring example.
//!
//! Connects to a receiver and prints every status change it pushes --
//! volume knob turns, power toggles from the remote, inputs selected by
//! other network clients. Run it, then poke the receiver.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p avrlib --example monitor_events -- 192.168.0.23
//! ```

use avrlib::eiscp::EiscpClient;
use avrlib::DeviceEvent;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.0.23".to_string());

    let client = EiscpClient::new(host);
    let mut events = client.subscribe();
    client.connect().await?;

    println!("Connected. Waiting for status changes (Ctrl-C to quit)...\n");

    loop {
        match events.recv().await {
            Ok(DeviceEvent::Property { group, value }) => {
                println!("{group}: {value}");
            }
            Ok(DeviceEvent::Unrecognized { payload }) => {
                println!("(unrecognized) {payload}");
            }
            Ok(DeviceEvent::DecodeFailed { group, parameter }) => {
                println!("(undecodable) {group} {parameter}");
            }
            Ok(DeviceEvent::Connected) => println!("-- connected --"),
            Ok(DeviceEvent::Disconnected) => {
                println!("-- disconnected --");
                break;
            }
            Err(e) => {
                println!("event stream closed: {e}");
                break;
            }
        }
    }

    Ok(())
}
