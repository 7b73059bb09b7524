//! Example: Monitor Tor events and track circuits
//!
//! This example demonstrates subscribing to events and letting the circuit
//! registry follow them.
//!
//! Run with: cargo run --example events

use torctl::{CircuitRegistry, Event, EventType, Result, TorController};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("Connecting to Tor control port...");
    let controller = TorController::connect_default().await?;
    controller.auto_authenticate().await?;
    println!("Connected and authenticated!");

    // The registry folds circuit and relay events in the background.
    let registry = CircuitRegistry::new();
    registry.attach(&controller);

    let mut events = controller.event_stream();

    let monitored = [
        EventType::Circ,   // Circuit events
        EventType::Stream, // Stream events
        EventType::Bw,     // Bandwidth events
        EventType::Notice, // Notice-level log messages
        EventType::Ns,     // Network status entries
    ];
    println!("\nSubscribing to events: {:?}", monitored);
    controller.set_events(&monitored).await?;
    println!("Subscribed! Waiting for events (Ctrl+C to exit)...\n");

    while let Some(event) = events.recv().await {
        match &event {
            Event::CircuitStatus(circ) => {
                let path: Vec<String> = circ.path.iter().map(|n| n.to_string()).collect();
                println!(
                    "[CIRCUIT] id={} status={} path={}",
                    circ.id,
                    circ.status,
                    if path.is_empty() {
                        "-".to_string()
                    } else {
                        path.join("->")
                    }
                );
                println!(
                    "          registry now tracks {} live circuit(s), {} relay(s)",
                    registry.live_circuits().len(),
                    registry.node_count()
                );
            }
            Event::StreamStatus(stream) => {
                println!(
                    "[STREAM] id={} status={:?} target={}",
                    stream.id, stream.status, stream.target
                );
            }
            Event::Bandwidth(bw) => {
                println!(
                    "[BANDWIDTH] read={} B/s written={} B/s",
                    bw.bytes_read, bw.bytes_written
                );
            }
            Event::Log(log) => {
                println!("[LOG:{:?}] {}", log.severity, log.message);
            }
            _ => {
                println!("[EVENT] {:?}", event);
            }
        }
    }

    Ok(())
}
