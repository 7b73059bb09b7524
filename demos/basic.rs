//! Example: Basic connection and authentication
//!
//! This example demonstrates how to connect to Tor and authenticate.
//!
//! Run with: cargo run --example basic

use torctl::{Result, TorController};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (optional)
    tracing_subscriber::fmt::init();

    println!("Connecting to Tor control port...");

    // Connect to the default control port (127.0.0.1:9051)
    let controller = TorController::connect_default().await?;
    println!("Connected!");

    // Get protocol info to see available auth methods
    let info = controller.protocol_info().await?;
    println!("Tor version: {}", info.server_version);
    println!("Auth methods: {:?}", info.auth_methods);
    if let Some(ref cookie) = info.cookie_file {
        println!("Cookie file: {}", cookie);
    }

    // Authenticate using the best available method
    println!("\nAuthenticating...");
    controller.auto_authenticate().await?;
    println!("Authentication successful!");

    // Basic queries
    let version = controller.get_info("version").await?;
    println!("\nTor version: {}", version);

    let bootstrap = controller.bootstrap_phase().await?;
    println!(
        "Bootstrap: {}% ({}) {}",
        bootstrap.progress, bootstrap.tag, bootstrap.summary
    );

    if let Ok(traffic) = controller
        .get_info_multi(&["traffic/read", "traffic/written"])
        .await
    {
        for (key, value) in traffic {
            println!("{}: {} bytes", key, value);
        }
    }

    // Request fresh circuits
    controller.new_identity().await?;
    println!("\nRequested new identity.");

    // Close the connection gracefully
    controller.close().await;
    println!("Disconnected.");

    Ok(())
}
