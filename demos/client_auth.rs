//! Example: Client authorization for a restricted onion service
//!
//! Generates (or loads) the x25519 key pair for a restricted service and
//! registers it with the running session, so circuits to the service can be
//! built. Pass the service address as the first argument.
//!
//! Run with: cargo run --example client_auth -- <service>.onion

use torctl::{ControlError, OnionAddress, OnionAuthStore, Result, TorController};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let service: OnionAddress = std::env::args()
        .nth(1)
        .ok_or_else(|| ControlError::Config("usage: client_auth <service>.onion".to_string()))?
        .parse()?;

    let controller = TorController::connect_default().await?;
    controller.auto_authenticate().await?;

    // Keys live next to the daemon's other client-auth material; each
    // service gets one stable key pair across runs.
    let store = OnionAuthStore::open("./onion_auth")?;
    let pair = controller.install_client_auth(&store, &service).await?;

    println!("Registered client authorization for {}", service.full_address());
    println!("Public key (give this to the service operator):");
    println!("  descriptor:x25519:{}", pair.public_base32());

    println!("\nKnown services with stored keys:");
    for known in store.list()? {
        println!("  {}", known.full_address());
    }

    controller.close().await;
    Ok(())
}
