//! # torctl
//!
//! An async Rust client for the Tor control protocol: authenticated command
//! sessions, asynchronous event delivery, a live circuit/relay registry, and
//! onion-service client authorization keys.
//!
//! The crate speaks to an already-running daemon over its control port (TCP
//! or Unix socket); it does not launch or supervise the daemon itself.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use torctl::{ControlConfig, Result, TorController};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Connect to the default control port (127.0.0.1:9051).
//!     let controller = TorController::connect(ControlConfig::default()).await?;
//!
//!     // Authenticate with the best available method.
//!     controller.auto_authenticate().await?;
//!
//!     let version = controller.get_info("version").await?;
//!     println!("connected to Tor {}", version);
//!
//!     // Request fresh circuits.
//!     controller.new_identity().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Events and the circuit registry
//!
//! Commands and asynchronous events share one connection; a background
//! reader task pairs replies with commands in strict FIFO order and routes
//! `650` events to registered observers:
//!
//! ```rust,no_run
//! # use torctl::{CircuitRegistry, EventType, TorController};
//! # async fn example(controller: TorController) -> torctl::Result<()> {
//! let registry = CircuitRegistry::new();
//! registry.attach(&controller);
//! controller
//!     .set_events(&[EventType::Circ, EventType::Ns, EventType::OrConn])
//!     .await?;
//!
//! // ...the registry now tracks circuits as events arrive.
//! for circuit in registry.live_circuits() {
//!     println!("circuit {} is {}", circuit.id, circuit.state);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Restricted onion services
//!
//! ```rust,no_run
//! # use torctl::{OnionAddress, OnionAuthStore, TorController};
//! # async fn example(controller: TorController) -> torctl::Result<()> {
//! let store = OnionAuthStore::open("/var/lib/tor/onion_auth")?;
//! let service: OnionAddress =
//!     "exampleoniont2pqglbny66wpovyvao3ylc23eileodtevc4b75ikpad".parse()?;
//!
//! // Generates and persists a key pair on first use, then registers it
//! // for this session.
//! controller.install_client_auth(&store, &service).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `tokio-runtime` (default): the async connection layer. Without it the
//!   crate still provides the protocol parser, event model, registry, and
//!   key store for use over other transports.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod keystore;
pub mod protocol;
pub mod registry;
pub mod types;

#[cfg(feature = "tokio-runtime")]
pub mod connection;

pub use error::{ControlError, Result, StatusCode};

#[cfg(feature = "tokio-runtime")]
pub use connection::{EventStream, OnionServiceInfo, TorController};

pub use auth::{AuthCredential, AuthMethod, ProtocolInfo};
pub use config::{ConnectionAddress, ControlConfig};
pub use events::{Event, EventDispatcher, EventType, SubscriptionId};
pub use keystore::{AuthKeyPair, OnionAuthStore};
pub use protocol::{ControlReply, LineFramer, ReplyLine, ReplyParser};
pub use registry::{Circuit, CircuitRegistry, Node};
pub use types::{
    BootstrapStatus, CircuitId, CircuitPurpose, CircuitStatus, Fingerprint, NodeRef, OnionAddress,
    OrConnStatus, Signal, StreamId, StreamStatus,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Control protocol version this crate implements.
pub const PROTOCOL_VERSION: u32 = 1;
