//! aggsig Network Layer
//!
//! Peer-to-peer discovery and committee selection for signer nodes.
//!
//! This module provides:
//! - Endpoint validation (SSRF / DNS-rebinding guard for peer URLs)
//! - Gossip message types and the WebSocket / in-memory transports
//! - Peer directory with active / suspected / inactive liveness tracking
//! - Gossip protocol: bootstrap, de-duplicated relay, heartbeats,
//!   health checks, periodic discovery and reconnects
//! - Signer selection and the signing coordinator that turns a committee's
//!   partial signatures into a pairing-ready aggregate

pub mod directory;
pub mod endpoint;
pub mod error;
pub mod gossip;
pub mod history;
pub mod message;
pub mod probe;
pub mod selector;
pub mod signing;
pub mod stats;
pub mod transport;

pub use directory::*;
pub use endpoint::*;
pub use error::*;
pub use gossip::*;
pub use history::*;
pub use message::*;
pub use probe::*;
pub use selector::*;
pub use signing::*;
pub use stats::*;
pub use transport::*;
