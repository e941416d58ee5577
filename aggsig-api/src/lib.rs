//! aggsig API Server
//!
//! REST surface of a signer node plus the gossip WebSocket gateway.
//!
//! ## Endpoints
//!
//! ### Health
//! - GET /health - Derived network health (healthy, degraded, isolated)
//! - GET /stats - Gossip counters
//!
//! ### Directory
//! - GET /nodes - Every known node, inactive ones included
//! - GET /nodes/active - Healthy nodes only
//! - GET /signers/:count - Select a signing committee
//!
//! ### Signing
//! - GET /identity - Node id, public key, registration status
//! - POST /sign - Partial signature over a hex message
//! - POST /aggregate - Aggregate partial signatures
//! - POST /verify - Verify a signature against aggregated public keys
//! - POST /aggregate-sign - Full signing round across a committee
//!
//! ### Gossip
//! - GET /gossip - WebSocket upgrade into the gossip protocol

pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use dto::*;
pub use error::*;
pub use routes::*;
pub use server::*;
pub use state::*;
