//! aggsig Signing Engine
//!
//! BLS12-381 signatures for aggregate-signature signer nodes.
//!
//! BLS (min-pubkey variant):
//! - Public keys on G1, messages and signatures on G2
//! - Hash-to-curve with a fixed domain separation tag
//! - Order-independent signature and public key aggregation
//! - Pairing verification
//!
//! EIP-2537:
//! - 128-byte G1 / 256-byte G2 layout for on-chain pairing checks
//!
//! Node identity:
//! - Persisted key material and registration status

pub mod aggregate;
pub mod bls;
pub mod eip2537;
pub mod error;
pub mod identity;

pub use aggregate::*;
pub use bls::*;
pub use eip2537::*;
pub use error::*;
pub use identity::*;
