//! Merkle allowlist for proof-of-participation NFT campaigns.
//!
//! Eligible identities (emails) are hashed into leaves, committed to by a
//! sorted-pair keccak Merkle root, and proven against an ERC-721 mint gate
//! that holds the active root on chain.

pub mod adapters;
pub mod config;
pub mod crypto;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod ports;
pub mod registry;
pub mod server;
pub mod sync;
