//! Cryptographic primitives used by the DV consensus crates.

pub use fmt::*;

pub mod bls12_381;
mod fmt;
pub mod keccak256;
