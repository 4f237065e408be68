//! Test-only storage implementations.
pub mod in_memory;
