//! Messages exchanged between operators during consensus.
mod committee;
mod consensus;
mod encode;
mod msg;

pub use committee::*;
pub use consensus::*;
pub use msg::*;
