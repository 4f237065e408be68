//! This crate contains the consensus component, which drives a committee of
//! operators to agreement on a single value per height, tolerating Byzantine
//! faults. It implements a QBFT-style instance: PrePrepare, Prepare and
//! Commit phases per round, round changes on timeout, and aggregation of
//! commit quorums into decided certificates.

pub use config::Config;

mod config;
pub mod qbft;
pub mod testonly;

/// Messages the instance hands to the network collaborator for broadcast.
pub type ToNetworkMessage = dv_consensus_roles::operator::SignedMessage;

/// Creates the channel on which an instance publishes its outbound messages.
pub fn create_outbound_channel() -> (
    tokio::sync::mpsc::UnboundedSender<ToNetworkMessage>,
    tokio::sync::mpsc::UnboundedReceiver<ToNetworkMessage>,
) {
    tokio::sync::mpsc::unbounded_channel()
}
