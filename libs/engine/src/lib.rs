//! Storage interface for decided certificates.
use std::fmt;

use dv_consensus_roles::operator;

pub mod testonly;

/// Defines the interface between the consensus core and the durable store of
/// decided certificates. The core treats this as an opaque key-value store
/// keyed by (identifier, height); retries and durability are owned by the
/// implementation.
#[async_trait::async_trait]
pub trait DecidedStore: 'static + fmt::Debug + Send + Sync {
    /// Persists a decided certificate, replacing any previous certificate
    /// stored for the same (identifier, height).
    async fn save_decided(&self, msg: &operator::SignedMessage) -> anyhow::Result<()>;

    /// Gets a decided certificate. Returns `None` if nothing was decided for
    /// this (identifier, height).
    async fn get_decided(
        &self,
        identifier: &operator::Identifier,
        height: operator::Height,
    ) -> anyhow::Result<Option<operator::SignedMessage>>;
}
