//! In-memory storage implementation.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use dv_consensus_roles::operator;

/// In-memory decided-certificate store.
#[derive(Debug, Clone, Default)]
pub struct DecidedStore(
    Arc<Mutex<HashMap<(operator::Identifier, operator::Height), operator::SignedMessage>>>,
);

impl DecidedStore {
    /// New empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of certificates currently stored.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl crate::DecidedStore for DecidedStore {
    async fn save_decided(&self, msg: &operator::SignedMessage) -> anyhow::Result<()> {
        self.0.lock().unwrap().insert(
            (msg.message.identifier.clone(), msg.message.height),
            msg.clone(),
        );
        Ok(())
    }

    async fn get_decided(
        &self,
        identifier: &operator::Identifier,
        height: operator::Height,
    ) -> anyhow::Result<Option<operator::SignedMessage>> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .get(&(identifier.clone(), height))
            .cloned())
    }
}
