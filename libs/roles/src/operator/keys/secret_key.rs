use std::{fmt, sync::Arc};

use dv_consensus_crypto::{bls12_381, ByteFmt, Text, TextFmt};

use super::{AggregateSignature, PublicKey, Signature};
use crate::operator::messages::{ConsensusMessage, MsgHash, OperatorId, SignedMessage};

/// A secret key for the operator role.
/// SecretKey is put into an Arc, so that we can clone it,
/// without copying the secret all over the RAM.
#[derive(Clone)]
pub struct SecretKey(pub(crate) Arc<bls12_381::SecretKey>);

impl SecretKey {
    /// Generates a secret key from a cryptographically-secure entropy source.
    pub fn generate() -> Self {
        Self(Arc::new(bls12_381::SecretKey::generate()))
    }

    /// Public key corresponding to this secret key.
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.public())
    }

    /// Signs a consensus message on behalf of the given operator.
    pub fn sign_msg(&self, signer: OperatorId, message: ConsensusMessage) -> SignedMessage {
        let sig = self.sign_hash(&message.hash());
        SignedMessage {
            message,
            signers: vec![signer],
            signature: AggregateSignature::from(&sig),
        }
    }

    /// Signs a message hash.
    pub fn sign_hash(&self, msg_hash: &MsgHash) -> Signature {
        Signature(self.0.sign(&ByteFmt::encode(msg_hash)))
    }
}

impl ByteFmt for SecretKey {
    fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        ByteFmt::decode(bytes).map(Arc::new).map(Self)
    }

    fn encode(&self) -> Vec<u8> {
        ByteFmt::encode(&*self.0)
    }
}

impl TextFmt for SecretKey {
    fn decode(text: Text) -> anyhow::Result<Self> {
        text.strip("operator:secret:bls12_381:")?
            .decode_hex()
            .map(Arc::new)
            .map(Self)
    }

    fn encode(&self) -> String {
        format!(
            "operator:secret:bls12_381:{}",
            hex::encode(ByteFmt::encode(&*self.0))
        )
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        // The secret itself should never be logged.
        write!(fmt, "<secret for {}>", TextFmt::encode(&self.public()))
    }
}
