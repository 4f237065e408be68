use std::fmt;

use dv_consensus_crypto::{bls12_381, ByteFmt, Text, TextFmt};

use super::{PublicKey, Signature};
use crate::operator::messages::MsgHash;

/// An aggregate signature from a set of operators.
#[derive(Clone, PartialEq, Eq)]
pub struct AggregateSignature(pub(crate) bls12_381::AggregateSignature);

impl AggregateSignature {
    /// Generates a new aggregate signature from a list of signatures.
    pub fn aggregate<'a>(sigs: impl IntoIterator<Item = &'a Signature>) -> anyhow::Result<Self> {
        let sigs: Vec<_> = sigs.into_iter().map(|sig| &sig.0).collect();
        Ok(Self(bls12_381::AggregateSignature::aggregate(sigs)?))
    }

    /// Folds one more signature into this aggregate.
    pub fn add(&mut self, sig: &Signature) -> anyhow::Result<()> {
        Ok(self.0.add(&sig.0)?)
    }

    /// Folds another aggregate into this one.
    pub fn merge(&mut self, other: &Self) {
        self.0.merge(&other.0);
    }

    /// Verify a message hash against a list of public keys, one per signer.
    pub(crate) fn verify_hash<'a>(
        &self,
        hashes_and_keys: impl Iterator<Item = (MsgHash, &'a PublicKey)>,
    ) -> anyhow::Result<()> {
        let bytes_and_pks: Vec<_> = hashes_and_keys
            .map(|(hash, pk)| (ByteFmt::encode(&hash), &pk.0))
            .collect();

        let bytes_and_pks = bytes_and_pks.iter().map(|(bytes, pk)| (&bytes[..], *pk));

        Ok(self.0.verify(bytes_and_pks)?)
    }
}

impl From<&Signature> for AggregateSignature {
    fn from(sig: &Signature) -> Self {
        Self(bls12_381::AggregateSignature::from(&sig.0))
    }
}

impl ByteFmt for AggregateSignature {
    fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        ByteFmt::decode(bytes).map(Self)
    }

    fn encode(&self) -> Vec<u8> {
        ByteFmt::encode(&self.0)
    }
}

impl TextFmt for AggregateSignature {
    fn decode(text: Text) -> anyhow::Result<Self> {
        text.strip("operator:aggregate_signature:bls12_381:")?
            .decode_hex()
            .map(Self)
    }

    fn encode(&self) -> String {
        format!(
            "operator:aggregate_signature:bls12_381:{}",
            hex::encode(ByteFmt::encode(&self.0))
        )
    }
}

impl fmt::Debug for AggregateSignature {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&TextFmt::encode(self))
    }
}
