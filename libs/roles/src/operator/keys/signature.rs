use std::fmt;

use dv_consensus_crypto::{bls12_381, ByteFmt, Text, TextFmt};

use super::PublicKey;
use crate::operator::messages::MsgHash;

/// A signature from an operator.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(pub(crate) bls12_381::Signature);

impl Signature {
    /// Verify a message hash against a public key.
    pub fn verify_hash(&self, msg_hash: &MsgHash, pk: &PublicKey) -> anyhow::Result<()> {
        Ok(self.0.verify(&ByteFmt::encode(msg_hash), &pk.0)?)
    }
}

impl ByteFmt for Signature {
    fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        ByteFmt::decode(bytes).map(Self)
    }

    fn encode(&self) -> Vec<u8> {
        ByteFmt::encode(&self.0)
    }
}

impl TextFmt for Signature {
    fn decode(text: Text) -> anyhow::Result<Self> {
        text.strip("operator:signature:bls12_381:")?
            .decode_hex()
            .map(Self)
    }

    fn encode(&self) -> String {
        format!(
            "operator:signature:bls12_381:{}",
            hex::encode(ByteFmt::encode(&self.0))
        )
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&TextFmt::encode(self))
    }
}

impl std::hash::Hash for Signature {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        ByteFmt::encode(self).hash(state)
    }
}
