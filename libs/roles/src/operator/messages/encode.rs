//! Canonical byte encoding for signable/hashable message types.
//!
//! The encoding is pinned to a fixed bincode configuration so that message
//! roots stay stable across releases. Any change here invalidates preexisting
//! signatures.
use bincode::config;

const LIMIT_16M: usize = 0x100_0000;

pub(crate) const CANONICAL: config::Configuration<
    config::BigEndian,
    config::Varint,
    config::Limit<LIMIT_16M>,
> = config::standard()
    .with_limit::<LIMIT_16M>()
    .with_big_endian()
    .with_variable_int_encoding();

/// Encodes a message with the canonical configuration.
pub(crate) fn canonical<T: bincode::Encode>(t: &T) -> Vec<u8> {
    // Encoding to a vec only fails on a malformed custom Encode impl;
    // all types passed here use derived impls.
    bincode::encode_to_vec(t, CANONICAL).expect("canonical encoding failed")
}

/// Decodes a message, rejecting trailing garbage.
pub(crate) fn decode_whole<T: bincode::de::Decode<()>>(bytes: &[u8]) -> anyhow::Result<T> {
    let (t, consumed) = bincode::decode_from_slice(bytes, CANONICAL)?;
    anyhow::ensure!(consumed == bytes.len(), "leftover bytes");
    Ok(t)
}
