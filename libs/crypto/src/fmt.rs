//! Traits for text (human readable) and byte encodings of crypto primitives.
use anyhow::Context as _;

/// Utility for parsing human-readable text representations via TextFmt::decode.
/// It keeps a reference to the initial text and a reference to the remaining
/// unparsed text, so that parsing errors can point at the consumed prefix.
pub struct Text<'a> {
    /// Initial text.
    context: &'a str,
    /// Remaining unparsed text.
    inner: &'a str,
}

impl<'a> Text<'a> {
    /// Constructs a new unparsed text. Text is an argument to the
    /// TextFmt::decode trait method.
    pub fn new(s: &'a str) -> Self {
        Self {
            context: s,
            inner: s,
        }
    }

    /// Prefix of this text, which has been already parsed.
    fn prefix(&self) -> &'a str {
        &self.context[..self.context.len() - self.inner.len()]
    }

    /// Strips a fixed prefix from the remaining text.
    pub fn strip(mut self, prefix: &str) -> anyhow::Result<Self> {
        let Some(inner) = self.inner.strip_prefix(prefix) else {
            anyhow::bail!("{}: expected {} got {}", self.prefix(), prefix, self.inner);
        };
        self.inner = inner;
        Ok(self)
    }

    /// Parses the remaining text, assuming that it is in hex format.
    /// The parsed bytes are then converted to T, using the ByteFmt trait.
    pub fn decode_hex<T: ByteFmt>(self) -> anyhow::Result<T> {
        let raw = hex::decode(self.inner).context(self.prefix().to_owned())?;
        ByteFmt::decode(&raw).context(self.prefix().to_owned())
    }

    /// Syntax sugar for `TextFmt::decode`:
    /// instead of `<T as TextFmt>::decode(t)`, you can write
    /// `t.decode::<T>()`.
    pub fn decode<T: TextFmt>(self) -> anyhow::Result<T> {
        TextFmt::decode(self)
    }
}

/// Trait converting a type from/to a human-readable text format.
/// It is roughly equivalent to str::FromStr + std::fmt::Display,
/// but has additional requirements:
/// - `x == decode(x.encode())` has to hold.
/// - encoding collision between different types should be unlikely:
///   cryptographic keys of different roles should not parse if the
///   role prefix doesn't match.
pub trait TextFmt: Sized {
    /// Decodes the object from a text representation.
    fn decode(text: Text) -> anyhow::Result<Self>;
    /// Encodes the object to a text representation.
    fn encode(&self) -> String;
}

/// Trait converting a type from/to a sparse byte format.
/// The binary encoding is well defined rather than relying on the internals
/// of a serializer implementation, since the encoded bytes may get signed.
pub trait ByteFmt: Sized {
    /// Decodes the object from the byte representation.
    fn decode(bytes: &[u8]) -> anyhow::Result<Self>;
    /// Encodes the object to the byte representation.
    fn encode(&self) -> Vec<u8>;
}
