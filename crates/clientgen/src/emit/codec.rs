//! The `codec.rs` module written into every generated client.
//!
//! It is fixed text: the other generated files only call into it, so its
//! contents never depend on the descriptor.

use super::code::GENERATED_HEADER;

const CODEC_BODY: &str = r##"//!
//! Wire codec shared by the generated client. Integers are little-endian.
//! Strings, byte strings and vectors carry a `u32` length prefix, options a
//! `u8` presence tag and [`COption`] a `u32` one. Enums start with a `u8`
//! variant index.

use core::fmt;

use solana_address::Address;

/// Bytes that do not match the layout they are decoded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutMismatch {
    /// The input ended before the layout did.
    UnexpectedEnd { needed: usize, remaining: usize },
    /// The leading discriminator belongs to a different layout.
    Discriminator {
        expected: &'static [u8],
        found: Vec<u8>,
    },
    /// Bytes were left over after the layout was decoded.
    TrailingBytes { remaining: usize },
    /// A bool, option or enum tag outside its declared range.
    InvalidTag { tag: u32 },
    InvalidUtf8,
    /// A string, byte string or vector too long for its `u32` length prefix.
    LengthOverflow { len: usize },
}

impl fmt::Display for LayoutMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd { needed, remaining } => {
                write!(f, "expected {needed} more byte(s), found {remaining}")
            }
            Self::Discriminator { expected, found } => {
                write!(f, "discriminator mismatch, expected {expected:?}, found {found:?}")
            }
            Self::TrailingBytes { remaining } => {
                write!(f, "{remaining} trailing byte(s) after the declared layout")
            }
            Self::InvalidTag { tag } => write!(f, "invalid tag {tag}"),
            Self::InvalidUtf8 => f.write_str("string is not valid UTF-8"),
            Self::LengthOverflow { len } => {
                write!(f, "length {len} does not fit a u32 length prefix")
            }
        }
    }
}

impl std::error::Error for LayoutMismatch {}

/// Types with a borsh compatible wire encoding.
pub trait Codec: Sized {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch>;

    /// Decode a value from the front of `input`, advancing it past the bytes
    /// that were read.
    fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch>;

    fn encode_to_vec(&self) -> Result<Vec<u8>, LayoutMismatch> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }
}

/// Decode a value that must span all of `bytes`.
pub fn decode_exact<T: Codec>(bytes: &[u8]) -> Result<T, LayoutMismatch> {
    let mut input = bytes;
    let value = T::decode_from(&mut input)?;
    expect_end(input)?;
    Ok(value)
}

pub fn take<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8], LayoutMismatch> {
    if input.len() < len {
        return Err(LayoutMismatch::UnexpectedEnd {
            needed: len,
            remaining: input.len(),
        });
    }
    let (head, rest) = input.split_at(len);
    *input = rest;
    Ok(head)
}

pub fn strip_discriminator(
    input: &mut &[u8],
    expected: &'static [u8],
) -> Result<(), LayoutMismatch> {
    let found = take(input, expected.len())?;
    if found != expected {
        return Err(LayoutMismatch::Discriminator {
            expected,
            found: found.to_vec(),
        });
    }
    Ok(())
}

pub fn expect_end(input: &[u8]) -> Result<(), LayoutMismatch> {
    if input.is_empty() {
        Ok(())
    } else {
        Err(LayoutMismatch::TrailingBytes {
            remaining: input.len(),
        })
    }
}

fn encode_len(len: usize, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
    let prefix = u32::try_from(len).map_err(|_| LayoutMismatch::LengthOverflow { len })?;
    prefix.encode_into(out)
}

fn decode_len(input: &mut &[u8]) -> Result<usize, LayoutMismatch> {
    let len = u32::decode_from(input)?;
    Ok(len as usize)
}

macro_rules! impl_codec_for_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Codec for $ty {
                fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
                    out.extend_from_slice(&self.to_le_bytes());
                    Ok(())
                }

                fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {
                    let mut bytes = [0u8; core::mem::size_of::<$ty>()];
                    bytes.copy_from_slice(take(input, core::mem::size_of::<$ty>())?);
                    Ok(<$ty>::from_le_bytes(bytes))
                }
            }
        )*
    };
}

impl_codec_for_number!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64);

impl Codec for bool {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
        out.push(u8::from(*self));
        Ok(())
    }

    fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {
        match u8::decode_from(input)? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(LayoutMismatch::InvalidTag {
                tag: u32::from(tag),
            }),
        }
    }
}

impl Codec for String {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
        encode_len(self.len(), out)?;
        out.extend_from_slice(self.as_bytes());
        Ok(())
    }

    fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {
        let len = decode_len(input)?;
        let bytes = take(input, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| LayoutMismatch::InvalidUtf8)
    }
}

impl<T: Codec> Codec for Vec<T> {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
        encode_len(self.len(), out)?;
        for item in self {
            item.encode_into(out)?;
        }
        Ok(())
    }

    fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {
        let len = decode_len(input)?;
        let mut items = Vec::with_capacity(len.min(input.len()));
        for _ in 0..len {
            items.push(T::decode_from(input)?);
        }
        Ok(items)
    }
}

impl<T: Codec> Codec for Option<T> {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
        match self {
            None => {
                out.push(0);
                Ok(())
            }
            Some(value) => {
                out.push(1);
                value.encode_into(out)
            }
        }
    }

    fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {
        match u8::decode_from(input)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode_from(input)?)),
            tag => Err(LayoutMismatch::InvalidTag {
                tag: u32::from(tag),
            }),
        }
    }
}

impl<T: Codec> Codec for Box<T> {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
        self.as_ref().encode_into(out)
    }

    fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {
        T::decode_from(input).map(Box::new)
    }
}

impl<T: Codec, const N: usize> Codec for [T; N] {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
        for item in self {
            item.encode_into(out)?;
        }
        Ok(())
    }

    fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::decode_from(input)?);
        }
        items.try_into().map_err(|_| LayoutMismatch::UnexpectedEnd {
            needed: N,
            remaining: 0,
        })
    }
}

impl Codec for Address {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
        out.extend_from_slice(self.as_ref());
        Ok(())
    }

    fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(take(input, 32)?);
        Ok(Address::new_from_array(bytes))
    }
}

/// An optional value with a four byte presence tag, as used by the SPL
/// token programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct COption<T>(pub Option<T>);

impl<T> From<Option<T>> for COption<T> {
    fn from(value: Option<T>) -> Self {
        Self(value)
    }
}

impl<T: Codec> Codec for COption<T> {
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), LayoutMismatch> {
        match &self.0 {
            None => 0u32.encode_into(out),
            Some(value) => {
                1u32.encode_into(out)?;
                value.encode_into(out)
            }
        }
    }

    fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {
        match u32::decode_from(input)? {
            0 => Ok(Self(None)),
            1 => Ok(Self(Some(T::decode_from(input)?))),
            tag => Err(LayoutMismatch::InvalidTag { tag }),
        }
    }
}

/// An account passed to an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub const fn new(address: Address, is_signer: bool, is_writable: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable,
        }
    }
}

/// A built instruction: the program to invoke, its accounts in order, and
/// the encoded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPayload {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// An instruction that could not be built from its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No bump seed gives a valid address for the derived account. Seeds
    /// longer than 32 bytes always end here.
    Derivation { account: &'static str },
    /// The arguments do not fit their wire layout.
    Encode(LayoutMismatch),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Derivation { account } => {
                write!(f, "cannot derive the address of `{account}` from its seeds")
            }
            Self::Encode(err) => write!(f, "cannot encode the arguments: {err}"),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<LayoutMismatch> for BuildError {
    fn from(err: LayoutMismatch) -> Self {
        Self::Encode(err)
    }
}
"##;

/// Render `codec.rs`.
pub fn render() -> String {
	format!("{GENERATED_HEADER}\n{CODEC_BODY}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn starts_with_the_generated_header() {
		let text = render();
		assert!(text.starts_with("//! This file is generated by clientgen. Do not edit.\n//!\n"));
		assert!(text.contains("pub trait Codec: Sized"));
		assert!(text.ends_with("}\n"));
	}

	#[test]
	fn never_panics_on_long_collections() {
		let text = render();
		assert!(!text.contains(".expect("));
		assert!(!text.contains(".unwrap()"));
		assert!(text.contains("LayoutMismatch::LengthOverflow { len }"));
	}

	#[test]
	fn account_metas_do_not_require_copy_addresses() {
		let text = render();
		let meta = text
			.find("pub struct AccountMeta")
			.unwrap_or_else(|| panic!("AccountMeta is missing"));
		let derive = text[..meta]
			.rfind("#[derive(")
			.unwrap_or_else(|| panic!("AccountMeta has no derive"));
		assert_eq!(&text[derive..meta], "#[derive(Debug, Clone, PartialEq, Eq, Hash)]\n");
	}
}
