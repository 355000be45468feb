//! Emits account and event codecs.
//!
//! Each layout becomes a struct with the declared fields, a `Codec` impl
//! for the fields alone, and inherent `encode`/`decode` methods that add the
//! discriminator. `decode` is strict about trailing bytes; `decode_prefix`
//! is not, for accounts that were allocated larger than their layout.

use super::code::CodeBuffer;
use super::code::array_literal;
use super::types::field_specs;
use super::types::uses_address;
use super::types::write_imports;
use super::types::write_struct;
use super::types::write_struct_codec;
use crate::error::GenerateError;
use crate::error::Result;
use crate::layout::NamedLayout;
use crate::schema::AccountDef;
use crate::types::RegisteredType;
use crate::types::TypeRegistry;

pub fn render_account(
	registry: &TypeRegistry,
	def: &AccountDef,
	entry: &RegisteredType,
) -> Result<String> {
	let NamedLayout::Struct(layouts) = &entry.layout else {
		return Err(GenerateError::malformed(
			format!("{}.{}", entry.module.dir(), def.name),
			"account layouts must be structs",
		));
	};

	let specs = field_specs(&def.fields, layouts);
	let address = layouts.iter().any(|field| uses_address(&field.layout));
	let rust_name = &entry.rust_name;
	let len = entry.fixed_size.map(|size| size + def.discriminator.len());

	let mut buffer = CodeBuffer::file(&[]);
	write_imports(&mut buffer, registry, address, &[
		"Codec",
		"LayoutMismatch",
		"strip_discriminator",
	]);
	write_struct(&mut buffer, registry, rust_name, &def.docs, &specs, &entry.boxed);
	buffer.blank();

	buffer.block(format!("impl {rust_name} {{"), "}", |b| {
		b.line("/// Bytes that prefix the encoded fields.");
		b.line(format!(
			"pub const DISCRIMINATOR: &'static [u8] = &{};",
			array_literal(&def.discriminator)
		));
		b.line("/// Encoded size including the discriminator, when every value of the");
		b.line("/// layout has the same size.");
		match len {
			Some(len) => b.line(format!("pub const LEN: Option<usize> = Some({len});")),
			None => b.line("pub const LEN: Option<usize> = None;"),
		}
		b.blank();
		b.line("/// Encode the discriminator and the fields. Fails only when a string,");
		b.line("/// byte string or vector is too long for its length prefix.");
		b.block("pub fn encode(&self) -> Result<Vec<u8>, LayoutMismatch> {", "}", |b| {
			match len {
				Some(len) => b.line(format!("let mut out = Vec::with_capacity({len});")),
				None => b.line("let mut out = Vec::new();"),
			}
			b.line("out.extend_from_slice(Self::DISCRIMINATOR);");
			b.line("self.encode_into(&mut out)?;");
			b.line("Ok(out)");
		});
		b.blank();
		b.line("/// Decode an account whose data is exactly this layout.");
		b.block(
			"pub fn decode(bytes: &[u8]) -> Result<Self, LayoutMismatch> {",
			"}",
			|b| {
				b.line("let (value, consumed) = Self::decode_prefix(bytes)?;");
				b.block("if consumed != bytes.len() {", "}", |b| {
					b.block("return Err(LayoutMismatch::TrailingBytes {", "});", |b| {
						b.line("remaining: bytes.len() - consumed,");
					});
				});
				b.line("Ok(value)");
			},
		);
		b.blank();
		b.line("/// Decode the layout from the front of `bytes`, returning the value and");
		b.line("/// the number of bytes read.");
		b.block(
			"pub fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize), LayoutMismatch> {",
			"}",
			|b| {
				b.line("let mut input = bytes;");
				b.line("strip_discriminator(&mut input, Self::DISCRIMINATOR)?;");
				b.line("let value = <Self as Codec>::decode_from(&mut input)?;");
				b.line("Ok((value, bytes.len() - input.len()))");
			},
		);
	});
	buffer.blank();
	write_struct_codec(&mut buffer, rust_name, &specs);

	Ok(buffer.finish())
}
