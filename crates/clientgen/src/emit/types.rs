//! Emits the shared types of `<out>/types/`.

use std::collections::BTreeSet;

use super::code::CodeBuffer;
use super::code::camel_ident;
use super::code::snake_ident;
use crate::error::GenerateError;
use crate::error::Result;
use crate::layout::FieldLayout;
use crate::layout::Layout;
use crate::layout::NamedLayout;
use crate::layout::VariantFieldsLayout;
use crate::schema::EnumVariant;
use crate::schema::Field;
use crate::schema::InterfaceDescriptor;
use crate::schema::TypeBody;
use crate::schema::VariantFields;
use crate::types::RegisteredType;
use crate::types::TypeRegistry;

/// A field to emit, with its docs and wire layout.
pub struct FieldSpec<'a> {
	pub name: &'a str,
	pub docs: &'a [String],
	pub layout: &'a Layout,
}

/// Pair layouts with the declared fields they came from.
pub fn field_specs<'a>(fields: &'a [Field], layouts: &'a [FieldLayout]) -> Vec<FieldSpec<'a>> {
	fields
		.iter()
		.zip(layouts)
		.map(|(field, layout)| {
			FieldSpec {
				name: &field.name,
				docs: &field.docs,
				layout: &layout.layout,
			}
		})
		.collect()
}

/// Whether `layout` spells out `Address` in its Rust type.
pub fn uses_address(layout: &Layout) -> bool {
	let mut stack = vec![layout];
	while let Some(layout) = stack.pop() {
		match layout {
			Layout::Pubkey => return true,
			Layout::Array { element, .. } | Layout::Vec { element } => stack.push(element),
			Layout::Option { inner, .. } => stack.push(inner),
			_ => {}
		}
	}
	false
}

/// Write the `use` lines a generated type file needs.
pub fn write_imports(buffer: &mut CodeBuffer, registry: &TypeRegistry, address: bool, codec: &[&str]) {
	if address {
		buffer.line("use solana_address::Address;");
		buffer.blank();
	}
	if !codec.is_empty() {
		for item in codec {
			buffer.line(format!("use {}::codec::{item};", registry.module_path()));
		}
		buffer.blank();
	}
}

pub fn render_type(
	registry: &TypeRegistry,
	descriptor: &InterfaceDescriptor,
	entry: &RegisteredType,
) -> Result<String> {
	let def = descriptor
		.find_type(&entry.name)
		.ok_or_else(|| GenerateError::unresolved("types", entry.name.clone()))?;

	let address = entry.layout.layouts().into_iter().any(uses_address);
	let mut buffer = CodeBuffer::file(&[]);

	match (&entry.layout, &def.body) {
		(NamedLayout::Alias(layout), _) => {
			write_imports(&mut buffer, registry, address, &[]);
			buffer.docs(&def.docs);
			buffer.line(format!(
				"pub type {} = {};",
				entry.rust_name,
				registry.rust_type(layout, &entry.boxed)
			));
		}
		(NamedLayout::Struct(layouts), TypeBody::Struct(fields)) => {
			write_imports(&mut buffer, registry, address, &["Codec", "LayoutMismatch"]);
			let specs = field_specs(fields, layouts);
			write_struct(&mut buffer, registry, &entry.rust_name, &def.docs, &specs, &entry.boxed);
			buffer.blank();
			write_struct_codec(&mut buffer, &entry.rust_name, &specs);
		}
		(NamedLayout::Tuple(layouts), TypeBody::Tuple(_)) => {
			write_imports(&mut buffer, registry, address, &["Codec", "LayoutMismatch"]);
			write_tuple_struct(&mut buffer, registry, entry, &def.docs, layouts);
		}
		(NamedLayout::Enum(variants), TypeBody::Enum(defs)) => {
			write_imports(&mut buffer, registry, address, &["Codec", "LayoutMismatch"]);
			write_enum(&mut buffer, registry, entry, &def.docs, variants, defs);
		}
		_ => {
			return Err(GenerateError::malformed(
				format!("types.{}", entry.name),
				"layout does not match the declared body",
			));
		}
	}

	Ok(buffer.finish())
}

/// Write a struct with named fields. Each field documents its wire layout.
pub fn write_struct(
	buffer: &mut CodeBuffer,
	registry: &TypeRegistry,
	rust_name: &str,
	docs: &[String],
	fields: &[FieldSpec<'_>],
	boxed: &BTreeSet<String>,
) {
	buffer.docs(docs);
	buffer.line("#[derive(Debug, Clone, PartialEq)]");
	if fields.is_empty() {
		buffer.line(format!("pub struct {rust_name} {{}}"));
		return;
	}
	buffer.block(format!("pub struct {rust_name} {{"), "}", |b| {
		for field in fields {
			b.docs(field.docs);
			if !field.docs.is_empty() {
				b.line("///");
			}
			b.line(format!("/// Layout: `{}`.", field.layout));
			b.line(format!(
				"pub {}: {},",
				snake_ident(field.name),
				registry.rust_type(field.layout, boxed)
			));
		}
	});
}

/// Implement `Codec` for a struct: fields in declaration order.
pub fn write_struct_codec(buffer: &mut CodeBuffer, rust_name: &str, fields: &[FieldSpec<'_>]) {
	buffer.block(format!("impl Codec for {rust_name} {{"), "}", |b| {
		let out = if fields.is_empty() { "_out" } else { "out" };
		b.block(
			format!("fn encode_into(&self, {out}: &mut Vec<u8>) -> Result<(), LayoutMismatch> {{"),
			"}",
			|b| {
				for field in fields {
					b.line(format!("self.{}.encode_into(out)?;", snake_ident(field.name)));
				}
				b.line("Ok(())");
			},
		);
		b.blank();
		let input = if fields.is_empty() { "_input" } else { "input" };
		b.block(
			format!("fn decode_from({input}: &mut &[u8]) -> Result<Self, LayoutMismatch> {{"),
			"}",
			|b| {
				if fields.is_empty() {
					b.line("Ok(Self {})");
					return;
				}
				b.block("Ok(Self {", "})", |b| {
					for field in fields {
						b.line(format!("{}: Codec::decode_from(input)?,", snake_ident(field.name)));
					}
				});
			},
		);
	});
}

fn write_tuple_struct(
	buffer: &mut CodeBuffer,
	registry: &TypeRegistry,
	entry: &RegisteredType,
	docs: &[String],
	layouts: &[Layout],
) {
	let rust_name = &entry.rust_name;
	let types: Vec<String> = layouts
		.iter()
		.map(|layout| format!("pub {}", registry.rust_type(layout, &entry.boxed)))
		.collect();

	buffer.docs(docs);
	for (index, layout) in layouts.iter().enumerate() {
		buffer.line(format!("/// Field {index} layout: `{layout}`."));
	}
	buffer.line("#[derive(Debug, Clone, PartialEq)]");
	buffer.line(format!("pub struct {rust_name}({});", types.join(", ")));
	buffer.blank();

	buffer.block(format!("impl Codec for {rust_name} {{"), "}", |b| {
		let out = if layouts.is_empty() { "_out" } else { "out" };
		b.block(
			format!("fn encode_into(&self, {out}: &mut Vec<u8>) -> Result<(), LayoutMismatch> {{"),
			"}",
			|b| {
				for index in 0..layouts.len() {
					b.line(format!("self.{index}.encode_into(out)?;"));
				}
				b.line("Ok(())");
			},
		);
		b.blank();
		b.block(
			"fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {",
			"}",
			|b| {
				b.block("Ok(Self(", "))", |b| {
					for _ in layouts {
						b.line("Codec::decode_from(input)?,");
					}
				});
			},
		);
	});
}

fn write_enum(
	buffer: &mut CodeBuffer,
	registry: &TypeRegistry,
	entry: &RegisteredType,
	docs: &[String],
	variants: &[crate::layout::VariantLayout],
	defs: &[EnumVariant],
) {
	let rust_name = &entry.rust_name;
	let boxed = &entry.boxed;

	buffer.docs(docs);
	buffer.line("#[derive(Debug, Clone, PartialEq)]");
	buffer.block(format!("pub enum {rust_name} {{"), "}", |b| {
		for (variant, def) in variants.iter().zip(defs) {
			b.docs(&def.docs);
			let name = camel_ident(&variant.name);
			match (&variant.fields, &def.fields) {
				(VariantFieldsLayout::Unit, _) => b.line(format!("{name},")),
				(VariantFieldsLayout::Tuple(items), _) => {
					let types: Vec<String> = items
						.iter()
						.map(|layout| registry.rust_type(layout, boxed))
						.collect();
					b.line(format!("{name}({}),", types.join(", ")));
				}
				(VariantFieldsLayout::Named(fields), def_fields) => {
					let field_docs: Vec<&[String]> = match def_fields {
						VariantFields::Named(def_fields) => def_fields.iter().map(|f| f.docs.as_slice()).collect(),
						_ => Vec::new(),
					};
					b.block(format!("{name} {{"), "},", |b| {
						for (index, field) in fields.iter().enumerate() {
							if let Some(docs) = field_docs.get(index) {
								b.docs(docs);
							}
							b.line(format!(
								"{}: {},",
								snake_ident(&field.name),
								registry.rust_type(&field.layout, boxed)
							));
						}
					});
				}
			}
		}
	});
	buffer.blank();

	buffer.block(format!("impl Codec for {rust_name} {{"), "}", |b| {
		let out = if variants.is_empty() { "_out" } else { "out" };
		b.block(
			format!("fn encode_into(&self, {out}: &mut Vec<u8>) -> Result<(), LayoutMismatch> {{"),
			"}",
			|b| {
				if variants.is_empty() {
					b.line("match *self {}");
					return;
				}
				b.block("match self {", "}", |b| {
					for (tag, variant) in variants.iter().enumerate() {
						let name = camel_ident(&variant.name);
						let (pattern, bindings) = variant_pattern(&name, &variant.fields);
						b.block(format!("Self::{pattern} => {{"), "}", |b| {
							b.line(format!("out.push({tag});"));
							for binding in &bindings {
								b.line(format!("{binding}.encode_into(out)?;"));
							}
						});
					}
				});
				b.line("Ok(())");
			},
		);
		b.blank();
		b.block(
			"fn decode_from(input: &mut &[u8]) -> Result<Self, LayoutMismatch> {",
			"}",
			|b| {
				b.block("match u8::decode_from(input)? {", "}", |b| {
					for (tag, variant) in variants.iter().enumerate() {
						let name = camel_ident(&variant.name);
						match &variant.fields {
							VariantFieldsLayout::Unit => b.line(format!("{tag} => Ok(Self::{name}),")),
							VariantFieldsLayout::Tuple(items) => {
								b.block(format!("{tag} => Ok(Self::{name}("), ")),", |b| {
									for _ in items {
										b.line("Codec::decode_from(input)?,");
									}
								});
							}
							VariantFieldsLayout::Named(fields) => {
								b.block(format!("{tag} => Ok(Self::{name} {{"), "}),", |b| {
									for field in fields {
										b.line(format!(
											"{}: Codec::decode_from(input)?,",
											snake_ident(&field.name)
										));
									}
								});
							}
						}
					}
					b.line("tag => Err(LayoutMismatch::InvalidTag {");
					b.line("    tag: u32::from(tag),");
					b.line("}),");
				});
			},
		);
	});
}

/// A match pattern for a variant and the bindings it introduces, in wire
/// order.
fn variant_pattern(name: &str, fields: &VariantFieldsLayout) -> (String, Vec<String>) {
	match fields {
		VariantFieldsLayout::Unit => (name.to_owned(), Vec::new()),
		VariantFieldsLayout::Tuple(items) => {
			let bindings: Vec<String> = (0..items.len()).map(|index| format!("field_{index}")).collect();
			(format!("{name}({})", bindings.join(", ")), bindings)
		}
		VariantFieldsLayout::Named(fields) => {
			let bindings: Vec<String> = fields.iter().map(|field| snake_ident(&field.name)).collect();
			(format!("{name} {{ {} }}", bindings.join(", ")), bindings)
		}
	}
}
