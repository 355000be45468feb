//! Byte-level layout descriptions.
//!
//! A [`Layout`] is what the type mapper hands to every other stage: the
//! emitters turn it into codec calls and comments, the reference runtime
//! interprets it directly. All integers are little-endian. Strings, byte
//! strings and vectors carry a `u32` length prefix.

use std::fmt;

/// Layout of a single type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layout {
	Bool,
	Int { width: usize, signed: bool },
	Float { width: usize },
	String,
	Bytes,
	Pubkey,
	Array { element: Box<Layout>, len: usize },
	Vec { element: Box<Layout> },
	/// A presence tag of `tag_width` bytes followed by the value when the tag
	/// is one. Regular options use a one byte tag, `COption` uses four.
	Option { inner: Box<Layout>, tag_width: usize },
	/// A reference to a named layout in the type registry.
	Named(String),
}

pub const LENGTH_PREFIX: usize = 4;
pub const ENUM_TAG: usize = 1;

impl Layout {
	/// Size in bytes when every value of this layout encodes to the same
	/// length. `named` resolves the size of named layouts.
	pub fn fixed_size(&self, named: &impl Fn(&str) -> Option<usize>) -> Option<usize> {
		match self {
			Self::Bool => Some(1),
			Self::Int { width, .. } | Self::Float { width } => Some(*width),
			Self::Pubkey => Some(32),
			Self::String | Self::Bytes | Self::Vec { .. } | Self::Option { .. } => None,
			Self::Array { element, len } => element.fixed_size(named).map(|size| size * len),
			Self::Named(name) => named(name),
		}
	}

	/// Names of the layouts this one refers to.
	pub fn named_refs(&self) -> Vec<&str> {
		let mut names = Vec::new();
		let mut stack = vec![self];
		while let Some(layout) = stack.pop() {
			match layout {
				Self::Named(name) => names.push(name.as_str()),
				Self::Array { element, .. } | Self::Vec { element } => stack.push(element),
				Self::Option { inner, .. } => stack.push(inner),
				_ => {}
			}
		}
		names
	}
}

impl fmt::Display for Layout {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bool => f.write_str("bool (1 byte)"),
			Self::Int { width, signed } => {
				write!(f, "{}{} le", if *signed { "i" } else { "u" }, width * 8)
			}
			Self::Float { width } => write!(f, "f{} le", width * 8),
			Self::String => f.write_str("u32 length + utf-8"),
			Self::Bytes => f.write_str("u32 length + bytes"),
			Self::Pubkey => f.write_str("pubkey (32 bytes)"),
			Self::Array { element, len } => write!(f, "[{element}; {len}]"),
			Self::Vec { element } => write!(f, "u32 length + [{element}]"),
			Self::Option { inner, tag_width } => write!(f, "u{} tag + {inner}", tag_width * 8),
			Self::Named(name) => f.write_str(name),
		}
	}
}

/// Layout of a named type, as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedLayout {
	Struct(Vec<FieldLayout>),
	Tuple(Vec<Layout>),
	/// A one byte variant index followed by the variant's fields.
	Enum(Vec<VariantLayout>),
	Alias(Layout),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
	pub name: String,
	pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantLayout {
	pub name: String,
	pub fields: VariantFieldsLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantFieldsLayout {
	Unit,
	Named(Vec<FieldLayout>),
	Tuple(Vec<Layout>),
}

impl VariantFieldsLayout {
	pub fn layouts(&self) -> Vec<&Layout> {
		match self {
			Self::Unit => Vec::new(),
			Self::Named(fields) => fields.iter().map(|field| &field.layout).collect(),
			Self::Tuple(items) => items.iter().collect(),
		}
	}
}

impl NamedLayout {
	pub fn layouts(&self) -> Vec<&Layout> {
		match self {
			Self::Struct(fields) => fields.iter().map(|field| &field.layout).collect(),
			Self::Tuple(items) => items.iter().collect(),
			Self::Enum(variants) => {
				variants
					.iter()
					.flat_map(|variant| variant.fields.layouts())
					.collect()
			}
			Self::Alias(layout) => vec![layout],
		}
	}

	pub fn fixed_size(&self, named: &impl Fn(&str) -> Option<usize>) -> Option<usize> {
		let sum = |layouts: Vec<&Layout>| {
			layouts
				.into_iter()
				.map(|layout| layout.fixed_size(named))
				.sum::<Option<usize>>()
		};

		match self {
			Self::Struct(_) | Self::Tuple(_) => sum(self.layouts()),
			Self::Alias(layout) => layout.fixed_size(named),
			Self::Enum(variants) => {
				// Only enums whose variants all encode to the same size are fixed.
				let mut size = None;
				for variant in variants {
					let variant_size = sum(variant.fields.layouts())?;
					match size {
						None => size = Some(variant_size),
						Some(existing) if existing == variant_size => {}
						Some(_) => return None,
					}
				}
				Some(ENUM_TAG + size.unwrap_or(0))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn no_named(_: &str) -> Option<usize> {
		None
	}

	#[test]
	fn fixed_sizes_follow_the_wire_format() {
		let array = Layout::Array {
			element: Box::new(Layout::Int {
				width: 2,
				signed: false,
			}),
			len: 3,
		};
		assert_eq!(array.fixed_size(&no_named), Some(6));
		assert_eq!(Layout::Pubkey.fixed_size(&no_named), Some(32));
		assert_eq!(Layout::String.fixed_size(&no_named), None);

		let option = Layout::Option {
			inner: Box::new(Layout::Bool),
			tag_width: 1,
		};
		assert_eq!(option.fixed_size(&no_named), None);
	}

	#[test]
	fn enums_are_fixed_only_when_variants_agree() {
		let unit = NamedLayout::Enum(vec![
			VariantLayout {
				name: "A".to_owned(),
				fields: VariantFieldsLayout::Unit,
			},
			VariantLayout {
				name: "B".to_owned(),
				fields: VariantFieldsLayout::Unit,
			},
		]);
		assert_eq!(unit.fixed_size(&no_named), Some(1));

		let mixed = NamedLayout::Enum(vec![
			VariantLayout {
				name: "A".to_owned(),
				fields: VariantFieldsLayout::Unit,
			},
			VariantLayout {
				name: "B".to_owned(),
				fields: VariantFieldsLayout::Tuple(vec![Layout::Bool]),
			},
		]);
		assert_eq!(mixed.fixed_size(&no_named), None);
	}

	#[test]
	fn describes_layouts_for_comments() {
		let layout = Layout::Option {
			inner: Box::new(Layout::Int {
				width: 8,
				signed: false,
			}),
			tag_width: 4,
		};
		assert_eq!(layout.to_string(), "u32 tag + u64 le");
	}
}
