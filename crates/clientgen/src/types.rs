//! Maps descriptor types to Rust types and byte layouts.
//!
//! Named types are mapped once into a [`TypeRegistry`] keyed by descriptor
//! name. Every site that refers to a named type gets the registry path for it
//! rather than an inlined copy.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use heck::ToUpperCamelCase;

use crate::emit::code::camel_ident;
use crate::emit::code::file_stem;
use crate::error::GenerateError;
use crate::error::Result;
use crate::layout::FieldLayout;
use crate::layout::Layout;
use crate::layout::NamedLayout;
use crate::layout::VariantFieldsLayout;
use crate::layout::VariantLayout;
use crate::schema::Field;
use crate::schema::InterfaceDescriptor;
use crate::schema::NamedLayoutRef;
use crate::schema::Primitive;
use crate::schema::Serialization;
use crate::schema::TypeBody;
use crate::schema::TypeRef;
use crate::schema::VariantFields;

/// The generated module a named layout lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeModule {
	Types,
	Accounts,
	Events,
}

impl TypeModule {
	pub fn dir(self) -> &'static str {
		match self {
			Self::Types => "types",
			Self::Accounts => "accounts",
			Self::Events => "events",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredType {
	/// Name as declared in the descriptor.
	pub name: String,
	pub rust_name: String,
	pub file_stem: String,
	pub module: TypeModule,
	pub layout: NamedLayout,
	pub fixed_size: Option<usize>,
	/// Named types that close a cycle back to this one through an option.
	/// Those option edges are emitted as `Option<Box<T>>`.
	pub boxed: BTreeSet<String>,
}

/// Memoized mapping of every named layout in a descriptor. Built once per
/// generation run and shared read-only by the emitters.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
	module_path: String,
	entries: BTreeMap<String, RegisteredType>,
}

impl TypeRegistry {
	/// Map every named layout of `descriptor`. `module_path` is the Rust path
	/// the generated module tree is mounted at, such as `crate::generated`.
	pub fn build(descriptor: &InterfaceDescriptor, module_path: &str) -> Result<Self> {
		let mut modules: BTreeMap<&str, TypeModule> = BTreeMap::new();
		let mut queue: VecDeque<&str> = VecDeque::new();
		for ty in &descriptor.types {
			modules.insert(&ty.name, TypeModule::Types);
			queue.push_back(&ty.name);
		}
		for account in &descriptor.accounts {
			modules.insert(&account.name, TypeModule::Accounts);
			queue.push_back(&account.name);
		}
		for event in &descriptor.events {
			modules.insert(&event.name, TypeModule::Events);
			queue.push_back(&event.name);
		}

		let mut visited: BTreeSet<&str> = BTreeSet::new();
		let mut entries = BTreeMap::new();

		while let Some(name) = queue.pop_front() {
			if !visited.insert(name) {
				continue;
			}
			let Some(found) = descriptor.find_layout(name) else {
				return Err(GenerateError::unresolved("types", name));
			};
			let layout = map_named(descriptor, found)?;
			for referenced in layout.layouts().into_iter().flat_map(Layout::named_refs) {
				if !visited.contains(referenced) {
					if let Some((key, _)) = modules.get_key_value(referenced) {
						queue.push_back(*key);
					}
				}
			}

			let module = modules.get(name).copied().unwrap_or(TypeModule::Types);
			entries.insert(name.to_owned(), RegisteredType {
				name: name.to_owned(),
				rust_name: camel_ident(name),
				file_stem: file_stem(name),
				module,
				layout,
				fixed_size: None,
				boxed: BTreeSet::new(),
			});
		}

		check_name_collisions(&entries)?;
		compute_fixed_sizes(&mut entries);
		compute_boxed_edges(&mut entries);

		tracing::debug!(types = entries.len(), "built type registry");

		Ok(Self {
			module_path: module_path.to_owned(),
			entries,
		})
	}

	pub fn get(&self, name: &str) -> Option<&RegisteredType> {
		self.entries.get(name)
	}

	/// Registered types of one module, ordered by file name.
	pub fn in_module(&self, module: TypeModule) -> Vec<&RegisteredType> {
		let mut types: Vec<_> = self
			.entries
			.values()
			.filter(|entry| entry.module == module)
			.collect();
		types.sort_by(|a, b| a.file_stem.cmp(&b.file_stem));
		types
	}

	pub fn module_path(&self) -> &str {
		&self.module_path
	}

	/// Map a type reference that appears outside a named layout, such as an
	/// instruction argument or a constant.
	pub fn layout_of(&self, context: &str, ty: &TypeRef) -> Result<Layout> {
		map_ref(context, ty, &|name| self.entries.contains_key(name))
	}

	pub fn fixed_size(&self, layout: &Layout) -> Option<usize> {
		layout.fixed_size(&|name| self.get(name).and_then(|entry| entry.fixed_size))
	}

	/// Follow aliases until a layout that is not a named alias.
	pub fn resolve_alias<'a>(&'a self, layout: &'a Layout) -> &'a Layout {
		let mut current = layout;
		while let Layout::Named(name) = current {
			match self.get(name).map(|entry| &entry.layout) {
				Some(NamedLayout::Alias(inner)) => current = inner,
				_ => break,
			}
		}
		current
	}

	/// Path of a named type inside the generated module tree.
	pub fn named_path(&self, name: &str) -> String {
		match self.get(name) {
			Some(entry) => {
				format!(
					"{}::{}::{}",
					self.module_path,
					entry.module.dir(),
					entry.rust_name
				)
			}
			None => name.to_upper_camel_case(),
		}
	}

	/// Rust type expression for `layout`. `boxed` lists the named types whose
	/// option edges must be boxed from the current owner.
	pub fn rust_type(&self, layout: &Layout, boxed: &BTreeSet<String>) -> String {
		match layout {
			Layout::Bool => "bool".to_owned(),
			Layout::Int { width, signed } => {
				format!("{}{}", if *signed { "i" } else { "u" }, width * 8)
			}
			Layout::Float { width } => format!("f{}", width * 8),
			Layout::String => "String".to_owned(),
			Layout::Bytes => "Vec<u8>".to_owned(),
			Layout::Pubkey => "Address".to_owned(),
			Layout::Array { element, len } => format!("[{}; {len}]", self.rust_type(element, boxed)),
			Layout::Vec { element } => format!("Vec<{}>", self.rust_type(element, boxed)),
			Layout::Option { inner, tag_width } => {
				let mut inner_type = self.rust_type(inner, boxed);
				if size_refs(inner).iter().any(|name| boxed.contains(*name)) {
					inner_type = format!("Box<{inner_type}>");
				}
				if *tag_width == 1 {
					format!("Option<{inner_type}>")
				} else {
					format!("{}::codec::COption<{inner_type}>", self.module_path)
				}
			}
			Layout::Named(name) => self.named_path(name),
		}
	}

	/// Layouts of a field list, each paired with the field name.
	pub fn field_layouts(&self, context: &str, fields: &[Field]) -> Result<Vec<FieldLayout>> {
		fields
			.iter()
			.map(|field| {
				Ok(FieldLayout {
					name: field.name.clone(),
					layout: self.layout_of(&format!("{context}.{}", field.name), &field.ty)?,
				})
			})
			.collect()
	}
}

fn map_named(descriptor: &InterfaceDescriptor, found: NamedLayoutRef<'_>) -> Result<NamedLayout> {
	let exists = |name: &str| descriptor.find_layout(name).is_some();

	match found {
		NamedLayoutRef::Type(def) => {
			let context = format!("types.{}", def.name);
			if !def.generics.is_empty() {
				return Err(GenerateError::unsupported(
					context,
					"generic",
					format!(
						"generic parameters <{}> have no concrete layout",
						def.generics.join(", ")
					),
				));
			}
			check_serialization(&context, &def.serialization)?;

			match &def.body {
				TypeBody::Struct(fields) => Ok(NamedLayout::Struct(map_fields(&context, fields, &exists)?)),
				TypeBody::Tuple(items) => {
					items
						.iter()
						.enumerate()
						.map(|(index, item)| map_ref(&format!("{context}.{index}"), item, &exists))
						.collect::<Result<Vec<_>>>()
						.map(NamedLayout::Tuple)
				}
				TypeBody::Enum(variants) => {
					let mut layouts = Vec::with_capacity(variants.len());
					for variant in variants {
						let variant_context = format!("{context}.{}", variant.name);
						let fields = match &variant.fields {
							VariantFields::Unit => VariantFieldsLayout::Unit,
							VariantFields::Named(fields) => {
								VariantFieldsLayout::Named(map_fields(&variant_context, fields, &exists)?)
							}
							VariantFields::Tuple(items) => {
								VariantFieldsLayout::Tuple(
									items
										.iter()
										.enumerate()
										.map(|(index, item)| {
											map_ref(&format!("{variant_context}.{index}"), item, &exists)
										})
										.collect::<Result<Vec<_>>>()?,
								)
							}
						};
						layouts.push(VariantLayout {
							name: variant.name.clone(),
							fields,
						});
					}
					if layouts.len() > 256 {
						return Err(GenerateError::unsupported(
							context,
							"enum",
							"more than 256 variants do not fit a one byte tag",
						));
					}
					Ok(NamedLayout::Enum(layouts))
				}
				TypeBody::Alias(ty) => Ok(NamedLayout::Alias(map_ref(&context, ty, &exists)?)),
			}
		}
		NamedLayoutRef::Account(def) | NamedLayoutRef::Event(def) => {
			let namespace = if matches!(found, NamedLayoutRef::Account(_)) {
				"accounts"
			} else {
				"events"
			};
			let context = format!("{namespace}.{}", def.name);
			check_serialization(&context, &def.serialization)?;
			Ok(NamedLayout::Struct(map_fields(&context, &def.fields, &exists)?))
		}
	}
}

fn check_serialization(context: &str, serialization: &Serialization) -> Result<()> {
	match serialization {
		Serialization::Borsh => Ok(()),
		Serialization::Other(other) => {
			Err(GenerateError::unsupported(
				context,
				format!("serialization `{other}`"),
				"only borsh layouts can be generated",
			))
		}
	}
}

fn map_fields(
	context: &str,
	fields: &[Field],
	exists: &impl Fn(&str) -> bool,
) -> Result<Vec<FieldLayout>> {
	fields
		.iter()
		.map(|field| {
			Ok(FieldLayout {
				name: field.name.clone(),
				layout: map_ref(&format!("{context}.{}", field.name), &field.ty, exists)?,
			})
		})
		.collect()
}

/// Map one type reference. Named references become [`Layout::Named`] leaves;
/// the registry maps their bodies separately.
pub fn map_ref(context: &str, ty: &TypeRef, exists: &impl Fn(&str) -> bool) -> Result<Layout> {
	let layout = match ty {
		TypeRef::Primitive(primitive) => primitive_layout(context, *primitive)?,
		TypeRef::Array(element, len) => {
			Layout::Array {
				element: Box::new(map_ref(context, element, exists)?),
				len: *len,
			}
		}
		TypeRef::Vec(element) => {
			Layout::Vec {
				element: Box::new(map_ref(context, element, exists)?),
			}
		}
		TypeRef::Option(inner) => {
			Layout::Option {
				inner: Box::new(map_ref(context, inner, exists)?),
				tag_width: 1,
			}
		}
		TypeRef::COption(inner) => {
			Layout::Option {
				inner: Box::new(map_ref(context, inner, exists)?),
				tag_width: 4,
			}
		}
		TypeRef::Defined(name) => {
			if !exists(name) {
				return Err(GenerateError::unresolved(context, name.clone()));
			}
			Layout::Named(name.clone())
		}
		TypeRef::Generic(generic) => {
			return Err(GenerateError::unsupported(
				context,
				"generic",
				format!("`{generic}` has no concrete layout"),
			));
		}
	};
	Ok(layout)
}

fn primitive_layout(context: &str, primitive: Primitive) -> Result<Layout> {
	let layout = match primitive {
		Primitive::Bool => Layout::Bool,
		Primitive::F32 => Layout::Float { width: 4 },
		Primitive::F64 => Layout::Float { width: 8 },
		Primitive::String => Layout::String,
		Primitive::Bytes => Layout::Bytes,
		Primitive::Pubkey => Layout::Pubkey,
		Primitive::U256 | Primitive::I256 => {
			return Err(GenerateError::unsupported(
				context,
				primitive.name(),
				"256-bit integers have no native Rust type",
			));
		}
		other => {
			let (width, signed) = other.integer().ok_or_else(|| {
				GenerateError::unsupported(context, other.name(), "not an integer type")
			})?;
			Layout::Int { width, signed }
		}
	};
	Ok(layout)
}

fn check_name_collisions(entries: &BTreeMap<String, RegisteredType>) -> Result<()> {
	let mut seen: BTreeMap<(TypeModule, bool, &str), &str> = BTreeMap::new();
	for entry in entries.values() {
		for (is_file, key) in [(false, &entry.rust_name), (true, &entry.file_stem)] {
			if let Some(first) = seen.insert((entry.module, is_file, key.as_str()), &entry.name) {
				return Err(GenerateError::malformed(
					format!("{}.{}", entry.module.dir(), entry.name),
					format!("name collides with `{first}` after case conversion"),
				));
			}
		}
	}
	Ok(())
}

/// Fixed sizes depend on each other, so iterate until nothing changes.
fn compute_fixed_sizes(entries: &mut BTreeMap<String, RegisteredType>) {
	loop {
		let mut changed = false;
		let known: BTreeMap<String, usize> = entries
			.iter()
			.filter_map(|(name, entry)| entry.fixed_size.map(|size| (name.clone(), size)))
			.collect();
		for entry in entries.values_mut() {
			if entry.fixed_size.is_some() {
				continue;
			}
			if let Some(size) = entry.layout.fixed_size(&|name| known.get(name).copied()) {
				entry.fixed_size = Some(size);
				changed = true;
			}
		}
		if !changed {
			break;
		}
	}
}

/// Named types a layout embeds directly or behind an option, which is what
/// determines the size of the Rust type. Vectors are heap allocated and stop
/// the walk.
fn size_refs(layout: &Layout) -> Vec<&str> {
	let mut names = Vec::new();
	let mut stack = vec![layout];
	while let Some(layout) = stack.pop() {
		match layout {
			Layout::Named(name) => names.push(name.as_str()),
			Layout::Array { element, .. } => stack.push(element),
			Layout::Option { inner, .. } => stack.push(inner),
			_ => {}
		}
	}
	names
}

/// An option edge from `owner` to `target` is boxed when `target` can reach
/// `owner` again through sized edges.
fn compute_boxed_edges(entries: &mut BTreeMap<String, RegisteredType>) {
	let edges: BTreeMap<String, BTreeSet<String>> = entries
		.iter()
		.map(|(name, entry)| {
			let targets = entry
				.layout
				.layouts()
				.into_iter()
				.flat_map(size_refs)
				.map(str::to_owned)
				.collect();
			(name.clone(), targets)
		})
		.collect();

	let reaches = |from: &str, to: &str| -> bool {
		let mut visited = BTreeSet::new();
		let mut stack = vec![from];
		while let Some(node) = stack.pop() {
			if node == to {
				return true;
			}
			if !visited.insert(node) {
				continue;
			}
			if let Some(targets) = edges.get(node) {
				stack.extend(targets.iter().map(String::as_str));
			}
		}
		false
	};

	for (name, entry) in entries.iter_mut() {
		let mut boxed = BTreeSet::new();
		for layout in entry.layout.layouts() {
			let mut stack = vec![layout];
			while let Some(layout) = stack.pop() {
				match layout {
					Layout::Option { inner, .. } => {
						for target in size_refs(inner) {
							if reaches(target, name.as_str()) {
								boxed.insert(target.to_owned());
							}
						}
						stack.push(inner);
					}
					Layout::Array { element, .. } | Layout::Vec { element } => stack.push(element),
					_ => {}
				}
			}
		}
		entry.boxed = boxed;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use crate::loader::load_descriptor;

	fn registry(types: &str) -> Result<TypeRegistry> {
		let json = format!(
			r#"{{ "address": "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS",
				"metadata": {{ "name": "demo", "spec": "0.1.0" }}, "types": {types} }}"#
		);
		let descriptor = load_descriptor(&json).unwrap_or_else(|e| panic!("load failed: {e}"));
		TypeRegistry::build(&descriptor, "crate::generated")
	}

	#[test]
	fn maps_named_types_once_and_refers_by_path() {
		let registry = registry(
			r#"[
				{ "name": "Point", "type": { "kind": "struct", "fields": [
					{ "name": "x", "type": "i32" }, { "name": "y", "type": "i32" }
				] } },
				{ "name": "Segment", "type": { "kind": "struct", "fields": [
					{ "name": "from", "type": { "defined": { "name": "Point" } } },
					{ "name": "to", "type": { "defined": { "name": "Point" } } }
				] } }
			]"#,
		)
		.unwrap_or_else(|e| panic!("registry failed: {e}"));

		let segment = registry.get("Segment").unwrap_or_else(|| panic!("missing Segment"));
		let NamedLayout::Struct(fields) = &segment.layout else {
			panic!("expected struct layout");
		};
		assert_eq!(fields[0].layout, Layout::Named("Point".to_owned()));
		assert_eq!(
			registry.rust_type(&fields[1].layout, &segment.boxed),
			"crate::generated::types::Point"
		);
		assert_eq!(segment.fixed_size, Some(16));
	}

	#[test]
	fn rejects_wide_integers() {
		let err = registry(
			r#"[{ "name": "Big", "type": { "kind": "struct", "fields": [{ "name": "v", "type": "u256" }] } }]"#,
		)
		.err()
		.unwrap_or_else(|| panic!("expected error"));
		assert_eq!(err.kind(), ErrorKind::UnsupportedType);
		assert!(err.to_string().contains("types.Big.v"));
	}

	#[test]
	fn rejects_generic_types() {
		let err = registry(
			r#"[{ "name": "Wrapper", "generics": [{ "kind": "type", "name": "T" }],
				"type": { "kind": "struct", "fields": [{ "name": "inner", "type": { "generic": "T" } }] } }]"#,
		)
		.err()
		.unwrap_or_else(|| panic!("expected error"));
		assert_eq!(err.kind(), ErrorKind::UnsupportedType);
	}

	#[test]
	fn rejects_foreign_serialization() {
		let err = registry(
			r#"[{ "name": "Packed", "serialization": "bytemuck", "type": { "kind": "struct", "fields": [] } }]"#,
		)
		.err()
		.unwrap_or_else(|| panic!("expected error"));
		assert_eq!(err.kind(), ErrorKind::UnsupportedType);
	}

	#[test]
	fn boxes_option_edges_that_close_a_cycle() {
		let registry = registry(
			r#"[{ "name": "Node", "type": { "kind": "struct", "fields": [
				{ "name": "value", "type": "u8" },
				{ "name": "next", "type": { "option": { "defined": { "name": "Node" } } } }
			] } }]"#,
		)
		.unwrap_or_else(|e| panic!("registry failed: {e}"));

		let node = registry.get("Node").unwrap_or_else(|| panic!("missing Node"));
		let NamedLayout::Struct(fields) = &node.layout else {
			panic!("expected struct layout");
		};
		assert_eq!(
			registry.rust_type(&fields[1].layout, &node.boxed),
			"Option<Box<crate::generated::types::Node>>"
		);
		assert_eq!(node.fixed_size, None);
	}

	#[test]
	fn keeps_nested_options_distinct() {
		let registry = registry(
			r#"[{ "name": "Maybe", "type": { "kind": "type", "alias": { "option": { "option": "u16" } } } }]"#,
		)
		.unwrap_or_else(|e| panic!("registry failed: {e}"));

		let maybe = registry.get("Maybe").unwrap_or_else(|| panic!("missing Maybe"));
		let NamedLayout::Alias(layout) = &maybe.layout else {
			panic!("expected alias layout");
		};
		assert_eq!(registry.rust_type(layout, &maybe.boxed), "Option<Option<u16>>");
	}
}
