//! Lowers a serialized descriptor into the validated [`InterfaceDescriptor`].

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use solana_address::Address;

use crate::error::GenerateError;
use crate::error::Result;
use crate::idl::RawAccount;
use crate::idl::RawAccountItem;
use crate::idl::RawArrayLen;
use crate::idl::RawConstant;
use crate::idl::RawDefined;
use crate::idl::RawDefinedFields;
use crate::idl::RawEnumVariant;
use crate::idl::RawField;
use crate::idl::RawIdl;
use crate::idl::RawInstruction;
use crate::idl::RawInstructionAccount;
use crate::idl::RawMetadata;
use crate::idl::RawSeed;
use crate::idl::RawType;
use crate::idl::RawTypeDef;
use crate::idl::RawTypeDefBody;
use crate::idl::SUPPORTED_SPEC_VERSION;
use crate::schema::AccountDef;
use crate::schema::AccountRequirement;
use crate::schema::ConstantDef;
use crate::schema::EnumVariant;
use crate::schema::ErrorDef;
use crate::schema::Field;
use crate::schema::InstructionDef;
use crate::schema::InterfaceDescriptor;
use crate::schema::NamedLayoutRef;
use crate::schema::PdaRule;
use crate::schema::Primitive;
use crate::schema::ProgramRef;
use crate::schema::SeedExpr;
use crate::schema::Serialization;
use crate::schema::TypeBody;
use crate::schema::TypeDef;
use crate::schema::TypeRef;
use crate::schema::VariantFields;

/// Read and validate a descriptor file.
pub fn read_descriptor(path: &Path) -> Result<InterfaceDescriptor> {
	let text = std::fs::read_to_string(path).map_err(|source| {
		GenerateError::ReadFile {
			path: path.to_path_buf(),
			source,
		}
	})?;
	load_descriptor(&text)
}

/// Parse and validate a descriptor document.
pub fn load_descriptor(text: &str) -> Result<InterfaceDescriptor> {
	let raw: RawIdl = serde_json::from_str(text)
		.map_err(|err| GenerateError::malformed("descriptor", err.to_string()))?;
	let descriptor = lower_idl(raw)?;

	validate_references(&descriptor)?;
	validate_layout_cycles(&descriptor)?;
	validate_seed_paths(&descriptor)?;

	tracing::debug!(
		program = %descriptor.name,
		instructions = descriptor.instructions.len(),
		accounts = descriptor.accounts.len(),
		types = descriptor.types.len(),
		"loaded descriptor"
	);

	Ok(descriptor)
}

fn lower_idl(raw: RawIdl) -> Result<InterfaceDescriptor> {
	check_spec_version(&raw.metadata)?;

	let name = raw
		.metadata
		.name
		.clone()
		.ok_or_else(|| GenerateError::malformed("metadata.name", "missing program name"))?;
	let address_text = raw
		.address
		.as_deref()
		.or(raw.metadata.address.as_deref())
		.ok_or_else(|| GenerateError::malformed("address", "missing program address"))?;
	let address = parse_address("address", address_text)?;
	let version = raw
		.metadata
		.version
		.clone()
		.unwrap_or_else(|| "0.0.0".to_owned());

	let mut docs = raw.docs.clone();
	if docs.is_empty() {
		docs.extend(raw.metadata.description.clone());
	}

	let mut type_names = BTreeSet::new();
	let mut types = Vec::with_capacity(raw.types.len());
	for raw_type in &raw.types {
		if !type_names.insert(raw_type.name.as_str()) {
			return Err(GenerateError::malformed(
				format!("types.{}", raw_type.name),
				"duplicate type name",
			));
		}
		types.push(lower_type_def(raw_type)?);
	}

	let accounts = lower_layouts("accounts", &raw.accounts, &mut types)?;
	let events = lower_layouts("events", &raw.events, &mut types)?;
	check_discriminators("account", &accounts, false)?;
	check_discriminators("event", &events, false)?;

	let mut instruction_names = BTreeSet::new();
	let mut instructions = Vec::with_capacity(raw.instructions.len());
	for raw_instruction in &raw.instructions {
		if !instruction_names.insert(raw_instruction.name.as_str()) {
			return Err(GenerateError::malformed(
				format!("instructions.{}", raw_instruction.name),
				"duplicate instruction name",
			));
		}
		instructions.push(lower_instruction(raw_instruction)?);
	}
	check_discriminators("instruction", &instructions, true)?;

	let errors = lower_errors(&raw)?;
	let constants = raw
		.constants
		.iter()
		.map(lower_constant)
		.collect::<Result<Vec<_>>>()?;

	Ok(InterfaceDescriptor {
		name,
		version,
		address,
		docs,
		instructions,
		accounts,
		events,
		types,
		errors,
		constants,
	})
}

fn check_spec_version(metadata: &RawMetadata) -> Result<()> {
	match metadata.spec.as_deref() {
		Some(SUPPORTED_SPEC_VERSION) => Ok(()),
		Some(other) => {
			Err(GenerateError::malformed(
				"metadata.spec",
				format!(
					"unsupported descriptor format `{other}`, expected `{SUPPORTED_SPEC_VERSION}`"
				),
			))
		}
		None => {
			tracing::warn!(
				expected = SUPPORTED_SPEC_VERSION,
				"descriptor does not declare `metadata.spec`; assuming the supported format"
			);
			Ok(())
		}
	}
}

fn parse_address(context: &str, text: &str) -> Result<Address> {
	Address::from_str(text).map_err(|_| {
		GenerateError::malformed(context, format!("`{text}` is not a valid base58 address"))
	})
}

fn lower_type_def(raw: &RawTypeDef) -> Result<TypeDef> {
	let context = format!("types.{}", raw.name);
	let serialization = match raw.serialization.as_deref() {
		None | Some("borsh") => Serialization::Borsh,
		Some(other) => Serialization::Other(other.to_owned()),
	};

	Ok(TypeDef {
		name: raw.name.clone(),
		docs: raw.docs.clone(),
		generics: raw.generics.iter().map(|g| g.name.clone()).collect(),
		serialization,
		body: lower_type_body(&context, &raw.ty)?,
	})
}

fn lower_type_body(context: &str, body: &RawTypeDefBody) -> Result<TypeBody> {
	match body {
		RawTypeDefBody::Struct { fields: None } => Ok(TypeBody::Struct(Vec::new())),
		RawTypeDefBody::Struct {
			fields: Some(RawDefinedFields::Named(fields)),
		} => Ok(TypeBody::Struct(lower_fields(context, fields)?)),
		RawTypeDefBody::Struct {
			fields: Some(RawDefinedFields::Tuple(items)),
		} => Ok(TypeBody::Tuple(lower_tuple(context, items)?)),
		RawTypeDefBody::Enum { variants } => Ok(TypeBody::Enum(lower_variants(context, variants)?)),
		RawTypeDefBody::Type { alias } => Ok(TypeBody::Alias(lower_type(alias))),
	}
}

fn lower_fields(context: &str, fields: &[RawField]) -> Result<Vec<Field>> {
	let mut names = BTreeSet::new();
	let mut lowered = Vec::with_capacity(fields.len());
	for field in fields {
		if !names.insert(field.name.as_str()) {
			return Err(GenerateError::malformed(
				format!("{context}.{}", field.name),
				"duplicate field name",
			));
		}
		lowered.push(Field {
			name: field.name.clone(),
			docs: field.docs.clone(),
			ty: lower_type(&field.ty),
		});
	}
	Ok(lowered)
}

fn lower_tuple(_context: &str, items: &[RawType]) -> Result<Vec<TypeRef>> {
	Ok(items.iter().map(lower_type).collect())
}

fn lower_variants(context: &str, variants: &[RawEnumVariant]) -> Result<Vec<EnumVariant>> {
	let mut names = BTreeSet::new();
	let mut lowered = Vec::with_capacity(variants.len());
	for variant in variants {
		let variant_context = format!("{context}.{}", variant.name);
		if !names.insert(variant.name.as_str()) {
			return Err(GenerateError::malformed(
				variant_context,
				"duplicate enum variant",
			));
		}
		let fields = match &variant.fields {
			None => VariantFields::Unit,
			Some(RawDefinedFields::Named(fields)) if fields.is_empty() => VariantFields::Unit,
			Some(RawDefinedFields::Named(fields)) => {
				VariantFields::Named(lower_fields(&variant_context, fields)?)
			}
			Some(RawDefinedFields::Tuple(items)) => {
				VariantFields::Tuple(lower_tuple(&variant_context, items)?)
			}
		};
		lowered.push(EnumVariant {
			name: variant.name.clone(),
			docs: variant.docs.clone(),
			fields,
		});
	}
	Ok(lowered)
}

/// Lower a serialized type reference. Names that are not primitives are
/// treated as references to defined types and resolved later.
fn lower_type(raw: &RawType) -> TypeRef {
	match raw {
		RawType::Primitive(name) => {
			Primitive::from_name(name).map_or_else(|| TypeRef::Defined(name.clone()), TypeRef::Primitive)
		}
		RawType::Vec { vec } => TypeRef::Vec(Box::new(lower_type(vec))),
		RawType::Option { option } => TypeRef::Option(Box::new(lower_type(option))),
		RawType::COption { coption } => TypeRef::COption(Box::new(lower_type(coption))),
		RawType::Array {
			array: (inner, RawArrayLen::Value(len)),
		} => TypeRef::Array(Box::new(lower_type(inner)), *len),
		RawType::Array {
			array: (_, RawArrayLen::Generic { generic }),
		} => TypeRef::Generic(format!("array length `{generic}`")),
		RawType::Defined {
			defined: RawDefined::Name(name),
		} => TypeRef::Defined(name.clone()),
		RawType::Defined {
			defined: RawDefined::Full { name, generics },
		} => {
			if generics.is_empty() {
				TypeRef::Defined(name.clone())
			} else {
				TypeRef::Generic(format!("{name}<{}>", generics.len()))
			}
		}
		RawType::Generic { generic } => TypeRef::Generic(generic.clone()),
	}
}

/// Build account or event layouts. Layouts that are not inlined take their
/// fields from the `types` entry of the same name, which then moves out of
/// the shared type list.
fn lower_layouts(
	namespace: &str,
	raw_layouts: &[RawAccount],
	types: &mut Vec<TypeDef>,
) -> Result<Vec<AccountDef>> {
	let mut names = BTreeSet::new();
	let mut layouts = Vec::with_capacity(raw_layouts.len());

	for raw in raw_layouts {
		let context = format!("{namespace}.{}", raw.name);
		if !names.insert(raw.name.as_str()) {
			return Err(GenerateError::malformed(context, "duplicate name"));
		}

		let (docs, serialization, body) = if let Some(body) = &raw.ty {
			(raw.docs.clone(), Serialization::Borsh, lower_type_body(&context, body)?)
		} else {
			let Some(position) = types.iter().position(|ty| ty.name == raw.name) else {
				return Err(GenerateError::unresolved(context, raw.name.clone()));
			};
			let ty = types.remove(position);
			if !ty.generics.is_empty() {
				return Err(GenerateError::unsupported(
					context,
					"generic",
					"generic account layouts have no concrete encoding",
				));
			}
			let docs = if raw.docs.is_empty() { ty.docs } else { raw.docs.clone() };
			(docs, ty.serialization, ty.body)
		};

		let fields = match body {
			TypeBody::Struct(fields) => fields,
			TypeBody::Tuple(items) if items.is_empty() => Vec::new(),
			other => {
				return Err(GenerateError::unsupported(
					context,
					body_kind(&other),
					"account and event layouts must be structs with named fields",
				));
			}
		};

		layouts.push(AccountDef {
			name: raw.name.clone(),
			docs,
			discriminator: raw.discriminator.clone(),
			serialization,
			fields,
		});
	}

	Ok(layouts)
}

fn body_kind(body: &TypeBody) -> &'static str {
	match body {
		TypeBody::Struct(_) => "struct",
		TypeBody::Tuple(_) => "tuple struct",
		TypeBody::Enum(_) => "enum",
		TypeBody::Alias(_) => "alias",
	}
}

trait Discriminated {
	fn name(&self) -> &str;
	fn discriminator(&self) -> &[u8];
}

impl Discriminated for AccountDef {
	fn name(&self) -> &str {
		&self.name
	}

	fn discriminator(&self) -> &[u8] {
		&self.discriminator
	}
}

impl Discriminated for InstructionDef {
	fn name(&self) -> &str {
		&self.name
	}

	fn discriminator(&self) -> &[u8] {
		&self.discriminator
	}
}

/// Discriminators must be unique within their namespace. Layouts without a
/// discriminator are not dispatched on and are skipped.
fn check_discriminators<T: Discriminated>(
	namespace: &'static str,
	items: &[T],
	required: bool,
) -> Result<()> {
	let mut seen: BTreeMap<&[u8], &str> = BTreeMap::new();
	for item in items {
		let discriminator = item.discriminator();
		if discriminator.is_empty() {
			if required {
				return Err(GenerateError::malformed(
					format!("{namespace}s.{}", item.name()),
					"missing discriminator",
				));
			}
			continue;
		}
		if let Some(first) = seen.insert(discriminator, item.name()) {
			return Err(GenerateError::DuplicateDiscriminant {
				namespace,
				discriminator: discriminator.to_vec(),
				first: first.to_owned(),
				second: item.name().to_owned(),
			});
		}
	}
	Ok(())
}

fn lower_instruction(raw: &RawInstruction) -> Result<InstructionDef> {
	let context = format!("instructions.{}", raw.name);
	let args = lower_fields(&format!("{context}.args"), &raw.args)?;

	let mut flat = Vec::new();
	flatten_accounts(&raw.accounts, None, &mut flat);

	let mut names = BTreeSet::new();
	for account in &flat {
		if !names.insert(account.0.as_str()) {
			return Err(GenerateError::malformed(
				format!("{context}.accounts.{}", account.0),
				"duplicate account name",
			));
		}
	}

	let mut accounts = Vec::with_capacity(flat.len());
	for (name, raw_account) in &flat {
		let account_context = format!("{context}.accounts.{name}");
		let address = raw_account
			.address
			.as_deref()
			.map(|text| parse_address(&format!("{account_context}.address"), text))
			.transpose()?;
		let derived = raw_account
			.pda
			.as_ref()
			.map(|pda| lower_pda(&account_context, pda, &args, &names))
			.transpose()?;

		accounts.push(AccountRequirement {
			name: name.clone(),
			docs: raw_account.docs.clone(),
			writable: raw_account.writable,
			signer: raw_account.signer,
			optional: raw_account.optional,
			address,
			derived,
		});
	}

	Ok(InstructionDef {
		name: raw.name.clone(),
		docs: raw.docs.clone(),
		discriminator: raw.discriminator.clone(),
		args,
		accounts,
	})
}

/// Flatten nested account groups into `group_member` names, keeping
/// declaration order.
fn flatten_accounts<'a>(
	items: &'a [RawAccountItem],
	prefix: Option<&str>,
	out: &mut Vec<(String, &'a RawInstructionAccount)>,
) {
	for item in items {
		match item {
			RawAccountItem::Single(account) => {
				let name = prefix.map_or_else(
					|| account.name.clone(),
					|prefix| format!("{prefix}_{}", account.name),
				);
				out.push((name, account));
			}
			RawAccountItem::Group(group) => {
				let nested = prefix.map_or_else(
					|| group.name.clone(),
					|prefix| format!("{prefix}_{}", group.name),
				);
				flatten_accounts(&group.accounts, Some(&nested), out);
			}
		}
	}
}

fn lower_pda(
	context: &str,
	pda: &crate::idl::RawPda,
	args: &[Field],
	account_names: &BTreeSet<&str>,
) -> Result<PdaRule> {
	let mut seeds = Vec::with_capacity(pda.seeds.len());
	for (index, seed) in pda.seeds.iter().enumerate() {
		let seed_context = format!("{context}.pda.seeds[{index}]");
		let lowered = match seed {
			RawSeed::Const { value } => SeedExpr::Literal(value.clone()),
			RawSeed::Arg { path } => {
				let mut segments = path.split('.').map(str::to_owned);
				let name = segments.next().unwrap_or_default();
				if !args.iter().any(|arg| arg.name == name) {
					return Err(GenerateError::unresolved(seed_context, path.clone()));
				}
				SeedExpr::Arg {
					name,
					path: segments.collect(),
				}
			}
			RawSeed::Account { path } => resolve_account_seed(&seed_context, path, account_names)?,
		};
		seeds.push(lowered);
	}

	let program = match &pda.program {
		None => ProgramRef::CurrentProgram,
		Some(RawSeed::Const { value }) => {
			let bytes: [u8; 32] = value.as_slice().try_into().map_err(|_| {
				GenerateError::malformed(
					format!("{context}.pda.program"),
					format!("expected 32 address bytes, found {}", value.len()),
				)
			})?;
			ProgramRef::Literal(Address::new_from_array(bytes))
		}
		Some(RawSeed::Account { path }) => {
			match resolve_account_seed(&format!("{context}.pda.program"), path, account_names)? {
				SeedExpr::Account { name } => ProgramRef::Account(name),
				_ => {
					return Err(GenerateError::malformed(
						format!("{context}.pda.program"),
						"the deriving program must be an account address",
					));
				}
			}
		}
		Some(RawSeed::Arg { .. }) => {
			return Err(GenerateError::malformed(
				format!("{context}.pda.program"),
				"the deriving program must be a constant or an account",
			));
		}
	};

	Ok(PdaRule { seeds, program })
}

/// Account seed paths either name an account (nested groups use dots) or
/// point into an account's data (`account.field`, `group.account.field`).
/// The longest prefix naming a flattened account wins.
fn resolve_account_seed(
	context: &str,
	path: &str,
	account_names: &BTreeSet<&str>,
) -> Result<SeedExpr> {
	let flattened = path.replace('.', "_");
	if account_names.contains(flattened.as_str()) {
		return Ok(SeedExpr::Account { name: flattened });
	}

	let segments: Vec<&str> = path.split('.').collect();
	for split in (1..segments.len()).rev() {
		let account = segments[..split].join("_");
		if account_names.contains(account.as_str()) {
			return Ok(SeedExpr::AccountData {
				account,
				path: segments[split..].iter().map(|segment| (*segment).to_owned()).collect(),
			});
		}
	}

	Err(GenerateError::unresolved(context, path))
}

fn lower_errors(raw: &RawIdl) -> Result<Vec<ErrorDef>> {
	let mut codes = BTreeSet::new();
	let mut names = BTreeSet::new();
	let mut errors = Vec::with_capacity(raw.errors.len());
	for error in &raw.errors {
		let context = format!("errors.{}", error.name);
		if !codes.insert(error.code) {
			return Err(GenerateError::malformed(
				context,
				format!("duplicate error code {}", error.code),
			));
		}
		if !names.insert(error.name.as_str()) {
			return Err(GenerateError::malformed(context, "duplicate error name"));
		}
		errors.push(ErrorDef {
			code: error.code,
			name: error.name.clone(),
			msg: error.msg.clone(),
		});
	}
	Ok(errors)
}

fn lower_constant(raw: &RawConstant) -> Result<ConstantDef> {
	Ok(ConstantDef {
		name: raw.name.clone(),
		docs: raw.docs.clone(),
		ty: lower_type(&raw.ty),
		value: raw.value.clone(),
	})
}

impl InterfaceDescriptor {
	/// Every place a type reference appears, paired with a dotted location
	/// used in error messages.
	pub fn type_sites(&self) -> Vec<(String, &TypeRef)> {
		let mut sites = Vec::new();

		for ty in &self.types {
			body_sites(&format!("types.{}", ty.name), &ty.body, &mut sites);
		}
		for (namespace, layouts) in [("accounts", &self.accounts), ("events", &self.events)] {
			for layout in layouts {
				for field in &layout.fields {
					sites.push((format!("{namespace}.{}.{}", layout.name, field.name), &field.ty));
				}
			}
		}
		for instruction in &self.instructions {
			for arg in &instruction.args {
				sites.push((
					format!("instructions.{}.args.{}", instruction.name, arg.name),
					&arg.ty,
				));
			}
		}
		for constant in &self.constants {
			sites.push((format!("constants.{}", constant.name), &constant.ty));
		}

		sites
	}
}

fn body_sites<'a>(context: &str, body: &'a TypeBody, sites: &mut Vec<(String, &'a TypeRef)>) {
	match body {
		TypeBody::Struct(fields) => {
			for field in fields {
				sites.push((format!("{context}.{}", field.name), &field.ty));
			}
		}
		TypeBody::Tuple(items) => {
			for (index, item) in items.iter().enumerate() {
				sites.push((format!("{context}.{index}"), item));
			}
		}
		TypeBody::Enum(variants) => {
			for variant in variants {
				match &variant.fields {
					VariantFields::Unit => {}
					VariantFields::Named(fields) => {
						for field in fields {
							sites.push((
								format!("{context}.{}.{}", variant.name, field.name),
								&field.ty,
							));
						}
					}
					VariantFields::Tuple(items) => {
						for (index, item) in items.iter().enumerate() {
							sites.push((format!("{context}.{}.{index}", variant.name), item));
						}
					}
				}
			}
		}
		TypeBody::Alias(ty) => sites.push((context.to_owned(), ty)),
	}
}

fn validate_references(descriptor: &InterfaceDescriptor) -> Result<()> {
	for (context, ty) in descriptor.type_sites() {
		for name in ty.defined_names() {
			if descriptor.find_layout(name).is_none() {
				return Err(GenerateError::unresolved(context, name));
			}
		}
	}
	Ok(())
}

/// Named layouts embedded by value must not contain themselves. Cycles are
/// only allowed through an option or a vector.
fn validate_layout_cycles(descriptor: &InterfaceDescriptor) -> Result<()> {
	let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
	let mut order = Vec::new();

	for ty in &descriptor.types {
		let targets = ty
			.body
			.type_refs()
			.into_iter()
			.flat_map(TypeRef::by_value_names)
			.collect();
		edges.insert(&ty.name, targets);
		order.push(ty.name.as_str());
	}
	for layout in descriptor.accounts.iter().chain(&descriptor.events) {
		let targets = layout
			.fields
			.iter()
			.flat_map(|field| field.ty.by_value_names())
			.collect();
		edges.insert(&layout.name, targets);
		order.push(layout.name.as_str());
	}

	#[derive(Clone, Copy, PartialEq)]
	enum Mark {
		Active,
		Done,
	}

	let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
	for &root in &order {
		if marks.contains_key(root) {
			continue;
		}
		let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
		marks.insert(root, Mark::Active);

		while let Some((node, next)) = stack.last_mut() {
			let targets = edges.get(node).map_or(&[][..], Vec::as_slice);
			if let Some(&target) = targets.get(*next) {
				*next += 1;
				match marks.get(target) {
					Some(Mark::Done) => {}
					Some(Mark::Active) => {
						let start = stack
							.iter()
							.position(|(name, _)| *name == target)
							.unwrap_or_default();
						let mut cycle: Vec<&str> = stack[start..].iter().map(|(name, _)| *name).collect();
						cycle.push(target);
						return Err(GenerateError::malformed(
							format!("types.{target}"),
							format!(
								"recursive layout without option or vector indirection: {}",
								cycle.join(" -> ")
							),
						));
					}
					None => {
						marks.insert(target, Mark::Active);
						stack.push((target, 0));
					}
				}
			} else {
				marks.insert(node, Mark::Done);
				stack.pop();
			}
		}
	}

	Ok(())
}

/// Argument seeds may reach into struct arguments with a dotted path; every
/// segment has to name a field.
fn validate_seed_paths(descriptor: &InterfaceDescriptor) -> Result<()> {
	for instruction in &descriptor.instructions {
		for account in &instruction.accounts {
			let Some(rule) = &account.derived else {
				continue;
			};
			for (index, seed) in rule.seeds.iter().enumerate() {
				let SeedExpr::Arg { name, path } = seed else {
					continue;
				};
				let context = format!(
					"instructions.{}.accounts.{}.pda.seeds[{index}]",
					instruction.name, account.name
				);
				let Some(arg) = instruction.find_arg(name) else {
					return Err(GenerateError::unresolved(context, name.clone()));
				};
				if resolve_field_path(descriptor, &arg.ty, path).is_none() {
					let mut full = vec![name.clone()];
					full.extend(path.iter().cloned());
					return Err(GenerateError::unresolved(context, full.join(".")));
				}
			}
		}
	}
	Ok(())
}

/// Follow a path of field names starting at `ty`, looking through aliases.
pub fn resolve_field_path<'a>(
	descriptor: &'a InterfaceDescriptor,
	ty: &'a TypeRef,
	path: &[String],
) -> Option<&'a TypeRef> {
	let mut current = ty;
	for segment in path {
		let fields = loop {
			let TypeRef::Defined(name) = current else {
				return None;
			};
			match descriptor.find_layout(name)? {
				NamedLayoutRef::Type(def) => {
					match &def.body {
						TypeBody::Struct(fields) => break fields,
						TypeBody::Alias(inner) => current = inner,
						TypeBody::Tuple(_) | TypeBody::Enum(_) => return None,
					}
				}
				NamedLayoutRef::Account(def) | NamedLayoutRef::Event(def) => break &def.fields,
			}
		};
		current = &fields.iter().find(|field| &field.name == segment)?.ty;
	}
	Some(current)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;

	const PROGRAM: &str = "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS";

	fn descriptor(body: &str) -> String {
		format!(
			r#"{{ "address": "{PROGRAM}", "metadata": {{ "name": "demo", "version": "0.1.0", "spec": "0.1.0" }}, {body} }}"#
		)
	}

	fn load_err(body: &str) -> GenerateError {
		match load_descriptor(&descriptor(body)) {
			Ok(_) => panic!("expected descriptor to be rejected"),
			Err(err) => err,
		}
	}

	#[test]
	fn rejects_unparseable_documents() {
		let err = load_descriptor("{ not json").err().unwrap_or_else(|| panic!("expected error"));
		assert_eq!(err.kind(), ErrorKind::MalformedDescriptor);
	}

	#[test]
	fn rejects_unknown_spec_versions() {
		let json = format!(
			r#"{{ "address": "{PROGRAM}", "metadata": {{ "name": "demo", "spec": "9.9.9" }} }}"#
		);
		let err = load_descriptor(&json).err().unwrap_or_else(|| panic!("expected error"));
		assert_eq!(err.kind(), ErrorKind::MalformedDescriptor);
		assert!(err.to_string().contains("9.9.9"));
	}

	#[test]
	fn reports_dangling_type_references_with_location() {
		let err = load_err(
			r#""types": [{ "name": "Config", "type": { "kind": "struct", "fields": [
				{ "name": "owner", "type": { "defined": { "name": "Missing" } } }
			] } }]"#,
		);
		assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
		assert!(matches!(
			&err,
			GenerateError::UnresolvedReference { context, reference }
				if context == "types.Config.owner" && reference == "Missing"
		));
	}

	#[test]
	fn rejects_duplicate_instruction_discriminators() {
		let err = load_err(
			r#""instructions": [
				{ "name": "a", "discriminator": [1], "accounts": [], "args": [] },
				{ "name": "b", "discriminator": [1], "accounts": [], "args": [] }
			]"#,
		);
		assert_eq!(err.kind(), ErrorKind::DuplicateDiscriminant);
		assert!(err.to_string().contains("`a`"));
	}

	#[test]
	fn same_discriminator_in_different_namespaces_is_allowed() {
		let json = descriptor(
			r#""instructions": [{ "name": "a", "discriminator": [1], "accounts": [], "args": [] }],
			"accounts": [{ "name": "State", "discriminator": [1] }],
			"types": [{ "name": "State", "type": { "kind": "struct", "fields": [] } }]"#,
		);
		let loaded = load_descriptor(&json).unwrap_or_else(|e| panic!("load failed: {e}"));
		assert!(loaded.types.is_empty(), "account layout moves out of shared types");
		assert_eq!(loaded.accounts[0].discriminator, vec![1]);
	}

	#[test]
	fn rejects_seed_references_to_unknown_arguments() {
		let err = load_err(
			r#""instructions": [{ "name": "init", "discriminator": [0], "args": [],
				"accounts": [{ "name": "vault", "pda": { "seeds": [{ "kind": "arg", "path": "amount" }] } }]
			}]"#,
		);
		assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
	}

	#[test]
	fn rejects_by_value_type_cycles() {
		let err = load_err(
			r#""types": [
				{ "name": "A", "type": { "kind": "struct", "fields": [{ "name": "b", "type": { "defined": { "name": "B" } } }] } },
				{ "name": "B", "type": { "kind": "struct", "fields": [{ "name": "a", "type": { "array": [{ "defined": { "name": "A" } }, 2] } }] } }
			]"#,
		);
		assert_eq!(err.kind(), ErrorKind::MalformedDescriptor);
		assert!(err.to_string().contains("A -> B -> A"));
	}

	#[test]
	fn allows_cycles_through_options_and_vectors() {
		let json = descriptor(
			r#""types": [
				{ "name": "Node", "type": { "kind": "struct", "fields": [
					{ "name": "next", "type": { "option": { "defined": { "name": "Node" } } } },
					{ "name": "children", "type": { "vec": { "defined": { "name": "Node" } } } }
				] } }
			]"#,
		);
		assert!(load_descriptor(&json).is_ok());
	}

	#[test]
	fn flattens_account_groups_and_resolves_seeds() {
		let json = descriptor(
			r#""instructions": [{ "name": "deposit", "discriminator": [7],
				"args": [{ "name": "params", "type": { "defined": { "name": "Params" } } }],
				"accounts": [
					{ "name": "common", "accounts": [{ "name": "authority", "signer": true }] },
					{ "name": "vault", "writable": true, "pda": { "seeds": [
						{ "kind": "const", "value": [118, 97, 117, 108, 116] },
						{ "kind": "account", "path": "common.authority" },
						{ "kind": "arg", "path": "params.id" }
					] } }
				]
			}],
			"types": [{ "name": "Params", "type": { "kind": "struct", "fields": [{ "name": "id", "type": "u32" }] } }]"#,
		);
		let loaded = load_descriptor(&json).unwrap_or_else(|e| panic!("load failed: {e}"));
		let instruction = &loaded.instructions[0];
		assert_eq!(instruction.accounts[0].name, "common_authority");
		let rule = instruction.accounts[1]
			.derived
			.as_ref()
			.unwrap_or_else(|| panic!("vault should be derived"));
		assert_eq!(rule.seeds[1], SeedExpr::Account {
			name: "common_authority".to_owned()
		});
		assert_eq!(rule.seeds[2], SeedExpr::Arg {
			name: "params".to_owned(),
			path: vec!["id".to_owned()],
		});
	}

	#[test]
	fn resolves_data_seeds_through_account_groups() {
		let json = descriptor(
			r#""instructions": [{ "name": "claim", "discriminator": [9], "args": [],
				"accounts": [
					{ "name": "pool", "accounts": [
						{ "name": "state", "accounts": [{ "name": "vault" }] },
						{ "name": "owner", "signer": true }
					] },
					{ "name": "ticket", "pda": { "seeds": [
						{ "kind": "account", "path": "pool.state.vault.owner" },
						{ "kind": "account", "path": "pool.owner" }
					] } }
				]
			}]"#,
		);
		let loaded = load_descriptor(&json).unwrap_or_else(|e| panic!("load failed: {e}"));
		let instruction = &loaded.instructions[0];
		assert_eq!(instruction.accounts[0].name, "pool_state_vault");
		let rule = instruction.accounts[2]
			.derived
			.as_ref()
			.unwrap_or_else(|| panic!("ticket should be derived"));
		assert_eq!(rule.seeds[0], SeedExpr::AccountData {
			account: "pool_state_vault".to_owned(),
			path: vec!["owner".to_owned()],
		});
		assert_eq!(rule.seeds[1], SeedExpr::Account {
			name: "pool_owner".to_owned()
		});
	}

	#[test]
	fn keeps_the_descriptor_description_as_docs() {
		let json = format!(
			r#"{{ "address": "{PROGRAM}", "metadata": {{ "name": "demo", "spec": "0.1.0", "description": "A demo." }},
				"errors": [{{ "code": 6000, "name": "Denied" }}] }}"#
		);
		let loaded = load_descriptor(&json).unwrap_or_else(|e| panic!("load failed: {e}"));
		assert_eq!(loaded.docs, vec!["A demo.".to_owned()]);
		assert_eq!(loaded.errors[0].code, 6000);
	}
}
