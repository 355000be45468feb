//! Program derived address planning.
//!
//! Instructions declare derivation rules per account. This module orders the
//! derived accounts of an instruction so every seed is known before it is
//! used, and collects the rules of all instructions into a catalog of helper
//! functions, sharing identical rules.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use heck::ToSnakeCase;
use solana_address::Address;

use crate::error::GenerateError;
use crate::error::Result;
use crate::layout::Layout;
use crate::loader::resolve_field_path;
use crate::schema::InstructionDef;
use crate::schema::InterfaceDescriptor;
use crate::schema::PdaRule;
use crate::schema::ProgramRef;
use crate::schema::SeedExpr;
use crate::types::TypeRegistry;

/// Most seeds a single derivation accepts, the bump seed included.
pub const MAX_SEEDS: usize = 16;
/// Longest accepted seed, in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Indices of the derived accounts of `instruction`, ordered so that every
/// derived account comes after the derived accounts its seeds refer to.
pub fn derivation_order(instruction: &InstructionDef) -> Result<Vec<usize>> {
	let dependencies = |index: usize| -> Vec<usize> {
		let Some(rule) = &instruction.accounts[index].derived else {
			return Vec::new();
		};
		let mut names: Vec<&str> = rule
			.seeds
			.iter()
			.filter_map(|seed| {
				match seed {
					SeedExpr::Account { name } => Some(name.as_str()),
					_ => None,
				}
			})
			.collect();
		if let ProgramRef::Account(name) = &rule.program {
			names.push(name);
		}
		names
			.into_iter()
			.filter_map(|name| instruction.account_index(name))
			.filter(|&target| instruction.accounts[target].derived.is_some())
			.collect()
	};

	#[derive(Clone, Copy, PartialEq)]
	enum Mark {
		Active,
		Done,
	}

	let mut marks: BTreeMap<usize, Mark> = BTreeMap::new();
	let mut order = Vec::new();

	for root in 0..instruction.accounts.len() {
		if instruction.accounts[root].derived.is_none() || marks.contains_key(&root) {
			continue;
		}
		let mut stack: Vec<(usize, Vec<usize>)> = vec![(root, dependencies(root))];
		marks.insert(root, Mark::Active);

		while let Some((node, pending)) = stack.last_mut() {
			let node = *node;
			if pending.is_empty() {
				marks.insert(node, Mark::Done);
				order.push(node);
				stack.pop();
				continue;
			}
			let target = pending.remove(0);
			match marks.get(&target) {
				Some(Mark::Done) => {}
				Some(Mark::Active) => {
					let start = stack
						.iter()
						.position(|(index, _)| *index == target)
						.unwrap_or_default();
					let mut cycle: Vec<String> = stack[start..]
						.iter()
						.map(|(index, _)| instruction.accounts[*index].name.clone())
						.collect();
					cycle.push(instruction.accounts[target].name.clone());
					return Err(GenerateError::SeedCycle {
						instruction: instruction.name.clone(),
						cycle,
					});
				}
				None => {
					marks.insert(target, Mark::Active);
					stack.push((target, dependencies(target)));
				}
			}
		}
	}

	Ok(order)
}

/// How a seed parameter is turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeedKind {
	/// Little-endian at the declared width.
	Int { width: usize, signed: bool },
	/// One byte, zero or one.
	Bool,
	/// The 32 address bytes.
	Pubkey,
	/// UTF-8 bytes without a length prefix.
	Str,
	/// Raw bytes without a length prefix.
	Bytes,
	/// A fixed `[u8; N]` array, raw.
	ByteArray(usize),
}

impl SeedKind {
	fn from_layout(context: &str, registry: &TypeRegistry, layout: &Layout) -> Result<Self> {
		let kind = match registry.resolve_alias(layout) {
			Layout::Int { width, signed } => {
				Self::Int {
					width: *width,
					signed: *signed,
				}
			}
			Layout::Bool => Self::Bool,
			Layout::Pubkey => Self::Pubkey,
			Layout::String => Self::Str,
			Layout::Bytes => Self::Bytes,
			Layout::Array { element, len }
				if **element
					== Layout::Int {
						width: 1,
						signed: false,
					} =>
			{
				Self::ByteArray(*len)
			}
			other => {
				return Err(GenerateError::unsupported(
					context,
					other.to_string(),
					"this type cannot be used as an address seed",
				));
			}
		};
		Ok(kind)
	}
}

/// Where the value of a seed parameter comes from inside an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeedSource {
	Arg { name: String, path: Vec<String> },
	Account(String),
	/// Caller-supplied bytes standing in for data read from an account.
	AccountData { account: String, path: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeedParam {
	pub name: String,
	pub kind: SeedKind,
	pub source: SeedSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeedPart {
	Literal(Vec<u8>),
	/// Index into [`PdaFunction::params`].
	Param(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PdaProgram {
	Current,
	Literal(Address),
	/// Index into [`PdaFunction::params`]; the parameter is an address.
	Param(usize),
}

/// The shape of a derivation, independent of which instruction declared it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PdaShape {
	pub params: Vec<SeedParam>,
	pub seeds: Vec<SeedPart>,
	pub program: PdaProgram,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdaFunction {
	/// Snake case rule name, also the generated file stem.
	pub name: String,
	pub shape: PdaShape,
	/// `(instruction, account)` pairs using this rule, in declaration order.
	pub users: Vec<(String, String)>,
}

impl PdaFunction {
	pub fn fn_name(&self) -> String {
		format!("find_{}_address", self.name)
	}
}

/// Every derivation rule of a descriptor, deduplicated and named.
#[derive(Debug, Clone, Default)]
pub struct PdaCatalog {
	functions: Vec<PdaFunction>,
	by_user: BTreeMap<(String, String), usize>,
}

impl PdaCatalog {
	pub fn build(descriptor: &InterfaceDescriptor, registry: &TypeRegistry) -> Result<Self> {
		// Account name -> distinct shapes in first-use order, with their users.
		let mut groups: BTreeMap<String, Vec<(PdaShape, Vec<(String, String)>)>> = BTreeMap::new();

		for instruction in &descriptor.instructions {
			derivation_order(instruction)?;
			for account in &instruction.accounts {
				let Some(rule) = &account.derived else {
					continue;
				};
				let context = format!("instructions.{}.accounts.{}.pda", instruction.name, account.name);
				let shape = plan_shape(&context, descriptor, registry, instruction, rule)?;
				let user = (instruction.name.clone(), account.name.clone());
				let shapes = groups.entry(account.name.to_snake_case()).or_default();
				match shapes.iter_mut().find(|(existing, _)| *existing == shape) {
					Some((_, users)) => users.push(user),
					None => shapes.push((shape, vec![user])),
				}
			}
		}

		// Unqualified names are claimed first so a qualified name never takes
		// one away from a rule that has no conflict.
		let mut taken: BTreeSet<String> = groups
			.iter()
			.filter(|(_, shapes)| shapes.len() == 1)
			.map(|(base, _)| base.clone())
			.collect();
		let mut functions = Vec::new();
		for (base, shapes) in groups {
			if shapes.len() == 1 {
				for (shape, users) in shapes {
					functions.push(PdaFunction {
						name: base.clone(),
						shape,
						users,
					});
				}
				continue;
			}
			for (shape, users) in shapes {
				let qualified = format!("{}_{base}", users[0].0.to_snake_case());
				let name = unique_name(&mut taken, qualified);
				functions.push(PdaFunction { name, shape, users });
			}
		}
		functions.sort_by(|a, b| a.name.cmp(&b.name));

		let mut by_user = BTreeMap::new();
		for (index, function) in functions.iter().enumerate() {
			for user in &function.users {
				by_user.insert(user.clone(), index);
			}
		}

		tracing::debug!(rules = functions.len(), "planned address derivations");

		Ok(Self { functions, by_user })
	}

	pub fn functions(&self) -> &[PdaFunction] {
		&self.functions
	}

	pub fn function_for(&self, instruction: &str, account: &str) -> Option<&PdaFunction> {
		self.by_user
			.get(&(instruction.to_owned(), account.to_owned()))
			.map(|&index| &self.functions[index])
	}
}

/// Claim `name`, or `name_2`, `name_3` and so on when it is taken.
fn unique_name(taken: &mut BTreeSet<String>, name: String) -> String {
	if taken.insert(name.clone()) {
		return name;
	}
	let mut suffix = 2;
	loop {
		let candidate = format!("{name}_{suffix}");
		if taken.insert(candidate.clone()) {
			return candidate;
		}
		suffix += 1;
	}
}

fn plan_shape(
	context: &str,
	descriptor: &InterfaceDescriptor,
	registry: &TypeRegistry,
	instruction: &InstructionDef,
	rule: &PdaRule,
) -> Result<PdaShape> {
	let mut params: Vec<SeedParam> = Vec::new();
	let mut seeds = Vec::with_capacity(rule.seeds.len());

	for (index, seed) in rule.seeds.iter().enumerate() {
		let seed_context = format!("{context}.seeds[{index}]");
		let part = match seed {
			SeedExpr::Literal(bytes) => SeedPart::Literal(bytes.clone()),
			SeedExpr::Arg { name, path } => {
				let arg = instruction
					.find_arg(name)
					.ok_or_else(|| GenerateError::unresolved(&seed_context, name.clone()))?;
				let ty = resolve_field_path(descriptor, &arg.ty, path).ok_or_else(|| {
					GenerateError::unresolved(&seed_context, format!("{name}.{}", path.join(".")))
				})?;
				let layout = registry.layout_of(&seed_context, ty)?;
				let kind = SeedKind::from_layout(&seed_context, registry, &layout)?;
				let mut base = name.clone();
				for segment in path {
					base.push('_');
					base.push_str(segment);
				}
				SeedPart::Param(add_param(&mut params, base, kind, SeedSource::Arg {
					name: name.clone(),
					path: path.clone(),
				}))
			}
			SeedExpr::Account { name } => {
				SeedPart::Param(add_param(
					&mut params,
					name.clone(),
					SeedKind::Pubkey,
					SeedSource::Account(name.clone()),
				))
			}
			SeedExpr::AccountData { account, path } => {
				let base = format!("{account}_{}_seed", path.join("_"));
				SeedPart::Param(add_param(&mut params, base, SeedKind::Bytes, SeedSource::AccountData {
					account: account.clone(),
					path: path.clone(),
				}))
			}
		};
		seeds.push(part);
	}

	if seeds.len() >= MAX_SEEDS {
		return Err(GenerateError::malformed(
			format!("{context}.seeds"),
			format!(
				"{} seeds leave no room for the bump seed, the limit is {}",
				seeds.len(),
				MAX_SEEDS - 1
			),
		));
	}
	for (index, seed) in seeds.iter().enumerate() {
		if let SeedPart::Literal(bytes) = seed {
			if bytes.len() > MAX_SEED_LEN {
				return Err(GenerateError::malformed(
					format!("{context}.seeds[{index}]"),
					format!("literal seeds are limited to {MAX_SEED_LEN} bytes"),
				));
			}
		}
	}

	let program = match &rule.program {
		ProgramRef::CurrentProgram => PdaProgram::Current,
		ProgramRef::Literal(address) => PdaProgram::Literal(*address),
		ProgramRef::Account(name) => {
			PdaProgram::Param(add_param(
				&mut params,
				name.clone(),
				SeedKind::Pubkey,
				SeedSource::Account(name.clone()),
			))
		}
	};

	Ok(PdaShape {
		params,
		seeds,
		program,
	})
}

/// Add a parameter unless one with the same source exists, returning its
/// index.
fn add_param(params: &mut Vec<SeedParam>, base: String, kind: SeedKind, source: SeedSource) -> usize {
	if let Some(index) = params.iter().position(|param| param.source == source) {
		return index;
	}
	let mut name = base.to_snake_case();
	if params.iter().any(|param| param.name == name) {
		name = format!("{name}_{}", params.len());
	}
	params.push(SeedParam { name, kind, source });
	params.len() - 1
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use crate::loader::load_descriptor;

	fn descriptor(instructions: &str) -> InterfaceDescriptor {
		let json = format!(
			r#"{{ "address": "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS",
				"metadata": {{ "name": "demo", "spec": "0.1.0" }}, "instructions": {instructions} }}"#
		);
		load_descriptor(&json).unwrap_or_else(|e| panic!("load failed: {e}"))
	}

	fn catalog(descriptor: &InterfaceDescriptor) -> Result<PdaCatalog> {
		let registry = TypeRegistry::build(descriptor, "crate::generated")?;
		PdaCatalog::build(descriptor, &registry)
	}

	#[test]
	fn orders_nested_derivations() {
		let descriptor = descriptor(
			r#"[{ "name": "open", "discriminator": [0], "args": [], "accounts": [
				{ "name": "receipt", "pda": { "seeds": [{ "kind": "account", "path": "vault" }] } },
				{ "name": "vault", "pda": { "seeds": [{ "kind": "account", "path": "owner" }] } },
				{ "name": "owner", "signer": true }
			] }]"#,
		);
		let order = derivation_order(&descriptor.instructions[0])
			.unwrap_or_else(|e| panic!("order failed: {e}"));
		assert_eq!(order, vec![1, 0]);
	}

	#[test]
	fn reports_seed_cycles() {
		let descriptor = descriptor(
			r#"[{ "name": "open", "discriminator": [0], "args": [], "accounts": [
				{ "name": "a", "pda": { "seeds": [{ "kind": "account", "path": "b" }] } },
				{ "name": "b", "pda": { "seeds": [{ "kind": "account", "path": "a" }] } }
			] }]"#,
		);
		let err = derivation_order(&descriptor.instructions[0])
			.err()
			.unwrap_or_else(|| panic!("expected cycle"));
		assert_eq!(err.kind(), ErrorKind::SeedCycle);
		assert!(err.to_string().contains("a -> b -> a"));
	}

	#[test]
	fn shares_identical_rules_and_qualifies_conflicts() {
		let descriptor = descriptor(
			r#"[
				{ "name": "deposit", "discriminator": [0], "args": [], "accounts": [
					{ "name": "owner", "signer": true },
					{ "name": "vault", "pda": { "seeds": [{ "kind": "const", "value": [118] }, { "kind": "account", "path": "owner" }] } }
				] },
				{ "name": "withdraw", "discriminator": [1], "args": [], "accounts": [
					{ "name": "owner", "signer": true },
					{ "name": "vault", "pda": { "seeds": [{ "kind": "const", "value": [118] }, { "kind": "account", "path": "owner" }] } }
				] },
				{ "name": "migrate", "discriminator": [2], "args": [{ "name": "index", "type": "u16" }], "accounts": [
					{ "name": "vault", "pda": { "seeds": [{ "kind": "arg", "path": "index" }] } }
				] }
			]"#,
		);
		let catalog = catalog(&descriptor).unwrap_or_else(|e| panic!("catalog failed: {e}"));
		let names: Vec<_> = catalog.functions().iter().map(PdaFunction::fn_name).collect();
		assert_eq!(names, vec![
			"find_deposit_vault_address",
			"find_migrate_vault_address"
		]);
		assert_eq!(
			catalog.function_for("withdraw", "vault").map(|f| f.name.as_str()),
			Some("deposit_vault")
		);
	}

	#[test]
	fn rejects_unsupported_seed_types() {
		let descriptor = descriptor(
			r#"[{ "name": "open", "discriminator": [0], "args": [{ "name": "ids", "type": { "vec": "u64" } }], "accounts": [
				{ "name": "vault", "pda": { "seeds": [{ "kind": "arg", "path": "ids" }] } }
			] }]"#,
		);
		let err = catalog(&descriptor).err().unwrap_or_else(|| panic!("expected error"));
		assert_eq!(err.kind(), ErrorKind::UnsupportedType);
	}

	#[test]
	fn qualified_names_do_not_collide_with_plain_rules() {
		let descriptor = descriptor(
			r#"[
				{ "name": "deposit", "discriminator": [0], "args": [], "accounts": [
					{ "name": "vault", "pda": { "seeds": [{ "kind": "const", "value": [1] }] } },
					{ "name": "depositVault", "pda": { "seeds": [{ "kind": "const", "value": [2] }] } }
				] },
				{ "name": "withdraw", "discriminator": [1], "args": [], "accounts": [
					{ "name": "vault", "pda": { "seeds": [{ "kind": "const", "value": [3] }] } }
				] }
			]"#,
		);
		let catalog = catalog(&descriptor).unwrap_or_else(|e| panic!("catalog failed: {e}"));
		let names: Vec<_> = catalog.functions().iter().map(|f| f.name.as_str()).collect();
		assert_eq!(names, vec!["deposit_vault", "deposit_vault_2", "withdraw_vault"]);
		assert_eq!(
			catalog.function_for("deposit", "depositVault").map(|f| f.name.as_str()),
			Some("deposit_vault")
		);
		assert_eq!(
			catalog.function_for("deposit", "vault").map(|f| f.name.as_str()),
			Some("deposit_vault_2")
		);
	}

	#[test]
	fn leaves_room_for_the_bump_seed() {
		let seeds = vec![r#"{ "kind": "const", "value": [1] }"#; MAX_SEEDS].join(", ");
		let descriptor = descriptor(&format!(
			r#"[{{ "name": "open", "discriminator": [0], "args": [], "accounts": [
				{{ "name": "vault", "pda": {{ "seeds": [{seeds}] }} }}
			] }}]"#
		));
		let err = catalog(&descriptor).err().unwrap_or_else(|| panic!("expected error"));
		assert_eq!(err.kind(), ErrorKind::MalformedDescriptor);
	}
}
