//! Emits instruction builders.
//!
//! For every instruction the generated file holds the discriminator, an
//! `<Name>Args` struct, an `<Name>Accounts` struct with the accounts the
//! caller has to supply, and a builder that resolves every other account and
//! encodes the data. Builders fail with `BuildError` when a derived address
//! has no valid bump or an argument outgrows its length prefix.

use std::collections::BTreeSet;

use super::code::CodeBuffer;
use super::code::array_literal;
use super::code::camel_ident;
use super::code::const_ident;
use super::code::snake_ident;
use super::pdas::by_value;
use super::types::field_specs;
use super::types::uses_address;
use super::types::write_struct;
use super::types::write_struct_codec;
use crate::error::GenerateError;
use crate::error::Result;
use crate::pda::PdaCatalog;
use crate::pda::SeedKind;
use crate::pda::SeedSource;
use crate::pda::derivation_order;
use crate::schema::AccountRequirement;
use crate::schema::InstructionDef;
use crate::types::TypeRegistry;

/// A `Vec<u8>` field of the accounts struct standing in for account data
/// used as a seed.
struct DataSeedField {
	field: String,
	account: String,
	path: Vec<String>,
}

pub fn render_instruction(
	registry: &TypeRegistry,
	catalog: &PdaCatalog,
	instruction: &InstructionDef,
) -> Result<String> {
	let context = format!("instructions.{}", instruction.name);
	let layouts = registry.field_layouts(&format!("{context}.args"), &instruction.args)?;
	let order = derivation_order(instruction)?;

	let camel = camel_ident(&instruction.name);
	let fn_name = snake_ident(&instruction.name);
	let discriminator_const = format!("{}_DISCRIMINATOR", const_ident(&instruction.name).trim_start_matches("r#"));
	let args_name = format!("{camel}Args");
	let accounts_name = format!("{camel}Accounts");
	let root = registry.module_path();

	let supplied: Vec<&AccountRequirement> = instruction
		.accounts
		.iter()
		.filter(|account| account.is_caller_supplied())
		.collect();

	let mut data_seeds: Vec<DataSeedField> = Vec::new();
	// Accounts whose address feeds a derivation and so needs a local.
	let mut seed_accounts: BTreeSet<&str> = BTreeSet::new();
	for &index in &order {
		let account = &instruction.accounts[index];
		let function = catalog
			.function_for(&instruction.name, &account.name)
			.ok_or_else(|| GenerateError::unresolved(&context, format!("pdas.{}", account.name)))?;
		for param in &function.shape.params {
			match &param.source {
				SeedSource::AccountData { account, path } => {
					if !data_seeds.iter().any(|seed| &seed.account == account && &seed.path == path) {
						data_seeds.push(DataSeedField {
							field: param.name.clone(),
							account: account.clone(),
							path: path.clone(),
						});
					}
				}
				SeedSource::Account(name) => {
					seed_accounts.insert(name.as_str());
				}
				SeedSource::Arg { .. } => {}
			}
		}
	}

	let has_args = !instruction.args.is_empty();
	let has_accounts = !supplied.is_empty() || !data_seeds.is_empty();
	let needs_address = !supplied.is_empty()
		|| instruction.accounts.iter().any(|account| account.address.is_some() && account.derived.is_none())
		|| layouts.iter().any(|field| uses_address(&field.layout));

	let mut buffer = CodeBuffer::file(&[]);
	if needs_address {
		buffer.line("use solana_address::Address;");
		buffer.blank();
	}
	buffer.line(format!("use {root}::codec::AccountMeta;"));
	buffer.line(format!("use {root}::codec::BuildError;"));
	if has_args {
		buffer.line(format!("use {root}::codec::Codec;"));
	}
	buffer.line(format!("use {root}::codec::InstructionPayload;"));
	if has_args {
		buffer.line(format!("use {root}::codec::LayoutMismatch;"));
	}
	buffer.line(format!("use {root}::program::PROGRAM_ID;"));
	buffer.blank();

	buffer.line(format!(
		"pub const {discriminator_const}: &[u8] = &{};",
		array_literal(&instruction.discriminator)
	));
	buffer.blank();

	if has_args {
		let specs = field_specs(&instruction.args, &layouts);
		let docs = vec![format!("Arguments of the `{}` instruction.", instruction.name)];
		write_struct(&mut buffer, registry, &args_name, &docs, &specs, &BTreeSet::new());
		buffer.blank();
		write_struct_codec(&mut buffer, &args_name, &specs);
		buffer.blank();
	}

	if has_accounts {
		buffer.line(format!(
			"/// Accounts of the `{}` instruction that the caller supplies.",
			instruction.name
		));
		buffer.line("#[derive(Debug, Clone, PartialEq)]");
		buffer.block(format!("pub struct {accounts_name} {{"), "}", |b| {
			for account in &supplied {
				b.docs(&account.docs);
				if !account.docs.is_empty() {
					b.line("///");
				}
				b.line(format!("/// {}", account_flags(account)));
				let ty = if account.optional { "Option<Address>" } else { "Address" };
				b.line(format!("pub {}: {ty},", snake_ident(&account.name)));
			}
			for seed in &data_seeds {
				b.line(format!(
					"/// Seed bytes read from the data of `{}` at `{}`.",
					seed.account,
					seed.path.join(".")
				));
				b.line(format!("pub {}: Vec<u8>,", snake_ident(&seed.field)));
			}
		});
		buffer.blank();
	}

	buffer.docs(&instruction.docs);
	let mut params = Vec::new();
	if has_accounts {
		params.push(format!("accounts: &{accounts_name}"));
	}
	if has_args {
		params.push(format!("args: &{args_name}"));
	}
	let signature = format!(
		"pub fn {fn_name}({}) -> Result<InstructionPayload, BuildError> {{",
		params.join(", ")
	);

	let mut body_error = None;
	buffer.block(signature, "}", |b| {
		let mut resolved = false;
		for account in &instruction.accounts {
			let local = address_local(&account.name);
			let field = snake_ident(&account.name);
			if let Some(address) = &account.address {
				if account.derived.is_none() {
					b.line(format!(
						"let {local} = Address::new_from_array({});",
						array_literal(address.as_ref())
					));
					resolved = true;
				}
			} else if account.derived.is_none() {
				if !account.optional {
					b.line(format!("let {local} = accounts.{field}.clone();"));
					resolved = true;
				} else if seed_accounts.contains(account.name.as_str()) {
					b.line(format!("let {local} = accounts.{field}.clone().unwrap_or(PROGRAM_ID);"));
					resolved = true;
				}
			}
		}

		for &index in &order {
			let account = &instruction.accounts[index];
			let Some(function) = catalog.function_for(&instruction.name, &account.name) else {
				continue;
			};
			let mut call_args = Vec::with_capacity(function.shape.params.len());
			for param in &function.shape.params {
				match seed_argument(instruction, &param.source, param.kind, &data_seeds) {
					Ok(arg) => call_args.push(arg),
					Err(err) => {
						body_error = Some(err);
						return;
					}
				}
			}
			b.line(format!(
				"let ({}, _) = {root}::pdas::{}({})",
				address_local(&account.name),
				function.fn_name(),
				call_args.join(", ")
			));
			b.line(format!(
				"    .ok_or(BuildError::Derivation {{ account: {:?} }})?;",
				account.name
			));
			resolved = true;
		}
		if resolved {
			b.blank();
		}

		let args_size: Option<usize> = layouts
			.iter()
			.map(|field| registry.fixed_size(&field.layout))
			.sum();
		if has_args {
			match args_size {
				Some(size) => {
					b.line(format!(
						"let mut data = Vec::with_capacity({});",
						size + instruction.discriminator.len()
					));
				}
				None => b.line("let mut data = Vec::new();"),
			}
			b.line(format!("data.extend_from_slice({discriminator_const});"));
			b.line("args.encode_into(&mut data)?;");
		} else {
			b.line(format!("let data = {discriminator_const}.to_vec();"));
		}
		b.blank();

		b.block("Ok(InstructionPayload {", "})", |b| {
			b.line("program_id: PROGRAM_ID,");
			b.block("accounts: vec![", "],", |b| {
				for account in &instruction.accounts {
					let meta = format!(
						"AccountMeta::new({}, {}, {})",
						"{address}", account.signer, account.writable
					);
					if account.optional && account.is_caller_supplied() {
						b.line(format!(
							"accounts.{}.clone().map_or(AccountMeta::new(PROGRAM_ID, false, false), |address| {}),",
							snake_ident(&account.name),
							meta.replace("{address}", "address")
						));
					} else {
						b.line(format!("{},", meta.replace("{address}", &address_local(&account.name))));
					}
				}
			});
			b.line("data,");
		});
	});

	if let Some(err) = body_error {
		return Err(err);
	}

	Ok(buffer.finish())
}

/// Local variable holding the resolved address of an account.
fn address_local(name: &str) -> String {
	format!("{}_address", snake_ident(name).trim_start_matches("r#"))
}

fn account_flags(account: &AccountRequirement) -> String {
	let mut flags = Vec::new();
	if account.signer {
		flags.push("signer");
	}
	flags.push(if account.writable { "writable" } else { "read-only" });
	if account.optional {
		flags.push("optional, the program id stands in when omitted");
	}
	let text = flags.join(", ");
	let mut chars = text.chars();
	match chars.next() {
		Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
		None => String::new(),
	}
}

/// The expression passed for one seed parameter inside the builder.
fn seed_argument(
	instruction: &InstructionDef,
	source: &SeedSource,
	kind: SeedKind,
	data_seeds: &[DataSeedField],
) -> Result<String> {
	match source {
		SeedSource::Arg { name, path } => {
			let mut expr = format!("args.{}", snake_ident(name));
			for segment in path {
				expr.push('.');
				expr.push_str(&snake_ident(segment));
			}
			if by_value(kind) {
				Ok(expr)
			} else {
				Ok(format!("&{expr}"))
			}
		}
		SeedSource::Account(name) => {
			if instruction.account_index(name).is_none() {
				return Err(GenerateError::unresolved(
					format!("instructions.{}", instruction.name),
					name.clone(),
				));
			}
			Ok(format!("&{}", address_local(name)))
		}
		SeedSource::AccountData { account, path } => {
			let field = data_seeds
				.iter()
				.find(|seed| &seed.account == account && &seed.path == path)
				.map(|seed| snake_ident(&seed.field))
				.ok_or_else(|| {
					GenerateError::unresolved(
						format!("instructions.{}", instruction.name),
						format!("{account}.{}", path.join(".")),
					)
				})?;
			Ok(format!("&accounts.{field}"))
		}
	}
}
