//! Emits one address derivation helper per rule in the [`PdaCatalog`].

use std::collections::BTreeSet;

use super::code::CodeBuffer;
use super::code::array_literal;
use super::code::bytes_literal;
use super::code::snake_ident;
use crate::pda::PdaFunction;
use crate::pda::PdaProgram;
use crate::pda::SeedKind;
use crate::pda::SeedParam;
use crate::pda::SeedPart;
use crate::types::TypeRegistry;

/// Rust parameter type for a seed.
pub fn param_type(kind: SeedKind) -> String {
	match kind {
		SeedKind::Int { width, signed } => format!("{}{}", if signed { "i" } else { "u" }, width * 8),
		SeedKind::Bool => "bool".to_owned(),
		SeedKind::Pubkey => "&Address".to_owned(),
		SeedKind::Str => "&str".to_owned(),
		SeedKind::Bytes => "&[u8]".to_owned(),
		SeedKind::ByteArray(len) => format!("&[u8; {len}]"),
	}
}

/// Whether the parameter is passed by value rather than by reference.
pub fn by_value(kind: SeedKind) -> bool {
	matches!(kind, SeedKind::Int { .. } | SeedKind::Bool)
}

pub fn render_pda(registry: &TypeRegistry, function: &PdaFunction) -> String {
	let shape = &function.shape;
	let mut buffer = CodeBuffer::file(&[]);

	buffer.line("use solana_address::Address;");
	buffer.blank();
	if shape.program == PdaProgram::Current {
		buffer.line(format!("use {}::program::PROGRAM_ID;", registry.module_path()));
		buffer.blank();
	}

	let users: Vec<String> = function
		.users
		.iter()
		.map(|(instruction, account)| format!("`{instruction}.{account}`"))
		.collect();
	buffer.line(format!(
		"/// Find the program derived address used by {}.",
		users.join(", ")
	));
	buffer.line("///");
	buffer.line("/// Returns the address and its bump seed, or `None` when no bump gives a");
	buffer.line("/// valid address, which is always the case for seeds over 32 bytes.");

	let params: Vec<String> = shape
		.params
		.iter()
		.map(|param| format!("{}: {}", snake_ident(&param.name), param_type(param.kind)))
		.collect();
	let signature = format!(
		"pub fn {}({}) -> Option<(Address, u8)> {{",
		function.fn_name(),
		params.join(", ")
	);

	buffer.block(signature, "}", |b| {
		let mut seeds = Vec::with_capacity(shape.seeds.len());
		let mut bound = BTreeSet::new();
		for seed in &shape.seeds {
			match seed {
				SeedPart::Literal(bytes) => {
					let literal = bytes_literal(bytes);
					if literal.starts_with('[') {
						seeds.push(format!("&{literal}"));
					} else {
						seeds.push(literal);
					}
				}
				SeedPart::Param(index) => {
					let param = &shape.params[*index];
					if bound.insert(*index) {
						if let Some(binding) = seed_binding(param) {
							b.line(binding);
						}
					}
					seeds.push(seed_expr(param));
				}
			}
		}
		b.line(format!("let seeds: &[&[u8]] = &[{}];", seeds.join(", ")));

		let program = match &shape.program {
			PdaProgram::Current => "&PROGRAM_ID".to_owned(),
			PdaProgram::Literal(address) => {
				b.line(format!(
					"let program_id = Address::new_from_array({});",
					array_literal(address.as_ref())
				));
				"&program_id".to_owned()
			}
			PdaProgram::Param(index) => snake_ident(&shape.params[*index].name),
		};
		b.line(format!("Address::try_find_program_address(seeds, {program})"));
	});

	buffer.finish()
}

/// A `let` that turns a by-value seed into bytes, when one is needed.
fn seed_binding(param: &SeedParam) -> Option<String> {
	let name = snake_ident(&param.name);
	let bytes = bytes_local(&param.name);
	match param.kind {
		SeedKind::Int { .. } => Some(format!("let {bytes} = {name}.to_le_bytes();")),
		SeedKind::Bool => Some(format!("let {bytes} = [u8::from({name})];")),
		_ => None,
	}
}

fn seed_expr(param: &SeedParam) -> String {
	let name = snake_ident(&param.name);
	match param.kind {
		SeedKind::Int { .. } | SeedKind::Bool => format!("&{}", bytes_local(&param.name)),
		SeedKind::Pubkey => format!("{name}.as_ref()"),
		SeedKind::Str => format!("{name}.as_bytes()"),
		SeedKind::Bytes | SeedKind::ByteArray(_) => name,
	}
}

fn bytes_local(name: &str) -> String {
	format!("{}_bytes", snake_ident(name).trim_start_matches("r#"))
}
