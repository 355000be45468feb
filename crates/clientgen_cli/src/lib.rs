pub mod config;
pub mod error;

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use clientgen::GeneratedClient;
use clientgen::InterfaceDescriptor;
use clientgen::PdaCatalog;
use clientgen::RenderConfig;
use clientgen::TypeRegistry;
use clientgen::runtime::BuiltInstruction;
use clientgen::runtime::InstructionInputs;
use clientgen::runtime::Runtime;
use comfy_table::Table;
use comfy_table::presets::ASCII_MARKDOWN;
use serde_json::Value as Json;
use serde_json::json;
use solana_address::Address;

pub use crate::config::ConfigFile;
pub use crate::config::DEFAULT_CONFIG_FILE;
pub use crate::config::GenerateConfig;
use crate::error::CliError;

/// Render the client described by `config` and write it to disk.
pub fn generate_client(config: &GenerateConfig) -> Result<GeneratedClient, CliError> {
	tracing::info!(
		idl = %config.idl.display(),
		output = %config.output.display(),
		"generating client"
	);
	Ok(clientgen::render_idl_file(
		&config.idl,
		&config.output,
		&config.render,
	)?)
}

/// What a descriptor declares and what its client would contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
	pub program: String,
	pub version: String,
	pub address: String,
	pub instructions: usize,
	pub accounts: usize,
	pub events: usize,
	pub shared_types: usize,
	pub derivations: usize,
	pub errors: usize,
	pub constants: usize,
	pub files: usize,
}

/// Load, validate and render a descriptor in memory, without writing.
pub fn check_descriptor(idl: &Path) -> Result<Summary, CliError> {
	let descriptor = clientgen::read_descriptor(idl)?;
	let registry = TypeRegistry::build(&descriptor, clientgen::DEFAULT_MODULE_PATH)?;
	let catalog = PdaCatalog::build(&descriptor, &registry)?;
	let client = clientgen::generate(&descriptor, &RenderConfig::default())?;

	Ok(Summary {
		program: descriptor.name.clone(),
		version: descriptor.version.clone(),
		address: descriptor.address.to_string(),
		instructions: descriptor.instructions.len(),
		accounts: descriptor.accounts.len(),
		events: descriptor.events.len(),
		shared_types: registry.in_module(clientgen::types::TypeModule::Types).len(),
		derivations: catalog.functions().len(),
		errors: descriptor.errors.len(),
		constants: descriptor.constants.len(),
		files: client.files.len(),
	})
}

pub fn summary_table(summary: &Summary) -> Table {
	let mut table = Table::new();
	table.load_preset(ASCII_MARKDOWN);
	table.set_header(vec!["item", "count"]);
	for (item, count) in [
		("instructions", summary.instructions),
		("accounts", summary.accounts),
		("events", summary.events),
		("shared types", summary.shared_types),
		("address derivations", summary.derivations),
		("errors", summary.errors),
		("constants", summary.constants),
		("generated files", summary.files),
	] {
		table.add_row(vec![item.to_owned(), count.to_string()]);
	}
	table
}

/// The descriptor lowered to a Codama root node, as pretty JSON.
pub fn codama_json(idl: &Path) -> Result<String, CliError> {
	let descriptor = clientgen::read_descriptor(idl)?;
	let root = clientgen::descriptor_to_root_node(&descriptor)?;
	serde_json::to_string_pretty(&root).map_err(|source| {
		CliError::Serialize {
			what: "the Codama IDL",
			source,
		}
	})
}

/// Decode raw account or event bytes into their JSON view. With `prefix`,
/// bytes past the declared layout are reported instead of rejected.
pub fn decode_account(idl: &Path, account: &str, data: &str, prefix: bool) -> Result<Json, CliError> {
	let descriptor = clientgen::read_descriptor(idl)?;
	let registry = TypeRegistry::build(&descriptor, clientgen::DEFAULT_MODULE_PATH)?;
	let runtime = Runtime::new(&descriptor, &registry);
	let bytes = parse_hex("--data", data)?;

	if prefix {
		let (value, consumed) = runtime.decode_account_prefix(account, &bytes)?;
		return Ok(json!({
			"value": value.to_json(),
			"consumed": consumed,
			"remaining": bytes.len() - consumed,
		}));
	}
	Ok(runtime.decode_account(account, &bytes)?.to_json())
}

/// Inputs of `build-ix`, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest<'a> {
	pub instruction: &'a str,
	/// JSON object of arguments.
	pub args: &'a str,
	/// JSON object mapping account names to base58 addresses.
	pub accounts: &'a str,
	/// `name=hex` pairs standing in for account data used as seeds.
	pub seed_data: &'a [String],
}

pub fn build_instruction(idl: &Path, request: &BuildRequest<'_>) -> Result<Json, CliError> {
	let descriptor = clientgen::read_descriptor(idl)?;
	let registry = TypeRegistry::build(&descriptor, clientgen::DEFAULT_MODULE_PATH)?;
	let catalog = PdaCatalog::build(&descriptor, &registry)?;
	let runtime = Runtime::new(&descriptor, &registry);

	let args: Json = serde_json::from_str(request.args)
		.map_err(|err| CliError::invalid_input("--args", err.to_string()))?;
	let inputs = InstructionInputs {
		args: runtime.args_from_json(request.instruction, &args)?,
		accounts: parse_accounts(request.accounts)?,
		seed_data: parse_seed_data(request.seed_data)?,
	};
	let built = runtime.build_instruction(&catalog, request.instruction, &inputs)?;
	Ok(instruction_json(&descriptor, &built))
}

fn instruction_json(descriptor: &InterfaceDescriptor, built: &BuiltInstruction) -> Json {
	let accounts: Vec<Json> = built
		.accounts
		.iter()
		.map(|meta| {
			json!({
				"name": meta.name,
				"address": meta.address.to_string(),
				"isSigner": meta.is_signer,
				"isWritable": meta.is_writable,
			})
		})
		.collect();
	json!({
		"program": descriptor.name,
		"programId": built.program_id.to_string(),
		"accounts": accounts,
		"data": hex::encode(&built.data),
	})
}

fn parse_hex(flag: &'static str, text: &str) -> Result<Vec<u8>, CliError> {
	let text = text.trim();
	let text = text.strip_prefix("0x").unwrap_or(text);
	hex::decode(text).map_err(|err| CliError::invalid_input(flag, err.to_string()))
}

fn parse_accounts(text: &str) -> Result<BTreeMap<String, Address>, CliError> {
	let json: Json =
		serde_json::from_str(text).map_err(|err| CliError::invalid_input("--accounts", err.to_string()))?;
	let Json::Object(object) = json else {
		return Err(CliError::invalid_input(
			"--accounts",
			"expected an object of account names to addresses",
		));
	};
	object
		.into_iter()
		.map(|(name, value)| {
			let address = value
				.as_str()
				.and_then(|text| Address::from_str(text).ok())
				.ok_or_else(|| {
					CliError::invalid_input("--accounts", format!("`{name}` is not a base58 address"))
				})?;
			Ok((name, address))
		})
		.collect()
}

fn parse_seed_data(pairs: &[String]) -> Result<BTreeMap<String, Vec<u8>>, CliError> {
	pairs
		.iter()
		.map(|pair| {
			let (name, data) = pair
				.split_once('=')
				.ok_or_else(|| CliError::invalid_input("--seed-data", format!("`{pair}` is not `name=hex`")))?;
			Ok((name.to_owned(), parse_hex("--seed-data", data)?))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_input_accepts_an_optional_prefix() {
		assert_eq!(parse_hex("--data", "0x0a0B").ok(), Some(vec![10, 11]));
		assert_eq!(parse_hex("--data", " ff ").ok(), Some(vec![255]));
		let err = parse_hex("--data", "xyz").err().unwrap_or_else(|| panic!("expected an error"));
		assert_eq!(err.kind(), "InvalidInput");
	}

	#[test]
	fn seed_data_pairs_are_split_on_the_first_equals_sign() {
		let parsed = parse_seed_data(&["owner_mint_seed=0102".to_owned()])
			.unwrap_or_else(|e| panic!("seed data: {e}"));
		assert_eq!(parsed.get("owner_mint_seed"), Some(&vec![1, 2]));
		assert!(parse_seed_data(&["missing".to_owned()]).is_err());
	}

	#[test]
	fn accounts_must_be_base58_addresses() {
		let parsed = parse_accounts(r#"{ "system": "11111111111111111111111111111111" }"#)
			.unwrap_or_else(|e| panic!("accounts: {e}"));
		assert_eq!(parsed.get("system"), Some(&Address::new_from_array([0; 32])));
		let err = parse_accounts(r#"{ "system": "not-an-address" }"#)
			.err()
			.unwrap_or_else(|| panic!("expected an error"));
		assert!(err.to_string().contains("`system`"));
	}
}
