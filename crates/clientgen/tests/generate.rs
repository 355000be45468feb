use std::fs;
use std::path::Path;
use std::path::PathBuf;

use clientgen::ErrorKind;
use clientgen::GenerateError;
use clientgen::GeneratedClient;
use clientgen::RenderConfig;
use clientgen::generate;
use clientgen::read_descriptor;
use clientgen::render_idl_file;

fn fixture(name: &str) -> PathBuf {
	Path::new(env!("CARGO_MANIFEST_DIR"))
		.join("tests/fixtures")
		.join(name)
}

fn render(name: &str) -> GeneratedClient {
	let descriptor =
		read_descriptor(&fixture(name)).unwrap_or_else(|e| panic!("failed to load {name}: {e}"));
	generate(&descriptor, &RenderConfig::default())
		.unwrap_or_else(|e| panic!("failed to generate {name}: {e}"))
}

fn contents<'a>(client: &'a GeneratedClient, path: &str) -> &'a str {
	&client
		.get(path)
		.unwrap_or_else(|| panic!("missing generated file {path}"))
		.contents
}

fn read_tree(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
	let mut pending = vec![root.to_path_buf()];
	let mut files = Vec::new();
	while let Some(dir) = pending.pop() {
		for entry in fs::read_dir(&dir).unwrap_or_else(|e| panic!("read_dir {}: {e}", dir.display())) {
			let path = entry.unwrap_or_else(|e| panic!("dir entry: {e}")).path();
			if path.is_dir() {
				pending.push(path);
			} else {
				let bytes = fs::read(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
				let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
				files.push((relative, bytes));
			}
		}
	}
	files.sort();
	files
}

#[test]
fn transfer_instruction() {
	let client = render("transfer.json");
	let text = contents(&client, "instructions/transfer.rs");
	insta::assert_snapshot!("transfer_instruction", text);
}

#[test]
fn lays_out_the_module_tree() {
	let client = render("vault.json");
	let paths: Vec<String> = client
		.files
		.iter()
		.map(|file| file.path.to_string_lossy().replace('\\', "/"))
		.collect();
	assert_eq!(paths, vec![
		"accounts/mod.rs",
		"accounts/vault.rs",
		"codec.rs",
		"constants.rs",
		"errors.rs",
		"events/deposited.rs",
		"events/mod.rs",
		"instructions/deposit.rs",
		"instructions/initialize.rs",
		"instructions/mod.rs",
		"mod.rs",
		"pdas/mod.rs",
		"pdas/receipt.rs",
		"pdas/vault.rs",
		"program.rs",
		"types/mod.rs",
		"types/tier.rs",
		"types/vault_config.rs",
	]);
	for file in &client.files {
		assert!(
			file.contents.starts_with("//! This file is generated by clientgen. Do not edit."),
			"{} lacks the generated header",
			file.path.display()
		);
	}
}

#[test]
fn shared_types_are_emitted_once() {
	let client = render("vault.json");
	let definitions = client
		.files
		.iter()
		.filter(|file| file.contents.contains("pub struct VaultConfig"))
		.count();
	assert_eq!(definitions, 1);
	assert!(contents(&client, "types/vault_config.rs").contains("pub struct VaultConfig {"));

	for path in ["accounts/vault.rs", "instructions/initialize.rs"] {
		assert!(
			contents(&client, path).contains("crate::generated::types::VaultConfig"),
			"{path} should refer to the shared type"
		);
	}
	assert!(contents(&client, "types/vault_config.rs").contains("crate::generated::types::Tier"));
}

#[test]
fn resolves_derived_and_fixed_accounts_inside_builders() {
	let client = render("vault.json");
	let initialize = contents(&client, "instructions/initialize.rs");

	let vault = initialize
		.find("crate::generated::pdas::find_vault_address(&authority_address)\n")
		.unwrap_or_else(|| panic!("vault is not derived from the authority"));
	assert!(initialize.contains(".ok_or(BuildError::Derivation { account: \"vault\" })?;"));
	let receipt = initialize
		.find("crate::generated::pdas::find_receipt_address(&vault_address)")
		.unwrap_or_else(|| panic!("receipt is not derived from the vault"));
	assert!(vault < receipt, "the vault must be derived before the receipt");

	assert!(initialize.contains("let system_program_address = Address::new_from_array([0, 0"));
	assert!(!initialize.contains("pub vault: Address"));
	assert!(!initialize.contains("pub system_program: Address"));

	let deposit = contents(&client, "instructions/deposit.rs");
	assert!(deposit.contains("pub referrer: Option<Address>,"));
	assert!(deposit.contains(
		"accounts.referrer.clone().map_or(AccountMeta::new(PROGRAM_ID, false, false), |address| AccountMeta::new(address, false, false)),"
	));
	assert!(deposit.contains("let authority_address = accounts.authority.clone();"));
	assert!(!deposit.contains("referrer_address"), "no seed reads the referrer");
}

#[test]
fn shares_identical_derivations_between_instructions() {
	let client = render("vault.json");
	let index = contents(&client, "pdas/mod.rs");
	assert!(index.contains("pub use vault::find_vault_address;"));
	assert!(index.contains("pub use receipt::find_receipt_address;"));

	let vault = contents(&client, "pdas/vault.rs");
	assert!(vault.contains("pub fn find_vault_address(authority: &Address) -> Option<(Address, u8)> {"));
	assert!(vault.contains("Address::try_find_program_address(seeds, &PROGRAM_ID)"));
}

#[test]
fn renders_errors_and_constants() {
	let client = render("vault.json");
	let errors = contents(&client, "errors.rs");
	assert!(errors.contains("Unauthorized = 6000"));
	assert!(errors.contains("Signer is not the vault authority"));
	assert!(errors.contains("CapExceeded = 6001"));

	let constants = contents(&client, "constants.rs");
	assert!(constants.contains("/// Upper bound on `fee_bps`."));
	assert!(constants.contains("pub const MAX_FEE_BPS: u16 = 1000;"));
	assert!(constants.contains("pub const VAULT_SEED"));
}

#[test]
fn program_name_can_be_overridden() {
	let descriptor = read_descriptor(&fixture("vault.json")).unwrap_or_else(|e| panic!("load: {e}"));
	let config = RenderConfig {
		program_name: Some("custody".to_owned()),
		..RenderConfig::default()
	};
	let client = generate(&descriptor, &config).unwrap_or_else(|e| panic!("generate: {e}"));
	assert!(contents(&client, "program.rs").contains("pub const PROGRAM_NAME: &str = \"custody\";"));
	assert!(contents(&client, "program.rs").contains("pub const PROGRAM_VERSION: &str = \"0.3.1\";"));
}

#[test]
fn module_path_is_used_for_cross_references() {
	let descriptor = read_descriptor(&fixture("vault.json")).unwrap_or_else(|e| panic!("load: {e}"));
	let config = RenderConfig {
		module_path: "crate::vault_client".to_owned(),
		..RenderConfig::default()
	};
	let client = generate(&descriptor, &config).unwrap_or_else(|e| panic!("generate: {e}"));
	let account = contents(&client, "accounts/vault.rs");
	assert!(account.contains("crate::vault_client::types::VaultConfig"));
	assert!(!account.contains("crate::generated"));
}

#[test]
fn output_is_byte_identical_across_runs() {
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let first = dir.path().join("first");
	let second = dir.path().join("second");
	let idl = fixture("vault.json");

	render_idl_file(&idl, &first, &RenderConfig::default()).unwrap_or_else(|e| panic!("first run: {e}"));
	render_idl_file(&idl, &second, &RenderConfig::default()).unwrap_or_else(|e| panic!("second run: {e}"));

	let first = read_tree(&first);
	assert!(!first.is_empty());
	assert_eq!(first, read_tree(&second));
}

#[test]
fn regenerating_replaces_stale_files() {
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let out = dir.path().join("generated");
	render_idl_file(&fixture("vault.json"), &out, &RenderConfig::default())
		.unwrap_or_else(|e| panic!("vault: {e}"));
	render_idl_file(&fixture("transfer.json"), &out, &RenderConfig::default())
		.unwrap_or_else(|e| panic!("transfer: {e}"));

	assert!(out.join("instructions/transfer.rs").exists());
	assert!(!out.join("instructions/deposit.rs").exists());
	assert!(!out.join("types/vault_config.rs").exists());
}

#[test]
fn seed_cycles_write_nothing() {
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let out = dir.path().join("generated");
	let err = render_idl_file(&fixture("seed_cycle.json"), &out, &RenderConfig::default())
		.err()
		.unwrap_or_else(|| panic!("expected a seed cycle"));

	assert_eq!(err.kind(), ErrorKind::SeedCycle);
	assert!(err.to_string().contains("first -> second -> first"));
	assert!(!out.exists());
}

#[test]
fn failed_runs_keep_previous_output() {
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	let out = dir.path().join("generated");
	render_idl_file(&fixture("transfer.json"), &out, &RenderConfig::default())
		.unwrap_or_else(|e| panic!("transfer: {e}"));
	let before = read_tree(&out);

	let err = render_idl_file(&fixture("dangling_type.json"), &out, &RenderConfig::default()).err();
	assert!(err.is_some());
	assert_eq!(read_tree(&out), before);
}

#[test]
fn dangling_references_name_their_location() {
	let err = read_descriptor(&fixture("dangling_type.json"))
		.err()
		.unwrap_or_else(|| panic!("expected an unresolved reference"));
	assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
	assert!(matches!(
		&err,
		GenerateError::UnresolvedReference { context, reference }
			if context == "instructions.configure.args.settings" && reference == "Settings"
	));
}

#[test]
fn missing_descriptor_files_are_io_errors() {
	let err = read_descriptor(&fixture("does_not_exist.json"))
		.err()
		.unwrap_or_else(|| panic!("expected an io error"));
	assert_eq!(err.kind(), ErrorKind::Io);
}
