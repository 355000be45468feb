//! Generates the clients under test from the `clientgen` fixture descriptors
//! and mounts each one as a module of this crate.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use clientgen::RenderConfig;
use clientgen::render_idl_file;

/// Descriptor file and the module its client is mounted at.
const CLIENTS: [(&str, &str); 3] = [
	("transfer.json", "token_lite"),
	("vault.json", "vault"),
	("registry.json", "registry"),
];

fn main() {
	let manifest_dir = PathBuf::from(
		env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|e| panic!("CARGO_MANIFEST_DIR: {e}")),
	);
	let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|e| panic!("OUT_DIR: {e}")));
	let fixtures = manifest_dir.join("../clientgen/tests/fixtures");

	let mut mounts = String::new();
	for (file, module) in CLIENTS {
		let idl = fixtures.join(file);
		println!("cargo:rerun-if-changed={}", idl.display());

		let dest = out_dir.join(module);
		let config = RenderConfig {
			module_path: format!("crate::{module}"),
			program_name: None,
		};
		render_idl_file(&idl, &dest, &config)
			.unwrap_or_else(|e| panic!("failed to generate {file}: {e}"));

		let root = dest.join("mod.rs").display().to_string();
		writeln!(mounts, "#[path = {root:?}]\npub mod {module};")
			.unwrap_or_else(|e| panic!("format: {e}"));
	}

	fs::write(out_dir.join("clients.rs"), mounts)
		.unwrap_or_else(|e| panic!("failed to write clients.rs: {e}"));
}
