//! Deterministic generator of typed Rust clients from Solana program
//! interface descriptors (Anchor-style IDL JSON).
//!
//! A run loads a descriptor into the [`schema`] model, maps every named type
//! once into a [`TypeRegistry`], plans the program derived addresses, renders
//! every file of the client in memory and finally swaps the rendered tree into
//! the output directory.

pub mod codama;
pub mod emit;
pub mod error;
pub mod idl;
pub mod layout;
pub mod loader;
pub mod pda;
pub mod runtime;
pub mod schema;
pub mod types;
pub mod writer;

use std::path::Path;

pub use crate::codama::descriptor_to_root_node;
pub use crate::error::ErrorKind;
pub use crate::error::GenerateError;
pub use crate::error::LayoutMismatch;
pub use crate::error::Result;
pub use crate::loader::load_descriptor;
pub use crate::loader::read_descriptor;
pub use crate::pda::PdaCatalog;
pub use crate::schema::InterfaceDescriptor;
pub use crate::types::TypeRegistry;
pub use crate::writer::GeneratedClient;
pub use crate::writer::GeneratedFile;
pub use crate::writer::write_client;

use crate::emit::EmitContext;

/// Where the generated tree is mounted in the consuming crate.
pub const DEFAULT_MODULE_PATH: &str = "crate::generated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
	/// Rust path of the generated module, used for cross-file references.
	pub module_path: String,
	/// Overrides the descriptor's program name.
	pub program_name: Option<String>,
}

impl Default for RenderConfig {
	fn default() -> Self {
		Self {
			module_path: DEFAULT_MODULE_PATH.to_owned(),
			program_name: None,
		}
	}
}

/// Render the complete client for `descriptor` without touching the disk.
pub fn generate(descriptor: &InterfaceDescriptor, config: &RenderConfig) -> Result<GeneratedClient> {
	let registry = TypeRegistry::build(descriptor, &config.module_path)?;
	let catalog = PdaCatalog::build(descriptor, &registry)?;
	let program_name = config.program_name.as_deref().unwrap_or(&descriptor.name);

	let files = emit::render_files(EmitContext {
		descriptor,
		registry: &registry,
		catalog: &catalog,
		program_name,
	})?;

	tracing::info!(
		program = program_name,
		instructions = descriptor.instructions.len(),
		accounts = descriptor.accounts.len(),
		files = files.len(),
		"rendered client"
	);

	Ok(GeneratedClient::new(files))
}

/// Read the descriptor at `idl_path` and write its client to `output_dir`.
/// Nothing is written unless the whole client renders.
pub fn render_idl_file(idl_path: &Path, output_dir: &Path, config: &RenderConfig) -> Result<GeneratedClient> {
	let descriptor = read_descriptor(idl_path)?;
	let client = generate(&descriptor, config)?;
	write_client(&client, output_dir)?;
	Ok(client)
}
