//! Emits `program.rs` and the `mod.rs` files that tie the tree together.

use solana_address::Address;

use super::code::CodeBuffer;
use super::code::array_literal;
use super::code::module_ident;
use super::code::string_literal;

/// Subdirectories of the generated tree, each with its own `mod.rs`.
pub const MODULE_DIRS: [&str; 5] = ["accounts", "events", "instructions", "pdas", "types"];

pub fn render_program(name: &str, version: &str, address: &Address) -> String {
	let mut buffer = CodeBuffer::file(&[]);
	buffer.line("use solana_address::Address;");
	buffer.blank();
	buffer.line(format!("/// `{address}`"));
	buffer.line(format!(
		"pub const PROGRAM_ID: Address = Address::new_from_array({});",
		array_literal(address.as_ref())
	));
	buffer.blank();
	buffer.line(format!("pub const PROGRAM_NAME: &str = {};", string_literal(name)));
	buffer.line(format!("pub const PROGRAM_VERSION: &str = {};", string_literal(version)));
	buffer.finish()
}

/// The root `mod.rs`.
pub fn render_root(name: &str, version: &str, docs: &[String]) -> String {
	let mut module_docs = vec![format!("Client for the `{name}` program, version {version}.")];
	if !docs.is_empty() {
		module_docs.push(String::new());
		module_docs.extend(docs.iter().cloned());
	}

	let mut buffer = CodeBuffer::file(&module_docs);
	let mut modules: Vec<&str> = MODULE_DIRS.to_vec();
	modules.extend(["codec", "constants", "errors", "program"]);
	modules.sort_unstable();
	for module in modules {
		buffer.line(format!("pub mod {module};"));
	}
	buffer.blank();
	buffer.line("pub use codec::AccountMeta;");
	buffer.line("pub use codec::BuildError;");
	buffer.line("pub use codec::InstructionPayload;");
	buffer.line("pub use codec::LayoutMismatch;");
	buffer.line("pub use program::PROGRAM_ID;");
	buffer.finish()
}

/// A directory `mod.rs` that declares each file and re-exports its items.
/// `exports` pairs a file stem with the items to re-export; `None` means
/// everything.
pub fn render_module_index(exports: &[(String, Option<String>)]) -> String {
	let mut buffer = CodeBuffer::file(&[]);
	for (stem, _) in exports {
		buffer.line(format!("mod {};", module_ident(stem)));
	}
	buffer.blank();
	for (stem, item) in exports {
		let module = module_ident(stem);
		match item {
			Some(item) => buffer.line(format!("pub use {module}::{item};")),
			None => buffer.line(format!("pub use {module}::*;")),
		}
	}
	buffer.finish()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_program_constants() {
		let address = Address::new_from_array([7; 32]);
		let text = render_program("demo", "0.1.0", &address);
		assert!(text.contains("pub const PROGRAM_NAME: &str = \"demo\";"));
		assert!(text.contains("Address::new_from_array([7, 7, 7"));
	}

	#[test]
	fn indexes_modules_with_keyword_names() {
		let text = render_module_index(&[
			("config".to_owned(), Some("Config".to_owned())),
			("type".to_owned(), Some("Type".to_owned())),
		]);
		assert!(text.contains("mod r#type;"));
		assert!(text.contains("pub use r#type::Type;"));
	}
}
