//! Renders the generated module tree.
//!
//! Every file is rendered in memory from the shared, read-only model. Units
//! that do not depend on each other (one file per type, account, event,
//! instruction and derivation rule) are rendered in parallel and collected in
//! their original order.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::error::GenerateError;
use crate::error::Result;
use crate::pda::PdaCatalog;
use crate::schema::InterfaceDescriptor;
use crate::types::TypeModule;
use crate::types::TypeRegistry;
use crate::writer::GeneratedFile;

pub mod accounts;
pub mod code;
pub mod codec;
pub mod constants;
pub mod errors;
pub mod instructions;
pub mod pdas;
pub mod program;
pub mod types;

/// Everything the emitters read.
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
	pub descriptor: &'a InterfaceDescriptor,
	pub registry: &'a TypeRegistry,
	pub catalog: &'a PdaCatalog,
	/// Program name used for the error enum and `PROGRAM_NAME`.
	pub program_name: &'a str,
}

pub fn render_files(cx: EmitContext<'_>) -> Result<Vec<GeneratedFile>> {
	let EmitContext {
		descriptor,
		registry,
		catalog,
		program_name,
	} = cx;

	let mut files = vec![
		GeneratedFile::new(
			"mod.rs",
			program::render_root(program_name, &descriptor.version, &descriptor.docs),
		),
		GeneratedFile::new("codec.rs", codec::render()),
		GeneratedFile::new(
			"program.rs",
			program::render_program(program_name, &descriptor.version, &descriptor.address),
		),
		GeneratedFile::new("errors.rs", errors::render_errors(program_name, &descriptor.errors)),
		GeneratedFile::new(
			"constants.rs",
			constants::render_constants(registry, &descriptor.constants)?,
		),
	];

	let shared = registry.in_module(TypeModule::Types);
	let rendered: Vec<GeneratedFile> = shared
		.par_iter()
		.map(|entry| {
			let text = types::render_type(registry, descriptor, entry)?;
			tracing::debug!(name = %entry.name, "rendered type");
			Ok(GeneratedFile::new(format!("types/{}.rs", entry.file_stem), text))
		})
		.collect::<Result<_>>()?;
	files.extend(rendered);
	files.push(index_file(
		"types",
		shared
			.iter()
			.map(|entry| (entry.file_stem.clone(), Some(entry.rust_name.clone())))
			.collect(),
	));

	for module in [TypeModule::Accounts, TypeModule::Events] {
		let entries = registry.in_module(module);
		let rendered: Vec<GeneratedFile> = entries
			.par_iter()
			.map(|entry| {
				let def = match module {
					TypeModule::Events => descriptor.find_event(&entry.name),
					_ => descriptor.find_account(&entry.name),
				}
				.ok_or_else(|| GenerateError::unresolved(module.dir(), entry.name.clone()))?;
				let text = accounts::render_account(registry, def, entry)?;
				tracing::debug!(name = %entry.name, module = module.dir(), "rendered layout");
				Ok(GeneratedFile::new(
					format!("{}/{}.rs", module.dir(), entry.file_stem),
					text,
				))
			})
			.collect::<Result<_>>()?;
		files.extend(rendered);
		files.push(index_file(
			module.dir(),
			entries
				.iter()
				.map(|entry| (entry.file_stem.clone(), Some(entry.rust_name.clone())))
				.collect(),
		));
	}

	let mut instruction_stems: BTreeMap<String, &str> = BTreeMap::new();
	for instruction in &descriptor.instructions {
		let stem = code::file_stem(&instruction.name);
		if let Some(first) = instruction_stems.insert(stem, &instruction.name) {
			return Err(GenerateError::malformed(
				format!("instructions.{}", instruction.name),
				format!("name collides with `{first}` after case conversion"),
			));
		}
	}
	let rendered: Vec<GeneratedFile> = descriptor
		.instructions
		.par_iter()
		.map(|instruction| {
			let text = instructions::render_instruction(registry, catalog, instruction)?;
			tracing::debug!(name = %instruction.name, "rendered instruction");
			Ok(GeneratedFile::new(
				format!("instructions/{}.rs", code::file_stem(&instruction.name)),
				text,
			))
		})
		.collect::<Result<_>>()?;
	files.extend(rendered);
	files.push(index_file(
		"instructions",
		instruction_stems.into_keys().map(|stem| (stem, None)).collect(),
	));

	let rendered: Vec<GeneratedFile> = catalog
		.functions()
		.par_iter()
		.map(|function| {
			GeneratedFile::new(
				format!("pdas/{}.rs", function.name),
				pdas::render_pda(registry, function),
			)
		})
		.collect();
	files.extend(rendered);
	files.push(index_file(
		"pdas",
		catalog
			.functions()
			.iter()
			.map(|function| (function.name.clone(), Some(function.fn_name())))
			.collect(),
	));

	Ok(files)
}

fn index_file(dir: &str, exports: Vec<(String, Option<String>)>) -> GeneratedFile {
	GeneratedFile::new(
		format!("{dir}/mod.rs"),
		program::render_module_index(&exports),
	)
}
