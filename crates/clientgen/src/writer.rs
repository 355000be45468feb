//! Writes a rendered client to disk.
//!
//! The output directory belongs to the generator. Files are staged into a
//! sibling directory and moved into place only once all of them have been
//! written, so a failed run leaves the previous output as it was.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::error::GenerateError;
use crate::error::Result;

/// One generated file, with a path relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
	pub path: PathBuf,
	pub contents: String,
}

impl GeneratedFile {
	pub fn new(path: impl Into<PathBuf>, contents: String) -> Self {
		Self {
			path: path.into(),
			contents,
		}
	}
}

/// A fully rendered client, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedClient {
	pub files: Vec<GeneratedFile>,
}

impl GeneratedClient {
	pub fn new(mut files: Vec<GeneratedFile>) -> Self {
		files.sort_by(|a, b| a.path.cmp(&b.path));
		Self { files }
	}

	pub fn get(&self, path: impl AsRef<Path>) -> Option<&GeneratedFile> {
		let path = path.as_ref();
		self.files.iter().find(|file| file.path == path)
	}
}

const STAGING_SUFFIX: &str = ".clientgen-tmp";
const BACKUP_SUFFIX: &str = ".clientgen-old";

/// Replace `dest` with the files of `client`.
pub fn write_client(client: &GeneratedClient, dest: &Path) -> Result<()> {
	let staging = sibling(dest, STAGING_SUFFIX);
	let backup = sibling(dest, BACKUP_SUFFIX);

	if let Some(parent) = dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
		create_dir(parent)?;
	}
	remove_dir(&staging)?;
	create_dir(&staging)?;

	if let Err(err) = stage_files(client, &staging) {
		// The staging directory is scratch space; the original error matters.
		if let Err(cleanup) = fs::remove_dir_all(&staging) {
			tracing::warn!(
				path = %staging.display(),
				error = %cleanup,
				"failed to remove the staging directory"
			);
		}
		return Err(err);
	}

	remove_dir(&backup)?;
	if dest.exists() {
		rename(dest, &backup)?;
	}
	if let Err(err) = rename(&staging, dest) {
		if backup.exists() {
			if let Err(restore) = fs::rename(&backup, dest) {
				tracing::warn!(
					backup = %backup.display(),
					path = %dest.display(),
					error = %restore,
					"failed to restore the previous output"
				);
			}
		}
		return Err(err);
	}
	remove_dir(&backup)?;

	tracing::info!(
		path = %dest.display(),
		files = client.files.len(),
		"wrote generated client"
	);

	Ok(())
}

fn stage_files(client: &GeneratedClient, staging: &Path) -> Result<()> {
	for file in &client.files {
		let path = staging.join(&file.path);
		if let Some(parent) = path.parent() {
			create_dir(parent)?;
		}
		fs::write(&path, &file.contents).map_err(|source| GenerateError::WriteFile { path, source })?;
	}
	Ok(())
}

fn sibling(dest: &Path, suffix: &str) -> PathBuf {
	let mut name = dest
		.file_name()
		.map(|name| name.to_os_string())
		.unwrap_or_else(|| "generated".into());
	name.push(suffix);
	dest.with_file_name(name)
}

fn create_dir(path: &Path) -> Result<()> {
	fs::create_dir_all(path).map_err(|source| {
		GenerateError::WriteFile {
			path: path.to_path_buf(),
			source,
		}
	})
}

fn remove_dir(path: &Path) -> Result<()> {
	if !path.exists() {
		return Ok(());
	}
	fs::remove_dir_all(path).map_err(|source| {
		GenerateError::WriteFile {
			path: path.to_path_buf(),
			source,
		}
	})
}

fn rename(from: &Path, to: &Path) -> Result<()> {
	fs::rename(from, to).map_err(|source| {
		GenerateError::WriteFile {
			path: to.to_path_buf(),
			source,
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn client(contents: &str) -> GeneratedClient {
		GeneratedClient::new(vec![
			GeneratedFile::new("types/mod.rs", format!("// types {contents}\n")),
			GeneratedFile::new("mod.rs", format!("// root {contents}\n")),
		])
	}

	#[test]
	fn sorts_files_by_path() {
		let client = client("a");
		let paths: Vec<_> = client.files.iter().map(|file| file.path.clone()).collect();
		assert_eq!(paths, vec![PathBuf::from("mod.rs"), PathBuf::from("types/mod.rs")]);
	}

	#[test]
	fn failed_staging_leaves_the_destination_and_no_scratch() {
		let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
		let dest = dir.path().join("generated");
		write_client(&client("first"), &dest).unwrap_or_else(|e| panic!("write: {e}"));

		// A file and a directory cannot share a path, so staging fails.
		let broken = GeneratedClient::new(vec![
			GeneratedFile::new("types", "// file\n".to_owned()),
			GeneratedFile::new("types/mod.rs", "// nested\n".to_owned()),
		]);
		let err = write_client(&broken, &dest).err();
		assert!(err.is_some());

		let root = fs::read_to_string(dest.join("mod.rs")).unwrap_or_else(|e| panic!("read: {e}"));
		assert_eq!(root, "// root first\n");
		assert!(!sibling(&dest, STAGING_SUFFIX).exists());
	}

	#[test]
	fn replaces_previous_output() {
		let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
		let dest = dir.path().join("generated");

		write_client(&client("first"), &dest).unwrap_or_else(|e| panic!("write: {e}"));
		fs::write(dest.join("stale.rs"), "// stale\n").unwrap_or_else(|e| panic!("write: {e}"));
		write_client(&client("second"), &dest).unwrap_or_else(|e| panic!("write: {e}"));

		let root = fs::read_to_string(dest.join("mod.rs")).unwrap_or_else(|e| panic!("read: {e}"));
		assert_eq!(root, "// root second\n");
		assert!(!dest.join("stale.rs").exists());
		assert!(!sibling(&dest, STAGING_SUFFIX).exists());
		assert!(!sibling(&dest, BACKUP_SUFFIX).exists());
	}
}
