//! The `clientgen.json` configuration file.
//!
//! ```json
//! {
//!   "idl": "target/idl/vault.json",
//!   "clientOutputPath": "src/generated",
//!   "programName": "vault"
//! }
//! ```
//!
//! `clientJs` is accepted as an alias of `clientOutputPath`. Relative paths
//! resolve against the directory holding the configuration file.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use clientgen::RenderConfig;
use serde_json::Map;
use serde_json::Value;

use crate::error::CliError;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "clientgen.json";

const IDL_KEY: &str = "idl";
const OUTPUT_KEYS: [&str; 2] = ["clientOutputPath", "clientJs"];
const PROGRAM_NAME_KEY: &str = "programName";
const MODULE_PATH_KEY: &str = "modulePath";

/// Options read from a configuration file. Every option may still be
/// supplied on the command line, so nothing is required yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
	/// Where the options came from, for error messages.
	pub path: PathBuf,
	pub idl: Option<PathBuf>,
	pub output: Option<PathBuf>,
	pub program_name: Option<String>,
	pub module_path: Option<String>,
}

/// A complete generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateConfig {
	pub idl: PathBuf,
	pub output: PathBuf,
	pub render: RenderConfig,
}

impl ConfigFile {
	pub fn load(path: &Path) -> Result<Self, CliError> {
		let text = fs::read_to_string(path)
			.map_err(|err| CliError::configuration(path, format!("cannot read configuration: {err}")))?;
		let base = path.parent().unwrap_or_else(|| Path::new(""));
		Self::parse(path, &text, base)
	}

	/// Parse a configuration document. Relative paths are joined to `base`.
	pub fn parse(path: &Path, text: &str, base: &Path) -> Result<Self, CliError> {
		let value: Value = serde_json::from_str(text)
			.map_err(|err| CliError::configuration(path, format!("invalid JSON: {err}")))?;
		let Value::Object(object) = value else {
			return Err(CliError::configuration(path, "expected a JSON object"));
		};

		for key in object.keys() {
			if key != IDL_KEY
				&& key != PROGRAM_NAME_KEY
				&& key != MODULE_PATH_KEY
				&& !OUTPUT_KEYS.contains(&key.as_str())
			{
				tracing::debug!(option = %key, "ignoring unrecognized configuration option");
			}
		}

		let idl = string_option(path, &object, IDL_KEY)?.map(|idl| base.join(idl));
		let mut output = None;
		for key in OUTPUT_KEYS {
			if let Some(value) = string_option(path, &object, key)? {
				if output.is_some() {
					return Err(CliError::configuration(
						path,
						"`clientOutputPath` and `clientJs` are both set",
					));
				}
				output = Some(base.join(value));
			}
		}

		Ok(Self {
			path: path.to_path_buf(),
			idl,
			output,
			program_name: string_option(path, &object, PROGRAM_NAME_KEY)?,
			module_path: string_option(path, &object, MODULE_PATH_KEY)?,
		})
	}

	/// Apply command line overrides and check that the required options are
	/// present.
	pub fn resolve(self, idl: Option<PathBuf>, output: Option<PathBuf>) -> Result<GenerateConfig, CliError> {
		let idl = idl
			.or(self.idl)
			.ok_or_else(|| CliError::configuration(&self.path, format!("missing required option `{IDL_KEY}`")))?;
		let output = output.or(self.output).ok_or_else(|| {
			CliError::configuration(
				&self.path,
				format!("missing required option `{}`", OUTPUT_KEYS[0]),
			)
		})?;

		let mut render = RenderConfig {
			program_name: self.program_name,
			..RenderConfig::default()
		};
		if let Some(module_path) = self.module_path {
			render.module_path = module_path;
		}

		Ok(GenerateConfig { idl, output, render })
	}
}

fn string_option(path: &Path, object: &Map<String, Value>, key: &str) -> Result<Option<String>, CliError> {
	match object.get(key) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(value)) if value.trim().is_empty() => {
			Err(CliError::configuration(path, format!("`{key}` must not be empty")))
		}
		Some(Value::String(value)) => Ok(Some(value.clone())),
		Some(_) => Err(CliError::configuration(path, format!("`{key}` must be a string"))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(text: &str) -> Result<ConfigFile, CliError> {
		ConfigFile::parse(Path::new("project/clientgen.json"), text, Path::new("project"))
	}

	#[test]
	fn resolves_paths_against_the_config_directory() {
		let config = parse(r#"{ "idl": "idl/vault.json", "clientOutputPath": "src/generated" }"#)
			.and_then(|file| file.resolve(None, None))
			.unwrap_or_else(|e| panic!("config: {e}"));
		assert_eq!(config.idl, PathBuf::from("project/idl/vault.json"));
		assert_eq!(config.output, PathBuf::from("project/src/generated"));
		assert_eq!(config.render, RenderConfig::default());
	}

	#[test]
	fn accepts_the_client_js_alias_and_ignores_unknown_keys() {
		let config = parse(
			r#"{ "idl": "vault.json", "clientJs": "out", "programName": "custody", "cluster": "devnet" }"#,
		)
		.and_then(|file| file.resolve(None, None))
		.unwrap_or_else(|e| panic!("config: {e}"));
		assert_eq!(config.output, PathBuf::from("project/out"));
		assert_eq!(config.render.program_name.as_deref(), Some("custody"));
	}

	#[test]
	fn missing_required_options_are_configuration_errors() {
		let err = parse(r#"{ "idl": "vault.json" }"#)
			.and_then(|file| file.resolve(None, None))
			.err()
			.unwrap_or_else(|| panic!("expected an error"));
		assert_eq!(err.kind(), "ConfigurationError");
		assert!(err.to_string().contains("clientOutputPath"));
	}

	#[test]
	fn command_line_values_take_precedence() {
		let config = parse(r#"{ "idl": "vault.json", "clientOutputPath": "out" }"#)
			.and_then(|file| file.resolve(Some("other.json".into()), None))
			.unwrap_or_else(|e| panic!("config: {e}"));
		assert_eq!(config.idl, PathBuf::from("other.json"));
		assert_eq!(config.output, PathBuf::from("project/out"));
	}

	#[test]
	fn rejects_non_string_options() {
		let err = parse(r#"{ "idl": 7, "clientOutputPath": "out" }"#)
			.err()
			.unwrap_or_else(|| panic!("expected an error"));
		assert!(err.to_string().contains("`idl` must be a string"));
	}
}
