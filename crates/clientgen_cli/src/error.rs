use std::path::PathBuf;

use clientgen::GenerateError;

/// Errors reported by the `clientgen` command line.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
	#[error("{0}")]
	Generate(#[from] GenerateError),

	#[error("`{path}`: {reason}")]
	Configuration { path: PathBuf, reason: String },

	#[error("invalid `{flag}`: {reason}")]
	InvalidInput { flag: &'static str, reason: String },

	#[error("failed to write {path}: {source}")]
	WriteOutput {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("failed to serialize {what}: {source}")]
	Serialize {
		what: &'static str,
		source: serde_json::Error,
	},
}

impl CliError {
	pub fn configuration(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
		Self::Configuration {
			path: path.into(),
			reason: reason.into(),
		}
	}

	pub fn invalid_input(flag: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidInput {
			flag,
			reason: reason.into(),
		}
	}

	/// The category printed in `error[<kind>]`.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Generate(err) => err.kind().as_str(),
			Self::Configuration { .. } => "ConfigurationError",
			Self::InvalidInput { .. } => "InvalidInput",
			Self::WriteOutput { .. } => "Io",
			Self::Serialize { .. } => "Serialization",
		}
	}
}
