use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerateError>;

/// The failure categories a generation run can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	MalformedDescriptor,
	UnresolvedReference,
	DuplicateDiscriminant,
	UnsupportedType,
	LayoutMismatch,
	SeedCycle,
	Io,
}

impl ErrorKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::MalformedDescriptor => "MalformedDescriptor",
			Self::UnresolvedReference => "UnresolvedReference",
			Self::DuplicateDiscriminant => "DuplicateDiscriminant",
			Self::UnsupportedType => "UnsupportedType",
			Self::LayoutMismatch => "LayoutMismatch",
			Self::SeedCycle => "SeedCycle",
			Self::Io => "Io",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Error)]
pub enum GenerateError {
	#[error("failed to read `{path}`: {source}")]
	ReadFile {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("failed to write `{path}`: {source}")]
	WriteFile {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("malformed descriptor at `{context}`: {reason}")]
	MalformedDescriptor { context: String, reason: String },
	#[error("unresolved reference `{reference}` at `{context}`")]
	UnresolvedReference { context: String, reference: String },
	#[error(
		"duplicate {namespace} discriminator {discriminator:?} shared by `{first}` and `{second}`"
	)]
	DuplicateDiscriminant {
		namespace: &'static str,
		discriminator: Vec<u8>,
		first: String,
		second: String,
	},
	#[error("unsupported type `{kind}` at `{context}`: {reason}")]
	UnsupportedType {
		context: String,
		kind: String,
		reason: String,
	},
	#[error("seed cycle in instruction `{instruction}`: {}", cycle.join(" -> "))]
	SeedCycle {
		instruction: String,
		cycle: Vec<String>,
	},
	#[error(transparent)]
	LayoutMismatch(#[from] LayoutMismatch),
}

impl GenerateError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::ReadFile { .. } | Self::WriteFile { .. } => ErrorKind::Io,
			Self::MalformedDescriptor { .. } => ErrorKind::MalformedDescriptor,
			Self::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
			Self::DuplicateDiscriminant { .. } => ErrorKind::DuplicateDiscriminant,
			Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
			Self::SeedCycle { .. } => ErrorKind::SeedCycle,
			Self::LayoutMismatch(_) => ErrorKind::LayoutMismatch,
		}
	}

	pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::MalformedDescriptor {
			context: context.into(),
			reason: reason.into(),
		}
	}

	pub fn unresolved(context: impl Into<String>, reference: impl Into<String>) -> Self {
		Self::UnresolvedReference {
			context: context.into(),
			reference: reference.into(),
		}
	}

	pub fn unsupported(
		context: impl Into<String>,
		kind: impl Into<String>,
		reason: impl Into<String>,
	) -> Self {
		Self::UnsupportedType {
			context: context.into(),
			kind: kind.into(),
			reason: reason.into(),
		}
	}
}

/// Raised when bytes or values do not fit the layout they are decoded into
/// or encoded from. This is the only error the generated client can return
/// at runtime; the reference runtime in [`crate::runtime`] reports the same
/// cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutMismatch {
	#[error("`{context}`: expected {needed} more byte(s), found {remaining}")]
	UnexpectedEnd {
		context: String,
		needed: usize,
		remaining: usize,
	},
	#[error("`{context}`: discriminator mismatch, expected {expected:?}, found {found:?}")]
	Discriminator {
		context: String,
		expected: Vec<u8>,
		found: Vec<u8>,
	},
	#[error("`{context}`: {remaining} trailing byte(s) after the declared layout")]
	TrailingBytes { context: String, remaining: usize },
	#[error("`{context}`: invalid tag {tag}")]
	InvalidTag { context: String, tag: u32 },
	#[error("`{context}`: string is not valid UTF-8")]
	InvalidUtf8 { context: String },
	#[error("`{context}`: expected {expected}")]
	ValueShape { context: String, expected: String },
	#[error("`{context}`: missing value for `{name}`")]
	MissingValue { context: String, name: String },
}
