//! Small helpers for writing Rust source text.

use heck::ToSnakeCase;
use heck::ToUpperCamelCase;

pub const GENERATED_HEADER: &str = "//! This file is generated by clientgen. Do not edit.";

const INDENT: &str = "    ";

/// An indentation-aware line buffer. Generated files use four space
/// indentation so they read like `rustfmt` output.
#[derive(Debug, Default)]
pub struct CodeBuffer {
	text: String,
	depth: usize,
}

impl CodeBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start a file with the generated header and an optional module doc.
	pub fn file(docs: &[String]) -> Self {
		let mut buffer = Self::new();
		buffer.line(GENERATED_HEADER);
		if !docs.is_empty() {
			buffer.line("//!");
			for doc in docs {
				buffer.doc_line("//!", doc);
			}
		}
		buffer.blank();
		buffer
	}

	pub fn line(&mut self, text: impl AsRef<str>) {
		let text = text.as_ref();
		if !text.is_empty() {
			for _ in 0..self.depth {
				self.text.push_str(INDENT);
			}
		}
		self.text.push_str(text);
		self.text.push('\n');
	}

	pub fn blank(&mut self) {
		if !self.text.is_empty() && !self.text.ends_with("\n\n") {
			self.text.push('\n');
		}
	}

	/// Write `open`, the body one level deeper, then `close`.
	pub fn block(&mut self, open: impl AsRef<str>, close: &str, body: impl FnOnce(&mut Self)) {
		self.line(open);
		self.depth += 1;
		body(self);
		self.depth -= 1;
		self.line(close);
	}

	/// Outer doc comments, one `///` line per descriptor line.
	pub fn docs(&mut self, docs: &[String]) {
		for doc in docs {
			self.doc_line("///", doc);
		}
	}

	fn doc_line(&mut self, marker: &str, doc: &str) {
		for line in doc.lines() {
			let line = line.trim_end();
			if line.is_empty() {
				self.line(marker);
			} else {
				self.line(format!("{marker} {line}"));
			}
		}
		if doc.is_empty() {
			self.line(marker);
		}
	}

	pub fn finish(mut self) -> String {
		while self.text.ends_with("\n\n") {
			self.text.pop();
		}
		self.text
	}
}

const KEYWORDS: &[&str] = &[
	"as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
	"fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
	"return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
	"abstract", "become", "box", "do", "final", "gen", "macro", "override", "priv", "try",
	"typeof", "unsized", "virtual", "yield",
];

/// A snake case identifier that is safe to use for fields, functions and
/// locals.
pub fn snake_ident(name: &str) -> String {
	let ident = name.to_snake_case();
	escape_ident(ident)
}

/// An upper camel case identifier for types and variants.
pub fn camel_ident(name: &str) -> String {
	let ident = name.to_upper_camel_case();
	escape_ident(ident)
}

/// A screaming snake case identifier for constants.
pub fn const_ident(name: &str) -> String {
	let ident = name.to_snake_case().to_uppercase();
	escape_ident(ident)
}

/// File name (without extension) for a generated module.
pub fn file_stem(name: &str) -> String {
	let ident = snake_ident(name);
	ident.trim_start_matches("r#").to_owned()
}

/// The `mod` name for a file stem produced by [`file_stem`].
pub fn module_ident(stem: &str) -> String {
	escape_ident(stem.to_owned())
}

fn escape_ident(ident: String) -> String {
	if ident.is_empty() {
		return "_unnamed".to_owned();
	}
	if ident.starts_with(|c: char| c.is_ascii_digit()) {
		return format!("_{ident}");
	}
	match ident.as_str() {
		"self" | "Self" | "super" | "crate" => format!("{ident}_"),
		keyword if KEYWORDS.contains(&keyword) => format!("r#{ident}"),
		_ => ident,
	}
}

/// A byte string literal when every byte is printable ASCII, otherwise an
/// array literal.
pub fn bytes_literal(bytes: &[u8]) -> String {
	let printable = !bytes.is_empty() && bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ');
	if printable {
		let mut text = String::from("b\"");
		for &byte in bytes {
			match byte {
				b'"' => text.push_str("\\\""),
				b'\\' => text.push_str("\\\\"),
				other => text.push(char::from(other)),
			}
		}
		text.push('"');
		text
	} else {
		array_literal(bytes)
	}
}

pub fn array_literal(bytes: &[u8]) -> String {
	let items: Vec<String> = bytes.iter().map(u8::to_string).collect();
	format!("[{}]", items.join(", "))
}

/// A string literal with Rust escapes.
pub fn string_literal(text: &str) -> String {
	format!("{text:?}")
}
