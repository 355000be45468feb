use super::code::CodeBuffer;
use super::code::camel_ident;
use super::code::string_literal;
use crate::schema::ErrorDef;

/// Name of the generated error enum for a program.
pub fn error_enum_name(program_name: &str) -> String {
	format!("{}Error", camel_ident(program_name))
}

/// Render `errors.rs`: one variant per declared error, keyed by its code.
pub fn render_errors(program_name: &str, errors: &[ErrorDef]) -> String {
	let mut buffer = CodeBuffer::file(&[]);
	if errors.is_empty() {
		buffer.line(format!("// `{program_name}` declares no custom errors."));
		return buffer.finish();
	}

	let name = error_enum_name(program_name);
	buffer.line("use core::fmt;");
	buffer.blank();

	buffer.line(format!("/// Custom errors returned by the `{program_name}` program."));
	buffer.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
	buffer.line("#[repr(u32)]");
	buffer.block(format!("pub enum {name} {{"), "}", |b| {
		for error in errors {
			if let Some(msg) = &error.msg {
				b.docs(std::slice::from_ref(msg));
			}
			b.line(format!("{} = {},", camel_ident(&error.name), error.code));
		}
	});
	buffer.blank();

	buffer.block(format!("impl {name} {{"), "}", |b| {
		b.block("pub const fn code(self) -> u32 {", "}", |b| {
			b.line("self as u32");
		});
		b.blank();
		b.block("pub const fn from_code(code: u32) -> Option<Self> {", "}", |b| {
			b.block("match code {", "}", |b| {
				for error in errors {
					b.line(format!("{} => Some(Self::{}),", error.code, camel_ident(&error.name)));
				}
				b.line("_ => None,");
			});
		});
		b.blank();
		b.block("pub const fn message(self) -> &'static str {", "}", |b| {
			b.block("match self {", "}", |b| {
				for error in errors {
					let message = error.msg.as_deref().unwrap_or(&error.name);
					b.line(format!(
						"Self::{} => {},",
						camel_ident(&error.name),
						string_literal(message)
					));
				}
			});
		});
	});
	buffer.blank();

	buffer.block(format!("impl fmt::Display for {name} {{"), "}", |b| {
		b.block("fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {", "}", |b| {
			b.line("write!(f, \"{} (error {})\", self.message(), self.code())");
		});
	});
	buffer.blank();
	buffer.line(format!("impl std::error::Error for {name} {{}}"));

	buffer.finish()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_codes_and_messages() {
		let errors = vec![
			ErrorDef {
				code: 6000,
				name: "insufficientFunds".to_owned(),
				msg: Some("Not enough funds".to_owned()),
			},
			ErrorDef {
				code: 6001,
				name: "Locked".to_owned(),
				msg: None,
			},
		];
		let text = render_errors("token_vault", &errors);
		assert!(text.contains("pub enum TokenVaultError {"));
		assert!(text.contains("    InsufficientFunds = 6000,"));
		assert!(text.contains("6001 => Some(Self::Locked),"));
		assert!(text.contains("Self::Locked => \"Locked\","));
	}

	#[test]
	fn omits_the_enum_without_errors() {
		let text = render_errors("demo", &[]);
		assert!(!text.contains("enum"));
	}
}
