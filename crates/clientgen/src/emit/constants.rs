//! Emits `constants.rs` from the descriptor's textual constant values.

use std::str::FromStr;

use solana_address::Address;

use super::code::CodeBuffer;
use super::code::array_literal;
use super::code::bytes_literal;
use super::code::const_ident;
use super::code::string_literal;
use crate::error::GenerateError;
use crate::error::Result;
use crate::layout::Layout;
use crate::schema::ConstantDef;
use crate::types::TypeRegistry;

pub fn render_constants(registry: &TypeRegistry, constants: &[ConstantDef]) -> Result<String> {
	let mut lines = Vec::with_capacity(constants.len());
	let mut address = false;

	for constant in constants {
		let context = format!("constants.{}", constant.name);
		let layout = registry.layout_of(&context, &constant.ty)?;
		let (ty, value) = constant_item(&context, registry.resolve_alias(&layout), &constant.value)?;
		address |= ty == "Address";
		lines.push((constant, ty, value));
	}

	let mut buffer = CodeBuffer::file(&[]);
	if address {
		buffer.line("use solana_address::Address;");
		buffer.blank();
	}
	if lines.is_empty() {
		buffer.line("// The program declares no constants.");
	}
	for (constant, ty, value) in lines {
		buffer.docs(&constant.docs);
		buffer.line(format!("pub const {}: {ty} = {value};", const_ident(&constant.name)));
	}

	Ok(buffer.finish())
}

/// The Rust type and value expression of one constant.
fn constant_item(context: &str, layout: &Layout, text: &str) -> Result<(String, String)> {
	let text = text.trim();
	let invalid = |expected: &str| {
		GenerateError::malformed(context, format!("`{text}` is not a valid {expected} value"))
	};

	let item = match layout {
		Layout::Bool => {
			let value: bool = text.parse().map_err(|_| invalid("bool"))?;
			("bool".to_owned(), value.to_string())
		}
		Layout::Int { width, signed } => {
			let digits: String = text.chars().filter(|c| *c != '_').collect();
			let digits = strip_int_suffix(&digits);
			let bits = width * 8;
			let ty = format!("{}{bits}", if *signed { "i" } else { "u" });
			if *signed {
				let value: i128 = digits.parse().map_err(|_| invalid(&ty))?;
				let min = if bits == 128 { i128::MIN } else { -(1i128 << (bits - 1)) };
				let max = if bits == 128 { i128::MAX } else { (1i128 << (bits - 1)) - 1 };
				if value < min || value > max {
					return Err(invalid(&ty));
				}
				(ty, value.to_string())
			} else {
				let value: u128 = digits.parse().map_err(|_| invalid(&ty))?;
				if bits < 128 && value >> bits != 0 {
					return Err(invalid(&ty));
				}
				(ty, value.to_string())
			}
		}
		Layout::Float { width } => {
			let ty = format!("f{}", width * 8);
			let value: f64 = text.trim_end_matches(ty.as_str()).parse().map_err(|_| invalid(&ty))?;
			if !value.is_finite() || (*width == 4 && value.abs() > f64::from(f32::MAX)) {
				return Err(invalid(&ty));
			}
			let mut literal = value.to_string();
			if !literal.contains('.') && !literal.contains('e') {
				literal.push_str(".0");
			}
			(ty, literal)
		}
		Layout::String => {
			let value = unquote(text);
			("&str".to_owned(), string_literal(&value))
		}
		Layout::Bytes => {
			let bytes = parse_bytes(text).ok_or_else(|| invalid("bytes"))?;
			let literal = bytes_literal(&bytes);
			let value = if literal.starts_with('[') { format!("&{literal}") } else { literal };
			("&[u8]".to_owned(), value)
		}
		Layout::Array { element, len }
			if **element
				== Layout::Int {
					width: 1,
					signed: false,
				} =>
		{
			let bytes = parse_bytes(text).ok_or_else(|| invalid("byte array"))?;
			if bytes.len() != *len {
				return Err(invalid(&format!("[u8; {len}]")));
			}
			(format!("[u8; {len}]"), array_literal(&bytes))
		}
		Layout::Pubkey => {
			let value = unquote(text);
			let address = Address::from_str(&value).map_err(|_| invalid("address"))?;
			(
				"Address".to_owned(),
				format!("Address::new_from_array({})", array_literal(address.as_ref())),
			)
		}
		other => {
			return Err(GenerateError::unsupported(
				context,
				other.to_string(),
				"constants must be numbers, bools, strings, byte strings or addresses",
			));
		}
	};
	Ok(item)
}

fn strip_int_suffix(text: &str) -> &str {
	for suffix in [
		"u128", "i128", "u64", "i64", "u32", "i32", "u16", "i16", "u8", "i8", "usize", "isize",
	] {
		if let Some(stripped) = text.strip_suffix(suffix) {
			return stripped;
		}
	}
	text
}

/// Descriptors print string constants as Rust literals; accept either form.
fn unquote(text: &str) -> String {
	if text.starts_with('"') {
		if let Ok(value) = serde_json::from_str::<String>(text) {
			return value;
		}
	}
	text.to_owned()
}

/// Byte constants appear as `[1, 2, 3]`, `b"seed"` or a quoted string.
fn parse_bytes(text: &str) -> Option<Vec<u8>> {
	if text.starts_with('[') {
		return serde_json::from_str(text).ok();
	}
	if let Some(inner) = text.strip_prefix("b\"").and_then(|rest| rest.strip_suffix('"')) {
		let mut bytes = Vec::with_capacity(inner.len());
		let mut chars = inner.bytes();
		while let Some(byte) = chars.next() {
			if byte == b'\\' {
				match chars.next()? {
					b'n' => bytes.push(b'\n'),
					b't' => bytes.push(b'\t'),
					b'0' => bytes.push(0),
					other => bytes.push(other),
				}
			} else {
				bytes.push(byte);
			}
		}
		return Some(bytes);
	}
	Some(unquote(text).into_bytes())
}
