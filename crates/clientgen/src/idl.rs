//! Serialized descriptor format.
//!
//! These types mirror the JSON document emitted by Anchor-style IDL builds
//! (`target/idl/<program>.json`). They are deliberately permissive: unknown
//! keys are ignored and most collections default to empty. Structural checks
//! happen when the loader lowers them into [`crate::schema`].

use serde::Deserialize;

/// The descriptor format revision this generator is pinned to.
pub const SUPPORTED_SPEC_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Deserialize)]
pub struct RawIdl {
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub metadata: RawMetadata,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default)]
	pub instructions: Vec<RawInstruction>,
	#[serde(default)]
	pub accounts: Vec<RawAccount>,
	#[serde(default)]
	pub events: Vec<RawAccount>,
	#[serde(default)]
	pub errors: Vec<RawError>,
	#[serde(default)]
	pub types: Vec<RawTypeDef>,
	#[serde(default)]
	pub constants: Vec<RawConstant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub spec: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	/// Legacy descriptors carried the program address here.
	#[serde(default)]
	pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInstruction {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default)]
	pub discriminator: Vec<u8>,
	#[serde(default)]
	pub accounts: Vec<RawAccountItem>,
	#[serde(default)]
	pub args: Vec<RawField>,
}

/// An instruction account entry, either a single account or a named group of
/// nested entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAccountItem {
	Group(RawAccountGroup),
	Single(RawInstructionAccount),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAccountGroup {
	pub name: String,
	pub accounts: Vec<RawAccountItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct RawInstructionAccount {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default, alias = "isMut")]
	pub writable: bool,
	#[serde(default, alias = "isSigner")]
	pub signer: bool,
	#[serde(default, alias = "isOptional")]
	pub optional: bool,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub pda: Option<RawPda>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPda {
	pub seeds: Vec<RawSeed>,
	#[serde(default)]
	pub program: Option<RawSeed>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawSeed {
	Const { value: Vec<u8> },
	Arg { path: String },
	Account { path: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(rename = "type")]
	pub ty: RawType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawType {
	Primitive(String),
	Vec { vec: Box<RawType> },
	Option { option: Box<RawType> },
	COption { coption: Box<RawType> },
	Array { array: (Box<RawType>, RawArrayLen) },
	Defined { defined: RawDefined },
	Generic { generic: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawArrayLen {
	Value(usize),
	Generic { generic: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDefined {
	Name(String),
	Full {
		name: String,
		#[serde(default)]
		generics: Vec<serde_json::Value>,
	},
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTypeDef {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default)]
	pub serialization: Option<String>,
	#[serde(default)]
	pub generics: Vec<RawGeneric>,
	#[serde(rename = "type")]
	pub ty: RawTypeDefBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGeneric {
	pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawTypeDefBody {
	Struct {
		#[serde(default)]
		fields: Option<RawDefinedFields>,
	},
	Enum {
		variants: Vec<RawEnumVariant>,
	},
	Type {
		alias: RawType,
	},
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDefinedFields {
	Named(Vec<RawField>),
	Tuple(Vec<RawType>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEnumVariant {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default)]
	pub fields: Option<RawDefinedFields>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAccount {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(default)]
	pub discriminator: Vec<u8>,
	/// Older descriptors inline the layout instead of pointing at `types`.
	#[serde(default, rename = "type")]
	pub ty: Option<RawTypeDefBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawError {
	pub code: u32,
	pub name: String,
	#[serde(default)]
	pub msg: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawConstant {
	pub name: String,
	#[serde(default)]
	pub docs: Vec<String>,
	#[serde(rename = "type")]
	pub ty: RawType,
	pub value: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_nested_types() {
		let json = r#"{ "vec": { "option": { "defined": { "name": "Config" } } } }"#;
		let ty: RawType =
			serde_json::from_str(json).unwrap_or_else(|e| panic!("parse failed: {e}"));
		let RawType::Vec { vec } = ty else {
			panic!("expected vec, got {ty:?}");
		};
		let RawType::Option { option } = *vec else {
			panic!("expected option");
		};
		assert!(matches!(
			*option,
			RawType::Defined {
				defined: RawDefined::Full { ref name, .. }
			} if name == "Config"
		));
	}

	#[test]
	fn parses_account_groups_and_seeds() {
		let json = r#"[
			{ "name": "payer", "writable": true, "signer": true },
			{ "name": "vault", "pda": { "seeds": [
				{ "kind": "const", "value": [118, 97, 117, 108, 116] },
				{ "kind": "account", "path": "payer" }
			] } },
			{ "name": "group", "accounts": [ { "name": "inner" } ] }
		]"#;
		let items: Vec<RawAccountItem> =
			serde_json::from_str(json).unwrap_or_else(|e| panic!("parse failed: {e}"));
		assert_eq!(items.len(), 3);
		assert!(matches!(&items[0], RawAccountItem::Single(account) if account.signer));
		let RawAccountItem::Single(vault) = &items[1] else {
			panic!("expected single account");
		};
		let pda = vault.pda.as_ref().unwrap_or_else(|| panic!("missing pda"));
		assert!(matches!(&pda.seeds[0], RawSeed::Const { value } if value == b"vault"));
		assert!(matches!(&items[2], RawAccountItem::Group(group) if group.accounts.len() == 1));
	}

	#[test]
	fn parses_tuple_enum_variants() {
		let json = r#"{ "kind": "enum", "variants": [
			{ "name": "Empty" },
			{ "name": "Pair", "fields": ["u8", "u16"] },
			{ "name": "Named", "fields": [{ "name": "x", "type": "i64" }] }
		] }"#;
		let body: RawTypeDefBody =
			serde_json::from_str(json).unwrap_or_else(|e| panic!("parse failed: {e}"));
		let RawTypeDefBody::Enum { variants } = body else {
			panic!("expected enum");
		};
		assert!(variants[0].fields.is_none());
		assert!(matches!(&variants[1].fields, Some(RawDefinedFields::Tuple(items)) if items.len() == 2));
		assert!(matches!(&variants[2].fields, Some(RawDefinedFields::Named(fields)) if fields[0].name == "x"));
	}
}
