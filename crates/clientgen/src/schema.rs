//! Typed, validated model of a program interface descriptor.
//!
//! The model is produced once by [`crate::loader`] and is read-only for the
//! rest of a generation run. Every later stage derives its output from it.

use solana_address::Address;

/// Root of a loaded descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDescriptor {
	pub name: String,
	pub version: String,
	pub address: Address,
	pub docs: Vec<String>,
	pub instructions: Vec<InstructionDef>,
	pub accounts: Vec<AccountDef>,
	pub events: Vec<EventDef>,
	pub types: Vec<TypeDef>,
	pub errors: Vec<ErrorDef>,
	pub constants: Vec<ConstantDef>,
}

impl InterfaceDescriptor {
	pub fn find_type(&self, name: &str) -> Option<&TypeDef> {
		self.types.iter().find(|ty| ty.name == name)
	}

	pub fn find_instruction(&self, name: &str) -> Option<&InstructionDef> {
		self.instructions.iter().find(|ix| ix.name == name)
	}

	pub fn find_account(&self, name: &str) -> Option<&AccountDef> {
		self.accounts.iter().find(|account| account.name == name)
	}

	pub fn find_event(&self, name: &str) -> Option<&EventDef> {
		self.events.iter().find(|event| event.name == name)
	}

	/// Look up any named layout: a shared type, an account, or an event.
	pub fn find_layout(&self, name: &str) -> Option<NamedLayoutRef<'_>> {
		if let Some(ty) = self.find_type(name) {
			return Some(NamedLayoutRef::Type(ty));
		}
		if let Some(account) = self.find_account(name) {
			return Some(NamedLayoutRef::Account(account));
		}
		self.find_event(name).map(NamedLayoutRef::Event)
	}
}

/// A borrowed view of something a [`TypeRef::Defined`] can point at.
#[derive(Debug, Clone, Copy)]
pub enum NamedLayoutRef<'a> {
	Type(&'a TypeDef),
	Account(&'a AccountDef),
	Event(&'a EventDef),
}

impl NamedLayoutRef<'_> {
	pub fn name(&self) -> &str {
		match self {
			Self::Type(ty) => &ty.name,
			Self::Account(account) | Self::Event(account) => &account.name,
		}
	}
}

/// Primitive leaf types understood by the descriptor format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
	Bool,
	U8,
	I8,
	U16,
	I16,
	U32,
	I32,
	F32,
	U64,
	I64,
	F64,
	U128,
	I128,
	U256,
	I256,
	String,
	Bytes,
	Pubkey,
}

impl Primitive {
	pub fn from_name(name: &str) -> Option<Self> {
		let primitive = match name {
			"bool" => Self::Bool,
			"u8" => Self::U8,
			"i8" => Self::I8,
			"u16" => Self::U16,
			"i16" => Self::I16,
			"u32" => Self::U32,
			"i32" => Self::I32,
			"f32" => Self::F32,
			"u64" => Self::U64,
			"i64" => Self::I64,
			"f64" => Self::F64,
			"u128" => Self::U128,
			"i128" => Self::I128,
			"u256" => Self::U256,
			"i256" => Self::I256,
			"string" => Self::String,
			"bytes" => Self::Bytes,
			"pubkey" | "publicKey" => Self::Pubkey,
			_ => return None,
		};
		Some(primitive)
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::Bool => "bool",
			Self::U8 => "u8",
			Self::I8 => "i8",
			Self::U16 => "u16",
			Self::I16 => "i16",
			Self::U32 => "u32",
			Self::I32 => "i32",
			Self::F32 => "f32",
			Self::U64 => "u64",
			Self::I64 => "i64",
			Self::F64 => "f64",
			Self::U128 => "u128",
			Self::I128 => "i128",
			Self::U256 => "u256",
			Self::I256 => "i256",
			Self::String => "string",
			Self::Bytes => "bytes",
			Self::Pubkey => "pubkey",
		}
	}

	/// Width in bytes and signedness for integer primitives.
	pub fn integer(self) -> Option<(usize, bool)> {
		match self {
			Self::U8 => Some((1, false)),
			Self::I8 => Some((1, true)),
			Self::U16 => Some((2, false)),
			Self::I16 => Some((2, true)),
			Self::U32 => Some((4, false)),
			Self::I32 => Some((4, true)),
			Self::U64 => Some((8, false)),
			Self::I64 => Some((8, true)),
			Self::U128 => Some((16, false)),
			Self::I128 => Some((16, true)),
			Self::U256 => Some((32, false)),
			Self::I256 => Some((32, true)),
			_ => None,
		}
	}
}

/// A reference to a type, as it appears on a field, argument, or constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
	Primitive(Primitive),
	Array(Box<TypeRef>, usize),
	Option(Box<TypeRef>),
	/// An option with a four byte tag, as used by the SPL token programs.
	COption(Box<TypeRef>),
	Vec(Box<TypeRef>),
	Defined(String),
	Generic(String),
}

impl TypeRef {
	/// Names of every defined type this reference points at, in order of
	/// appearance.
	pub fn defined_names(&self) -> Vec<&str> {
		let mut names = Vec::new();
		let mut stack = vec![self];
		while let Some(ty) = stack.pop() {
			match ty {
				Self::Defined(name) => names.push(name.as_str()),
				Self::Array(inner, _) | Self::Option(inner) | Self::COption(inner) | Self::Vec(inner) => {
					stack.push(inner);
				}
				Self::Primitive(_) | Self::Generic(_) => {}
			}
		}
		names
	}

	/// Named types reachable without passing through an option or vector.
	/// These edges must stay acyclic for the layout to have a finite size.
	pub fn by_value_names(&self) -> Vec<&str> {
		let mut names = Vec::new();
		let mut stack = vec![self];
		while let Some(ty) = stack.pop() {
			match ty {
				Self::Defined(name) => names.push(name.as_str()),
				Self::Array(inner, _) => stack.push(inner),
				Self::Option(_)
				| Self::COption(_)
				| Self::Vec(_)
				| Self::Primitive(_)
				| Self::Generic(_) => {}
			}
		}
		names
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
	pub name: String,
	pub docs: Vec<String>,
	pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Serialization {
	Borsh,
	Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
	pub name: String,
	pub docs: Vec<String>,
	pub generics: Vec<String>,
	pub serialization: Serialization,
	pub body: TypeBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeBody {
	Struct(Vec<Field>),
	Tuple(Vec<TypeRef>),
	Enum(Vec<EnumVariant>),
	Alias(TypeRef),
}

impl TypeBody {
	/// Every type reference in the body, in declaration order.
	pub fn type_refs(&self) -> Vec<&TypeRef> {
		match self {
			Self::Struct(fields) => fields.iter().map(|field| &field.ty).collect(),
			Self::Tuple(items) => items.iter().collect(),
			Self::Enum(variants) => {
				variants
					.iter()
					.flat_map(|variant| variant.fields.type_refs())
					.collect()
			}
			Self::Alias(ty) => vec![ty],
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
	pub name: String,
	pub docs: Vec<String>,
	pub fields: VariantFields,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantFields {
	Unit,
	Named(Vec<Field>),
	Tuple(Vec<TypeRef>),
}

impl VariantFields {
	pub fn type_refs(&self) -> Vec<&TypeRef> {
		match self {
			Self::Unit => Vec::new(),
			Self::Named(fields) => fields.iter().map(|field| &field.ty).collect(),
			Self::Tuple(items) => items.iter().collect(),
		}
	}
}

/// An on-chain data layout, optionally prefixed by a discriminator.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDef {
	pub name: String,
	pub docs: Vec<String>,
	pub discriminator: Vec<u8>,
	pub serialization: Serialization,
	pub fields: Vec<Field>,
}

/// Events share the account layout shape: a discriminator followed by fields.
pub type EventDef = AccountDef;

#[derive(Debug, Clone, PartialEq)]
pub struct InstructionDef {
	pub name: String,
	pub docs: Vec<String>,
	pub discriminator: Vec<u8>,
	pub args: Vec<Field>,
	pub accounts: Vec<AccountRequirement>,
}

impl InstructionDef {
	pub fn find_arg(&self, name: &str) -> Option<&Field> {
		self.args.iter().find(|arg| arg.name == name)
	}

	pub fn account_index(&self, name: &str) -> Option<usize> {
		self.accounts.iter().position(|account| account.name == name)
	}
}

#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct AccountRequirement {
	pub name: String,
	pub docs: Vec<String>,
	pub writable: bool,
	pub signer: bool,
	pub optional: bool,
	/// A fixed address the account must have, such as a known program.
	pub address: Option<Address>,
	/// Set when the address is a program derived address.
	pub derived: Option<PdaRule>,
}

impl AccountRequirement {
	/// Whether the caller has to supply this account's address.
	pub fn is_caller_supplied(&self) -> bool {
		self.address.is_none() && self.derived.is_none()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PdaRule {
	pub seeds: Vec<SeedExpr>,
	pub program: ProgramRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeedExpr {
	Literal(Vec<u8>),
	/// An instruction argument, optionally followed by a path of struct field
	/// names inside it.
	Arg { name: String, path: Vec<String> },
	/// The address of another account of the same instruction.
	Account { name: String },
	/// Bytes read from another account's data. The client cannot fetch them
	/// so they are supplied by the caller.
	AccountData { account: String, path: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgramRef {
	CurrentProgram,
	Literal(Address),
	Account(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDef {
	pub code: u32,
	pub name: String,
	pub msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDef {
	pub name: String,
	pub docs: Vec<String>,
	pub ty: TypeRef,
	pub value: String,
}
