//! Reference interpreter of the type mapper's layouts.
//!
//! [`Runtime`] encodes and decodes dynamic [`Value`]s byte for byte like the
//! generated codec, and builds instruction payloads the way the generated
//! builders do: same argument encoding, same derivation order, same handling
//! of omitted optional accounts. It lets tools inspect accounts and build
//! instructions without compiling a client.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::Map;
use serde_json::Number;
use serde_json::Value as Json;
use solana_address::Address;

use crate::error::GenerateError;
use crate::error::LayoutMismatch;
use crate::error::Result;
use crate::layout::ENUM_TAG;
use crate::layout::FieldLayout;
use crate::layout::LENGTH_PREFIX;
use crate::layout::Layout;
use crate::layout::NamedLayout;
use crate::layout::VariantFieldsLayout;
use crate::pda::MAX_SEED_LEN;
use crate::pda::MAX_SEEDS;
use crate::pda::PdaCatalog;
use crate::pda::PdaProgram;
use crate::pda::SeedKind;
use crate::pda::SeedParam;
use crate::pda::SeedPart;
use crate::pda::SeedSource;
use crate::pda::derivation_order;
use crate::schema::AccountDef;
use crate::schema::InstructionDef;
use crate::schema::InterfaceDescriptor;
use crate::types::TypeRegistry;

type CodecResult<T> = std::result::Result<T, LayoutMismatch>;

/// A dynamically typed value of some layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Bool(bool),
	Unsigned(u128),
	Signed(i128),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	Address(Address),
	/// Fixed arrays and vectors.
	Array(Vec<Value>),
	Option(Option<Box<Value>>),
	/// Named fields in declaration order.
	Struct(Vec<(String, Value)>),
	Tuple(Vec<Value>),
	/// `fields` is a [`Value::Struct`] or [`Value::Tuple`], or `None` for a
	/// unit variant.
	Enum {
		variant: String,
		fields: Option<Box<Value>>,
	},
}

impl Value {
	pub fn field(&self, name: &str) -> Option<&Value> {
		match self {
			Self::Struct(fields) => {
				fields
					.iter()
					.find(|(field, _)| field == name)
					.map(|(_, value)| value)
			}
			_ => None,
		}
	}

	/// JSON view of the value. Integers that do not fit 64 bits become
	/// decimal strings, unit variants become their name and other variants an
	/// object with the variant name as the only key.
	pub fn to_json(&self) -> Json {
		match self {
			Self::Bool(value) => Json::Bool(*value),
			Self::Unsigned(value) => {
				u64::try_from(*value).map_or_else(|_| Json::String(value.to_string()), Json::from)
			}
			Self::Signed(value) => {
				i64::try_from(*value).map_or_else(|_| Json::String(value.to_string()), Json::from)
			}
			Self::Float(value) => Number::from_f64(*value).map_or(Json::Null, Json::Number),
			Self::String(value) => Json::String(value.clone()),
			Self::Bytes(bytes) => Json::Array(bytes.iter().map(|byte| Json::from(*byte)).collect()),
			Self::Address(address) => Json::String(address.to_string()),
			Self::Array(items) | Self::Tuple(items) => Json::Array(items.iter().map(Self::to_json).collect()),
			Self::Option(value) => value.as_ref().map_or(Json::Null, |value| value.to_json()),
			Self::Struct(fields) => {
				Json::Object(
					fields
						.iter()
						.map(|(name, value)| (name.clone(), value.to_json()))
						.collect(),
				)
			}
			Self::Enum {
				variant,
				fields: None,
			} => Json::String(variant.clone()),
			Self::Enum {
				variant,
				fields: Some(fields),
			} => {
				let mut object = Map::new();
				object.insert(variant.clone(), fields.to_json());
				Json::Object(object)
			}
		}
	}
}

/// One account of a built instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
	/// Declared account name.
	pub name: String,
	pub address: Address,
	pub is_signer: bool,
	pub is_writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltInstruction {
	pub program_id: Address,
	pub accounts: Vec<AccountMeta>,
	pub data: Vec<u8>,
}

/// What the caller supplies to build an instruction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructionInputs {
	/// Argument values by declared name.
	pub args: Vec<(String, Value)>,
	/// Addresses of the caller-supplied accounts by declared name. Optional
	/// accounts left out are omitted from the instruction.
	pub accounts: BTreeMap<String, Address>,
	/// Bytes standing in for account data used as seeds, keyed by seed
	/// parameter name.
	pub seed_data: BTreeMap<String, Vec<u8>>,
}

/// Derive a program address, checking the seed limits first.
pub fn derive_address(context: &str, seeds: &[Vec<u8>], program: &Address) -> CodecResult<(Address, u8)> {
	if seeds.len() >= MAX_SEEDS {
		return Err(shape(context, format!("at most {} seeds", MAX_SEEDS - 1)));
	}
	if let Some(index) = seeds.iter().position(|seed| seed.len() > MAX_SEED_LEN) {
		return Err(shape(
			&format!("{context}.seeds[{index}]"),
			format!("a seed of at most {MAX_SEED_LEN} bytes"),
		));
	}
	let slices: Vec<&[u8]> = seeds.iter().map(Vec::as_slice).collect();
	Address::try_find_program_address(&slices, program)
		.ok_or_else(|| shape(context, "seeds with a valid bump"))
}

/// Encoder, decoder and instruction builder for one descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Runtime<'a> {
	descriptor: &'a InterfaceDescriptor,
	registry: &'a TypeRegistry,
}

impl<'a> Runtime<'a> {
	pub fn new(descriptor: &'a InterfaceDescriptor, registry: &'a TypeRegistry) -> Self {
		Self {
			descriptor,
			registry,
		}
	}

	pub fn encode(&self, context: &str, layout: &Layout, value: &Value, out: &mut Vec<u8>) -> CodecResult<()> {
		match (layout, value) {
			(Layout::Bool, Value::Bool(value)) => out.push(u8::from(*value)),
			(Layout::Int { width, signed }, value) => {
				out.extend_from_slice(&int_bytes(context, *width, *signed, value)?);
			}
			(Layout::Float { width: 4 }, Value::Float(value)) => {
				out.extend_from_slice(&(*value as f32).to_le_bytes());
			}
			(Layout::Float { .. }, Value::Float(value)) => out.extend_from_slice(&value.to_le_bytes()),
			(Layout::String, Value::String(text)) => {
				encode_len(context, text.len(), out)?;
				out.extend_from_slice(text.as_bytes());
			}
			(Layout::Bytes, Value::Bytes(bytes)) => {
				encode_len(context, bytes.len(), out)?;
				out.extend_from_slice(bytes);
			}
			(Layout::Pubkey, Value::Address(address)) => out.extend_from_slice(address.as_ref()),
			(Layout::Array { element, len }, Value::Array(items)) => {
				if items.len() != *len {
					return Err(shape(context, format!("exactly {len} item(s), found {}", items.len())));
				}
				self.encode_items(context, element, items, out)?;
			}
			(Layout::Vec { element }, Value::Array(items)) => {
				encode_len(context, items.len(), out)?;
				self.encode_items(context, element, items, out)?;
			}
			(Layout::Option { inner, tag_width }, Value::Option(value)) => {
				write_tag(out, *tag_width, u8::from(value.is_some()));
				if let Some(value) = value {
					self.encode(context, inner, value, out)?;
				}
			}
			(Layout::Named(name), value) => self.encode_named(context, name, value, out)?,
			(layout, _) => return Err(shape(context, layout.to_string())),
		}
		Ok(())
	}

	pub fn decode(&self, context: &str, layout: &Layout, input: &mut &[u8]) -> CodecResult<Value> {
		let value = match layout {
			Layout::Bool => {
				match take(context, input, 1)?[0] {
					0 => Value::Bool(false),
					1 => Value::Bool(true),
					tag => return Err(invalid_tag(context, u32::from(tag))),
				}
			}
			Layout::Int { width, signed } => {
				let bytes = take(context, input, *width)?;
				let negative = *signed && bytes.last().is_some_and(|byte| byte & 0x80 != 0);
				let mut wide = if negative { [0xff; 16] } else { [0; 16] };
				wide[..*width].copy_from_slice(bytes);
				if *signed {
					Value::Signed(i128::from_le_bytes(wide))
				} else {
					Value::Unsigned(u128::from_le_bytes(wide))
				}
			}
			Layout::Float { width: 4 } => {
				let mut bytes = [0; 4];
				bytes.copy_from_slice(take(context, input, 4)?);
				Value::Float(f64::from(f32::from_le_bytes(bytes)))
			}
			Layout::Float { .. } => {
				let mut bytes = [0; 8];
				bytes.copy_from_slice(take(context, input, 8)?);
				Value::Float(f64::from_le_bytes(bytes))
			}
			Layout::String => {
				let len = decode_len(context, input)?;
				let bytes = take(context, input, len)?;
				let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
					LayoutMismatch::InvalidUtf8 {
						context: context.to_owned(),
					}
				})?;
				Value::String(text)
			}
			Layout::Bytes => {
				let len = decode_len(context, input)?;
				Value::Bytes(take(context, input, len)?.to_vec())
			}
			Layout::Pubkey => {
				let mut bytes = [0; 32];
				bytes.copy_from_slice(take(context, input, 32)?);
				Value::Address(Address::new_from_array(bytes))
			}
			Layout::Array { element, len } => Value::Array(self.decode_items(context, element, *len, input)?),
			Layout::Vec { element } => {
				let len = decode_len(context, input)?;
				Value::Array(self.decode_items(context, element, len, input)?)
			}
			Layout::Option { inner, tag_width } => {
				let tag = take(context, input, *tag_width)?;
				match read_tag(tag) {
					0 => Value::Option(None),
					1 => Value::Option(Some(Box::new(self.decode(context, inner, input)?))),
					tag => return Err(invalid_tag(context, tag)),
				}
			}
			Layout::Named(name) => self.decode_named(context, name, input)?,
		};
		Ok(value)
	}

	/// Build a value of `layout` from its JSON view, as produced by
	/// [`Value::to_json`]. Missing optional fields read as `None`.
	pub fn from_json(&self, context: &str, layout: &Layout, json: &Json) -> CodecResult<Value> {
		let value = match layout {
			Layout::Bool => Value::Bool(json.as_bool().ok_or_else(|| shape(context, "a boolean"))?),
			Layout::Int { .. } => int_from_json(context, json)?,
			Layout::Float { .. } => Value::Float(json.as_f64().ok_or_else(|| shape(context, "a number"))?),
			Layout::String => {
				Value::String(
					json.as_str()
						.ok_or_else(|| shape(context, "a string"))?
						.to_owned(),
				)
			}
			Layout::Bytes => Value::Bytes(bytes_from_json(context, json)?),
			Layout::Pubkey => Value::Address(address_from_json(context, json)?),
			Layout::Array { element, .. } | Layout::Vec { element } => {
				let items = json.as_array().ok_or_else(|| shape(context, "an array"))?;
				Value::Array(
					items
						.iter()
						.enumerate()
						.map(|(index, item)| self.from_json(&format!("{context}[{index}]"), element, item))
						.collect::<CodecResult<_>>()?,
				)
			}
			Layout::Option { inner, .. } => {
				if json.is_null() {
					Value::Option(None)
				} else {
					Value::Option(Some(Box::new(self.from_json(context, inner, json)?)))
				}
			}
			Layout::Named(name) => self.named_from_json(context, name, json)?,
		};
		Ok(value)
	}

	/// Encode an account or event, discriminator first.
	pub fn encode_account(&self, name: &str, value: &Value) -> Result<Vec<u8>> {
		let def = self.layout_def(name)?;
		let mut out = def.discriminator.clone();
		self.encode(name, &Layout::Named(def.name.clone()), value, &mut out)?;
		Ok(out)
	}

	/// Decode an account or event that must span all of `bytes`.
	pub fn decode_account(&self, name: &str, bytes: &[u8]) -> Result<Value> {
		let (value, consumed) = self.decode_account_prefix(name, bytes)?;
		if consumed != bytes.len() {
			return Err(LayoutMismatch::TrailingBytes {
				context: name.to_owned(),
				remaining: bytes.len() - consumed,
			}
			.into());
		}
		Ok(value)
	}

	/// Decode an account or event from the start of `bytes`, returning the
	/// number of bytes read.
	pub fn decode_account_prefix(&self, name: &str, bytes: &[u8]) -> Result<(Value, usize)> {
		let def = self.layout_def(name)?;
		let mut input = bytes;
		let found = take(name, &mut input, def.discriminator.len())?;
		if found != def.discriminator.as_slice() {
			return Err(LayoutMismatch::Discriminator {
				context: name.to_owned(),
				expected: def.discriminator.clone(),
				found: found.to_vec(),
			}
			.into());
		}
		let value = self.decode(name, &Layout::Named(def.name.clone()), &mut input)?;
		Ok((value, bytes.len() - input.len()))
	}

	/// Parse instruction arguments from a JSON object keyed by argument name.
	pub fn args_from_json(&self, instruction: &str, json: &Json) -> Result<Vec<(String, Value)>> {
		let def = self.instruction(instruction)?;
		let context = format!("instructions.{}.args", def.name);
		let layouts = self.registry.field_layouts(&context, &def.args)?;
		let empty = Map::new();
		let object = match json {
			Json::Null => &empty,
			Json::Object(object) => object,
			_ => return Err(shape(&context, "an object of arguments").into()),
		};
		Ok(self.fields_from_json(&context, &layouts, object)?)
	}

	/// Build the payload of `instruction` from `inputs`.
	pub fn build_instruction(
		&self,
		catalog: &PdaCatalog,
		instruction: &str,
		inputs: &InstructionInputs,
	) -> Result<BuiltInstruction> {
		let def = self.instruction(instruction)?;
		let context = format!("instructions.{}", def.name);
		let program_id = self.descriptor.address;

		let layouts = self.registry.field_layouts(&format!("{context}.args"), &def.args)?;
		let mut data = def.discriminator.clone();
		self.encode_fields(&format!("{context}.args"), &layouts, &inputs.args, &mut data)?;

		// Resolved addresses by account index. Omitted optional accounts
		// resolve to the program id.
		let mut addresses: Vec<Option<Address>> = vec![None; def.accounts.len()];
		let mut omitted = vec![false; def.accounts.len()];
		for (index, account) in def.accounts.iter().enumerate() {
			if account.derived.is_some() {
				continue;
			}
			if let Some(address) = account.address {
				addresses[index] = Some(address);
				continue;
			}
			match inputs.accounts.get(&account.name) {
				Some(address) => addresses[index] = Some(*address),
				None if account.optional => {
					addresses[index] = Some(program_id);
					omitted[index] = true;
				}
				None => {
					return Err(LayoutMismatch::MissingValue {
						context: format!("{context}.accounts"),
						name: account.name.clone(),
					}
					.into());
				}
			}
		}

		for index in derivation_order(def)? {
			let account = &def.accounts[index];
			let function = catalog
				.function_for(&def.name, &account.name)
				.ok_or_else(|| GenerateError::unresolved(&context, format!("pdas.{}", account.name)))?;
			let plan = &function.shape;
			let pda_context = format!("{context}.accounts.{}", account.name);

			let mut seeds = Vec::with_capacity(plan.seeds.len());
			for part in &plan.seeds {
				let bytes = match part {
					SeedPart::Literal(bytes) => bytes.clone(),
					SeedPart::Param(param) => {
						self.seed_bytes(&pda_context, def, &plan.params[*param], &addresses, inputs)?
					}
				};
				seeds.push(bytes);
			}
			let program = match &plan.program {
				PdaProgram::Current => program_id,
				PdaProgram::Literal(address) => *address,
				PdaProgram::Param(param) => {
					let bytes = self.seed_bytes(&pda_context, def, &plan.params[*param], &addresses, inputs)?;
					let array: [u8; 32] = bytes
						.try_into()
						.map_err(|_| shape(&pda_context, "a program address"))?;
					Address::new_from_array(array)
				}
			};
			let (address, _) = derive_address(&pda_context, &seeds, &program)?;
			addresses[index] = Some(address);
		}

		let accounts = def
			.accounts
			.iter()
			.zip(addresses)
			.zip(omitted)
			.map(|((account, address), omitted)| {
				let address = address.unwrap_or(program_id);
				if omitted {
					AccountMeta {
						name: account.name.clone(),
						address,
						is_signer: false,
						is_writable: false,
					}
				} else {
					AccountMeta {
						name: account.name.clone(),
						address,
						is_signer: account.signer,
						is_writable: account.writable,
					}
				}
			})
			.collect();

		tracing::debug!(instruction = %def.name, bytes = data.len(), "built instruction");

		Ok(BuiltInstruction {
			program_id,
			accounts,
			data,
		})
	}

	fn instruction(&self, name: &str) -> Result<&'a InstructionDef> {
		self.descriptor
			.find_instruction(name)
			.ok_or_else(|| GenerateError::unresolved("instructions", name))
	}

	fn layout_def(&self, name: &str) -> Result<&'a AccountDef> {
		self.descriptor
			.find_account(name)
			.or_else(|| self.descriptor.find_event(name))
			.ok_or_else(|| GenerateError::unresolved("accounts", name))
	}

	fn named(&self, context: &str, name: &str) -> CodecResult<&'a NamedLayout> {
		self.registry
			.get(name)
			.map(|entry| &entry.layout)
			.ok_or_else(|| shape(context, format!("a registered type `{name}`")))
	}

	fn encode_items(&self, context: &str, element: &Layout, items: &[Value], out: &mut Vec<u8>) -> CodecResult<()> {
		for (index, item) in items.iter().enumerate() {
			self.encode(&format!("{context}[{index}]"), element, item, out)?;
		}
		Ok(())
	}

	fn encode_fields(
		&self,
		context: &str,
		fields: &[FieldLayout],
		values: &[(String, Value)],
		out: &mut Vec<u8>,
	) -> CodecResult<()> {
		for field in fields {
			let value = values
				.iter()
				.find(|(name, _)| *name == field.name)
				.map(|(_, value)| value)
				.ok_or_else(|| {
					LayoutMismatch::MissingValue {
						context: context.to_owned(),
						name: field.name.clone(),
					}
				})?;
			self.encode(&format!("{context}.{}", field.name), &field.layout, value, out)?;
		}
		if let Some((name, _)) = values
			.iter()
			.find(|(name, _)| !fields.iter().any(|field| field.name == *name))
		{
			return Err(shape(context, format!("no field named `{name}`")));
		}
		Ok(())
	}

	fn encode_named(&self, context: &str, name: &str, value: &Value, out: &mut Vec<u8>) -> CodecResult<()> {
		match (self.named(context, name)?, value) {
			(NamedLayout::Struct(fields), Value::Struct(values)) => self.encode_fields(context, fields, values, out),
			(NamedLayout::Tuple(items), Value::Tuple(values)) => self.encode_tuple(context, items, values, out),
			(NamedLayout::Alias(inner), value) => self.encode(context, inner, value, out),
			(NamedLayout::Enum(variants), Value::Enum { variant, fields }) => {
				let (index, def) = variants
					.iter()
					.enumerate()
					.find(|(_, def)| def.name == *variant)
					.ok_or_else(|| shape(context, format!("a variant of `{name}`, found `{variant}`")))?;
				out.push(index as u8);
				let context = format!("{context}::{variant}");
				match (&def.fields, fields.as_deref()) {
					(VariantFieldsLayout::Unit, None) => Ok(()),
					(VariantFieldsLayout::Named(fields), Some(Value::Struct(values))) => {
						self.encode_fields(&context, fields, values, out)
					}
					(VariantFieldsLayout::Tuple(items), Some(Value::Tuple(values))) => {
						self.encode_tuple(&context, items, values, out)
					}
					_ => Err(shape(&context, "the declared variant fields")),
				}
			}
			(_, _) => Err(shape(context, format!("a value of `{name}`"))),
		}
	}

	fn encode_tuple(&self, context: &str, items: &[Layout], values: &[Value], out: &mut Vec<u8>) -> CodecResult<()> {
		if items.len() != values.len() {
			return Err(shape(context, format!("{} tuple item(s), found {}", items.len(), values.len())));
		}
		for (index, (layout, value)) in items.iter().zip(values).enumerate() {
			self.encode(&format!("{context}.{index}"), layout, value, out)?;
		}
		Ok(())
	}

	fn decode_items(&self, context: &str, element: &Layout, len: usize, input: &mut &[u8]) -> CodecResult<Vec<Value>> {
		let mut items = Vec::with_capacity(len.min(input.len()));
		for index in 0..len {
			items.push(self.decode(&format!("{context}[{index}]"), element, input)?);
		}
		Ok(items)
	}

	fn decode_fields(&self, context: &str, fields: &[FieldLayout], input: &mut &[u8]) -> CodecResult<Value> {
		let mut values = Vec::with_capacity(fields.len());
		for field in fields {
			let value = self.decode(&format!("{context}.{}", field.name), &field.layout, input)?;
			values.push((field.name.clone(), value));
		}
		Ok(Value::Struct(values))
	}

	fn decode_tuple(&self, context: &str, items: &[Layout], input: &mut &[u8]) -> CodecResult<Value> {
		let mut values = Vec::with_capacity(items.len());
		for (index, layout) in items.iter().enumerate() {
			values.push(self.decode(&format!("{context}.{index}"), layout, input)?);
		}
		Ok(Value::Tuple(values))
	}

	fn decode_named(&self, context: &str, name: &str, input: &mut &[u8]) -> CodecResult<Value> {
		match self.named(context, name)? {
			NamedLayout::Struct(fields) => self.decode_fields(context, fields, input),
			NamedLayout::Tuple(items) => self.decode_tuple(context, items, input),
			NamedLayout::Alias(inner) => self.decode(context, inner, input),
			NamedLayout::Enum(variants) => {
				let tag = take(context, input, ENUM_TAG)?[0];
				let def = variants
					.get(usize::from(tag))
					.ok_or_else(|| invalid_tag(context, u32::from(tag)))?;
				let context = format!("{context}::{}", def.name);
				let fields = match &def.fields {
					VariantFieldsLayout::Unit => None,
					VariantFieldsLayout::Named(fields) => Some(Box::new(self.decode_fields(&context, fields, input)?)),
					VariantFieldsLayout::Tuple(items) => Some(Box::new(self.decode_tuple(&context, items, input)?)),
				};
				Ok(Value::Enum {
					variant: def.name.clone(),
					fields,
				})
			}
		}
	}

	fn fields_from_json(
		&self,
		context: &str,
		fields: &[FieldLayout],
		object: &Map<String, Json>,
	) -> CodecResult<Vec<(String, Value)>> {
		if let Some(unknown) = object.keys().find(|key| !fields.iter().any(|field| field.name == **key)) {
			return Err(shape(context, format!("no field named `{unknown}`")));
		}
		fields
			.iter()
			.map(|field| {
				let field_context = format!("{context}.{}", field.name);
				let value = match (object.get(&field.name), &field.layout) {
					(Some(json), layout) => self.from_json(&field_context, layout, json)?,
					(None, Layout::Option { .. }) => Value::Option(None),
					(None, _) => {
						return Err(LayoutMismatch::MissingValue {
							context: context.to_owned(),
							name: field.name.clone(),
						});
					}
				};
				Ok((field.name.clone(), value))
			})
			.collect()
	}

	fn tuple_from_json(&self, context: &str, items: &[Layout], json: &Json) -> CodecResult<Value> {
		let values = json
			.as_array()
			.filter(|values| values.len() == items.len())
			.ok_or_else(|| shape(context, format!("an array of {} item(s)", items.len())))?;
		Ok(Value::Tuple(
			items
				.iter()
				.zip(values)
				.enumerate()
				.map(|(index, (layout, json))| self.from_json(&format!("{context}.{index}"), layout, json))
				.collect::<CodecResult<_>>()?,
		))
	}

	fn named_from_json(&self, context: &str, name: &str, json: &Json) -> CodecResult<Value> {
		match self.named(context, name)? {
			NamedLayout::Struct(fields) => {
				let object = json.as_object().ok_or_else(|| shape(context, "an object"))?;
				Ok(Value::Struct(self.fields_from_json(context, fields, object)?))
			}
			NamedLayout::Tuple(items) => self.tuple_from_json(context, items, json),
			NamedLayout::Alias(inner) => self.from_json(context, inner, json),
			NamedLayout::Enum(variants) => {
				let (variant, payload) = match json {
					Json::String(variant) => (variant.as_str(), &Json::Null),
					Json::Object(object) if object.len() == 1 => {
						let Some((variant, payload)) = object.iter().next() else {
							return Err(shape(context, "a variant"));
						};
						(variant.as_str(), payload)
					}
					_ => return Err(shape(context, format!("a variant of `{name}`"))),
				};
				let def = variants
					.iter()
					.find(|def| def.name == variant)
					.ok_or_else(|| shape(context, format!("a variant of `{name}`, found `{variant}`")))?;
				let context = format!("{context}::{variant}");
				let fields = match &def.fields {
					VariantFieldsLayout::Unit if payload.is_null() => None,
					VariantFieldsLayout::Unit => return Err(shape(&context, "no fields")),
					VariantFieldsLayout::Named(fields) => {
						let object = payload.as_object().ok_or_else(|| shape(&context, "an object"))?;
						Some(Box::new(Value::Struct(self.fields_from_json(&context, fields, object)?)))
					}
					VariantFieldsLayout::Tuple(items) => Some(Box::new(self.tuple_from_json(&context, items, payload)?)),
				};
				Ok(Value::Enum {
					variant: def.name.clone(),
					fields,
				})
			}
		}
	}

	fn seed_bytes(
		&self,
		context: &str,
		instruction: &InstructionDef,
		param: &SeedParam,
		addresses: &[Option<Address>],
		inputs: &InstructionInputs,
	) -> CodecResult<Vec<u8>> {
		let context = format!("{context}.{}", param.name);
		match &param.source {
			SeedSource::Arg { name, path } => {
				let mut value = inputs
					.args
					.iter()
					.find(|(arg, _)| arg == name)
					.map(|(_, value)| value)
					.ok_or_else(|| {
						LayoutMismatch::MissingValue {
							context: context.clone(),
							name: name.clone(),
						}
					})?;
				for segment in path {
					value = value.field(segment).ok_or_else(|| {
						LayoutMismatch::MissingValue {
							context: context.clone(),
							name: segment.clone(),
						}
					})?;
				}
				seed_value_bytes(&context, param.kind, value)
			}
			SeedSource::Account(name) => {
				instruction
					.account_index(name)
					.and_then(|index| addresses[index])
					.map(|address| address.as_ref().to_vec())
					.ok_or_else(|| {
						LayoutMismatch::MissingValue {
							context,
							name: name.clone(),
						}
					})
			}
			SeedSource::AccountData { .. } => {
				inputs.seed_data.get(&param.name).cloned().ok_or_else(|| {
					LayoutMismatch::MissingValue {
						context,
						name: param.name.clone(),
					}
				})
			}
		}
	}
}

fn shape(context: &str, expected: impl Into<String>) -> LayoutMismatch {
	LayoutMismatch::ValueShape {
		context: context.to_owned(),
		expected: expected.into(),
	}
}

fn invalid_tag(context: &str, tag: u32) -> LayoutMismatch {
	LayoutMismatch::InvalidTag {
		context: context.to_owned(),
		tag,
	}
}

fn take<'b>(context: &str, input: &mut &'b [u8], len: usize) -> CodecResult<&'b [u8]> {
	if input.len() < len {
		return Err(LayoutMismatch::UnexpectedEnd {
			context: context.to_owned(),
			needed: len,
			remaining: input.len(),
		});
	}
	let (head, rest) = input.split_at(len);
	*input = rest;
	Ok(head)
}

fn encode_len(context: &str, len: usize, out: &mut Vec<u8>) -> CodecResult<()> {
	let len = u32::try_from(len).map_err(|_| shape(context, "a length that fits u32"))?;
	out.extend_from_slice(&len.to_le_bytes());
	Ok(())
}

fn decode_len(context: &str, input: &mut &[u8]) -> CodecResult<usize> {
	let mut bytes = [0; LENGTH_PREFIX];
	bytes.copy_from_slice(take(context, input, LENGTH_PREFIX)?);
	Ok(u32::from_le_bytes(bytes) as usize)
}

fn write_tag(out: &mut Vec<u8>, width: usize, tag: u8) {
	out.push(tag);
	out.extend(std::iter::repeat_n(0, width.saturating_sub(1)));
}

fn read_tag(bytes: &[u8]) -> u32 {
	let mut wide = [0; 4];
	let len = bytes.len().min(4);
	wide[..len].copy_from_slice(&bytes[..len]);
	u32::from_le_bytes(wide)
}

/// Little-endian bytes of an integer at the declared width.
fn int_bytes(context: &str, width: usize, signed: bool, value: &Value) -> CodecResult<Vec<u8>> {
	let bits = width * 8;
	let name = format!("{}{bits}", if signed { "i" } else { "u" });
	let out_of_range = || shape(context, format!("a value that fits {name}"));

	let bytes = if signed {
		let value = match value {
			Value::Signed(value) => *value,
			Value::Unsigned(value) => i128::try_from(*value).map_err(|_| out_of_range())?,
			_ => return Err(shape(context, name)),
		};
		if bits < 128 && (value < -(1i128 << (bits - 1)) || value >= 1i128 << (bits - 1)) {
			return Err(out_of_range());
		}
		value.to_le_bytes()
	} else {
		let value = match value {
			Value::Unsigned(value) => *value,
			Value::Signed(value) => u128::try_from(*value).map_err(|_| out_of_range())?,
			_ => return Err(shape(context, name)),
		};
		if bits < 128 && value >> bits != 0 {
			return Err(out_of_range());
		}
		value.to_le_bytes()
	};
	Ok(bytes[..width].to_vec())
}

/// Seed encoding of an argument: integers at their width, strings and byte
/// strings raw without a length prefix.
fn seed_value_bytes(context: &str, kind: SeedKind, value: &Value) -> CodecResult<Vec<u8>> {
	match (kind, value) {
		(SeedKind::Int { width, signed }, value) => int_bytes(context, width, signed, value),
		(SeedKind::Bool, Value::Bool(value)) => Ok(vec![u8::from(*value)]),
		(SeedKind::Pubkey, Value::Address(address)) => Ok(address.as_ref().to_vec()),
		(SeedKind::Str, Value::String(text)) => Ok(text.as_bytes().to_vec()),
		(SeedKind::Bytes, Value::Bytes(bytes)) => Ok(bytes.clone()),
		(SeedKind::ByteArray(len), Value::Array(items)) if items.len() == len => {
			items
				.iter()
				.map(|item| int_bytes(context, 1, false, item).map(|byte| byte[0]))
				.collect()
		}
		(SeedKind::ByteArray(len), Value::Bytes(bytes)) if bytes.len() == len => Ok(bytes.clone()),
		(kind, _) => Err(shape(context, format!("a seed value of kind {kind:?}"))),
	}
}

fn int_from_json(context: &str, json: &Json) -> CodecResult<Value> {
	if let Some(value) = json.as_u64() {
		return Ok(Value::Unsigned(u128::from(value)));
	}
	if let Some(value) = json.as_i64() {
		return Ok(Value::Signed(i128::from(value)));
	}
	let text = json.as_str().ok_or_else(|| shape(context, "an integer"))?;
	if let Ok(value) = text.parse::<u128>() {
		return Ok(Value::Unsigned(value));
	}
	text.parse::<i128>()
		.map(Value::Signed)
		.map_err(|_| shape(context, "an integer"))
}

fn bytes_from_json(context: &str, json: &Json) -> CodecResult<Vec<u8>> {
	json.as_array()
		.ok_or_else(|| shape(context, "an array of bytes"))?
		.iter()
		.map(|item| {
			item.as_u64()
				.and_then(|byte| u8::try_from(byte).ok())
				.ok_or_else(|| shape(context, "an array of bytes"))
		})
		.collect()
}

pub fn address_from_json(context: &str, json: &Json) -> CodecResult<Address> {
	json.as_str()
		.and_then(|text| Address::from_str(text).ok())
		.ok_or_else(|| shape(context, "a base58 address"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::loader::load_descriptor;

	const PROGRAM: &str = "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS";

	fn descriptor(body: &str) -> InterfaceDescriptor {
		let json = format!(
			r#"{{ "address": "{PROGRAM}", "metadata": {{ "name": "demo", "version": "0.1.0", "spec": "0.1.0" }}, {body} }}"#
		);
		load_descriptor(&json).unwrap_or_else(|e| panic!("load failed: {e}"))
	}

	fn registry(descriptor: &InterfaceDescriptor) -> TypeRegistry {
		TypeRegistry::build(descriptor, "crate::generated").unwrap_or_else(|e| panic!("registry: {e}"))
	}

	#[test]
	fn decodes_signed_integers_with_sign_extension() {
		let descriptor = descriptor(r#""instructions": []"#);
		let registry = registry(&descriptor);
		let runtime = Runtime::new(&descriptor, &registry);
		let layout = Layout::Int {
			width: 2,
			signed: true,
		};
		let mut input: &[u8] = &[0xfe, 0xff];
		let value = runtime
			.decode("x", &layout, &mut input)
			.unwrap_or_else(|e| panic!("decode: {e}"));
		assert_eq!(value, Value::Signed(-2));

		let mut out = Vec::new();
		runtime
			.encode("x", &layout, &value, &mut out)
			.unwrap_or_else(|e| panic!("encode: {e}"));
		assert_eq!(out, vec![0xfe, 0xff]);
	}

	#[test]
	fn rejects_out_of_range_integers() {
		let err = int_bytes("x", 1, false, &Value::Unsigned(256)).err();
		assert!(matches!(err, Some(LayoutMismatch::ValueShape { .. })));
		let err = int_bytes("x", 1, true, &Value::Signed(-129)).err();
		assert!(matches!(err, Some(LayoutMismatch::ValueShape { .. })));
	}

	#[test]
	fn coption_uses_a_four_byte_tag() {
		let descriptor = descriptor(r#""instructions": []"#);
		let registry = registry(&descriptor);
		let runtime = Runtime::new(&descriptor, &registry);
		let layout = Layout::Option {
			inner: Box::new(Layout::Int {
				width: 1,
				signed: false,
			}),
			tag_width: 4,
		};
		let mut out = Vec::new();
		runtime
			.encode("x", &layout, &Value::Option(Some(Box::new(Value::Unsigned(9)))), &mut out)
			.unwrap_or_else(|e| panic!("encode: {e}"));
		assert_eq!(out, vec![1, 0, 0, 0, 9]);

		let mut input: &[u8] = &[2, 0, 0, 0];
		let err = runtime.decode("x", &layout, &mut input).err();
		assert_eq!(
			err,
			Some(LayoutMismatch::InvalidTag {
				context: "x".to_owned(),
				tag: 2,
			})
		);
	}

	#[test]
	fn enums_round_trip_through_json() {
		let descriptor = descriptor(
			r#""instructions": [], "types": [{ "name": "Shape", "type": { "kind": "enum", "variants": [
				{ "name": "Empty" },
				{ "name": "Circle", "fields": [{ "name": "radius", "type": "u16" }] },
				{ "name": "Pair", "fields": ["u8", "bool"] }
			] } }]"#,
		);
		let registry = registry(&descriptor);
		let runtime = Runtime::new(&descriptor, &registry);
		let layout = Layout::Named("Shape".to_owned());

		let json = serde_json::json!({ "Circle": { "radius": 513 } });
		let value = runtime
			.from_json("shape", &layout, &json)
			.unwrap_or_else(|e| panic!("from_json: {e}"));
		let mut out = Vec::new();
		runtime
			.encode("shape", &layout, &value, &mut out)
			.unwrap_or_else(|e| panic!("encode: {e}"));
		assert_eq!(out, vec![1, 1, 2]);

		let mut input = out.as_slice();
		let decoded = runtime
			.decode("shape", &layout, &mut input)
			.unwrap_or_else(|e| panic!("decode: {e}"));
		assert_eq!(decoded.to_json(), json);

		let mut input: &[u8] = &[3];
		assert!(matches!(
			runtime.decode("shape", &layout, &mut input),
			Err(LayoutMismatch::InvalidTag { tag: 3, .. })
		));
	}

	#[test]
	fn strict_account_decode_rejects_trailing_bytes() {
		let descriptor = descriptor(
			r#""instructions": [], "accounts": [{ "name": "Counter", "discriminator": [7, 7] }],
			"types": [{ "name": "Counter", "type": { "kind": "struct", "fields": [{ "name": "count", "type": "u32" }] } }]"#,
		);
		let registry = registry(&descriptor);
		let runtime = Runtime::new(&descriptor, &registry);

		let bytes = [7, 7, 5, 0, 0, 0, 0xaa];
		let err = runtime
			.decode_account("Counter", &bytes)
			.err()
			.unwrap_or_else(|| panic!("expected error"));
		assert!(matches!(
			err,
			GenerateError::LayoutMismatch(LayoutMismatch::TrailingBytes { remaining: 1, .. })
		));

		let (value, consumed) = runtime
			.decode_account_prefix("Counter", &bytes)
			.unwrap_or_else(|e| panic!("prefix: {e}"));
		assert_eq!(consumed, 6);
		assert_eq!(value.field("count"), Some(&Value::Unsigned(5)));

		let err = runtime.decode_account("Counter", &[1, 7, 5, 0, 0, 0]).err();
		assert!(matches!(
			err,
			Some(GenerateError::LayoutMismatch(LayoutMismatch::Discriminator { .. }))
		));
	}

	#[test]
	fn omitted_optional_accounts_resolve_to_the_program() {
		let descriptor = descriptor(
			r#""instructions": [{ "name": "close", "discriminator": [9], "args": [], "accounts": [
				{ "name": "owner", "signer": true, "writable": true },
				{ "name": "referrer", "writable": true, "optional": true }
			] }]"#,
		);
		let registry = registry(&descriptor);
		let catalog = PdaCatalog::build(&descriptor, &registry).unwrap_or_else(|e| panic!("catalog: {e}"));
		let runtime = Runtime::new(&descriptor, &registry);
		let owner = Address::new_from_array([1; 32]);

		let mut inputs = InstructionInputs::default();
		inputs.accounts.insert("owner".to_owned(), owner);
		let built = runtime
			.build_instruction(&catalog, "close", &inputs)
			.unwrap_or_else(|e| panic!("build: {e}"));

		assert_eq!(built.data, vec![9]);
		assert_eq!(built.accounts[1].address, descriptor.address);
		assert!(!built.accounts[1].is_signer);
		assert!(!built.accounts[1].is_writable);

		let missing = runtime.build_instruction(&catalog, "close", &InstructionInputs::default());
		assert!(matches!(
			missing,
			Err(GenerateError::LayoutMismatch(LayoutMismatch::MissingValue { .. }))
		));
	}
}
