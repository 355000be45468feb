//! Lowering of a descriptor into a Codama `RootNode`.
//!
//! Layouts come from the [`TypeRegistry`] so Codama sees exactly the wire
//! format the generated client uses. Byte discriminators become an omitted
//! `discriminator` field at offset zero. Events have no Codama counterpart and
//! are left out.

use codama_nodes::AccountNode;
use codama_nodes::AccountValueNode;
use codama_nodes::ArgumentValueNode;
use codama_nodes::ArrayTypeNode;
use codama_nodes::Base16;
use codama_nodes::BooleanTypeNode;
use codama_nodes::BytesTypeNode;
use codama_nodes::BytesValueNode;
use codama_nodes::ConstantPdaSeedNode;
use codama_nodes::DefaultValueStrategy;
use codama_nodes::DefinedTypeLinkNode;
use codama_nodes::DefinedTypeNode;
use codama_nodes::DiscriminatorNode;
use codama_nodes::EnumEmptyVariantTypeNode;
use codama_nodes::EnumStructVariantTypeNode;
use codama_nodes::EnumTupleVariantTypeNode;
use codama_nodes::EnumTypeNode;
use codama_nodes::EnumVariantTypeNode;
use codama_nodes::ErrorNode;
use codama_nodes::FieldDiscriminatorNode;
use codama_nodes::FixedSizeTypeNode;
use codama_nodes::InstructionAccountNode;
use codama_nodes::InstructionArgumentNode;
use codama_nodes::InstructionInputValueNode;
use codama_nodes::InstructionNode;
use codama_nodes::IsAccountSigner;
use codama_nodes::NumberFormat;
use codama_nodes::NumberTypeNode;
use codama_nodes::OptionTypeNode;
use codama_nodes::PdaLinkNode;
use codama_nodes::PdaNode;
use codama_nodes::PdaSeedNode;
use codama_nodes::PdaSeedValueNode;
use codama_nodes::PdaValueNode;
use codama_nodes::ProgramNode;
use codama_nodes::PublicKeyTypeNode;
use codama_nodes::PublicKeyValueNode;
use codama_nodes::RootNode;
use codama_nodes::SizePrefixTypeNode;
use codama_nodes::StringTypeNode;
use codama_nodes::StringValueNode;
use codama_nodes::StructFieldTypeNode;
use codama_nodes::StructTypeNode;
use codama_nodes::TupleTypeNode;
use codama_nodes::TypeNode;
use codama_nodes::VariablePdaSeedNode;

use crate::error::Result;
use crate::layout::FieldLayout;
use crate::layout::Layout;
use crate::layout::NamedLayout;
use crate::layout::VariantFieldsLayout;
use crate::pda::PdaCatalog;
use crate::pda::PdaFunction;
use crate::pda::PdaProgram;
use crate::pda::SeedKind;
use crate::pda::SeedPart;
use crate::pda::SeedSource;
use crate::schema::AccountDef;
use crate::schema::AccountRequirement;
use crate::schema::ErrorDef;
use crate::schema::InstructionDef;
use crate::schema::InterfaceDescriptor;
use crate::types::TypeModule;
use crate::types::TypeRegistry;

const DISCRIMINATOR_NAME: &str = "discriminator";

/// Convert a descriptor into a Codama `RootNode`.
pub fn descriptor_to_root_node(descriptor: &InterfaceDescriptor) -> Result<RootNode> {
	let registry = TypeRegistry::build(descriptor, crate::DEFAULT_MODULE_PATH)?;
	let catalog = PdaCatalog::build(descriptor, &registry)?;
	lower_program(descriptor, &registry, &catalog)
}

pub fn lower_program(
	descriptor: &InterfaceDescriptor,
	registry: &TypeRegistry,
	catalog: &PdaCatalog,
) -> Result<RootNode> {
	let mut program = ProgramNode::new(descriptor.name.as_str(), descriptor.address.to_string().as_str());
	program.version.clone_from(&descriptor.version);
	if !descriptor.docs.is_empty() {
		program.docs = descriptor.docs.clone().into();
	}

	for entry in registry.in_module(TypeModule::Types) {
		let mut node = DefinedTypeNode::new(entry.name.as_str(), named_type_node(&entry.layout));
		if let Some(def) = descriptor.find_type(&entry.name) {
			if !def.docs.is_empty() {
				node.docs = def.docs.clone().into();
			}
		}
		program.defined_types.push(node);
	}

	for account in &descriptor.accounts {
		program = program.add_account(build_account_node(registry, account));
	}

	for instruction in &descriptor.instructions {
		program = program.add_instruction(build_instruction_node(registry, catalog, instruction)?);
	}

	for function in catalog.functions() {
		program = program.add_pda(build_pda_node(function));
	}

	for error in &descriptor.errors {
		program = program.add_error(build_error_node(error));
	}

	Ok(RootNode::new(program))
}

fn build_account_node(registry: &TypeRegistry, account: &AccountDef) -> AccountNode {
	let layouts = registry
		.get(&account.name)
		.and_then(|entry| {
			match &entry.layout {
				NamedLayout::Struct(fields) => Some(fields.as_slice()),
				_ => None,
			}
		})
		.unwrap_or_default();

	let mut fields: Vec<StructFieldTypeNode> = layouts
		.iter()
		.zip(&account.fields)
		.map(|(layout, field)| struct_field(layout, &field.docs))
		.collect();

	let mut discriminators = Vec::new();
	if !account.discriminator.is_empty() {
		fields.insert(0, discriminator_field(&account.discriminator));
		discriminators.push(discriminator_node());
	}

	let mut node = AccountNode::new(account.name.as_str(), StructTypeNode::new(fields));
	node.discriminators = discriminators;
	if let Some(size) = registry.get(&account.name).and_then(|entry| entry.fixed_size) {
		node.size = Some(account.discriminator.len() + size);
	}
	if !account.docs.is_empty() {
		node.docs = account.docs.clone().into();
	}

	node
}

fn build_instruction_node(
	registry: &TypeRegistry,
	catalog: &PdaCatalog,
	instruction: &InstructionDef,
) -> Result<InstructionNode> {
	let context = format!("instructions.{}.args", instruction.name);
	let layouts = registry.field_layouts(&context, &instruction.args)?;

	let mut arguments: Vec<InstructionArgumentNode> = vec![discriminator_field(&instruction.discriminator).into()];
	arguments.extend(
		layouts
			.iter()
			.zip(&instruction.args)
			.map(|(layout, arg)| InstructionArgumentNode::from(struct_field(layout, &arg.docs))),
	);

	let accounts = instruction
		.accounts
		.iter()
		.map(|account| build_instruction_account_node(catalog, instruction, account))
		.collect();

	let mut node = InstructionNode {
		name: instruction.name.as_str().into(),
		accounts,
		arguments,
		discriminators: vec![discriminator_node()],
		..Default::default()
	};

	if !instruction.docs.is_empty() {
		node.docs = instruction.docs.clone().into();
	}

	Ok(node)
}

fn build_instruction_account_node(
	catalog: &PdaCatalog,
	instruction: &InstructionDef,
	account: &AccountRequirement,
) -> InstructionAccountNode {
	let is_signer = if account.signer {
		IsAccountSigner::True
	} else {
		IsAccountSigner::False
	};

	let mut node = InstructionAccountNode::new(account.name.as_str(), account.writable, is_signer);
	node.is_optional = account.optional;

	if !account.docs.is_empty() {
		node.docs = account.docs.clone().into();
	}

	if let Some(address) = &account.address {
		node.default_value = Some(InstructionInputValueNode::PublicKey(PublicKeyValueNode::new(
			address.to_string(),
		)));
	} else if let Some(function) = catalog.function_for(&instruction.name, &account.name) {
		node.default_value = Some(build_pda_value(function).into());
	}

	node
}

/// Link an instruction account to its derivation, feeding the seeds from the
/// instruction's own arguments and accounts where Codama can express them.
fn build_pda_value(function: &PdaFunction) -> PdaValueNode {
	let seeds = function
		.shape
		.params
		.iter()
		.filter_map(|param| {
			match &param.source {
				SeedSource::Arg { name, path } if path.is_empty() => {
					Some(PdaSeedValueNode::new(param.name.as_str(), ArgumentValueNode::new(name.as_str())))
				}
				SeedSource::Account(name) => {
					Some(PdaSeedValueNode::new(param.name.as_str(), AccountValueNode::new(name.as_str())))
				}
				SeedSource::Arg { .. } | SeedSource::AccountData { .. } => None,
			}
		})
		.collect();

	PdaValueNode::new(PdaLinkNode::new(function.name.as_str()), seeds)
}

fn build_pda_node(function: &PdaFunction) -> PdaNode {
	let shape = &function.shape;
	let seeds: Vec<PdaSeedNode> = shape
		.seeds
		.iter()
		.map(|seed| {
			match seed {
				SeedPart::Literal(value) => {
					if let Ok(text) = std::str::from_utf8(value) {
						PdaSeedNode::Constant(ConstantPdaSeedNode::new(
							StringTypeNode::utf8(),
							StringValueNode::new(text),
						))
					} else {
						PdaSeedNode::Constant(ConstantPdaSeedNode::new(
							BytesTypeNode::new(),
							BytesValueNode::new(Base16, hex::encode(value)),
						))
					}
				}
				SeedPart::Param(index) => {
					let param = &shape.params[*index];
					PdaSeedNode::Variable(VariablePdaSeedNode::new(param.name.as_str(), seed_type_node(param.kind)))
				}
			}
		})
		.collect();

	let mut node = PdaNode::new(function.name.as_str(), seeds);
	if let PdaProgram::Literal(address) = &shape.program {
		node.program_id = Some(address.to_string());
	}
	node
}

fn build_error_node(error: &ErrorDef) -> ErrorNode {
	let message = error.msg.clone().unwrap_or_default();
	ErrorNode::new(error.name.as_str(), error.code as usize, message)
}

fn discriminator_field(discriminator: &[u8]) -> StructFieldTypeNode {
	let mut field = StructFieldTypeNode::new(
		DISCRIMINATOR_NAME,
		FixedSizeTypeNode::<TypeNode>::new(BytesTypeNode::new(), discriminator.len()),
	);
	field.default_value = Some(BytesValueNode::new(Base16, hex::encode(discriminator)).into());
	field.default_value_strategy = Some(DefaultValueStrategy::Omitted);
	field
}

fn discriminator_node() -> DiscriminatorNode {
	DiscriminatorNode::Field(FieldDiscriminatorNode::new(DISCRIMINATOR_NAME, 0))
}

fn struct_field(field: &FieldLayout, docs: &[String]) -> StructFieldTypeNode {
	let mut node = StructFieldTypeNode::new(field.name.as_str(), type_node(&field.layout));
	if !docs.is_empty() {
		node.docs = docs.to_vec().into();
	}
	node
}

fn number(format: NumberFormat) -> TypeNode {
	NumberTypeNode::le(format).into()
}

fn int_format(width: usize, signed: bool) -> NumberFormat {
	match (width, signed) {
		(1, false) => NumberFormat::U8,
		(2, false) => NumberFormat::U16,
		(4, false) => NumberFormat::U32,
		(8, false) => NumberFormat::U64,
		(_, false) => NumberFormat::U128,
		(1, true) => NumberFormat::I8,
		(2, true) => NumberFormat::I16,
		(4, true) => NumberFormat::I32,
		(8, true) => NumberFormat::I64,
		(_, true) => NumberFormat::I128,
	}
}

fn type_node(layout: &Layout) -> TypeNode {
	match layout {
		Layout::Bool => BooleanTypeNode::default().into(),
		Layout::Int { width, signed } => number(int_format(*width, *signed)),
		Layout::Float { width: 4 } => number(NumberFormat::F32),
		Layout::Float { .. } => number(NumberFormat::F64),
		Layout::String => {
			SizePrefixTypeNode::<TypeNode>::new(StringTypeNode::utf8(), NumberTypeNode::le(NumberFormat::U32))
				.into()
		}
		Layout::Bytes => {
			SizePrefixTypeNode::<TypeNode>::new(BytesTypeNode::new(), NumberTypeNode::le(NumberFormat::U32)).into()
		}
		Layout::Pubkey => PublicKeyTypeNode::new().into(),
		Layout::Array { element, len } => ArrayTypeNode::fixed(type_node(element), *len).into(),
		Layout::Vec { element } => {
			ArrayTypeNode::prefixed(type_node(element), NumberTypeNode::le(NumberFormat::U32)).into()
		}
		Layout::Option { inner, tag_width } => {
			let option = OptionTypeNode::new(type_node(inner));
			if *tag_width == 4 {
				OptionTypeNode {
					prefix: NumberTypeNode::le(NumberFormat::U32).into(),
					..option
				}
				.into()
			} else {
				option.into()
			}
		}
		Layout::Named(name) => DefinedTypeLinkNode::new(name.as_str()).into(),
	}
}

fn seed_type_node(kind: SeedKind) -> TypeNode {
	match kind {
		SeedKind::Int { width, signed } => number(int_format(width, signed)),
		SeedKind::Bool => BooleanTypeNode::default().into(),
		SeedKind::Pubkey => PublicKeyTypeNode::new().into(),
		SeedKind::Str => StringTypeNode::utf8().into(),
		SeedKind::Bytes => BytesTypeNode::new().into(),
		SeedKind::ByteArray(len) => FixedSizeTypeNode::<TypeNode>::new(BytesTypeNode::new(), len).into(),
	}
}

fn fields_node(fields: &[FieldLayout]) -> StructTypeNode {
	StructTypeNode::new(
		fields
			.iter()
			.map(|field| StructFieldTypeNode::new(field.name.as_str(), type_node(&field.layout)))
			.collect(),
	)
}

fn named_type_node(layout: &NamedLayout) -> TypeNode {
	match layout {
		NamedLayout::Struct(fields) => fields_node(fields).into(),
		NamedLayout::Tuple(items) => TupleTypeNode::new(items.iter().map(type_node).collect()).into(),
		NamedLayout::Alias(inner) => type_node(inner),
		NamedLayout::Enum(variants) => {
			let variants: Vec<EnumVariantTypeNode> = variants
				.iter()
				.map(|variant| {
					let name = variant.name.as_str();
					match &variant.fields {
						VariantFieldsLayout::Unit => EnumEmptyVariantTypeNode::new(name).into(),
						VariantFieldsLayout::Named(fields) => {
							EnumStructVariantTypeNode::new(name, fields_node(fields)).into()
						}
						VariantFieldsLayout::Tuple(items) => {
							EnumTupleVariantTypeNode::new(
								name,
								TupleTypeNode::new(items.iter().map(type_node).collect()),
							)
							.into()
						}
					}
				})
				.collect();
			EnumTypeNode::new(variants).into()
		}
	}
}
