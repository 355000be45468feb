//! Builds instructions and round-trips account data through the reference
//! runtime.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use clientgen::InterfaceDescriptor;
use clientgen::PdaCatalog;
use clientgen::TypeRegistry;
use clientgen::read_descriptor;
use clientgen::runtime::InstructionInputs;
use clientgen::runtime::Runtime;
use clientgen::runtime::Value;
use clientgen::runtime::derive_address;
use proptest::prelude::*;
use solana_address::Address;

const PROGRAM: &str = "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS";

struct Loaded {
	descriptor: InterfaceDescriptor,
	registry: TypeRegistry,
	catalog: PdaCatalog,
}

fn load(name: &str) -> Loaded {
	let path = Path::new(env!("CARGO_MANIFEST_DIR"))
		.join("tests/fixtures")
		.join(name);
	let descriptor = read_descriptor(&path).unwrap_or_else(|e| panic!("failed to load {name}: {e}"));
	let registry = TypeRegistry::build(&descriptor, "crate::generated")
		.unwrap_or_else(|e| panic!("registry: {e}"));
	let catalog = PdaCatalog::build(&descriptor, &registry).unwrap_or_else(|e| panic!("catalog: {e}"));
	Loaded {
		descriptor,
		registry,
		catalog,
	}
}

fn program_id() -> Address {
	Address::from_str(PROGRAM).unwrap_or_else(|e| panic!("program id: {e:?}"))
}

#[test]
fn builds_the_transfer_payload() {
	let loaded = load("transfer.json");
	let runtime = Runtime::new(&loaded.descriptor, &loaded.registry);
	let source = Address::new_from_array([1; 32]);
	let destination = Address::new_from_array([2; 32]);

	let inputs = InstructionInputs {
		args: vec![("amount".to_owned(), Value::Unsigned(1000))],
		accounts: BTreeMap::from([
			("source".to_owned(), source),
			("destination".to_owned(), destination),
		]),
		..InstructionInputs::default()
	};
	let built = runtime
		.build_instruction(&loaded.catalog, "transfer", &inputs)
		.unwrap_or_else(|e| panic!("build: {e}"));

	assert_eq!(built.program_id, program_id());
	assert_eq!(built.data, vec![3, 232, 3, 0, 0, 0, 0, 0, 0]);
	let metas: Vec<_> = built
		.accounts
		.iter()
		.map(|meta| (meta.address, meta.is_signer, meta.is_writable))
		.collect();
	assert_eq!(metas, vec![(source, true, true), (destination, false, true)]);
}

#[test]
fn missing_required_accounts_are_reported() {
	let loaded = load("transfer.json");
	let runtime = Runtime::new(&loaded.descriptor, &loaded.registry);
	let inputs = InstructionInputs {
		args: vec![("amount".to_owned(), Value::Unsigned(1))],
		accounts: BTreeMap::from([("source".to_owned(), Address::new_from_array([1; 32]))]),
		..InstructionInputs::default()
	};
	let err = runtime
		.build_instruction(&loaded.catalog, "transfer", &inputs)
		.err()
		.unwrap_or_else(|| panic!("expected a missing account"));
	assert!(err.to_string().contains("destination"));
}

#[test]
fn derives_nested_addresses_deterministically() {
	let loaded = load("vault.json");
	let runtime = Runtime::new(&loaded.descriptor, &loaded.registry);
	let authority = Address::new_from_array([5; 32]);
	let args = runtime
		.args_from_json(
			"initialize",
			&serde_json::json!({
				"config": { "tier": { "Premium": { "level": 3 } }, "fee_bps": 25, "cap": null }
			}),
		)
		.unwrap_or_else(|e| panic!("args: {e}"));
	let inputs = InstructionInputs {
		args,
		accounts: BTreeMap::from([("authority".to_owned(), authority)]),
		..InstructionInputs::default()
	};

	let built = runtime
		.build_instruction(&loaded.catalog, "initialize", &inputs)
		.unwrap_or_else(|e| panic!("build: {e}"));
	let again = runtime
		.build_instruction(&loaded.catalog, "initialize", &inputs)
		.unwrap_or_else(|e| panic!("build: {e}"));
	assert_eq!(built, again);

	let (vault, _) = derive_address("vault", &[b"vault".to_vec(), authority.as_ref().to_vec()], &program_id())
		.unwrap_or_else(|e| panic!("derive: {e}"));
	let (receipt, _) = derive_address("receipt", &[b"receipt".to_vec(), vault.as_ref().to_vec()], &program_id())
		.unwrap_or_else(|e| panic!("derive: {e}"));
	let expected = Address::find_program_address(&[b"vault", authority.as_ref()], &program_id());
	assert_eq!(vault, expected.0);

	let metas: Vec<_> = built
		.accounts
		.iter()
		.map(|meta| (meta.name.as_str(), meta.address, meta.is_signer, meta.is_writable))
		.collect();
	assert_eq!(metas, vec![
		("authority", authority, true, true),
		("vault", vault, false, true),
		("receipt", receipt, false, true),
		("system_program", Address::new_from_array([0; 32]), false, false),
	]);

	let mut data = vec![175, 175, 109, 31, 13, 152, 155, 237];
	data.extend_from_slice(&[1, 3, 25, 0, 0, 0, 0, 0]);
	assert_eq!(built.data, data);
}

#[test]
fn derivation_is_stable_across_invocations() {
	let program = program_id();
	let seeds = vec![b"vault".to_vec(), program.as_ref().to_vec()];
	let first = derive_address("vault", &seeds, &program).unwrap_or_else(|e| panic!("derive: {e}"));
	let second = derive_address("vault", &seeds, &program).unwrap_or_else(|e| panic!("derive: {e}"));
	assert_eq!(first, second);
	assert_eq!(first, Address::find_program_address(&[b"vault", program.as_ref()], &program));

	let long = vec![vec![0; 33]];
	assert!(derive_address("vault", &long, &program).is_err());

	// Sixteen seeds leave no room for the bump seed.
	let many = vec![vec![1]; 16];
	assert!(derive_address("vault", &many, &program).is_err());
	assert!(derive_address("vault", &many[..15], &program).is_ok());
}

#[test]
fn omitted_optional_accounts_fall_back_to_the_program_id() {
	let loaded = load("vault.json");
	let runtime = Runtime::new(&loaded.descriptor, &loaded.registry);
	let authority = Address::new_from_array([5; 32]);
	let args = runtime
		.args_from_json("deposit", &serde_json::json!({ "amount": 500 }))
		.unwrap_or_else(|e| panic!("args: {e}"));
	let inputs = InstructionInputs {
		args,
		accounts: BTreeMap::from([("authority".to_owned(), authority)]),
		..InstructionInputs::default()
	};
	let built = runtime
		.build_instruction(&loaded.catalog, "deposit", &inputs)
		.unwrap_or_else(|e| panic!("build: {e}"));

	let referrer = built
		.accounts
		.iter()
		.find(|meta| meta.name == "referrer")
		.unwrap_or_else(|| panic!("referrer meta is missing"));
	assert_eq!(referrer.address, program_id());
	assert!(!referrer.is_signer);
	assert!(!referrer.is_writable);
	assert_eq!(&built.data[8..], &[244, 1, 0, 0, 0, 0, 0, 0, 0]);
}

fn tier() -> impl Strategy<Value = Value> {
	prop_oneof![
		Just(Value::Enum {
			variant: "Basic".to_owned(),
			fields: None,
		}),
		any::<u8>().prop_map(|level| {
			Value::Enum {
				variant: "Premium".to_owned(),
				fields: Some(Box::new(Value::Struct(vec![(
					"level".to_owned(),
					Value::Unsigned(u128::from(level)),
				)]))),
			}
		}),
		any::<u32>().prop_map(|value| {
			Value::Enum {
				variant: "Custom".to_owned(),
				fields: Some(Box::new(Value::Tuple(vec![Value::Unsigned(u128::from(value))]))),
			}
		}),
	]
}

fn vault_account() -> impl Strategy<Value = Value> {
	(
		any::<[u8; 32]>(),
		any::<u8>(),
		tier(),
		any::<u16>(),
		proptest::option::of(any::<u64>()),
		any::<u64>(),
	)
		.prop_map(|(authority, bump, tier, fee_bps, cap, balance)| {
			let config = Value::Struct(vec![
				("tier".to_owned(), tier),
				("fee_bps".to_owned(), Value::Unsigned(u128::from(fee_bps))),
				(
					"cap".to_owned(),
					Value::Option(cap.map(|cap| Box::new(Value::Unsigned(u128::from(cap))))),
				),
			]);
			Value::Struct(vec![
				("authority".to_owned(), Value::Address(Address::new_from_array(authority))),
				("bump".to_owned(), Value::Unsigned(u128::from(bump))),
				("config".to_owned(), config),
				("balance".to_owned(), Value::Unsigned(u128::from(balance))),
			])
		})
}

proptest! {
	#[test]
	fn vault_accounts_survive_encoding(value in vault_account()) {
		let loaded = load("vault.json");
		let runtime = Runtime::new(&loaded.descriptor, &loaded.registry);

		let bytes = runtime.encode_account("Vault", &value).unwrap_or_else(|e| panic!("encode: {e}"));
		prop_assert_eq!(&bytes[..8], &[211, 8, 232, 43, 2, 152, 117, 119]);
		let decoded = runtime.decode_account("Vault", &bytes).unwrap_or_else(|e| panic!("decode: {e}"));
		prop_assert_eq!(&decoded, &value);

		let back = runtime
			.from_json("Vault", &clientgen::layout::Layout::Named("Vault".to_owned()), &decoded.to_json())
			.unwrap_or_else(|e| panic!("from_json: {e}"));
		prop_assert_eq!(back, value);
	}

	#[test]
	fn truncated_accounts_never_decode(value in vault_account(), cut in 1usize..8) {
		let loaded = load("vault.json");
		let runtime = Runtime::new(&loaded.descriptor, &loaded.registry);
		let bytes = runtime.encode_account("Vault", &value).unwrap_or_else(|e| panic!("encode: {e}"));
		let truncated = &bytes[..bytes.len() - cut];
		prop_assert!(runtime.decode_account("Vault", truncated).is_err());
	}
}
