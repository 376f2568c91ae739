//! Program interface descriptions (IDL) and Borsh account decoding.
//!
//! Two IDL layouts are accepted:
//!
//! - current: `accounts[]` carry an explicit `discriminator`; field layouts
//!   live in `types[]` under the same name; public keys are `"pubkey"`.
//! - legacy: `accounts[]` carry their own `type`; the discriminator is
//!   derived from the account name; public keys are `"publicKey"`.
//!
//! Every document is checked against a JSON Schema before it is used.

use std::{collections::BTreeMap, path::Path};

use serde_json::{json, Value};
use tracing::{debug, warn};
use warden_contracts::{
    address::Address,
    error::{WardenError, WardenResult},
};

use crate::discriminator::{account_discriminator, DISCRIMINATOR_LEN};

const EMBEDDED_COUNTER_IDL: &str = include_str!("../idl/agentic_counter.json");

/// Borsh field types the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    U128,
    I128,
    Pubkey,
}

impl FieldType {
    fn parse(ty: &Value) -> Option<Self> {
        Some(match ty.as_str()? {
            "bool" => FieldType::Bool,
            "u8" => FieldType::U8,
            "i8" => FieldType::I8,
            "u16" => FieldType::U16,
            "i16" => FieldType::I16,
            "u32" => FieldType::U32,
            "i32" => FieldType::I32,
            "u64" => FieldType::U64,
            "i64" => FieldType::I64,
            "u128" => FieldType::U128,
            "i128" => FieldType::I128,
            "pubkey" | "publicKey" => FieldType::Pubkey,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            FieldType::Bool | FieldType::U8 | FieldType::I8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 => 4,
            FieldType::U64 | FieldType::I64 => 8,
            FieldType::U128 | FieldType::I128 => 16,
            FieldType::Pubkey => 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdlField {
    pub name: String,
    pub ty: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdlAccount {
    pub name: String,
    pub discriminator: [u8; DISCRIMINATOR_LEN],
    pub fields: Vec<IdlField>,
}

/// One decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Bool(bool),
    Unsigned(u128),
    Signed(i128),
    Pubkey(Address),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Unsigned(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_pubkey(&self) -> Option<Address> {
        match self {
            FieldValue::Pubkey(a) => Some(*a),
            _ => None,
        }
    }
}

/// Field name to value, in name order.
pub type DecodedAccount = BTreeMap<String, FieldValue>;

/// A validated program interface.
#[derive(Debug, Clone)]
pub struct ProgramIdl {
    name: Option<String>,
    address: Option<Address>,
    instructions: Vec<String>,
    accounts: Vec<IdlAccount>,
}

impl ProgramIdl {
    /// The counter program's interface, compiled into the binary.
    pub fn embedded_counter() -> WardenResult<Self> {
        Self::from_json_str(EMBEDDED_COUNTER_IDL)
    }

    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::Config {
            reason: format!("failed to read IDL '{}': {e}", path.display()),
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(s: &str) -> WardenResult<Self> {
        let value: Value = serde_json::from_str(s).map_err(|e| WardenError::Config {
            reason: format!("failed to parse IDL JSON: {e}"),
        })?;
        Self::from_value(&value)
    }

    /// Validate `value` against the IDL schema, then extract account layouts.
    pub fn from_value(value: &Value) -> WardenResult<Self> {
        validate_shape(value)?;

        let name = value
            .pointer("/metadata/name")
            .or_else(|| value.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let address = match value.get("address").and_then(Value::as_str) {
            Some(raw) => Some(Address::parse(raw).map_err(|e| WardenError::Config {
                reason: format!("IDL address '{raw}' is invalid: {e}"),
            })?),
            None => None,
        };
        let instructions = array(value, "instructions")
            .iter()
            .filter_map(|ix| ix.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let type_defs: BTreeMap<&str, &Value> = array(value, "types")
            .iter()
            .filter_map(|t| Some((t.get("name")?.as_str()?, t.get("type")?)))
            .collect();

        let accounts = array(value, "accounts")
            .iter()
            .map(|account| parse_account(account, &type_defs))
            .collect::<WardenResult<Vec<_>>>()?;

        debug!(
            idl = name.as_deref().unwrap_or("unnamed"),
            accounts = accounts.len(),
            "loaded program IDL"
        );
        Ok(Self {
            name,
            address,
            instructions,
            accounts,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The program id the IDL declares, if any.
    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn instruction_names(&self) -> &[String] {
        &self.instructions
    }

    pub fn account(&self, name: &str) -> Option<&IdlAccount> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Decode account `name` from raw account data.
    ///
    /// Checks the discriminator, then reads each field in declaration
    /// order. Trailing bytes are ignored.
    pub fn decode_account(&self, name: &str, data: &[u8]) -> WardenResult<DecodedAccount> {
        let layout = self.account(name).ok_or_else(|| WardenError::Decode {
            reason: format!("IDL has no account type '{name}'"),
        })?;
        let (disc, mut rest) = data
            .split_first_chunk::<DISCRIMINATOR_LEN>()
            .ok_or_else(|| WardenError::Decode {
                reason: format!("{name}: account data is {} bytes, too short", data.len()),
            })?;
        if disc != &layout.discriminator {
            return Err(WardenError::Decode {
                reason: format!("{name}: discriminator mismatch"),
            });
        }

        let mut decoded = DecodedAccount::new();
        for field in &layout.fields {
            let size = field.ty.size();
            if rest.len() < size {
                return Err(WardenError::Decode {
                    reason: format!("{name}.{}: needs {size} bytes, {} left", field.name, rest.len()),
                });
            }
            let (bytes, tail) = rest.split_at(size);
            rest = tail;
            let value = read_field(field.ty, bytes).ok_or_else(|| WardenError::Decode {
                reason: format!("{name}.{}: invalid {:?} encoding", field.name, field.ty),
            })?;
            decoded.insert(field.name.clone(), value);
        }
        Ok(decoded)
    }
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn parse_account(account: &Value, type_defs: &BTreeMap<&str, &Value>) -> WardenResult<IdlAccount> {
    let name = account
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| WardenError::Config {
            reason: "IDL account without a name".to_string(),
        })?;

    let discriminator = match account.get("discriminator").and_then(Value::as_array) {
        Some(bytes) => {
            let collected: Vec<u8> = bytes
                .iter()
                .filter_map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            collected.try_into().map_err(|_| WardenError::Config {
                reason: format!("IDL account '{name}' has a malformed discriminator"),
            })?
        }
        None => account_discriminator(name),
    };

    let ty = account
        .get("type")
        .or_else(|| type_defs.get(name).copied())
        .ok_or_else(|| WardenError::Config {
            reason: format!("IDL account '{name}' has no type definition"),
        })?;
    if ty.get("kind").and_then(Value::as_str) != Some("struct") {
        return Err(WardenError::Config {
            reason: format!("IDL account '{name}' is not a struct"),
        });
    }

    let fields = array(ty, "fields")
        .iter()
        .map(|field| {
            let field_name = field.get("name").and_then(Value::as_str).unwrap_or_default();
            let raw_ty = field.get("type").unwrap_or(&Value::Null);
            FieldType::parse(raw_ty)
                .map(|ty| IdlField {
                    name: field_name.to_string(),
                    ty,
                })
                .ok_or_else(|| WardenError::Config {
                    reason: format!("IDL field '{name}.{field_name}' has unsupported type {raw_ty}"),
                })
        })
        .collect::<WardenResult<Vec<_>>>()?;

    Ok(IdlAccount {
        name: name.to_string(),
        discriminator,
        fields,
    })
}

fn read_field(ty: FieldType, bytes: &[u8]) -> Option<FieldValue> {
    fn le<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
        bytes.try_into().ok()
    }
    Some(match ty {
        FieldType::Bool => match bytes.first()? {
            0 => FieldValue::Bool(false),
            1 => FieldValue::Bool(true),
            _ => return None,
        },
        FieldType::U8 => FieldValue::Unsigned(u128::from(*bytes.first()?)),
        FieldType::I8 => FieldValue::Signed(i128::from(i8::from_le_bytes(le(bytes)?))),
        FieldType::U16 => FieldValue::Unsigned(u128::from(u16::from_le_bytes(le(bytes)?))),
        FieldType::I16 => FieldValue::Signed(i128::from(i16::from_le_bytes(le(bytes)?))),
        FieldType::U32 => FieldValue::Unsigned(u128::from(u32::from_le_bytes(le(bytes)?))),
        FieldType::I32 => FieldValue::Signed(i128::from(i32::from_le_bytes(le(bytes)?))),
        FieldType::U64 => FieldValue::Unsigned(u128::from(u64::from_le_bytes(le(bytes)?))),
        FieldType::I64 => FieldValue::Signed(i128::from(i64::from_le_bytes(le(bytes)?))),
        FieldType::U128 => FieldValue::Unsigned(u128::from_le_bytes(le(bytes)?)),
        FieldType::I128 => FieldValue::Signed(i128::from_le_bytes(le(bytes)?)),
        FieldType::Pubkey => FieldValue::Pubkey(Address(le(bytes)?)),
    })
}

fn idl_schema() -> Value {
    json!({
        "type": "object",
        "required": ["instructions", "accounts"],
        "properties": {
            "address": { "type": "string" },
            "instructions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name"],
                    "properties": { "name": { "type": "string" } }
                }
            },
            "accounts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string" },
                        "discriminator": {
                            "type": "array",
                            "minItems": 8,
                            "maxItems": 8,
                            "items": { "type": "integer", "minimum": 0, "maximum": 255 }
                        }
                    }
                }
            },
            "types": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "type"]
                }
            }
        }
    })
}

fn validate_shape(value: &Value) -> WardenResult<()> {
    let validator = jsonschema::validator_for(&idl_schema()).map_err(|e| WardenError::Config {
        reason: format!("invalid IDL schema: {e}"),
    })?;
    let problems: Vec<String> = validator
        .iter_errors(value)
        .map(|error| format!("{}: {error}", error.instance_path))
        .collect();
    if problems.is_empty() {
        return Ok(());
    }
    for problem in &problems {
        warn!(%problem, "IDL schema violation");
    }
    Err(WardenError::Config {
        reason: format!("IDL failed schema validation: {}", problems.join("; ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::COUNTER_PROGRAM_ID;

    fn counter_bytes(authority: Address, count: u64) -> Vec<u8> {
        let mut data = account_discriminator("Counter").to_vec();
        data.extend_from_slice(authority.as_bytes());
        data.extend_from_slice(&count.to_le_bytes());
        data
    }

    #[test]
    fn embedded_counter_idl_loads() {
        let idl = ProgramIdl::embedded_counter().unwrap();
        assert_eq!(idl.name(), Some("agentic_counter"));
        assert_eq!(idl.address(), Some(&COUNTER_PROGRAM_ID));
        assert_eq!(idl.instruction_names(), ["increment", "initialize"]);

        let counter = idl.account("Counter").unwrap();
        assert_eq!(counter.discriminator, account_discriminator("Counter"));
        assert_eq!(
            counter.fields,
            vec![
                IdlField { name: "authority".into(), ty: FieldType::Pubkey },
                IdlField { name: "count".into(), ty: FieldType::U64 },
            ]
        );
    }

    #[test]
    fn legacy_layout_derives_the_discriminator() {
        let legacy = r#"{
            "version": "0.1.0",
            "name": "agentic_counter",
            "instructions": [{ "name": "initialize", "accounts": [], "args": [] }],
            "accounts": [{
                "name": "Counter",
                "type": { "kind": "struct", "fields": [
                    { "name": "authority", "type": "publicKey" },
                    { "name": "count", "type": "u64" }
                ]}
            }]
        }"#;
        let idl = ProgramIdl::from_json_str(legacy).unwrap();
        let authority = Address([5u8; 32]);
        let decoded = idl.decode_account("Counter", &counter_bytes(authority, 7)).unwrap();
        assert_eq!(decoded["authority"].as_pubkey(), Some(authority));
        assert_eq!(decoded["count"].as_u64(), Some(7));
    }

    #[test]
    fn schema_violations_are_config_errors() {
        let missing_accounts = r#"{ "instructions": [] }"#;
        let err = ProgramIdl::from_json_str(missing_accounts).unwrap_err();
        assert!(err.to_string().contains("schema validation"));

        let short_disc = r#"{ "instructions": [], "accounts": [{ "name": "X", "discriminator": [1, 2] }] }"#;
        assert!(matches!(
            ProgramIdl::from_json_str(short_disc),
            Err(WardenError::Config { .. })
        ));
    }

    #[test]
    fn unsupported_field_type_is_rejected_at_load() {
        let idl = r#"{
            "instructions": [],
            "accounts": [{ "name": "V", "type": { "kind": "struct", "fields": [
                { "name": "items", "type": { "vec": "u8" } }
            ]}}]
        }"#;
        let err = ProgramIdl::from_json_str(idl).unwrap_err();
        assert!(err.to_string().contains("V.items"));
    }

    #[test]
    fn decode_checks_discriminator_and_length() {
        let idl = ProgramIdl::embedded_counter().unwrap();

        let mut wrong = counter_bytes(Address([1u8; 32]), 1);
        wrong[0] ^= 0xff;
        assert!(matches!(
            idl.decode_account("Counter", &wrong),
            Err(WardenError::Decode { .. })
        ));

        let truncated = &counter_bytes(Address([1u8; 32]), 1)[..20];
        assert!(matches!(
            idl.decode_account("Counter", truncated),
            Err(WardenError::Decode { .. })
        ));

        assert!(matches!(
            idl.decode_account("Missing", &[]),
            Err(WardenError::Decode { .. })
        ));
    }

    #[test]
    fn invalid_bool_is_a_decode_error() {
        assert_eq!(read_field(FieldType::Bool, &[2]), None);
        assert_eq!(read_field(FieldType::Bool, &[1]), Some(FieldValue::Bool(true)));
        assert_eq!(
            read_field(FieldType::I64, &(-3i64).to_le_bytes()),
            Some(FieldValue::Signed(-3))
        );
    }
}
