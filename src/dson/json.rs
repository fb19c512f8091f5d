//! Type-prefixed JSON form of [`DsonValue`], as spoken by node RPC.
//!
//! Strings carry a five-character prefix naming the scalar type; integers stay
//! plain JSON numbers.

use super::value::DsonValue;
use crate::error::DsonError;
use crate::primitives::{Euid, Hash256, RadixAddress, Rri, UInt256};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const PREFIX_STRING: &str = ":str:";
pub const PREFIX_BYTES: &str = ":byt:";
pub const PREFIX_EUID: &str = ":uid:";
pub const PREFIX_HASH: &str = ":hsh:";
pub const PREFIX_ADDRESS: &str = ":adr:";
pub const PREFIX_U256: &str = ":u20:";
pub const PREFIX_RRI: &str = ":rri:";

pub fn to_json(value: &DsonValue) -> Value {
    match value {
        DsonValue::Null => Value::Null,
        DsonValue::Bool(b) => Value::Bool(*b),
        DsonValue::Int(i) => Value::from(*i),
        DsonValue::Text(s) => Value::String(format!("{PREFIX_STRING}{s}")),
        DsonValue::Bytes(b) => Value::String(format!("{PREFIX_BYTES}{}", STANDARD.encode(b))),
        DsonValue::Euid(e) => Value::String(format!("{PREFIX_EUID}{e}")),
        DsonValue::Hash(h) => Value::String(format!("{PREFIX_HASH}{h}")),
        DsonValue::Address(a) => Value::String(format!("{PREFIX_ADDRESS}{a}")),
        DsonValue::U256(v) => Value::String(format!("{PREFIX_U256}{v}")),
        DsonValue::Rri(r) => Value::String(format!("{PREFIX_RRI}{r}")),
        DsonValue::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        DsonValue::Map(map) => {
            let object: Map<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect();
            Value::Object(object)
        }
    }
}

pub fn from_json(value: &Value) -> Result<DsonValue, DsonError> {
    match value {
        Value::Null => Ok(DsonValue::Null),
        Value::Bool(b) => Ok(DsonValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(DsonValue::Int)
            .ok_or_else(|| DsonError::UnsupportedJson(n.to_string())),
        Value::String(s) => decode_string(s),
        Value::Array(items) => items
            .iter()
            .map(from_json)
            .collect::<Result<Vec<_>, _>>()
            .map(DsonValue::Array),
        Value::Object(object) => {
            let mut map = BTreeMap::new();
            for (key, item) in object {
                map.insert(key.clone(), from_json(item)?);
            }
            Ok(DsonValue::Map(map))
        }
    }
}

fn decode_string(s: &str) -> Result<DsonValue, DsonError> {
    let (prefix, body) = match (s.get(..5), s.get(5..)) {
        (Some(prefix), Some(body)) => (prefix, body),
        _ => return Err(DsonError::UnknownJsonPrefix(s.to_string())),
    };
    let value = match prefix {
        PREFIX_STRING => DsonValue::Text(body.to_string()),
        PREFIX_BYTES => DsonValue::Bytes(STANDARD.decode(body).map_err(|e| {
            DsonError::InvalidValue {
                field: "bytes".to_string(),
                reason: e.to_string(),
            }
        })?),
        PREFIX_EUID => DsonValue::Euid(Euid::from_hex(body)?),
        PREFIX_HASH => DsonValue::Hash(Hash256::from_hex(body)?),
        PREFIX_ADDRESS => DsonValue::Address(RadixAddress::from_base58(body)?),
        PREFIX_U256 => DsonValue::U256(body.parse::<UInt256>()?),
        PREFIX_RRI => DsonValue::Rri(body.parse::<Rri>()?),
        _ => return Err(DsonError::UnknownJsonPrefix(s.to_string())),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use serde_json::json;

    #[test]
    fn test_prefixes() {
        assert_eq!(to_json(&DsonValue::Text("hi".into())), json!(":str:hi"));
        assert_eq!(to_json(&DsonValue::Bytes(vec![1, 2, 3])), json!(":byt:AQID"));
        assert_eq!(
            to_json(&DsonValue::U256(UInt256::from_u64(1000))),
            json!(":u20:1000")
        );
        assert_eq!(to_json(&DsonValue::Int(-1)), json!(-1));
    }

    #[test]
    fn test_round_trip() {
        let address = RadixAddress::new(7, &KeyPair::generate().public_key);
        let mut map = BTreeMap::new();
        map.insert("owner".to_string(), DsonValue::Address(address));
        map.insert(
            "token".to_string(),
            DsonValue::Rri(Rri::new(address, "XRD").unwrap()),
        );
        map.insert("id".to_string(), DsonValue::Euid(address.uid()));
        map.insert("h".to_string(), DsonValue::Hash(Hash256::of(b"h")));
        let value = DsonValue::Map(map);
        assert_eq!(from_json(&to_json(&value)).unwrap(), value);
    }

    #[test]
    fn test_rejects_untagged() {
        assert!(matches!(
            from_json(&json!("plain")),
            Err(DsonError::UnknownJsonPrefix(_))
        ));
        assert!(matches!(
            from_json(&json!(":zzz:x")),
            Err(DsonError::UnknownJsonPrefix(_))
        ));
        assert!(matches!(
            from_json(&json!(1.5)),
            Err(DsonError::UnsupportedJson(_))
        ));
        assert!(from_json(&json!(":u20:notanumber")).is_err());
    }
}
