// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Generic CBOR data model.
//!
//! COSE headers, CWT claims and the signed trust-data containers are all small
//! CBOR maps keyed by integers or text. They are decoded into [`CborValue`]
//! trees and then picked apart by the typed layers above.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use minicbor::data::Type;
use minicbor::Decoder;

use crate::error::CoseError;

/// Maximum nesting accepted while decoding. DCC payloads are shallow; deep
/// nesting only shows up in hostile input.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CborKey {
    Int(i64),
    Text(String),
}

impl CborKey {
    /// JSON object keys are always text; integer keys are rendered in decimal.
    pub fn to_json_key(&self) -> String {
        match self {
            CborKey::Int(i) => i.to_string(),
            CborKey::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CborValue {
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<CborValue>),
    Map(BTreeMap<CborKey, CborValue>),
    Bool(bool),
    Tagged(u64, Box<CborValue>),
    Null,
}

impl CborValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CborValue::Int(i) => Some(*i),
            CborValue::Tagged(_, inner) => inner.as_i64(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CborValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CborValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[CborValue]> {
        match self {
            CborValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<CborKey, CborValue>> {
        match self {
            CborValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up an integer-keyed entry of a map value.
    pub fn get_int(&self, key: i64) -> Option<&CborValue> {
        self.as_map().and_then(|m| m.get(&CborKey::Int(key)))
    }

    /// Look up a text-keyed entry of a map value.
    pub fn get_text(&self, key: &str) -> Option<&CborValue> {
        self.as_map().and_then(|m| m.get(&CborKey::Text(key.to_string())))
    }

    /// Convert into the JSON shape used by the DCC schema and by rule logic.
    ///
    /// Byte strings become standard base64 text and tags are dropped (the tagged
    /// content is kept). Non-finite floats map to `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            CborValue::Int(i) => J::from(*i),
            CborValue::Float(f) => serde_json::Number::from_f64(*f).map(J::Number).unwrap_or(J::Null),
            CborValue::Bytes(b) => J::String(STANDARD.encode(b)),
            CborValue::Text(s) => J::String(s.clone()),
            CborValue::Array(a) => J::Array(a.iter().map(CborValue::to_json).collect()),
            CborValue::Map(m) => J::Object(m.iter().map(|(k, v)| (k.to_json_key(), v.to_json())).collect()),
            CborValue::Bool(b) => J::Bool(*b),
            CborValue::Tagged(_, inner) => inner.to_json(),
            CborValue::Null => J::Null,
        }
    }
}

/// Decode exactly one CBOR item spanning the whole input.
pub fn decode_value(bytes: &[u8]) -> Result<CborValue, CoseError> {
    if bytes.is_empty() {
        return Err(CoseError::EmptyInput);
    }
    let mut dec = Decoder::new(bytes);
    let value = decode_value_from_decoder(&mut dec)?;
    if dec.position() != bytes.len() {
        return Err(CoseError::TrailingBytes("CBOR item"));
    }
    Ok(value)
}

pub(crate) fn decode_value_from_decoder(dec: &mut Decoder<'_>) -> Result<CborValue, CoseError> {
    decode_nested(dec, 0)
}

pub(crate) fn decode_map_from_decoder(dec: &mut Decoder<'_>) -> Result<BTreeMap<CborKey, CborValue>, CoseError> {
    decode_map(dec, 0)
}

fn decode_map(dec: &mut Decoder<'_>, depth: usize) -> Result<BTreeMap<CborKey, CborValue>, CoseError> {
    let len = dec
        .map()
        .map_err(|e| CoseError::cbor("failed to read map", e))?
        .ok_or(CoseError::Indefinite("maps"))?;

    let mut out = BTreeMap::new();
    for _ in 0..len {
        let key = decode_key(dec)?;
        let value = decode_nested(dec, depth + 1)?;
        out.insert(key, value);
    }
    Ok(out)
}

fn decode_key(dec: &mut Decoder<'_>) -> Result<CborKey, CoseError> {
    match dec.datatype().map_err(|e| CoseError::cbor("failed to read key type", e))? {
        Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::Int | Type::U8 | Type::U16 | Type::U32 | Type::U64 => {
            let i = dec.i64().map_err(|e| CoseError::cbor("failed to decode int key", e))?;
            Ok(CborKey::Int(i))
        }
        Type::String => {
            let s = dec.str().map_err(|e| CoseError::cbor("failed to decode text key", e))?;
            Ok(CborKey::Text(s.to_string()))
        }
        other => Err(CoseError::Unsupported(format!("map key type {other:?}"))),
    }
}

fn decode_nested(dec: &mut Decoder<'_>, depth: usize) -> Result<CborValue, CoseError> {
    if depth > MAX_DEPTH {
        return Err(CoseError::TooDeep);
    }

    match dec.datatype().map_err(|e| CoseError::cbor("failed to read item type", e))? {
        Type::Null | Type::Undefined => {
            dec.skip().map_err(|e| CoseError::cbor("failed to read null", e))?;
            Ok(CborValue::Null)
        }
        Type::Bool => Ok(CborValue::Bool(dec.bool().map_err(|e| CoseError::cbor("failed to read bool", e))?)),
        Type::Bytes => Ok(CborValue::Bytes(
            dec.bytes().map_err(|e| CoseError::cbor("failed to read bstr", e))?.to_vec(),
        )),
        Type::String => Ok(CborValue::Text(
            dec.str().map_err(|e| CoseError::cbor("failed to read tstr", e))?.to_string(),
        )),
        Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::Int | Type::U8 | Type::U16 | Type::U32 | Type::U64 => {
            Ok(CborValue::Int(dec.i64().map_err(|e| CoseError::cbor("failed to read int", e))?))
        }
        Type::F16 | Type::F32 | Type::F64 => {
            Ok(CborValue::Float(dec.f64().map_err(|e| CoseError::cbor("failed to read float", e))?))
        }
        Type::Array => {
            let len = dec
                .array()
                .map_err(|e| CoseError::cbor("failed to read array", e))?
                .ok_or(CoseError::Indefinite("arrays"))?;
            let mut out = Vec::with_capacity(len.min(64) as usize);
            for _ in 0..len {
                out.push(decode_nested(dec, depth + 1)?);
            }
            Ok(CborValue::Array(out))
        }
        Type::Map => Ok(CborValue::Map(decode_map(dec, depth)?)),
        Type::Tag => {
            let tag = dec.tag().map_err(|e| CoseError::cbor("failed to read tag", e))?;
            let inner = decode_nested(dec, depth + 1)?;
            Ok(CborValue::Tagged(tag.as_u64(), Box::new(inner)))
        }
        other => Err(CoseError::Unsupported(format!("item type {other:?}"))),
    }
}
