// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use crate::value::{CborKey, CborValue};

/// COSE header label for `alg`.
pub const HEADER_ALG: i64 = 1;
/// COSE header label for `kid`.
pub const HEADER_KID: i64 = 4;
/// COSE header label for `x5chain`.
pub const HEADER_X5CHAIN: i64 = 33;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CoseHeaderMap {
    encoded_map_cbor: Vec<u8>,
    map: BTreeMap<CborKey, CborValue>,
}

impl CoseHeaderMap {
    pub(crate) fn new(encoded_map_cbor: Vec<u8>, map: BTreeMap<CborKey, CborValue>) -> Self {
        Self { encoded_map_cbor, map }
    }

    /// Raw bstr content as it appeared on the wire. Empty for unprotected headers.
    pub fn encoded_map_cbor(&self) -> &[u8] {
        &self.encoded_map_cbor
    }

    pub fn get(&self, label: i64) -> Option<&CborValue> {
        self.map.get(&CborKey::Int(label))
    }

    pub fn get_i64(&self, label: i64) -> Option<i64> {
        self.get(label).and_then(CborValue::as_i64)
    }

    pub fn get_bytes(&self, label: i64) -> Option<&[u8]> {
        self.get(label).and_then(CborValue::as_bytes)
    }

    /// Certificates carried under `x5chain`, accepting both the single-bstr and
    /// the array-of-bstr encodings.
    pub fn x5chain(&self) -> Vec<&[u8]> {
        match self.get(HEADER_X5CHAIN) {
            Some(CborValue::Bytes(b)) => vec![b.as_slice()],
            Some(CborValue::Array(items)) => items.iter().filter_map(CborValue::as_bytes).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn map(&self) -> &BTreeMap<CborKey, CborValue> {
        &self.map
    }
}
