// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! CWT claims carried in the COSE payload of a health certificate.

use crate::error::CoseError;
use crate::value::{decode_value, CborValue};

pub const CLAIM_ISSUER: i64 = 1;
pub const CLAIM_EXPIRATION: i64 = 4;
pub const CLAIM_ISSUED_AT: i64 = 6;
pub const CLAIM_HCERT: i64 = -260;
/// Key of the EU DCC claims inside the `hcert` map.
pub const HCERT_DCC_V1: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct CwtClaims {
    pub issuer: Option<String>,
    /// Seconds since the Unix epoch.
    pub issued_at: Option<i64>,
    /// Seconds since the Unix epoch.
    pub expiration: Option<i64>,
    /// DCC claims converted to JSON, as they are addressed by business rules.
    pub dcc: serde_json::Value,
}

pub fn decode_cwt_claims(payload: &[u8]) -> Result<CwtClaims, CoseError> {
    let root = decode_value(payload)?;
    if root.as_map().is_none() {
        return Err(CoseError::Malformed("CWT payload is not a map"));
    }

    let dcc = root
        .get_int(CLAIM_HCERT)
        .and_then(|h| h.get_int(HCERT_DCC_V1))
        .ok_or(CoseError::MissingClaim("hcert[-260][1]"))?;
    if dcc.as_map().is_none() {
        return Err(CoseError::Malformed("DCC claims are not a map"));
    }

    Ok(CwtClaims {
        issuer: root.get_int(CLAIM_ISSUER).and_then(CborValue::as_text).map(str::to_string),
        issued_at: root.get_int(CLAIM_ISSUED_AT).and_then(CborValue::as_i64),
        expiration: root.get_int(CLAIM_EXPIRATION).and_then(CborValue::as_i64),
        dcc: dcc.to_json(),
    })
}
