// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Internal test-certificate scheme: `TGCT:` + base45(compact JWS).
//!
//! The JWS is `header.payload.signature`, each part base64url without padding.
//! Only ES256 is accepted, with the raw 64-byte `r || s` signature over
//! `header.payload`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use hcert_cose::{decode_base45, strip_prefix};
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey as _;
use serde::{Deserialize, Serialize};
use signature::Verifier as _;
use tracing::debug;

use crate::error::VerifyError;
use crate::signature::extract_spki_der;

pub const TGCT_PREFIX: &str = "TGCT:";

/// The single P-256 key test certificates are signed with.
#[derive(Debug, Clone)]
pub struct TgctKey {
    key: VerifyingKey,
}

impl TgctKey {
    /// DER SubjectPublicKeyInfo or a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, VerifyError> {
        let pk = p256::PublicKey::from_public_key_der(&extract_spki_der(der))
            .map_err(|e| VerifyError::InvalidPublicKey(format!("bad TGCT public key: {e}")))?;
        Ok(Self { key: pk.into() })
    }

    /// `-----BEGIN PUBLIC KEY-----` PEM.
    pub fn from_pem(pem: &str) -> Result<Self, VerifyError> {
        let pk = p256::PublicKey::from_public_key_pem(pem)
            .map_err(|e| VerifyError::InvalidPublicKey(format!("bad TGCT public key: {e}")))?;
        Ok(Self { key: pk.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TgctPayload {
    pub firstname: String,
    pub lastname: String,
    /// Instant until which the test result is valid.
    #[serde(deserialize_with = "de_instant")]
    pub date: DateTime<Utc>,
    pub dob: String,
    #[serde(rename = "type")]
    pub test_type: String,
}

#[derive(Deserialize)]
struct JwsHeader {
    alg: String,
}

pub fn verify_tgct(input: &str, key: &TgctKey) -> Result<TgctPayload, VerifyError> {
    let body = strip_prefix(input, TGCT_PREFIX)?;
    let jws = decode_base45(body)?;
    let jws = std::str::from_utf8(&jws).map_err(|_| malformed("JWS is not UTF-8"))?;

    let mut parts = jws.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("JWS must have three parts"));
    };

    let header: JwsHeader = serde_json::from_slice(&b64(header_b64, "header")?)
        .map_err(|e| VerifyError::Claims(format!("bad JWS header: {e}")))?;
    if header.alg != "ES256" {
        return Err(VerifyError::UnsupportedAlgorithm(header.alg));
    }

    let signature = Signature::from_slice(&b64(sig_b64, "signature")?)
        .map_err(|e| VerifyError::BadSignature(format!("bad ES256 signature: {e}")))?;
    let signing_input = &jws[..header_b64.len() + 1 + payload_b64.len()];
    key.key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| VerifyError::BadSignature("signature does not match".to_string()))?;

    let payload: TgctPayload = serde_json::from_slice(&b64(payload_b64, "payload")?)
        .map_err(|e| VerifyError::Claims(format!("bad TGCT payload: {e}")))?;
    debug!(valid_until = %payload.date, "verified TGCT certificate");
    Ok(payload)
}

fn b64(part: &str, what: &str) -> Result<Vec<u8>, VerifyError> {
    URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| VerifyError::Claims(format!("bad JWS {what} encoding: {e}")))
}

fn malformed(msg: &str) -> VerifyError {
    VerifyError::Claims(msg.to_string())
}

/// RFC 3339 instant, or a bare `YYYY-MM-DD` meaning midnight UTC.
fn de_instant<'de, D: serde::Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(de)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{raw}'")))
}
