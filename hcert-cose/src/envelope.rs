// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Textual QR envelopes: `HC1:` + base45(zlib(COSE_Sign1)).

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::EnvelopeError;

pub const HC1_PREFIX: &str = "HC1:";

/// Upper bound on inflated size; real certificates are a few hundred bytes.
const MAX_INFLATED_LEN: u64 = 64 * 1024;

/// Strip the `HC1:` prefix, base45-decode and inflate.
///
/// Returns the raw COSE bytes. Uncompressed payloads (no zlib header) are passed
/// through unchanged, as some issuers in the wild skip the compression step.
pub fn unwrap_hc1(input: &str) -> Result<Vec<u8>, EnvelopeError> {
    let body = strip_prefix(input, HC1_PREFIX)?;
    let compressed = decode_base45(body)?;
    inflate_if_zlib(&compressed)
}

/// Remove a mandatory scheme prefix. Surrounding whitespace from scanners is ignored.
pub fn strip_prefix<'a>(input: &'a str, prefix: &'static str) -> Result<&'a str, EnvelopeError> {
    input
        .trim()
        .strip_prefix(prefix)
        .ok_or(EnvelopeError::MissingPrefix(prefix))
}

pub fn decode_base45(body: &str) -> Result<Vec<u8>, EnvelopeError> {
    if body.is_empty() {
        return Err(EnvelopeError::Empty);
    }
    base45::decode(body).map_err(|e| EnvelopeError::Base45(format!("{e:?}")))
}

fn inflate_if_zlib(data: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    // 0x78 is the CMF byte of every zlib stream with a 32K window.
    if data.first() != Some(&0x78) {
        return Ok(data.to_vec());
    }

    let mut out = Vec::with_capacity(data.len() * 2);
    ZlibDecoder::new(data)
        .take(MAX_INFLATED_LEN + 1)
        .read_to_end(&mut out)
        .map_err(|e| EnvelopeError::Inflate(e.to_string()))?;
    if out.len() as u64 > MAX_INFLATED_LEN {
        return Err(EnvelopeError::Inflate("inflated payload too large".to_string()));
    }
    Ok(out)
}
