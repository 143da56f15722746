// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use crate::error::CoseError;
use crate::header_map::{CoseHeaderMap, HEADER_ALG, HEADER_KID};
use crate::value::{decode_map_from_decoder, decode_value, CborValue};

pub const COSE_SIGN1_TAG: u64 = 18;
pub const CWT_TAG: u64 = 61;
pub const SIG_STRUCTURE_CONTEXT_SIGNATURE1: &str = "Signature1";

#[derive(Debug, Clone, Default)]
pub struct ParsedCoseSign1 {
    pub protected_headers: CoseHeaderMap,
    pub unprotected_headers: CoseHeaderMap,
    pub payload: Option<Vec<u8>>, // None => detached payload
    pub signature: Vec<u8>,
}

impl ParsedCoseSign1 {
    /// `alg`, protected bucket first.
    pub fn alg(&self) -> Option<i64> {
        self.protected_headers
            .get_i64(HEADER_ALG)
            .or_else(|| self.unprotected_headers.get_i64(HEADER_ALG))
    }

    /// `kid`, protected bucket first. Some issuers only put it in the unprotected map.
    pub fn kid(&self) -> Option<&[u8]> {
        self.protected_headers
            .get_bytes(HEADER_KID)
            .or_else(|| self.unprotected_headers.get_bytes(HEADER_KID))
    }

    pub fn x5chain(&self) -> Vec<&[u8]> {
        let protected = self.protected_headers.x5chain();
        if protected.is_empty() {
            self.unprotected_headers.x5chain()
        } else {
            protected
        }
    }
}

/// Parse COSE_Sign1 bytes. Accepts an optional CWT tag (61) in front of the
/// optional COSE_Sign1 tag (18), as found in issued health certificates.
pub fn parse_cose_sign1(input: &[u8]) -> Result<ParsedCoseSign1, CoseError> {
    if input.is_empty() {
        return Err(CoseError::EmptyInput);
    }

    let mut dec = Decoder::new(input);

    let mut seen_cose_tag = false;
    while matches!(dec.datatype().map_err(|e| CoseError::cbor("failed to read item type", e))?, Type::Tag) {
        let tag = dec.tag().map_err(|e| CoseError::cbor("failed to read CBOR tag", e))?.as_u64();
        match tag {
            CWT_TAG if !seen_cose_tag => {}
            COSE_SIGN1_TAG if !seen_cose_tag => seen_cose_tag = true,
            other => return Err(CoseError::UnexpectedTag(other)),
        }
    }

    let len = dec
        .array()
        .map_err(|e| CoseError::cbor("top-level item is not an array", e))?
        .ok_or(CoseError::Indefinite("arrays"))?;
    if len != 4 {
        return Err(CoseError::ArrayLength(len));
    }

    let protected_bstr = dec
        .bytes()
        .map_err(|e| CoseError::cbor("failed to read protected headers (bstr)", e))?
        .to_vec();
    let protected_map = if protected_bstr.is_empty() {
        BTreeMap::new()
    } else {
        match decode_value(&protected_bstr)? {
            CborValue::Map(m) => m,
            _ => return Err(CoseError::Malformed("protected headers are not a map")),
        }
    };

    if !matches!(dec.datatype().map_err(|e| CoseError::cbor("failed to read item type", e))?, Type::Map) {
        return Err(CoseError::Malformed("unprotected headers are not a map"));
    }
    let unprotected_map = decode_map_from_decoder(&mut dec)?;

    let payload = match dec.datatype().map_err(|e| CoseError::cbor("failed to read item type", e))? {
        Type::Null => {
            dec.null().map_err(|e| CoseError::cbor("failed to read null payload", e))?;
            None
        }
        Type::Bytes => Some(
            dec.bytes()
                .map_err(|e| CoseError::cbor("failed to read payload (bstr or null)", e))?
                .to_vec(),
        ),
        _ => return Err(CoseError::Malformed("payload is neither bstr nor null")),
    };

    let signature = dec
        .bytes()
        .map_err(|e| CoseError::cbor("failed to read signature (bstr)", e))?
        .to_vec();

    if dec.position() != input.len() {
        return Err(CoseError::TrailingBytes("COSE_Sign1"));
    }

    Ok(ParsedCoseSign1 {
        protected_headers: CoseHeaderMap::new(protected_bstr, protected_map),
        unprotected_headers: CoseHeaderMap::new(Vec::new(), unprotected_map),
        payload,
        signature,
    })
}

/// Encode the `Signature1` Sig_structure that the signature covers.
pub fn encode_signature1_sig_structure(
    msg: &ParsedCoseSign1,
    external_payload: Option<&[u8]>,
) -> Result<Vec<u8>, CoseError> {
    let payload = match (&msg.payload, external_payload) {
        (Some(p), _) => p.as_slice(),
        (None, Some(ext)) => ext,
        (None, None) => return Err(CoseError::DetachedPayload),
    };

    let mut out = Vec::with_capacity(32 + msg.protected_headers.encoded_map_cbor().len() + payload.len());
    let mut enc = Encoder::new(&mut out);
    encode_sig_structure(&mut enc, msg.protected_headers.encoded_map_cbor(), payload).map_err(|e| CoseError::Cbor {
        context: "failed to encode Sig_structure",
        message: e.to_string(),
    })?;
    Ok(out)
}

fn encode_sig_structure<W: minicbor::encode::Write>(
    enc: &mut Encoder<W>,
    protected: &[u8],
    payload: &[u8],
) -> Result<(), minicbor::encode::Error<W::Error>> {
    enc.array(4)?
        .str(SIG_STRUCTURE_CONTEXT_SIGNATURE1)?
        .bytes(protected)?
        .bytes(&[])? // external_aad
        .bytes(payload)?;
    Ok(())
}
