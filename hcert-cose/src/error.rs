// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Structural failures while decoding CBOR / COSE / CWT bytes.
#[derive(Debug, Error)]
pub enum CoseError {
    #[error("empty input")]
    EmptyInput,

    #[error("{context}: {message}")]
    Cbor { context: &'static str, message: String },

    #[error("indefinite-length {0} are not supported")]
    Indefinite(&'static str),

    #[error("unsupported CBOR {0}")]
    Unsupported(String),

    #[error("CBOR nesting too deep")]
    TooDeep,

    #[error("trailing bytes after {0}")]
    TrailingBytes(&'static str),

    #[error("unexpected CBOR tag {0} (expected COSE_Sign1 tag 18, CWT tag 61 or no tag)")]
    UnexpectedTag(u64),

    #[error("COSE_Sign1 array length was {0}, expected 4")]
    ArrayLength(u64),

    #[error("malformed COSE_Sign1: {0}")]
    Malformed(&'static str),

    #[error("detached payload requires external payload bytes")]
    DetachedPayload,

    #[error("missing claim: {0}")]
    MissingClaim(&'static str),
}

impl CoseError {
    pub(crate) fn cbor(context: &'static str, err: minicbor::decode::Error) -> Self {
        CoseError::Cbor {
            context,
            message: err.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CoseError::MissingClaim(_) => "CWT_CLAIM_MISSING",
            CoseError::DetachedPayload => "SIGSTRUCT_ERROR",
            _ => "COSE_PARSE_ERROR",
        }
    }
}

/// Failures while unwrapping the textual HC1 envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("missing '{0}' prefix")]
    MissingPrefix(&'static str),

    #[error("invalid base45 data: {0}")]
    Base45(String),

    #[error("zlib inflate failed: {0}")]
    Inflate(String),

    #[error("envelope is empty")]
    Empty,
}

impl EnvelopeError {
    pub fn code(&self) -> &'static str {
        match self {
            EnvelopeError::MissingPrefix(_) => "UNKNOWN_PREFIX",
            EnvelopeError::Base45(_) => "BASE45_DECODE_ERROR",
            EnvelopeError::Inflate(_) => "DECOMPRESSION_ERROR",
            EnvelopeError::Empty => "EMPTY_ENVELOPE",
        }
    }
}
