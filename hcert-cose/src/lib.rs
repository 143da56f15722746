// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wire-level decoding for EU Digital COVID Certificates.
//!
//! Layers, outermost first:
//! - `HC1:` text envelope (base45 + optional zlib), see [`envelope`]
//! - COSE_Sign1 structure and its Sig_structure, see [`cose_sign1`]
//! - CWT claims with the embedded DCC payload, see [`cwt`]
//!
//! Nothing here verifies signatures; that lives in `hcert-verify`.

pub mod cose_sign1;
pub mod cwt;
pub mod envelope;
pub mod error;
pub mod header_map;
pub mod value;

pub use cose_sign1::{encode_signature1_sig_structure, parse_cose_sign1, ParsedCoseSign1, COSE_SIGN1_TAG, CWT_TAG};
pub use cwt::{decode_cwt_claims, CwtClaims};
pub use envelope::{decode_base45, strip_prefix, unwrap_hc1, HC1_PREFIX};
pub use error::{CoseError, EnvelopeError};
pub use header_map::{CoseHeaderMap, HEADER_ALG, HEADER_KID, HEADER_X5CHAIN};
pub use value::{decode_value, CborKey, CborValue};
