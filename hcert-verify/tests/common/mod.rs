// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared helpers for `hcert-verify` integration tests.
//!
//! Issues a small PKI with `rcgen` (trust anchor, document signers), signs
//! COSE_Sign1 messages with `p256`, and wraps them the way issuers do
//! (`HC1:` + base45 + zlib, signed trust-data containers, TGCT tokens).

#![allow(dead_code)]

use std::io::Write as _;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use minicbor::data::Tag;
use minicbor::Encoder;
use p256::pkcs8::DecodePrivateKey as _;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use sha2::{Digest as _, Sha256};
use signature::Signer as _;

pub(crate) const EKU_TEST: &[u64] = &[1, 3, 6, 1, 4, 1, 1847, 2021, 1, 1];
pub(crate) const EKU_VACCINATION: &[u64] = &[1, 3, 6, 1, 4, 1, 1847, 2021, 1, 2];

/// A certificate plus the key it certifies.
pub(crate) struct TestSigner {
    pub(crate) der: Vec<u8>,
    pub(crate) signing_key: p256::ecdsa::SigningKey,
    key_pair: KeyPair,
    cert: rcgen::Certificate,
}

impl TestSigner {
    /// Raw `r || s` ES256 signature.
    pub(crate) fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let sig: p256::ecdsa::Signature = self.signing_key.sign(msg);
        sig.to_bytes().to_vec()
    }

    pub(crate) fn kid(&self) -> Vec<u8> {
        Sha256::digest(&self.der)[..8].to_vec()
    }
}

fn params(cn: &str) -> CertificateParams {
    let mut params = CertificateParams::new(vec![]).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    dn.push(DnType::CountryName, "AT");
    params.distinguished_name = dn;
    params
}

fn into_signer(key_pair: KeyPair, cert: rcgen::Certificate) -> TestSigner {
    let signing_key = p256::ecdsa::SigningKey::from_pkcs8_der(&key_pair.serialize_der()).unwrap();
    TestSigner {
        der: cert.der().to_vec(),
        signing_key,
        key_pair,
        cert,
    }
}

pub(crate) fn make_anchor(cn: &str) -> TestSigner {
    let mut params = params(cn);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let key_pair = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key_pair).unwrap();
    into_signer(key_pair, cert)
}

/// Certificate issued by `issuer`, valid between the given years, carrying the
/// given extended key usages.
pub(crate) fn make_signer(cn: &str, issuer: &TestSigner, years: (i32, i32), ekus: &[&[u64]]) -> TestSigner {
    let mut params = params(cn);
    params.not_before = rcgen::date_time_ymd(years.0, 1, 1);
    params.not_after = rcgen::date_time_ymd(years.1, 1, 1);
    params.extended_key_usages = ekus.iter().map(|oid| ExtendedKeyUsagePurpose::Other(oid.to_vec())).collect();
    let key_pair = KeyPair::generate().unwrap();
    let cert = params.signed_by(&key_pair, &issuer.cert, &issuer.key_pair).unwrap();
    into_signer(key_pair, cert)
}

/// ES256 COSE_Sign1 with tag 18. `kid` goes in the protected header, `x5chain`
/// (a single leaf) in the unprotected one.
pub(crate) fn sign_cose(payload: &[u8], kid: Option<&[u8]>, x5chain: Option<&[u8]>, signer: &TestSigner) -> Vec<u8> {
    let mut protected = Vec::new();
    let mut enc = Encoder::new(&mut protected);
    enc.map(if kid.is_some() { 2 } else { 1 }).unwrap();
    enc.i64(1).unwrap().i64(-7).unwrap();
    if let Some(kid) = kid {
        enc.i64(4).unwrap().bytes(kid).unwrap();
    }

    let mut sig_structure = Vec::new();
    Encoder::new(&mut sig_structure)
        .array(4)
        .unwrap()
        .str("Signature1")
        .unwrap()
        .bytes(&protected)
        .unwrap()
        .bytes(&[])
        .unwrap()
        .bytes(payload)
        .unwrap();
    let signature = signer.sign(&sig_structure);

    let mut out = Vec::new();
    let mut enc = Encoder::new(&mut out);
    enc.tag(Tag::new(18)).unwrap();
    enc.array(4).unwrap();
    enc.bytes(&protected).unwrap();
    match x5chain {
        Some(leaf) => {
            enc.map(1).unwrap().i64(33).unwrap().bytes(leaf).unwrap();
        }
        None => {
            enc.map(0).unwrap();
        }
    }
    enc.bytes(payload).unwrap();
    enc.bytes(&signature).unwrap();
    out
}

pub(crate) fn encode_json(enc: &mut Encoder<&mut Vec<u8>>, value: &serde_json::Value) {
    match value {
        serde_json::Value::Null => {
            enc.null().unwrap();
        }
        serde_json::Value::Bool(b) => {
            enc.bool(*b).unwrap();
        }
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => {
                enc.i64(i).unwrap();
            }
            None => {
                enc.f64(n.as_f64().unwrap()).unwrap();
            }
        },
        serde_json::Value::String(s) => {
            enc.str(s).unwrap();
        }
        serde_json::Value::Array(items) => {
            enc.array(items.len() as u64).unwrap();
            for item in items {
                encode_json(enc, item);
            }
        }
        serde_json::Value::Object(map) => {
            enc.map(map.len() as u64).unwrap();
            for (k, v) in map {
                enc.str(k).unwrap();
                encode_json(enc, v);
            }
        }
    }
}

/// CWT payload `{1: "AT", 4: exp, 6: iat, -260: {1: dcc}}`.
pub(crate) fn cwt_payload(dcc: &serde_json::Value, iat: i64, exp: i64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut enc = Encoder::new(&mut out);
    enc.map(4).unwrap();
    enc.i64(1).unwrap().str("AT").unwrap();
    enc.i64(4).unwrap().i64(exp).unwrap();
    enc.i64(6).unwrap().i64(iat).unwrap();
    enc.i64(-260).unwrap().map(1).unwrap().i64(1).unwrap();
    encode_json(&mut enc, dcc);
    out
}

pub(crate) fn hc1(cose: &[u8]) -> String {
    let mut z = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    z.write_all(cose).unwrap();
    format!("HC1:{}", base45::encode(z.finish().unwrap()))
}

pub(crate) fn vaccination_dcc() -> serde_json::Value {
    serde_json::json!({
        "ver": "1.3.0",
        "nam": {"fn": "Musterfrau", "fnt": "MUSTERFRAU", "gn": "Gabriele", "gnt": "GABRIELE"},
        "dob": "1998-02-26",
        "v": [{
            "tg": "840539006",
            "vp": "1119349007",
            "mp": "EU/1/20/1528",
            "ma": "ORG-100030215",
            "dn": 2,
            "sd": 2,
            "dt": "2021-02-18",
            "co": "AT",
            "is": "Ministry of Health, Austria",
            "ci": "URN:UVCI:01:AT:10807843F94AEE0EE5093FBC254BD813#B"
        }]
    })
}

/// Signed trust-data signature blob: COSE_Sign1 over
/// `{2: sha256(content), 4: valid_until, 5: valid_from}`.
pub(crate) fn sign_container(
    content: &[u8],
    valid_from: i64,
    valid_until: i64,
    signer: &TestSigner,
    with_x5chain: bool,
) -> Vec<u8> {
    let mut payload = Vec::new();
    let mut enc = Encoder::new(&mut payload);
    enc.map(3).unwrap();
    enc.i64(2).unwrap().bytes(&Sha256::digest(content)).unwrap();
    enc.i64(4).unwrap().i64(valid_until).unwrap();
    enc.i64(5).unwrap().i64(valid_from).unwrap();
    let x5chain = with_x5chain.then_some(signer.der.as_slice());
    sign_cose(&payload, None, x5chain, signer)
}

/// Trust list content `{"c": [{"i": kid, "r": der}, ...]}`.
pub(crate) fn trust_list_content(signers: &[&TestSigner]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut enc = Encoder::new(&mut out);
    enc.map(1).unwrap().str("c").unwrap().array(signers.len() as u64).unwrap();
    for s in signers {
        enc.map(2).unwrap();
        enc.str("i").unwrap().bytes(&s.kid()).unwrap();
        enc.str("r").unwrap().bytes(&s.der).unwrap();
    }
    out
}

/// `TGCT:` + base45 of an ES256 compact JWS.
pub(crate) fn tgct(header: &serde_json::Value, payload: &serde_json::Value, key: &p256::ecdsa::SigningKey) -> String {
    let h = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap());
    let p = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
    let signing_input = format!("{h}.{p}");
    let sig: p256::ecdsa::Signature = key.sign(signing_input.as_bytes());
    let jws = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig.to_bytes()));
    format!("TGCT:{}", base45::encode(jws))
}

pub(crate) fn ts(rfc3339: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&chrono::Utc)
}
