// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Issuer-side builders for facade tests: a small PKI, signed `HC1:` and
//! `TGCT:` certificates, and signed trust-data containers served from memory.

#![allow(dead_code)]

use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hcert::{FetchError, RawTrustData, Resource, StaticTrustDataSource, TrustDataSource, ValidatorConfig};
use minicbor::data::Tag;
use minicbor::Encoder;
use p256::pkcs8::DecodePrivateKey as _;
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use serde_json::{json, Value};
use sha2::{Digest as _, Sha256};
use signature::Signer as _;

pub(crate) const IAT: i64 = 1_613_606_400; // 2021-02-18
pub(crate) const EXP: i64 = 1_645_142_400; // 2022-02-18
pub(crate) const WINDOW_FROM: i64 = 1_609_459_200; // 2021-01-01
pub(crate) const WINDOW_UNTIL: i64 = 1_640_995_200; // 2022-01-01

pub(crate) struct TestSigner {
    pub(crate) der: Vec<u8>,
    pub(crate) signing_key: p256::ecdsa::SigningKey,
    key_pair: KeyPair,
    cert: rcgen::Certificate,
}

impl TestSigner {
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
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2030, 1, 1);
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

pub(crate) fn make_signer(cn: &str, issuer: &TestSigner) -> TestSigner {
    let key_pair = KeyPair::generate().unwrap();
    let cert = params(cn).signed_by(&key_pair, &issuer.cert, &issuer.key_pair).unwrap();
    into_signer(key_pair, cert)
}

fn sign_cose(payload: &[u8], kid: Option<&[u8]>, signer: &TestSigner) -> Vec<u8> {
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
    enc.map(0).unwrap();
    enc.bytes(payload).unwrap();
    enc.bytes(&signature).unwrap();
    out
}

fn encode_json(enc: &mut Encoder<&mut Vec<u8>>, value: &Value) {
    match value {
        Value::Null => {
            enc.null().unwrap();
        }
        Value::Bool(b) => {
            enc.bool(*b).unwrap();
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                enc.i64(i).unwrap();
            }
            None => {
                enc.f64(n.as_f64().unwrap()).unwrap();
            }
        },
        Value::String(s) => {
            enc.str(s).unwrap();
        }
        Value::Array(items) => {
            enc.array(items.len() as u64).unwrap();
            for item in items {
                encode_json(enc, item);
            }
        }
        Value::Object(map) => {
            enc.map(map.len() as u64).unwrap();
            for (k, v) in map {
                enc.str(k).unwrap();
                encode_json(enc, v);
            }
        }
    }
}

/// `HC1:` string signed by `dsc`.
pub(crate) fn issue(dcc: &Value, dsc: &TestSigner) -> String {
    let mut payload = Vec::new();
    let mut enc = Encoder::new(&mut payload);
    enc.map(4).unwrap();
    enc.i64(1).unwrap().str("AT").unwrap();
    enc.i64(4).unwrap().i64(EXP).unwrap();
    enc.i64(6).unwrap().i64(IAT).unwrap();
    enc.i64(-260).unwrap().map(1).unwrap().i64(1).unwrap();
    encode_json(&mut enc, dcc);

    let cose = sign_cose(&payload, Some(&dsc.kid()), dsc);
    let mut z = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    z.write_all(&cose).unwrap();
    format!("HC1:{}", base45::encode(z.finish().unwrap()))
}

pub(crate) fn vaccination_dcc() -> Value {
    json!({
        "ver": "1.3.0",
        "nam": {"fn": "Musterfrau-Gößinger", "fnt": "MUSTERFRAU<GOESSINGER", "gn": "Gabriele", "gnt": "GABRIELE"},
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

/// Signature blob over `content` valid in `[from, until)` (epoch seconds).
pub(crate) fn sign_container(content: &[u8], from: i64, until: i64, signer: &TestSigner) -> Vec<u8> {
    let mut payload = Vec::new();
    let mut enc = Encoder::new(&mut payload);
    enc.map(3).unwrap();
    enc.i64(2).unwrap().bytes(&Sha256::digest(content)).unwrap();
    enc.i64(4).unwrap().i64(until).unwrap();
    enc.i64(5).unwrap().i64(from).unwrap();
    sign_cose(&payload, None, signer)
}

fn trust_list_content(signers: &[&TestSigner]) -> Vec<u8> {
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

/// `{key: [{name_key: name, body_key: json text}, ...]}`
fn json_container(key: &str, name_key: &str, body_key: &str, entries: &[(String, Value)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut enc = Encoder::new(&mut out);
    enc.map(1).unwrap().str(key).unwrap().array(entries.len() as u64).unwrap();
    for (name, body) in entries {
        enc.map(2).unwrap();
        enc.str(name_key).unwrap().str(name).unwrap();
        enc.str(body_key).unwrap().str(&body.to_string()).unwrap();
    }
    out
}

/// EU-schema rule JSON with English and German descriptions.
pub(crate) fn rule_json(id: &str, country: &str, region: &str, logic: Value) -> Value {
    json!({
        "Identifier": id,
        "Type": "Acceptance",
        "Country": country,
        "Region": region,
        "Version": "1.0.0",
        "SchemaVersion": "1.0.0",
        "Engine": "CERTLOGIC",
        "EngineVersion": "1.0.0",
        "CertificateType": "General",
        "Description": [
            {"lang": "en", "desc": format!("{id} failed")},
            {"lang": "de", "desc": format!("{id} nicht erfüllt")}
        ],
        "ValidFrom": "2020-01-01T00:00:00Z",
        "ValidTo": "2030-01-01T00:00:00Z",
        "AffectedFields": [],
        "Logic": logic
    })
}

/// Holds for `days` days after the vaccination date.
pub(crate) fn valid_for_days(days: i64) -> Value {
    json!({
        "not-after": [
            {"plusTime": [{"var": "external.validationClock"}, 0, "day"]},
            {"plusTime": [{"var": "payload.v.0.dt"}, days, "day"]}
        ]
    })
}

pub(crate) fn accepted_vaccines() -> Value {
    json!({
        "valueSetId": "vaccines-covid-19-names",
        "valueSetDate": "2021-04-27",
        "valueSetValues": {
            "EU/1/20/1528": {"display": "Comirnaty", "lang": "en", "active": true, "system": "https://ec.europa.eu/health/documents/community-register/html/", "version": ""},
            "EU/1/20/1507": {"display": "Spikevax", "lang": "en", "active": true, "system": "https://ec.europa.eu/health/documents/community-register/html/", "version": ""}
        }
    })
}

/// Signed trust data: `anchor` signs all three containers in the default window.
pub(crate) fn trust_data(anchor: &TestSigner, signers: &[&TestSigner], rules: &[Value], value_sets: &[Value]) -> RawTrustData {
    let trust_list = trust_list_content(signers);
    let rules = json_container(
        "r",
        "i",
        "r",
        &rules
            .iter()
            .map(|r| (r["Identifier"].as_str().unwrap().to_string(), r.clone()))
            .collect::<Vec<_>>(),
    );
    let value_sets = json_container(
        "v",
        "n",
        "v",
        &value_sets
            .iter()
            .map(|v| (v["valueSetId"].as_str().unwrap().to_string(), v.clone()))
            .collect::<Vec<_>>(),
    );
    RawTrustData {
        trust_list_signature: sign_container(&trust_list, WINDOW_FROM, WINDOW_UNTIL, anchor),
        trust_list,
        rules_signature: sign_container(&rules, WINDOW_FROM, WINDOW_UNTIL, anchor),
        rules,
        value_sets_signature: sign_container(&value_sets, WINDOW_FROM, WINDOW_UNTIL, anchor),
        value_sets,
    }
}

/// Same content, containers re-signed for `[from, until)`.
pub(crate) fn resign(raw: &RawTrustData, from: i64, until: i64, anchor: &TestSigner) -> RawTrustData {
    RawTrustData {
        trust_list_signature: sign_container(&raw.trust_list, from, until, anchor),
        rules_signature: sign_container(&raw.rules, from, until, anchor),
        value_sets_signature: sign_container(&raw.value_sets, from, until, anchor),
        ..raw.clone()
    }
}


/// `TGCT:` + base45 of an ES256 compact JWS.
pub(crate) fn tgct(payload: &Value, key: &p256::ecdsa::SigningKey) -> String {
    let h = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&json!({"alg": "ES256", "typ": "JWT"})).unwrap());
    let p = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
    let signing_input = format!("{h}.{p}");
    let sig: p256::ecdsa::Signature = key.sign(signing_input.as_bytes());
    let jws = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig.to_bytes()));
    format!("TGCT:{}", base45::encode(jws))
}

pub(crate) fn tgct_key() -> (p256::ecdsa::SigningKey, String) {
    let key_pair = KeyPair::generate().unwrap();
    let signing_key = p256::ecdsa::SigningKey::from_pkcs8_der(&key_pair.serialize_der()).unwrap();
    (signing_key, key_pair.public_key_pem())
}

pub(crate) fn config(anchor: &TestSigner) -> ValidatorConfig {
    ValidatorConfig::default().with_trust_anchor(anchor.der.clone())
}

pub(crate) fn ts(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}

/// Counts how often the trust list is fetched.
pub(crate) struct CountingSource {
    inner: StaticTrustDataSource,
    fetches: AtomicUsize,
}

impl CountingSource {
    pub(crate) fn new(raw: RawTrustData) -> Arc<Self> {
        Arc::new(Self {
            inner: StaticTrustDataSource::from_raw(raw),
            fetches: AtomicUsize::new(0),
        })
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrustDataSource for CountingSource {
    async fn fetch(&self, resource: Resource) -> Result<Vec<u8>, FetchError> {
        if resource == Resource::TrustList {
            self.fetches.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.fetch(resource).await
    }
}

/// Never answers.
pub(crate) struct StalledSource;

#[async_trait]
impl TrustDataSource for StalledSource {
    async fn fetch(&self, _resource: Resource) -> Result<Vec<u8>, FetchError> {
        std::future::pending().await
    }
}
