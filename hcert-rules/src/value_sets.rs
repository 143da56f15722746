// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Value sets: named code tables referenced by business rules.
//!
//! Container content layout: `{"v": [{"n": name, "v": value-set JSON}, ...]}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hcert_cose::{decode_value, CborValue};
use hcert_verify::{verify_signed_data, TrustAnchor};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::RuleError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValueSetEntry {
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub version: String,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSet {
    pub id: String,
    pub date: String,
    pub values: BTreeMap<String, ValueSetEntry>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireValueSet {
    value_set_id: String,
    #[serde(default)]
    value_set_date: String,
    value_set_values: BTreeMap<String, ValueSetEntry>,
}

impl ValueSet {
    /// Parse EU value-set JSON and attach the window it is valid in.
    pub fn from_json(json: &str, valid_from: DateTime<Utc>, valid_until: DateTime<Utc>) -> Result<Self, RuleError> {
        let wire: WireValueSet = serde_json::from_str(json).map_err(|e| RuleError::Json {
            what: "value set",
            message: e.to_string(),
        })?;
        Ok(ValueSet {
            id: wire.value_set_id,
            date: wire.value_set_date,
            values: wire.value_set_values,
            valid_from,
            valid_until,
        })
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && at < self.valid_until
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSets {
    sets: Vec<ValueSet>,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
}

impl ValueSets {
    pub fn new(sets: Vec<ValueSet>) -> Self {
        Self {
            sets,
            ..Self::default()
        }
    }

    /// Verify the signed container as of `as_of` and decode every value set in it.
    pub fn decode(
        content: &[u8],
        signature: &[u8],
        anchors: &[TrustAnchor],
        as_of: DateTime<Utc>,
    ) -> Result<Self, RuleError> {
        let verified = verify_signed_data(content, signature, anchors, as_of)?;
        let mut sets = Self::decode_content(&verified.content, verified.valid_from, verified.valid_until)?;
        sets.valid_from = Some(verified.valid_from);
        sets.valid_until = Some(verified.valid_until);
        Ok(sets)
    }

    /// Decode container content; malformed entries are skipped.
    pub fn decode_content(
        content: &[u8],
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Result<Self, RuleError> {
        let root = decode_value(content)?;
        let entries = root
            .get_text("v")
            .and_then(CborValue::as_array)
            .ok_or_else(|| RuleError::Json {
                what: "value sets container",
                message: "missing 'v' array".to_string(),
            })?;

        let mut sets = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry.get_text("n").and_then(CborValue::as_text).unwrap_or("<unnamed>");
            let Some(json) = entry.get_text("v").and_then(CborValue::as_text) else {
                warn!(name, "value set entry without JSON body");
                continue;
            };
            match ValueSet::from_json(json, valid_from, valid_until) {
                Ok(set) => sets.push(set),
                Err(e) => warn!(name, error = %e, "skipping malformed value set"),
            }
        }
        debug!(count = sets.len(), "decoded value sets");
        Ok(Self::new(sets))
    }

    pub fn get(&self, id: &str) -> Option<&ValueSet> {
        self.sets.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Window of the signed container; unbounded when built in memory.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |from| from <= at) && self.valid_until.map_or(true, |until| at < until)
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    /// `valueSets` as exposed to rule logic: id to code list, limited to the
    /// sets valid at `at`.
    pub fn codes_at(&self, at: DateTime<Utc>) -> serde_json::Map<String, serde_json::Value> {
        self.sets
            .iter()
            .filter(|s| s.is_valid_at(at))
            .map(|s| {
                let codes = s.codes().map(|c| serde_json::Value::String(c.to_string())).collect();
                (s.id.clone(), serde_json::Value::Array(codes))
            })
            .collect()
    }
}
