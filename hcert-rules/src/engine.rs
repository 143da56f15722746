// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::certlogic::Value;
use crate::rules::BusinessRules;
use crate::value_sets::ValueSets;

/// What rules see of a certificate: the DCC claims as JSON plus the CWT
/// metadata forwarded as `external` parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleInput {
    pub payload: serde_json::Value,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub country_code: Option<String>,
}

impl RuleInput {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    pub fn with_issued_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.issued_at = at;
        self
    }

    pub fn with_expires_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = at;
        self
    }

    pub fn with_country_code(mut self, country: impl Into<String>) -> Self {
        self.country_code = Some(country.into());
        self
    }

    fn to_data(&self, value_sets: &ValueSets, date: DateTime<Utc>, rules_date: DateTime<Utc>) -> Value {
        let instant = |dt: Option<DateTime<Utc>>| dt.map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true));
        Value::from(&json!({
            "payload": self.payload,
            "external": {
                "validationClock": date.to_rfc3339_opts(SecondsFormat::Millis, true),
                "valueSets": value_sets.codes_at(rules_date),
                "countryCode": self.country_code,
                "exp": instant(self.expires_at),
                "iat": instant(self.issued_at),
            }
        }))
    }
}

/// One failing rule and its descriptions keyed by language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub identifier: String,
    pub descriptions: BTreeMap<String, String>,
}

impl RuleFailure {
    /// `lang` if declared, else English, else the first declared language.
    pub fn localized(&self, lang: &str) -> String {
        self.descriptions
            .get(lang)
            .or_else(|| self.descriptions.get("en"))
            .or_else(|| self.descriptions.values().next())
            .cloned()
            .unwrap_or_else(|| format!("[{}]", self.identifier))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleValidationResult {
    pub is_valid: bool,
    pub errors: Vec<RuleFailure>,
}

impl RuleValidationResult {
    pub fn localized_errors(&self, lang: &str) -> Vec<String> {
        self.errors.iter().map(|e| e.localized(lang)).collect()
    }
}

/// Evaluate every rule active at `rules_date` against `input` at `date`.
///
/// Rules outside their window are skipped. Value sets are taken as of
/// `rules_date` too, so only `validationClock` follows `date`. A rule fails unless its logic
/// yields exactly `true`; a logic fault counts as a failure. All failures are
/// collected.
pub fn evaluate(
    input: &RuleInput,
    rules: &BusinessRules,
    value_sets: &ValueSets,
    date: DateTime<Utc>,
    rules_date: DateTime<Utc>,
) -> RuleValidationResult {
    let data = input.to_data(value_sets, date, rules_date);
    let mut errors = Vec::new();

    for rule in rules.iter().filter(|r| r.is_active_at(rules_date)) {
        let passed = match rule.logic.evaluate(&data) {
            Ok(result) => result == Value::Bool(true),
            Err(e) => {
                warn!(rule = %rule.identifier, error = %e, code = e.code(), "rule evaluation failed");
                false
            }
        };
        if !passed {
            debug!(rule = %rule.identifier, %date, "rule failed");
            errors.push(RuleFailure {
                identifier: rule.identifier.clone(),
                descriptions: rule.failure_descriptions().collect(),
            });
        }
    }

    RuleValidationResult {
        is_valid: errors.is_empty(),
        errors,
    }
}
