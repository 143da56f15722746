// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hcert_cose::HC1_PREFIX;
use hcert_rules::{evaluate, get_valid_until, Clock, RuleInput, SystemClock};
use hcert_verify::{
    verify_hc1, verify_tgct, CertificateKind, HealthCertificate, TgctKey, TgctPayload, TrustAnchor, TGCT_PREFIX,
};
use tracing::{debug, info, instrument, warn};

use crate::cache::{TrustData, TrustDataCache};
use crate::config::{TgctKeyMaterial, ValidatorConfig};
use crate::result::{ErrorKind, Holder, RegionResult, Scheme, SetupError, ValidationError, ValidationResult};
use crate::source::{HttpTrustDataSource, TrustDataSource};

/// Entry point for checking certificates. Cheap to share behind an `Arc`;
/// concurrent calls share one verified copy of the trust data.
pub struct Validator {
    config: ValidatorConfig,
    cache: TrustDataCache,
    tgct_key: Option<TgctKey>,
    clock: Arc<dyn Clock>,
}

impl Validator {
    /// Validator fetching trust data over HTTP from the configured endpoints.
    pub fn new(config: ValidatorConfig) -> Result<Self, SetupError> {
        let source = Arc::new(HttpTrustDataSource::new(&config)?);
        Self::with_source(config, source)
    }

    pub fn with_source(config: ValidatorConfig, source: Arc<dyn TrustDataSource>) -> Result<Self, SetupError> {
        let anchors = config
            .trust_anchors
            .iter()
            .map(|der| TrustAnchor::from_der(der))
            .collect::<Result<Vec<_>, _>>()
            .map_err(SetupError::TrustAnchor)?;
        let tgct_key = match &config.tgct_key {
            Some(TgctKeyMaterial::Der(der)) => Some(TgctKey::from_der(der).map_err(SetupError::TgctKey)?),
            Some(TgctKeyMaterial::Pem(pem)) => Some(TgctKey::from_pem(pem).map_err(SetupError::TgctKey)?),
            None => None,
        };
        if anchors.is_empty() {
            warn!("no trust anchors configured; HC1 certificates cannot be verified");
        }
        let cache = TrustDataCache::new(source, anchors, config.cache_ttl, config.request_timeout);
        Ok(Self {
            config,
            cache,
            tgct_key,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source behind [`Validator::validate_now`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Verify `qr` and evaluate it for each of `regions` of `country` at `date`.
    ///
    /// Failures to read or trust the certificate end up in the top-level
    /// `error`; rule failures only in the affected region.
    #[instrument(skip(self, qr), fields(qr_len = qr.len()))]
    pub async fn validate(
        &self,
        qr: &str,
        date: DateTime<Utc>,
        lang: &str,
        country: &str,
        regions: &[&str],
    ) -> ValidationResult {
        let qr = qr.trim();
        let outcome = if qr.starts_with(HC1_PREFIX) {
            self.validate_hc1(qr, date, lang, country, regions).await
        } else if qr.starts_with(TGCT_PREFIX) {
            self.validate_tgct(qr, date, regions)
        } else {
            Err(ValidationError::format("input is neither an HC1 nor a TGCT certificate"))
        };

        match outcome {
            Ok(result) => {
                info!(
                    scheme = ?result.scheme,
                    valid_regions = result.regions.values().filter(|r| r.is_valid).count(),
                    regions = result.regions.len(),
                    "certificate validated"
                );
                result
            }
            Err(error) => {
                info!(kind = ?error.kind, code = %error.code, "certificate rejected");
                ValidationResult::failed(error)
            }
        }
    }

    /// [`Validator::validate`] at the validator's clock, the system time unless
    /// replaced with [`Validator::with_clock`].
    pub async fn validate_now(&self, qr: &str, lang: &str, country: &str, regions: &[&str]) -> ValidationResult {
        self.validate(qr, self.clock.now(), lang, country, regions).await
    }

    /// Forget cached trust data; the next validation fetches it again.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    async fn validate_hc1(
        &self,
        qr: &str,
        date: DateTime<Utc>,
        lang: &str,
        country: &str,
        regions: &[&str],
    ) -> Result<ValidationResult, ValidationError> {
        let data = self.cache.get(date).await?;
        let verified = verify_hc1(qr, &data.trust_list, date)?;
        debug!(signer = %verified.signer, kind = ?verified.certificate.kind(), "signature verified");

        let input = RuleInput::new(verified.payload.clone())
            .with_issued_at(verified.issued_at)
            .with_expires_at(verified.expires_at)
            .with_country_code(country);

        let regions = regions
            .iter()
            .map(|region| (region.to_string(), evaluate_region(&input, &data, date, lang, country, region)))
            .collect();

        Ok(ValidationResult {
            is_valid: true,
            error: None,
            scheme: Some(Scheme::Hc1),
            kind: verified.certificate.kind(),
            holder: Some(holder_of(&verified.certificate)),
            regions,
        })
    }

    /// Test certificates carry their own expiry; it applies to every region.
    fn validate_tgct(
        &self,
        qr: &str,
        date: DateTime<Utc>,
        regions: &[&str],
    ) -> Result<ValidationResult, ValidationError> {
        let key = self.tgct_key.as_ref().ok_or_else(|| {
            ValidationError::new(ErrorKind::Signature, "TGCT_KEY_MISSING", "no TGCT verification key configured")
        })?;
        let payload = verify_tgct(qr, key)?;

        let region = if date < payload.date {
            RegionResult::valid(Some(payload.date))
        } else {
            RegionResult::invalid(vec![format!("[TGCT] test result expired at {}", payload.date.to_rfc3339())])
        };
        let regions: BTreeMap<_, _> = regions.iter().map(|r| (r.to_string(), region.clone())).collect();

        Ok(ValidationResult {
            is_valid: true,
            error: None,
            scheme: Some(Scheme::Tgct),
            kind: Some(CertificateKind::Test),
            holder: Some(holder_of_tgct(payload)),
            regions,
        })
    }
}

/// Rules are selected at `date`; a passing region gets its expiry solved.
fn evaluate_region(
    input: &RuleInput,
    data: &TrustData,
    date: DateTime<Utc>,
    lang: &str,
    country: &str,
    region: &str,
) -> RegionResult {
    let rules = data.rules.filter(country, region);
    let outcome = evaluate(input, &rules, &data.value_sets, date, date);
    if !outcome.is_valid {
        debug!(region, failures = outcome.errors.len(), "region rejected");
        return RegionResult::invalid(outcome.localized_errors(lang));
    }
    let valid_until = get_valid_until(input, &rules, &data.value_sets, date);
    debug!(region, ?valid_until, "region accepted");
    RegionResult::valid(valid_until)
}

fn holder_of(certificate: &HealthCertificate) -> Holder {
    Holder {
        first_name: certificate.name.given_name.clone(),
        last_name: certificate.name.family_name.clone(),
        first_name_transliterated: certificate.name.given_name_transliterated.clone(),
        last_name_transliterated: Some(certificate.name.family_name_transliterated.clone()),
        date_of_birth: certificate.date_of_birth_raw.clone(),
    }
}

fn holder_of_tgct(payload: TgctPayload) -> Holder {
    Holder {
        first_name: Some(payload.firstname),
        last_name: Some(payload.lastname),
        first_name_transliterated: None,
        last_name_transliterated: None,
        date_of_birth: payload.dob,
    }
}
