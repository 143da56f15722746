// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Verified trust data, shared across validation calls.
//!
//! One entry holds the raw blobs and their decoded form. The entry is reused
//! until the TTL elapses, a container expires, or [`TrustDataCache::invalidate`]
//! is called. The decoded form serves every check date inside the container
//! windows. A date before them re-verifies the cached blobs as of that date
//! for that call only; a date past any container's end refetches.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hcert_rules::{BusinessRules, ValueSets};
use hcert_verify::{TrustAnchor, TrustList, VerifyError};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::result::ValidationError;
use crate::source::{FetchError, RawTrustData, TrustDataSource};

/// Trust list, rules and value sets, each verified against the anchors.
#[derive(Debug, Clone)]
pub struct TrustData {
    pub trust_list: TrustList,
    pub rules: BusinessRules,
    pub value_sets: ValueSets,
}

impl TrustData {
    #[instrument(skip_all, fields(%as_of))]
    pub fn decode(raw: &RawTrustData, anchors: &[TrustAnchor], as_of: DateTime<Utc>) -> Result<Self, ValidationError> {
        let trust_list = TrustList::decode(&raw.trust_list, &raw.trust_list_signature, anchors, as_of)?;
        let rules = BusinessRules::decode(&raw.rules, &raw.rules_signature, anchors, as_of)?;
        let value_sets = ValueSets::decode(&raw.value_sets, &raw.value_sets_signature, anchors, as_of)?;
        info!(
            signers = trust_list.len(),
            rules = rules.len(),
            value_sets = value_sets.len(),
            "trust data verified"
        );
        Ok(Self {
            trust_list,
            rules,
            value_sets,
        })
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.trust_list.is_valid_at(at) && self.rules.is_valid_at(at) && self.value_sets.is_valid_at(at)
    }

    /// Whether any container window ended at or before `at`.
    pub fn has_expired_by(&self, at: DateTime<Utc>) -> bool {
        [
            self.trust_list.valid_until(),
            self.rules.valid_until(),
            self.value_sets.valid_until(),
        ]
        .into_iter()
        .flatten()
        .any(|until| until <= at)
    }
}

/// What a cached entry can do for a check date.
enum Lookup {
    Hit(Arc<TrustData>),
    /// Fresh blobs, but the date precedes the decoded windows.
    Historical(Arc<RawTrustData>),
    Stale,
}

struct Entry {
    raw: Arc<RawTrustData>,
    decoded: Arc<TrustData>,
    fetched_at: Instant,
}

pub struct TrustDataCache {
    source: Arc<dyn TrustDataSource>,
    anchors: Vec<TrustAnchor>,
    ttl: Duration,
    fetch_timeout: Duration,
    entry: RwLock<Option<Entry>>,
}

impl TrustDataCache {
    pub fn new(
        source: Arc<dyn TrustDataSource>,
        anchors: Vec<TrustAnchor>,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            anchors,
            ttl,
            fetch_timeout,
            entry: RwLock::new(None),
        }
    }

    /// Trust data verified as of `as_of`, fetching when nothing fresh is cached.
    pub async fn get(&self, as_of: DateTime<Utc>) -> Result<Arc<TrustData>, ValidationError> {
        if self.anchors.is_empty() {
            return Err(VerifyError::NoTrustAnchor.into());
        }

        let cached = self.lookup(self.entry.read().await.as_ref(), as_of);
        match cached {
            Lookup::Hit(decoded) => return Ok(decoded),
            Lookup::Historical(raw) => return self.decode_historical(&raw, as_of),
            Lookup::Stale => {}
        }

        // Writers are serialized; whoever gets here second sees the first one's entry.
        let mut slot = self.entry.write().await;
        match self.lookup(slot.as_ref(), as_of) {
            Lookup::Hit(decoded) => return Ok(decoded),
            Lookup::Historical(raw) => {
                drop(slot);
                return self.decode_historical(&raw, as_of);
            }
            Lookup::Stale => {}
        }

        let raw = Arc::new(self.fetch().await?);
        let decoded = Arc::new(TrustData::decode(&raw, &self.anchors, as_of)?);
        *slot = Some(Entry {
            raw,
            decoded: decoded.clone(),
            fetched_at: Instant::now(),
        });
        Ok(decoded)
    }

    /// Drop the cached entry; the next call fetches again.
    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
        debug!("trust data cache invalidated");
    }

    fn lookup(&self, entry: Option<&Entry>, as_of: DateTime<Utc>) -> Lookup {
        match entry {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => {
                if entry.decoded.is_valid_at(as_of) {
                    Lookup::Hit(entry.decoded.clone())
                } else if entry.decoded.has_expired_by(as_of) {
                    debug!(%as_of, "cached trust data expired, refetching");
                    Lookup::Stale
                } else {
                    Lookup::Historical(entry.raw.clone())
                }
            }
            _ => Lookup::Stale,
        }
    }

    /// Kept out of the cache so the current entry keeps serving current dates.
    fn decode_historical(&self, raw: &RawTrustData, as_of: DateTime<Utc>) -> Result<Arc<TrustData>, ValidationError> {
        debug!(%as_of, "check date before cached trust data windows, re-verifying");
        Ok(Arc::new(TrustData::decode(raw, &self.anchors, as_of)?))
    }

    async fn fetch(&self) -> Result<RawTrustData, FetchError> {
        tokio::time::timeout(self.fetch_timeout, RawTrustData::fetch(self.source.as_ref()))
            .await
            .map_err(|_| FetchError::Deadline(self.fetch_timeout))?
    }
}
