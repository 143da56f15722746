// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Latest instant at which a currently valid certificate stays valid.
//!
//! Validity over time is assumed to be monotonic (valid up to some instant,
//! invalid afterwards) once the rule selection is pinned. The search does not
//! check that assumption; with non-monotonic rules it returns some instant at
//! which the certificate is valid and which is followed by an invalid one.

use chrono::{DateTime, Months, Utc};

use crate::engine::{evaluate, RuleInput};
use crate::rules::BusinessRules;
use crate::value_sets::ValueSets;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const HORIZON: Months = Months::new(1000 * 12);

/// Rules and value sets stay selected as of `from`; only the evaluation date
/// moves.
pub fn get_valid_until(
    input: &RuleInput,
    rules: &BusinessRules,
    value_sets: &ValueSets,
    from: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    solve_valid_until(from, |at| evaluate(input, rules, value_sets, at, from).is_valid)
}

/// Exponential probe from `from` (1 day, doubling) followed by a bisection, at
/// millisecond resolution. `None` when invalid at `from` or still valid
/// 1000 years later.
pub fn solve_valid_until(from: DateTime<Utc>, mut is_valid: impl FnMut(DateTime<Utc>) -> bool) -> Option<DateTime<Utc>> {
    if !is_valid(from) {
        return None;
    }
    let ceiling = from.checked_add_months(HORIZON)?.timestamp_millis();
    let at = |ms: i64| DateTime::<Utc>::from_timestamp_millis(ms);

    let from_ms = from.timestamp_millis();
    let mut lo = from_ms;
    let mut offset = DAY_MS;
    let mut hi = loop {
        let probe = from_ms.saturating_add(offset);
        if probe > ceiling {
            if is_valid(at(ceiling)?) {
                return None;
            }
            break ceiling;
        }
        if !is_valid(at(probe)?) {
            break probe;
        }
        lo = probe;
        offset = offset.saturating_mul(2);
    };

    loop {
        // Rounded midpoint; stops once it can no longer move a bound.
        let mid = lo + (hi - lo + 1) / 2;
        if mid == lo || mid == hi {
            break;
        }
        if is_valid(at(mid)?) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    at(lo)
}
