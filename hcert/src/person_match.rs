// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Fuzzy match between a certificate holder and a known person.

use hcert_verify::DateOfBirth;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::result::Holder;

const BASE_THRESHOLD: f64 = 0.8;
const THRESHOLD_STEP: f64 = 0.1;

/// Whether `holder` plausibly is the person `first last`, born `dob`.
///
/// Names are compared with Sørensen–Dice similarity after stripping
/// diacritics and case, against both the printed and the transliterated form.
/// Each date-of-birth component known on both sides and equal lowers the
/// required similarity by 0.1 from 0.8.
pub fn check_person(holder: &Holder, first: &str, last: &str, dob: &str) -> bool {
    let matched = matching_dob_components(&holder.date_of_birth, dob);
    let threshold = BASE_THRESHOLD - THRESHOLD_STEP * f64::from(matched);

    let person = normalize(&format!("{first} {last}"));
    let printed = format!(
        "{} {}",
        holder.first_name.as_deref().unwrap_or_default(),
        holder.last_name.as_deref().unwrap_or_default()
    );
    let transliterated = format!(
        "{} {}",
        holder.first_name_transliterated.as_deref().unwrap_or_default(),
        holder.last_name_transliterated.as_deref().unwrap_or_default()
    );

    [printed, transliterated]
        .iter()
        .map(|name| normalize(name))
        .filter(|name| !name.is_empty())
        .any(|name| strsim::sorensen_dice(&name, &person) >= threshold)
}

/// Year, month and day components known on both sides and equal.
fn matching_dob_components(certificate: &str, person: &str) -> u8 {
    let (Some(a), Some(b)) = (DateOfBirth::parse(certificate), DateOfBirth::parse(person)) else {
        return 0;
    };
    [
        (a.year.map(i64::from), b.year.map(i64::from)),
        (a.month.map(i64::from), b.month.map(i64::from)),
        (a.day.map(i64::from), b.day.map(i64::from)),
    ]
    .into_iter()
    .filter(|(x, y)| x.is_some() && x == y)
    .fold(0, |n, _| n + 1)
}

/// Lowercase, no combining marks, ICAO filler `<` as space, single spaces.
fn normalize(name: &str) -> String {
    let folded: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c == '<' { ' ' } else { c })
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
