// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use hcert::{check_person, Holder};

fn holder() -> Holder {
    Holder {
        first_name: Some("Gabriele".to_string()),
        last_name: Some("Musterfrau-Gößinger".to_string()),
        first_name_transliterated: Some("GABRIELE".to_string()),
        last_name_transliterated: Some("MUSTERFRAU<GOESSINGER".to_string()),
        date_of_birth: "1998-02-26".to_string(),
    }
}

#[test]
fn exact_name_and_birthday_match() {
    assert!(check_person(&holder(), "Gabriele", "Musterfrau-Gößinger", "1998-02-26"));
}

#[test]
fn case_and_diacritics_are_ignored() {
    assert!(check_person(&holder(), "GABRIELE", "musterfrau-gossinger", "1998-02-26"));
}

#[test]
fn transliterated_form_is_matched() {
    assert!(check_person(&holder(), "Gabriele", "Musterfrau Goessinger", "1998-02-26"));
}

#[test]
fn different_person_is_rejected() {
    assert!(!check_person(&holder(), "Max", "Mustermann", "1998-02-26"));
}

#[test]
fn differing_birthday_component_only_stops_counting() {
    // Year and month still match; the name alone decides.
    assert!(check_person(&holder(), "Gabriele", "Musterfrau-Gößinger", "1998-02-27"));
    assert!(check_person(&holder(), "Gabriele", "Musterfrau-Gößinger", "1971-07-04"));
    assert!(!check_person(&holder(), "Max", "Mustermann", "1998-02-27"));
}

#[test]
fn matching_birthday_relaxes_the_threshold() {
    // A shortened family name is close, but not close enough on its own.
    let mut holder = holder();
    holder.last_name_transliterated = None;
    holder.first_name_transliterated = None;
    assert!(check_person(&holder, "Gabriele", "Musterfrau", "1998-02-26"));

    holder.date_of_birth = String::new();
    assert!(!check_person(&holder, "Gabriele", "Musterfrau", "1998-02-26"));
}
