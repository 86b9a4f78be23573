//! Tests for the deterministic selection policy

use kplookup_core::backend::CandidateEntry;
use kplookup_core::error::LookupError;
use kplookup_core::selector::select;
use kplookup_core::specifier::Specifier;
use secrecy::ExposeSecret;

fn entry(title: &str, username: &str, password: &str, group: Option<&str>) -> CandidateEntry {
    CandidateEntry {
        title: title.to_string(),
        username: username.to_string(),
        password: password.to_string().into(),
        url: "ansible://svc".to_string(),
        group: group.map(str::to_string),
    }
}

fn bare() -> Specifier {
    Specifier::parse("ansible://svc").unwrap()
}

#[test]
fn empty_set_is_no_match() {
    let err = select(Vec::new(), &bare()).unwrap_err();
    assert!(matches!(err, LookupError::NoMatch { .. }));
}

#[test]
fn single_entry_is_returned() {
    let picked = select(vec![entry("A", "root", "pw", None)], &bare()).unwrap();
    assert_eq!(picked.title, "A");
}

#[test]
fn login_narrowing_is_exact_and_case_sensitive() {
    let entries = vec![
        entry("A", "root", "pw1", None),
        entry("B", "Root", "pw2", None),
    ];
    let spec = Specifier::parse("url=ansible://svc login=root").unwrap();
    let picked = select(entries, &spec).unwrap();
    assert_eq!(picked.title, "A");
}

#[test]
fn narrowing_to_nothing_is_no_match() {
    let entries = vec![entry("A", "root", "pw1", None)];
    let spec = Specifier::parse("url=ansible://svc login=admin").unwrap();
    let err = select(entries, &spec).unwrap_err();
    assert!(matches!(err, LookupError::NoMatch { .. }));
}

#[test]
fn name_then_group_narrowing() {
    let entries = vec![
        entry("db", "root", "pw1", Some("prod")),
        entry("db", "root", "pw2", Some("staging")),
    ];
    let spec = Specifier::parse("url=ansible://svc name=db group=staging").unwrap();
    let picked = select(entries, &spec).unwrap();
    assert_eq!(picked.password.expose_secret(), "pw2");
}

#[test]
fn equal_passwords_without_narrowing_return_first() {
    let entries = vec![
        entry("first", "a", "same", None),
        entry("second", "b", "same", None),
    ];
    let picked = select(entries, &bare()).unwrap();
    assert_eq!(picked.title, "first");
}

#[test]
fn equal_passwords_pick_is_stable_across_calls() {
    let make = || {
        vec![
            entry("first", "a", "same", None),
            entry("second", "b", "same", None),
            entry("third", "c", "same", None),
        ]
    };
    let one = select(make(), &bare()).unwrap();
    let two = select(make(), &bare()).unwrap();
    assert_eq!(one.title, two.title);
}

#[test]
fn differing_passwords_without_narrowing_are_ambiguous() {
    let entries = vec![
        entry("first", "a", "pw1", Some("g1")),
        entry("second", "b", "pw2", Some("g2")),
    ];
    let err = select(entries, &bare()).unwrap_err();
    match err {
        LookupError::AmbiguousMatch {
            count,
            titles,
            groups,
            ..
        } => {
            assert_eq!(count, 2);
            assert_eq!(titles, vec!["first".to_string(), "second".to_string()]);
            assert_eq!(groups, vec!["g1".to_string(), "g2".to_string()]);
        }
        other => panic!("expected AmbiguousMatch, got {other:?}"),
    }
}

#[test]
fn equal_passwords_with_narrowing_are_still_ambiguous() {
    // Step 6 only applies when no narrowing field was supplied at all.
    let entries = vec![
        entry("first", "root", "same", None),
        entry("second", "root", "same", None),
    ];
    let spec = Specifier::parse("url=ansible://svc login=root").unwrap();
    let err = select(entries, &spec).unwrap_err();
    assert!(matches!(err, LookupError::AmbiguousMatch { .. }));
}

#[test]
fn selection_failure_kind_is_idempotent() {
    let make = || {
        vec![
            entry("first", "a", "pw1", None),
            entry("second", "b", "pw2", None),
        ]
    };
    let one = select(make(), &bare()).unwrap_err();
    let two = select(make(), &bare()).unwrap_err();
    assert_eq!(
        std::mem::discriminant(&one),
        std::mem::discriminant(&two)
    );
}

#[test]
fn ambiguous_message_lists_titles() {
    let entries = vec![
        entry("mysql prod", "a", "pw1", None),
        entry("mysql dev", "b", "pw2", None),
    ];
    let err = select(entries, &bare()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("mysql prod"));
    assert!(message.contains("mysql dev"));
    assert!(!message.contains("pw1"), "message must not leak secrets");
}
