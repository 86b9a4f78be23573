//! Property tests for specifier parsing

use kplookup_core::error::LookupError;
use kplookup_core::specifier::Specifier;
use proptest::prelude::*;

#[test]
fn bare_url_parses_to_url_only() {
    let spec = Specifier::parse("https://example.org").unwrap();
    assert_eq!(spec.url, "https://example.org");
    assert_eq!(spec.login, None);
    assert_eq!(spec.name, None);
    assert_eq!(spec.group, None);
}

#[test]
fn url_and_login_tokens() {
    let spec = Specifier::parse("url=ansible://mysql login=root").unwrap();
    assert_eq!(spec.url, "ansible://mysql");
    assert_eq!(spec.login.as_deref(), Some("root"));
}

#[test]
fn quoted_name_keeps_embedded_whitespace() {
    let spec = Specifier::parse("url=ansible://secret name=\"My Secret\"").unwrap();
    assert_eq!(spec.url, "ansible://secret");
    assert_eq!(spec.name.as_deref(), Some("My Secret"));
}

#[test]
fn unknown_key_is_malformed() {
    let err = Specifier::parse("foo=bar").unwrap_err();
    assert!(matches!(err, LookupError::MalformedSpecifier { .. }));
}

#[test]
fn empty_input_is_malformed() {
    for raw in ["", "   ", "\t"] {
        let err = Specifier::parse(raw).unwrap_err();
        assert!(matches!(err, LookupError::MalformedSpecifier { .. }));
    }
}

#[test]
fn unbalanced_quote_is_malformed() {
    let err = Specifier::parse("url=ansible://s name=\"half").unwrap_err();
    assert!(matches!(err, LookupError::MalformedSpecifier { .. }));
    let err = Specifier::parse("url=ansible://s name=ha\"lf").unwrap_err();
    assert!(matches!(err, LookupError::MalformedSpecifier { .. }));
}

#[test]
fn error_message_names_the_specifier() {
    let err = Specifier::parse("foo=bar").unwrap_err();
    assert!(err.to_string().contains("foo=bar"));
}

fn value_strategy() -> impl Strategy<Value = String> {
    // Arbitrary printable values, including whitespace and quotes, which
    // Display must quote and escape.
    "[a-zA-Z0-9 _.\"\\\\/:-]{1,24}"
}

proptest! {
    // Formatting a specifier back into key=value tokens and re-parsing
    // yields an equal specifier.
    #[test]
    fn display_parse_round_trip(
        host in "[a-z][a-z0-9-]{0,15}",
        scheme in "[a-z][a-z0-9]{0,7}",
        login in proptest::option::of(value_strategy()),
        name in proptest::option::of(value_strategy()),
        group in proptest::option::of(value_strategy()),
    ) {
        let spec = Specifier {
            url: format!("{scheme}://{host}"),
            login,
            name,
            group,
        };
        let rendered = spec.to_string();
        let reparsed = Specifier::parse(&rendered).unwrap();
        prop_assert_eq!(spec, reparsed);
    }
}

proptest! {
    // Last duplicate wins, whatever the values are.
    #[test]
    fn duplicate_login_keeps_last(
        first in "[a-z]{1,8}",
        second in "[a-z]{1,8}",
    ) {
        let raw = format!("url=ansible://db login={first} login={second}");
        let spec = Specifier::parse(&raw).unwrap();
        prop_assert_eq!(spec.login.as_deref(), Some(second.as_str()));
    }
}
