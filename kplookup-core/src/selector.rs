//! Deterministic selection among candidate entries.
//!
//! A URL query can match several stored entries. Selection narrows the set
//! with the specifier's disambiguating fields and refuses to guess between
//! genuinely different secrets: injecting the wrong secret silently is a
//! worse failure than a loud error.

use secrecy::ExposeSecret;

use crate::backend::CandidateEntry;
use crate::error::{LookupError, LookupResult};
use crate::specifier::Specifier;

/// Applies the selection policy to the entries a backend returned.
///
/// In order: an empty set fails with `NoMatch`; `login`, `name` and
/// `group` narrow by exact, case-sensitive equality (an emptied set fails
/// with `NoMatch`); a single survivor is returned; several survivors are
/// returned as the first in response order only when no narrowing field
/// was supplied and every survivor carries the identical password
/// (duplicate registrations of one secret must not force disambiguation);
/// anything else fails with `AmbiguousMatch`.
///
/// Pure and side-effect free: the same entries and specifier always yield
/// the same entry or the same failure kind.
///
/// # Errors
/// [`LookupError::NoMatch`] and [`LookupError::AmbiguousMatch`] as above.
pub fn select(
    entries: Vec<CandidateEntry>,
    specifier: &Specifier,
) -> LookupResult<CandidateEntry> {
    let no_match = || LookupError::NoMatch {
        specifier: specifier.to_string(),
    };

    if entries.is_empty() {
        return Err(no_match());
    }

    let mut remaining = entries;
    if let Some(ref login) = specifier.login {
        remaining.retain(|e| &e.username == login);
    }
    if let Some(ref name) = specifier.name {
        remaining.retain(|e| &e.title == name);
    }
    if let Some(ref group) = specifier.group {
        remaining.retain(|e| e.group.as_ref() == Some(group));
    }

    if remaining.is_empty() {
        return Err(no_match());
    }
    if remaining.len() == 1 {
        // retain preserved response order; index 0 is the sole survivor
        return Ok(remaining.remove(0));
    }

    if !specifier.has_narrowing() && all_passwords_equal(&remaining) {
        return Ok(remaining.remove(0));
    }

    Err(ambiguous(&remaining, specifier))
}

fn all_passwords_equal(entries: &[CandidateEntry]) -> bool {
    let first = entries[0].password.expose_secret();
    entries[1..]
        .iter()
        .all(|e| e.password.expose_secret() == first)
}

/// Builds the `AmbiguousMatch` error, enumerating the distinguishing
/// fields so the operator can refine the specifier.
fn ambiguous(entries: &[CandidateEntry], specifier: &Specifier) -> LookupError {
    let mut titles: Vec<String> = Vec::new();
    let mut groups: Vec<String> = Vec::new();
    for entry in entries {
        if !titles.contains(&entry.title) {
            titles.push(entry.title.clone());
        }
        if let Some(ref group) = entry.group {
            if !groups.contains(group) {
                groups.push(group.clone());
            }
        }
    }
    LookupError::AmbiguousMatch {
        specifier: specifier.to_string(),
        count: entries.len(),
        titles,
        groups,
    }
}
