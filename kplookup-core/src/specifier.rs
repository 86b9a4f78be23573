//! Specifier parsing for credential lookups.
//!
//! A specifier is the free-text query the caller hands to the lookup
//! facade. It is either a bare URL (`https://example.org`) or a sequence of
//! whitespace-separated `key=value` tokens (`url=ansible://mysql
//! login=root name="My Secret"`). The URL identifies which manager entries
//! are candidates; `login`, `name` and `group` narrow the result when the
//! URL alone is ambiguous.

use std::fmt;

use url::Url;

use crate::error::{LookupError, LookupResult};

/// Keys accepted in `key=value` form
const VALID_KEYS: [&str; 4] = ["url", "login", "name", "group"];

/// A parsed credential specifier
///
/// Immutable after parsing. `url` is always present and is guaranteed to be
/// a syntactically valid URI with a scheme; the scheme does not have to name
/// a real network protocol (`ansible://mysql` is a valid specifier URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    /// URL the stored entries are matched against
    pub url: String,
    /// Narrow to entries with exactly this username
    pub login: Option<String>,
    /// Narrow to entries with exactly this title
    pub name: Option<String>,
    /// Narrow to entries stored in exactly this group
    pub group: Option<String>,
}

impl Specifier {
    /// Parses a raw specifier string.
    ///
    /// A string with no `key=value` tokens is treated as a bare URL.
    /// Otherwise every token must be `key=value` where `key` is one of
    /// `url`, `login`, `name`, `group`; values may be double-quoted to
    /// embed whitespace, with `\"` and `\\` escapes. Duplicate keys keep
    /// the last occurrence. Bare tokens mixed with `key=value` tokens are
    /// joined to form the URL when no explicit `url=` was given.
    ///
    /// # Errors
    /// Returns [`LookupError::MalformedSpecifier`] for empty input,
    /// unbalanced quoting, an unknown key, a missing URL, or a URL that is
    /// not a scheme-qualified URI.
    pub fn parse(raw: &str) -> LookupResult<Self> {
        let malformed = |reason: String| LookupError::MalformedSpecifier {
            specifier: raw.to_string(),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(malformed("specifier is empty".to_string()));
        }

        let tokens = tokenize(raw).map_err(malformed)?;

        let mut url: Option<String> = None;
        let mut login: Option<String> = None;
        let mut name: Option<String> = None;
        let mut group: Option<String> = None;
        let mut bare: Vec<String> = Vec::new();

        for token in tokens {
            match token {
                Token::Pair(key, value) => match key.as_str() {
                    "url" => url = Some(value),
                    "login" => login = Some(value),
                    "name" => name = Some(value),
                    "group" => group = Some(value),
                    other => {
                        return Err(malformed(format!(
                            "unknown key '{other}' (expected one of {})",
                            VALID_KEYS.join(", ")
                        )));
                    }
                },
                Token::Bare(word) => bare.push(word),
            }
        }

        // An explicit url= wins; otherwise bare tokens form the URL, as in
        // a plain `lookup('https://example.org')` invocation.
        let url = match url {
            Some(u) => u,
            None if !bare.is_empty() => bare.join(""),
            None => return Err(malformed("missing 'url'".to_string())),
        };

        if let Err(e) = Url::parse(&url) {
            return Err(malformed(format!("'{url}' is not a valid URL: {e}")));
        }

        Ok(Self {
            url,
            login,
            name,
            group,
        })
    }

    /// Returns true if any narrowing field (`login`, `name`, `group`) is set
    #[must_use]
    pub const fn has_narrowing(&self) -> bool {
        self.login.is_some() || self.name.is_some() || self.group.is_some()
    }
}

impl fmt::Display for Specifier {
    /// Renders the specifier back into `key=value` form.
    ///
    /// Values containing whitespace, quotes or backslashes are quoted and
    /// escaped, so `parse(spec.to_string())` yields an equal specifier.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "url={}", quote_value(&self.url))?;
        if let Some(ref login) = self.login {
            write!(f, " login={}", quote_value(login))?;
        }
        if let Some(ref name) = self.name {
            write!(f, " name={}", quote_value(name))?;
        }
        if let Some(ref group) = self.group {
            write!(f, " group={}", quote_value(group))?;
        }
        Ok(())
    }
}

/// A single token of the specifier grammar
enum Token {
    /// `key=value` with the value already unquoted
    Pair(String, String),
    /// A word with no key, contributing to the URL
    Bare(String),
}

/// Splits the raw string into tokens, honoring double quotes.
///
/// A token is a `key=value` pair only when the text before `=` is a plain
/// identifier; this keeps bare URLs with query strings (`https://x?a=b`)
/// from being misread as pairs.
fn tokenize(raw: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        // Read up to `=`, whitespace or end.
        let mut head = String::new();
        let mut is_pair = false;
        while let Some(&c) = chars.peek() {
            if c == '=' && is_identifier(&head) {
                chars.next();
                is_pair = true;
                break;
            }
            if c.is_whitespace() {
                break;
            }
            head.push(c);
            chars.next();
        }

        if !is_pair {
            tokens.push(Token::Bare(head));
            continue;
        }

        // Value: quoted or plain.
        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => return Err("unbalanced quoting".to_string()),
                    },
                    '"' => {
                        closed = true;
                        break;
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return Err("unbalanced quoting".to_string());
            }
            value
        } else {
            let mut value = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                if c == '"' {
                    return Err("unbalanced quoting".to_string());
                }
                value.push(c);
                chars.next();
            }
            value
        };

        tokens.push(Token::Pair(head, value));
    }

    Ok(tokens)
}

/// Returns true if `s` is a plain identifier (candidate `key=` prefix)
fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

/// Quotes a value for `Display` when it contains characters that would
/// not survive re-tokenization.
fn quote_value(value: &str) -> String {
    if !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\')
    {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}
