//! Deferred values for declarative output
//!
//! A [`Literal`] is written to the config body verbatim, never quoted by the
//! writer. It is either an already formatted token (`"sg-123"`, `42`, `true`)
//! or a reference to an attribute of a resource block that will only exist
//! once that block is emitted (`aws_subnet.public-a.id`).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    /// Token already in config syntax
    Raw(String),
    /// `<kind>.<name>.<attribute>`
    Reference {
        kind: String,
        name: String,
        attribute: String,
    },
}

impl Literal {
    /// Quoted string literal
    pub fn string(value: impl AsRef<str>) -> Self {
        Self::Raw(quote(value.as_ref()))
    }

    pub fn raw(token: impl Into<String>) -> Self {
        Self::Raw(token.into())
    }

    pub fn number(value: i64) -> Self {
        Self::Raw(value.to_string())
    }

    pub fn bool(value: bool) -> Self {
        Self::Raw(value.to_string())
    }

    /// Reference to another resource block's attribute
    ///
    /// The resource name goes through [`sanitize_name`] so it matches the
    /// block label emitted for that resource.
    pub fn property(
        kind: impl Into<String>,
        name: impl AsRef<str>,
        attribute: impl Into<String>,
    ) -> Self {
        Self::Reference {
            kind: kind.into(),
            name: sanitize_name(name.as_ref()),
            attribute: attribute.into(),
        }
    }

    /// The token as it appears in the config body
    pub fn token(&self) -> String {
        match self {
            Self::Raw(token) => token.clone(),
            Self::Reference {
                kind,
                name,
                attribute,
            } => format!("{}.{}.{}", kind, name, attribute),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }

    /// Token first; a raw token sorts before an equal-looking reference
    fn sort_key(&self) -> (String, Option<(&str, &str, &str)>) {
        let parts = match self {
            Self::Raw(_) => None,
            Self::Reference {
                kind,
                name,
                attribute,
            } => Some((kind.as_str(), name.as_str(), attribute.as_str())),
        };
        (self.token(), parts)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl Ord for Literal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Literal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort literals by their rendered token
pub fn sort_literals(literals: &mut [Literal]) {
    literals.sort();
}

/// Quote a string for the config language
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' | '"' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Make a logical name usable as a block label
///
/// `api.example.com` becomes `api-example-com`, `a/b` becomes `a--b`.
pub fn sanitize_name(name: &str) -> String {
    name.replace('.', "-").replace('/', "--")
}
