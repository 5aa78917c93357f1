//! Login identifiers (email address or phone number).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors returned when a raw identifier string cannot be classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,
    #[error("malformed email address")]
    MalformedEmail,
    #[error("malformed phone number")]
    MalformedPhone,
}

/// A login identifier, classified once at the request boundary.
///
/// Anything containing `@` is treated as an email address, everything else as
/// a phone number. This is a shape heuristic, not deliverability validation.
///
/// Values are normalized on parse: emails are trimmed and lowercased, phone
/// numbers lose spaces, dashes, dots and parentheses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identifier {
    Email(String),
    Phone(String),
}

impl Identifier {
    /// Raw normalized value without the kind tag.
    pub fn value(&self) -> &str {
        match self {
            Self::Email(v) | Self::Phone(v) => v,
        }
    }

    pub fn is_email(&self) -> bool {
        matches!(self, Self::Email(_))
    }

    /// Stable key fragment for ephemeral-store keys, e.g. `email:a@b.c`.
    pub fn key(&self) -> String {
        match self {
            Self::Email(v) => format!("email:{v}"),
            Self::Phone(v) => format!("phone:{v}"),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if trimmed.contains('@') {
            parse_email(trimmed).map(Self::Email)
        } else {
            parse_phone(trimmed).map(Self::Phone)
        }
    }
}

fn parse_email(s: &str) -> Result<String, IdentifierError> {
    let (local, domain) = s.split_once('@').ok_or(IdentifierError::MalformedEmail)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || s.chars().any(char::is_whitespace)
    {
        return Err(IdentifierError::MalformedEmail);
    }
    Ok(s.to_lowercase())
}

fn parse_phone(s: &str) -> Result<String, IdentifierError> {
    let (plus, rest) = match s.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", s),
    };
    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(IdentifierError::MalformedPhone),
        }
    }
    if !(7..=15).contains(&digits.len()) {
        return Err(IdentifierError::MalformedPhone);
    }
    Ok(format!("{plus}{digits}"))
}
