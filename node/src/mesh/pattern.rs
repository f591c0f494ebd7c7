//! Peer-name matching for broadcast and request routing.
//!
//! Glob syntax follows shell path matching: `*` matches any run of
//! characters except `/`, `?` matches one such character, `[...]` is a
//! character class (`[^...]` negated, `a-z` ranges) and `\` escapes the next
//! character. Patterns are translated to an anchored [`Regex`].

use regex::Regex;
use serde::Deserialize;

use crate::error::MeshError;

/// How routing patterns are interpreted. One mode is active per engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Shell-style glob matched against the whole name.
    #[default]
    Glob,
    /// Regular expression searched anywhere in the name.
    Regex,
}

/// A compiled routing pattern.
#[derive(Debug, Clone)]
pub struct PeerPattern {
    source: String,
    regex: Regex,
}

impl PeerPattern {
    /// Compiles `pattern` under the given mode.
    ///
    /// # Errors
    /// Returns `MeshError::InvalidPattern` for a malformed pattern.
    pub fn compile(pattern: &str, mode: MatchMode) -> Result<Self, MeshError> {
        let expr = match mode {
            MatchMode::Glob => glob_to_regex(pattern)?,
            MatchMode::Regex => pattern.to_string(),
        };
        let regex = Regex::new(&expr).map_err(|e| invalid(pattern, &e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Returns true if `name` matches.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Returns the pattern as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn invalid(pattern: &str, reason: &str) -> MeshError {
    MeshError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

fn escape_char(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0; 4]))
}

fn glob_to_regex(pattern: &str) -> Result<String, MeshError> {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| invalid(pattern, "trailing escape"))?;
                out.push_str(&escape_char(escaped));
            }
            '[' => {
                out.push('[');
                if chars.next_if_eq(&'^').is_some() {
                    out.push('^');
                }
                let mut members = 0usize;
                loop {
                    let member = match chars.next() {
                        None => return Err(invalid(pattern, "unterminated character class")),
                        Some(']') if members > 0 => break,
                        Some(']') => return Err(invalid(pattern, "empty character class")),
                        Some('\\') => chars
                            .next()
                            .ok_or_else(|| invalid(pattern, "trailing escape"))?,
                        Some(other) => other,
                    };
                    out.push_str(&escape_char(member));
                    if chars.next_if_eq(&'-').is_some() {
                        let upper = match chars.next() {
                            None => return Err(invalid(pattern, "unterminated range")),
                            Some(']') => return Err(invalid(pattern, "unterminated range")),
                            Some('\\') => chars
                                .next()
                                .ok_or_else(|| invalid(pattern, "trailing escape"))?,
                            Some(other) => other,
                        };
                        out.push('-');
                        out.push_str(&escape_char(upper));
                    }
                    members += 1;
                }
                out.push(']');
            }
            other => out.push_str(&escape_char(other)),
        }
    }

    out.push('$');
    Ok(out)
}
