//! Classification rules
//!
//! A rule claims a file when its MIME type matches any of the rule's MIME
//! patterns **or** its extension matches any of the rule's extensions. Rules
//! are evaluated in configured order and the first match wins; a file is never
//! claimed by two rules.

use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Audit value for the `rule` column when no rule claimed a file
pub const NO_MATCH: &str = "(no match)";

/// Errors raised while building rules from configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule name must not be empty")]
    EmptyName,

    #[error("rule '{rule}' has an empty {kind} pattern")]
    EmptyPattern { rule: String, kind: &'static str },

    #[error("duplicate rule name '{0}'")]
    DuplicateName(String),
}

/// A single MIME pattern, either an exact type or a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimePattern {
    /// `image/png` - compared case-insensitively against the full type
    Exact(String),
    /// `image/*` - everything before the trailing wildcard is a prefix
    Prefix(String),
}

impl MimePattern {
    /// Parse a configured pattern; a trailing `*` turns it into a prefix match
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern.is_empty() {
            return None;
        }

        match pattern.strip_suffix('*') {
            // `*` and `*/*` both mean "any type"
            Some("") | Some("*/") => Some(MimePattern::Prefix(String::new())),
            Some(prefix) => Some(MimePattern::Prefix(prefix.to_string())),
            None => Some(MimePattern::Exact(pattern)),
        }
    }

    pub fn matches(&self, mime: &str) -> bool {
        match self {
            MimePattern::Exact(expected) => mime == expected,
            MimePattern::Prefix(prefix) => mime.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for MimePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimePattern::Exact(mime) => write!(f, "{mime}"),
            MimePattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

/// A named matcher over (MIME type, extension)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    name: String,
    mime_patterns: Vec<MimePattern>,
    ext_patterns: Vec<String>,
}

impl Rule {
    /// Build a rule, normalising extensions to lowercase with a leading dot
    pub fn new<M, E>(name: impl Into<String>, mime_patterns: M, ext_patterns: E) -> Result<Self, RuleError>
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RuleError::EmptyName);
        }

        let mime_patterns = mime_patterns
            .into_iter()
            .map(|pattern| {
                MimePattern::parse(pattern.as_ref()).ok_or_else(|| RuleError::EmptyPattern {
                    rule: name.clone(),
                    kind: "MIME",
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ext_patterns = ext_patterns
            .into_iter()
            .map(|ext| {
                normalize_ext_pattern(ext.as_ref()).ok_or_else(|| RuleError::EmptyPattern {
                    rule: name.clone(),
                    kind: "extension",
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            mime_patterns,
            ext_patterns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_patterns(&self) -> &[MimePattern] {
        &self.mime_patterns
    }

    pub fn ext_patterns(&self) -> &[String] {
        &self.ext_patterns
    }

    /// Whether this rule claims a file with the given detected signals.
    ///
    /// A rule with no patterns at all never matches.
    pub fn matches(&self, mime: &str, ext: &str) -> bool {
        let mime = essence(mime);
        let mime_hit = self.mime_patterns.iter().any(|p| p.matches(&mime));
        let ext_hit = !ext.is_empty() && self.ext_patterns.iter().any(|e| e.eq_ignore_ascii_case(ext));
        mime_hit || ext_hit
    }
}

/// Ordered, immutable rule list for one run
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build a rule set; rule names must be unique since they key the audit
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(RuleError::DuplicateName(rule.name.clone()));
            }
        }
        Ok(Self { rules })
    }

    /// First rule (in configured order) that claims the file
    pub fn first_match(&self, mime: &str, ext: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(mime, ext))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Lowercased MIME type without parameters (`text/plain; charset=utf-8` -> `text/plain`)
fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn normalize_ext_pattern(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.');
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}
