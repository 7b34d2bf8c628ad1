//! Operation arguments for entry logging, with redaction.

use std::fmt;

/// Name fragments that are always redacted, whatever the config says
const ALWAYS_REDACTED: &[&str] = &["secret", "key", "token", "password", "credential"];

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArgValue {
    Shown(String),
    Redacted,
}

/// Ordered `(name, rendered value)` list describing one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgList {
    entries: Vec<(&'static str, ArgValue)>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument rendered with `Display`
    pub fn arg(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.entries.push((name, ArgValue::Shown(value.to_string())));
        self
    }

    /// Adds an argument rendered with `Debug`
    pub fn debug(mut self, name: &'static str, value: impl fmt::Debug) -> Self {
        self.entries
            .push((name, ArgValue::Shown(format!("{:?}", value))));
        self
    }

    /// Adds an argument whose value is never rendered
    pub fn redacted(mut self, name: &'static str) -> Self {
        self.entries.push((name, ArgValue::Redacted));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Renders `name=value` pairs, redacting sensitive names and `extra_redacted`
    pub fn render(&self, extra_redacted: &[String]) -> String {
        self.entries
            .iter()
            .map(|(name, value)| {
                let shown = match value {
                    ArgValue::Shown(v) if !is_sensitive(name, extra_redacted) => v.as_str(),
                    _ => REDACTED,
                };
                format!("{}={}", name, shown)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn is_sensitive(name: &str, extra_redacted: &[String]) -> bool {
    let lowered = name.to_ascii_lowercase();
    ALWAYS_REDACTED.iter().any(|frag| lowered.contains(frag))
        || extra_redacted
            .iter()
            .any(|extra| extra.eq_ignore_ascii_case(name))
}
