//! Property template resolution
//!
//! Task configuration values (table names, schemas, database names) may
//! reference task parameters with `{{ name }}` placeholders, e.g.
//! `orders_{{ env }}`. Resolution happens once at setup time; an unresolved
//! placeholder is a configuration error, never passed through silently.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, SyncError};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    // Compiled once; the pattern is a literal, so this cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid placeholder regex")
});

/// Task parameters used to resolve templated property values
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    values: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Resolve every `{{ name }}` placeholder in `template`.
    ///
    /// Returns the input unchanged when it contains no placeholders. Fails
    /// with a configuration error on the first placeholder that names an
    /// unknown parameter.
    pub fn resolve(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(template) {
            let whole = caps.get(0).ok_or_else(|| {
                SyncError::Internal("placeholder regex produced an empty match".to_string())
            })?;
            let name = &caps[1];

            let value = self.values.get(name).ok_or_else(|| {
                SyncError::config(format!(
                    "unknown parameter '{}' referenced in '{}'",
                    name, template
                ))
            })?;

            out.push_str(&template[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }

        out.push_str(&template[last..]);
        Ok(out)
    }
}

impl FromIterator<(String, String)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        let mut p = Parameters::new();
        p.set("env", "prod").set("region", "eu");
        p
    }

    #[test]
    fn test_resolve_plain_string_unchanged() {
        assert_eq!(params().resolve("orders").unwrap(), "orders");
    }

    #[test]
    fn test_resolve_single_placeholder() {
        assert_eq!(params().resolve("orders_{{ env }}").unwrap(), "orders_prod");
    }

    #[test]
    fn test_resolve_multiple_placeholders() {
        assert_eq!(
            params().resolve("{{region}}_{{ env }}_orders").unwrap(),
            "eu_prod_orders"
        );
    }

    #[test]
    fn test_unknown_parameter_is_config_error() {
        let err = params().resolve("orders_{{ tier }}").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert!(err.to_string().contains("tier"));
    }
}
