use serde::Deserialize;

use crate::filtering::{DEFAULT_LIMIT, MAX_LIMIT};

/// Engine-wide query defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryConfig {
    pub default_limit: u64,
    /// Capped at the hard ceiling of 100
    pub max_limit: u64,
    /// Postgres text search configuration for the `search` operator
    pub fulltext_language: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            fulltext_language: "english".to_string(),
        }
    }
}

impl QueryConfig {
    /// Read `MENUQUERY_DEFAULT_LIMIT`, `MENUQUERY_MAX_LIMIT` and
    /// `MENUQUERY_FULLTEXT_LANGUAGE`, falling back to the defaults for unset or
    /// unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) over any variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str, fallback: u64| {
            lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(fallback)
        };
        Self {
            default_limit: parse("MENUQUERY_DEFAULT_LIMIT", defaults.default_limit),
            max_limit: parse("MENUQUERY_MAX_LIMIT", defaults.max_limit),
            fulltext_language: lookup("MENUQUERY_FULLTEXT_LANGUAGE")
                .filter(|language| !language.trim().is_empty())
                .unwrap_or(defaults.fulltext_language),
        }
        .normalized()
    }

    /// Enforce `1 <= default_limit <= max_limit <= 100`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_limit = self.max_limit.clamp(1, MAX_LIMIT);
        self.default_limit = self.default_limit.clamp(1, self.max_limit);
        self
    }
}

/// `DATABASE_URL`, or an in-memory SQLite database when unset.
#[must_use]
pub fn database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_caps_limits() {
        let config = QueryConfig {
            default_limit: 500,
            max_limit: 1000,
            fulltext_language: "simple".into(),
        }
        .normalized();
        assert_eq!(config.max_limit, 100);
        assert_eq!(config.default_limit, 100);

        let zero = QueryConfig {
            default_limit: 0,
            max_limit: 0,
            ..QueryConfig::default()
        }
        .normalized();
        assert_eq!((zero.default_limit, zero.max_limit), (1, 1));
    }

    #[test]
    fn test_from_lookup_parses_and_normalizes() {
        let vars = std::collections::HashMap::from([
            ("MENUQUERY_DEFAULT_LIMIT", " 25 "),
            ("MENUQUERY_MAX_LIMIT", "20"),
            ("MENUQUERY_FULLTEXT_LANGUAGE", "simple"),
        ]);
        let config = QueryConfig::from_lookup(|key| vars.get(key).map(ToString::to_string));
        assert_eq!(config.max_limit, 20);
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.fulltext_language, "simple");

        let garbage = QueryConfig::from_lookup(|key| (key == "MENUQUERY_MAX_LIMIT").then(|| "lots".to_string()));
        assert_eq!(garbage, QueryConfig::default());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: QueryConfig = serde_json::from_str(r#"{ "maxLimit": 50 }"#).unwrap();
        assert_eq!(config.max_limit, 50);
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.fulltext_language, "english");
    }
}
