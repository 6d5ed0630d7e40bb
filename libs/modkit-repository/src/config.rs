//! Repository configuration.
//!
//! Loaded leniently from a `figment` section: a missing section yields the
//! defaults, a present but malformed one is an error.

use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::assembler::Role;
use crate::dialect::DialectKind;
use crate::{RepositoryError, Result};

/// Section name used by [`RepositoryConfig::load`].
pub const DEFAULT_SECTION: &str = "repository";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RepositoryConfig {
    /// Explicit dialect; takes precedence over detection.
    pub dialect: Option<DialectKind>,
    /// Connection string; its scheme names the dialect when `dialect` is unset.
    pub dsn: Option<String>,
}

impl RepositoryConfig {
    /// Extract the config under `section`, or the defaults when the section is absent.
    ///
    /// # Errors
    /// Returns `RepositoryError::Config` if the section exists but cannot be parsed.
    pub fn from_figment(figment: &Figment, section: &str) -> Result<Self> {
        if !figment.contains(section) {
            return Ok(Self::default());
        }
        figment
            .extract_inner(section)
            .map_err(|e| RepositoryError::Config(Box::new(e)))
    }

    /// [`from_figment`](Self::from_figment) with the `repository` section.
    ///
    /// # Errors
    /// Returns `RepositoryError::Config` if the section cannot be parsed.
    pub fn load(figment: &Figment) -> Result<Self> {
        Self::from_figment(figment, DEFAULT_SECTION)
    }

    /// The dialect this config names, if any.
    ///
    /// # Errors
    /// - `InvalidOverride` if the DSN is blank or disagrees with `dialect`
    /// - `UnsupportedDialect` if the DSN scheme is unknown
    pub fn dialect_kind(&self) -> Result<Option<DialectKind>> {
        let from_dsn = match self.dsn.as_deref() {
            Some(dsn) if dsn.trim().is_empty() => {
                return Err(RepositoryError::invalid_override(Role::Dialect, "dsn is blank"));
            }
            Some(dsn) => Some(DialectKind::from_dsn(dsn)?),
            None => None,
        };

        match (self.dialect, from_dsn) {
            (Some(explicit), Some(detected)) if explicit != detected => {
                Err(RepositoryError::invalid_override(
                    Role::Dialect,
                    format!("dialect '{explicit}' does not match dsn scheme '{detected}'"),
                ))
            }
            (Some(explicit), _) => Ok(Some(explicit)),
            (None, detected) => Ok(detected),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::providers::Serialized;
    use serde_json::json;

    fn figment(value: serde_json::Value) -> Figment {
        Figment::from(Serialized::defaults(value))
    }

    #[test]
    fn missing_section_yields_defaults() {
        let config = RepositoryConfig::load(&figment(json!({ "other": { "x": 1 } }))).unwrap();
        assert_eq!(config, RepositoryConfig::default());
        assert_eq!(config.dialect_kind().unwrap(), None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = RepositoryConfig::load(&figment(json!({
            "repository": { "dialect": "postgres", "pool": 4 }
        })))
        .unwrap_err();
        assert!(matches!(err, RepositoryError::Config(_)));
    }

    #[test]
    fn dsn_names_the_dialect() {
        let config = RepositoryConfig::from_figment(
            &figment(json!({ "db": { "dsn": "mysql://root@localhost/app" } })),
            "db",
        )
        .unwrap();
        assert_eq!(config.dialect_kind().unwrap(), Some(DialectKind::MySql));
    }

    #[test]
    fn conflicting_dialect_and_dsn_is_invalid() {
        let config = RepositoryConfig {
            dialect: Some(DialectKind::Postgres),
            dsn: Some("sqlite::memory:".to_owned()),
        };
        let err = config.dialect_kind().unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InvalidOverride {
                role: Role::Dialect,
                ..
            }
        ));
    }

    #[test]
    fn blank_and_unknown_dsn() {
        let blank = RepositoryConfig {
            dialect: None,
            dsn: Some("  ".to_owned()),
        };
        assert!(matches!(
            blank.dialect_kind().unwrap_err(),
            RepositoryError::InvalidOverride { .. }
        ));

        let unknown = RepositoryConfig {
            dialect: None,
            dsn: Some("oracle://db".to_owned()),
        };
        assert!(matches!(
            unknown.dialect_kind().unwrap_err(),
            RepositoryError::UnsupportedDialect { .. }
        ));
    }
}
