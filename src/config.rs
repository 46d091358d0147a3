//! Extractor configuration
//!
//! Selection parameters for turning records into batches. Values can be built
//! in code, loaded from JSON, or overridden from the command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::LoaderError;

/// Default number of days admitted before the window anchor
pub const DEFAULT_WINDOW_DAYS_BEFORE: i64 = 10;

/// Default number of days admitted after the window anchor
pub const DEFAULT_WINDOW_DAYS_AFTER: i64 = 0;

/// Largest window offset accepted in either direction (about a century)
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Configuration for [`crate::ExposureBatchExtractor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Record store to read; only used when the extractor opens a file itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    /// Admit UNCONFIRMED exposures as well as CONFIRMED ones
    pub include_unconfirmed_exposures: bool,
    /// Center the window on the infection onset instead of the test time
    pub window_around_infection_onset: bool,
    /// Inclusive offset in days before the anchor
    pub window_days_before_anchor: i64,
    /// Inclusive offset in days after the anchor
    pub window_days_after_anchor: i64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            source_path: None,
            include_unconfirmed_exposures: false,
            window_around_infection_onset: false,
            window_days_before_anchor: DEFAULT_WINDOW_DAYS_BEFORE,
            window_days_after_anchor: DEFAULT_WINDOW_DAYS_AFTER,
        }
    }
}

impl ExtractorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_unconfirmed_exposures(mut self, include: bool) -> Self {
        self.include_unconfirmed_exposures = include;
        self
    }

    pub fn with_window_around_infection_onset(mut self, enabled: bool) -> Self {
        self.window_around_infection_onset = enabled;
        self
    }

    pub fn with_window_days(mut self, before_anchor: i64, after_anchor: i64) -> Self {
        self.window_days_before_anchor = before_anchor;
        self.window_days_after_anchor = after_anchor;
        self
    }

    /// Parse a configuration from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self, LoaderError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self, LoaderError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, LoaderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject windows that are inverted or absurdly wide
    pub fn validate(&self) -> Result<(), LoaderError> {
        for (name, days) in [
            ("window_days_before_anchor", self.window_days_before_anchor),
            ("window_days_after_anchor", self.window_days_after_anchor),
        ] {
            if !(-MAX_WINDOW_DAYS..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(LoaderError::InvalidConfig(format!(
                    "{name} is {days}, limit is {MAX_WINDOW_DAYS} days"
                )));
            }
        }

        if self.window_days_before_anchor + self.window_days_after_anchor < 0 {
            return Err(LoaderError::InvalidConfig(format!(
                "window is inverted: {} days before and {} days after the anchor",
                self.window_days_before_anchor, self.window_days_after_anchor
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractorConfig::default();
        assert!(!config.include_unconfirmed_exposures);
        assert!(!config.window_around_infection_onset);
        assert_eq!(config.window_days_before_anchor, 10);
        assert_eq!(config.window_days_after_anchor, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = ExtractorConfig::from_json(
            r#"{"include_unconfirmed_exposures": true, "window_days_after_anchor": 2}"#,
        )
        .unwrap();

        assert!(config.include_unconfirmed_exposures);
        assert_eq!(config.window_days_before_anchor, 10);
        assert_eq!(config.window_days_after_anchor, 2);
        assert_eq!(config.source_path, None);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ExtractorConfig::new()
            .with_source_path("/data/exposures.rec")
            .with_window_around_infection_onset(true)
            .with_window_days(5, 3);

        let restored = ExtractorConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let config = ExtractorConfig::new().with_window_days(-3, 1);
        assert!(matches!(
            config.validate(),
            Err(LoaderError::InvalidConfig(_))
        ));

        // A window entirely before the anchor is still well formed
        let config = ExtractorConfig::new().with_window_days(10, -2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_window_rejected() {
        let config = ExtractorConfig::new().with_window_days(MAX_WINDOW_DAYS + 1, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extreme_offsets_rejected() {
        let json = format!(r#"{{"window_days_before_anchor": {}}}"#, i64::MIN);
        assert!(matches!(
            ExtractorConfig::from_json(&json),
            Err(LoaderError::InvalidConfig(_))
        ));

        let config = ExtractorConfig::new().with_window_days(0, i64::MAX);
        assert!(matches!(
            config.validate(),
            Err(LoaderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(ExtractorConfig::from_json("not json").is_err());
    }
}
