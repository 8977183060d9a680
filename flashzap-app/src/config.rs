use anyhow::{bail, Context, Result};
use flashzap_core::{IntervalModel, ReviewPolicy};
use flashzap_grader::GraderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    /// Interval model, e.g. `kind = "exponential"` with `growth_rate`, or
    /// `kind = "table"` with `days`.
    pub srs: IntervalModel,
    pub review: ReviewSettings,
    pub grader: GraderConfig,
    pub api: ApiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            srs: IntervalModel::default(),
            review: ReviewSettings::default(),
            grader: GraderConfig::default(),
            api: ApiSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    pub shuffle: bool,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self { shuffle: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub addr: String,
    /// Idle review sessions are dropped after this long.
    pub session_ttl_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            session_ttl_secs: 30 * 60,
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file, then environment variables.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => match flashzap_json::paths::config_file() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("FLASHZAP_LOG") {
            self.log_level = v;
        }
        if let Some(rate) = var("FLASHZAP_GROWTH_RATE").and_then(|v| v.trim().parse::<f64>().ok()) {
            self.srs = IntervalModel::Exponential { growth_rate: rate };
        }
        if let Some(v) = var("FLASHZAP_SHUFFLE") {
            self.review.shuffle = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = var("GEMINI_API_KEY") {
            self.grader.api_key = Some(v);
        }
        if let Some(v) = var("FLASHZAP_GRADER_MODEL") {
            self.grader.model = v;
        }
        if let Some(v) = var("FLASHZAP_GRADER_ENDPOINT") {
            self.grader.endpoint = v;
        }
        if let Some(secs) = var("FLASHZAP_GRADER_TIMEOUT").and_then(|v| v.trim().parse().ok()) {
            self.grader.timeout_secs = secs;
        }
        if let Some(v) = var("FLASHZAP_API_ADDR") {
            self.api.addr = v;
        }
        if let Some(secs) = var("FLASHZAP_SESSION_TTL").and_then(|v| v.trim().parse().ok()) {
            self.api.session_ttl_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.srs.validate()?;
        if self.api.session_ttl_secs == 0 {
            bail!("api.session_ttl_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn review_policy(&self) -> ReviewPolicy {
        ReviewPolicy {
            model: self.srs.clone(),
            shuffle: self.review.shuffle,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.api.session_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_gives_defaults() {
        let s = Settings::from_toml("").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.srs, IntervalModel::Exponential { growth_rate: 0.1 });
        assert!(s.review.shuffle);
        assert_eq!(s.grader.model, flashzap_grader::DEFAULT_MODEL);
    }

    #[test]
    fn table_model_from_toml() {
        let s = Settings::from_toml(
            r#"
            log_level = "debug"

            [srs]
            kind = "table"
            days = [0, 1, 3, 7, 14]

            [review]
            shuffle = false
            "#,
        )
        .unwrap();
        assert_eq!(s.log_level, "debug");
        assert_eq!(s.srs, IntervalModel::Table { days: vec![0, 1, 3, 7, 14] });
        assert!(!s.review_policy().shuffle);
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GEMINI_API_KEY", "secret"),
            ("FLASHZAP_GROWTH_RATE", "0.25"),
            ("FLASHZAP_SHUFFLE", "false"),
            ("FLASHZAP_GRADER_MODEL", "   "),
            ("FLASHZAP_SESSION_TTL", "60"),
        ]);
        let mut s = Settings::default();
        s.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.grader.api_key.as_deref(), Some("secret"));
        assert_eq!(s.srs, IntervalModel::Exponential { growth_rate: 0.25 });
        assert!(!s.review.shuffle);
        assert_eq!(s.grader.model, flashzap_grader::DEFAULT_MODEL);
        assert_eq!(s.session_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut s = Settings::default();
        s.srs = IntervalModel::Exponential { growth_rate: -1.0 };
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.api.session_ttl_secs = 0;
        assert!(s.validate().is_err());

        assert!(Settings::from_toml("[srs]\nkind = \"fibonacci\"").is_err());
    }
}
