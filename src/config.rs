use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Env var that points at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "TRANSCRIBE_MP3_CONFIG";
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
pub const BUCKET_ENV: &str = "GS_BUCKET";
pub const LANGUAGE_ENV: &str = "GCLOUD_ML_SPEECH_LANG";

pub const DEFAULT_LANGUAGE_CODE: &str = "th";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cloud: CloudConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Google Cloud project id (or set GOOGLE_CLOUD_PROJECT).
    pub project: Option<String>,
    /// Cloud Storage bucket name, without the `gs://` prefix (or set GS_BUCKET).
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub language_code: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
        }
    }
}

/// Fully resolved settings handed to the pipeline at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub project: String,
    pub bucket: String,
    pub language_code: String,
}

// --- Config loading ---

impl Config {
    /// Load config and return the resolved file path (if any).
    pub fn load_with_path(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        // 1. Check explicit path
        if let Some(p) = path {
            let config = Self::read_file(p)?;
            return Ok((config, Some(p.to_path_buf())));
        }

        // 2. Check beside the executable
        if let Ok(exe_path) = std::env::current_exe() {
            let beside_exe = exe_path.parent().map(|p| p.join("transcribe-mp3.toml"));
            if let Some(p) = beside_exe {
                if p.exists() {
                    let config = Self::read_file(&p)?;
                    return Ok((config, Some(p)));
                }
            }
        }

        // 3. Check platform config directory (e.g. ~/.config/transcribe-mp3/config.toml)
        if let Some(config_dir) = dirs::config_dir() {
            let platform_config = config_dir.join("transcribe-mp3").join("config.toml");
            if platform_config.exists() {
                let config = Self::read_file(&platform_config)?;
                return Ok((config, Some(platform_config)));
            }
        }

        // 4. Fall back to defaults
        tracing::debug!("No config file found, using defaults");
        Ok((Config::default(), None))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_path(path).map(|(config, _)| config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay environment variables on top of file values. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(project) = get(PROJECT_ENV) {
            self.cloud.project = Some(project);
        }
        if let Some(bucket) = get(BUCKET_ENV) {
            self.cloud.bucket = Some(bucket);
        }
        if let Some(lang) = get(LANGUAGE_ENV) {
            self.speech.language_code = lang;
        }
    }

    /// Check that the required settings are present.
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let project = present(&self.cloud.project).ok_or_else(|| {
            Error::UserInput(format!(
                "FAIL: No {PROJECT_ENV} environment variable set\n\
                 HOW TO FIX - Run this and try again:\n  \
                 gcloud config set project <project-id>"
            ))
        })?;

        let bucket = present(&self.cloud.bucket).ok_or_else(|| {
            Error::UserInput(format!(
                "FAIL: No {BUCKET_ENV} environment variable set\n\
                 HOW TO FIX - Run this and try again:\n  \
                 export {BUCKET_ENV}=<bucket>"
            ))
        })?;

        let language_code = if self.speech.language_code.trim().is_empty() {
            DEFAULT_LANGUAGE_CODE.to_string()
        } else {
            self.speech.language_code.clone()
        };

        Ok(PipelineConfig {
            project,
            bucket,
            language_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.cloud.project.is_none());
        assert!(config.cloud.bucket.is_none());
        assert_eq!(config.speech.language_code, "th");
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_str = r#"
            [cloud]
            project = "acme-speech"
            bucket = "acme-audio"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.cloud.project.as_deref(), Some("acme-speech"));
        assert_eq!(config.cloud.bucket.as_deref(), Some("acme-audio"));
        // Defaults still applied for unspecified sections
        assert_eq!(config.speech.language_code, "th");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config: Config = toml::from_str(
            r#"
            [cloud]
            project = "from-file"
            bucket = "file-bucket"

            [speech]
            language_code = "en-US"
            "#,
        )
        .unwrap();
        config.apply_env(env(&[
            ("GOOGLE_CLOUD_PROJECT", "from-env"),
            ("GCLOUD_ML_SPEECH_LANG", "ja-JP"),
        ]));

        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.project, "from-env");
        assert_eq!(resolved.bucket, "file-bucket");
        assert_eq!(resolved.language_code, "ja-JP");
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let mut config = Config::default();
        config.cloud.bucket = Some("kept".into());
        config.apply_env(env(&[("GS_BUCKET", "  ")]));
        assert_eq!(config.cloud.bucket.as_deref(), Some("kept"));
    }

    #[test]
    fn test_resolve_missing_project() {
        let mut config = Config::default();
        config.apply_env(env(&[("GS_BUCKET", "mybucket")]));
        let err = config.resolve().unwrap_err().to_string();
        assert!(err.starts_with("FAIL: No GOOGLE_CLOUD_PROJECT environment variable set"));
        assert!(err.contains("gcloud config set project <project-id>"));
    }

    #[test]
    fn test_resolve_missing_bucket() {
        let mut config = Config::default();
        config.apply_env(env(&[("GOOGLE_CLOUD_PROJECT", "p")]));
        let err = config.resolve().unwrap_err().to_string();
        assert!(err.starts_with("FAIL: No GS_BUCKET environment variable set"));
        assert!(err.contains("export GS_BUCKET=<bucket>"));
    }

    #[test]
    fn test_resolve_blank_language_falls_back_to_default() {
        let mut config = Config::default();
        config.cloud.project = Some("p".into());
        config.cloud.bucket = Some("b".into());
        config.speech.language_code = String::new();
        assert_eq!(config.resolve().unwrap().language_code, "th");
    }

    #[test]
    fn test_load_nonexistent_path_errors() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml_reports_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config_file = tmp.path().join("transcribe-mp3.toml");
        std::fs::write(&config_file, "[cloud\nproject = ").unwrap();

        let err = Config::load(Some(config_file.as_path())).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("transcribe-mp3.toml"));
    }

    #[test]
    fn test_load_with_path_returns_resolved_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config_file = tmp.path().join("transcribe-mp3.toml");
        std::fs::write(&config_file, "[speech]\nlanguage_code = \"de-DE\"\n").unwrap();

        let (config, resolved) = Config::load_with_path(Some(config_file.as_path())).unwrap();
        assert_eq!(config.speech.language_code, "de-DE");
        assert_eq!(resolved, Some(config_file));
    }
}
