//! Layered retry configuration loader
//!
//! Loads retry settings from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Project file (`rebound.yaml` in the loader's directory) or an explicit path
//! 3. Environment variables (REBOUND_* prefix), applied to every profile
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::{RetryProfile, RetrySettings};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use std::env;
use std::fs;

/// File name looked up in the loader's directory
pub const CONFIG_FILE_NAME: &str = "rebound.yaml";

const EMBEDDED_DEFAULTS: &str = "retry-defaults.yaml";

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/embedded/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Retry configuration loader
pub struct RetryConfigLoader {
    /// Directory searched for `rebound.yaml`
    config_dir: Utf8PathBuf,
}

impl RetryConfigLoader {
    /// Create a loader rooted at the current working directory
    pub fn new() -> Result<Self> {
        let cwd = env::current_dir()?;
        let config_dir = Utf8PathBuf::try_from(cwd)
            .map_err(|_| Error::invalid_config("Current directory is not valid UTF-8"))?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Load settings: embedded defaults, then `rebound.yaml` if present, then env
    pub fn load(&self) -> Result<RetrySettings> {
        let mut settings = Self::load_embedded()?;

        let config_path = self.config_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            tracing::debug!("Loading retry config from {}", config_path);
            let file_settings = Self::load_yaml_file(&config_path)?;
            settings = Self::merge(settings, file_settings);
        }

        Self::apply_env_overrides(settings)
    }

    /// Load settings from an explicit file instead of `rebound.yaml`
    ///
    /// A missing file is an error here, unlike the directory lookup in `load`.
    pub fn load_file(&self, path: &Utf8Path) -> Result<RetrySettings> {
        if !path.exists() {
            return Err(Error::config_not_found(path.as_str()));
        }

        let file_settings = Self::load_yaml_file(path)?;
        let settings = Self::merge(Self::load_embedded()?, file_settings);
        Self::apply_env_overrides(settings)
    }

    /// Settings compiled into the binary
    pub fn load_embedded() -> Result<RetrySettings> {
        let embedded_file = EmbeddedConfigs::get(EMBEDDED_DEFAULTS).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", EMBEDDED_DEFAULTS))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!(
                "Invalid UTF-8 in embedded config: {}",
                EMBEDDED_DEFAULTS
            ))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                EMBEDDED_DEFAULTS, e
            ))
        })
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(path: &Utf8Path) -> Result<RetrySettings> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml_ng::from_str(&content)?)
    }

    /// Merge two settings (base is overridden by overlay)
    fn merge(mut base: RetrySettings, overlay: RetrySettings) -> RetrySettings {
        for (name, profile) in overlay.profiles {
            base.profiles.insert(name, profile);
        }
        base.default = overlay.default;
        base
    }

    /// Apply environment variable overrides to the default and every named profile
    fn apply_env_overrides(mut settings: RetrySettings) -> Result<RetrySettings> {
        let overrides = EnvOverrides::from_env()?;
        if overrides.is_empty() {
            return Ok(settings);
        }

        tracing::debug!("Applying REBOUND_* overrides to all retry profiles");
        overrides.apply(&mut settings.default);
        for profile in settings.profiles.values_mut() {
            overrides.apply(profile);
        }
        Ok(settings)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

/// REBOUND_* values, parsed once and applied to each profile
#[derive(Debug, Default)]
struct EnvOverrides {
    max_attempts: Option<u32>,
    initial_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    multiplier: Option<f64>,
    jitter: Option<bool>,
}

impl EnvOverrides {
    fn from_env() -> Result<Self> {
        Ok(Self {
            max_attempts: parse_env("REBOUND_MAX_ATTEMPTS", "a valid number")?,
            initial_delay_ms: parse_env("REBOUND_INITIAL_DELAY_MS", "a valid number")?,
            max_delay_ms: parse_env("REBOUND_MAX_DELAY_MS", "a valid number")?,
            multiplier: parse_env("REBOUND_MULTIPLIER", "a valid number")?,
            jitter: parse_env("REBOUND_JITTER", "true or false")?,
        })
    }

    fn is_empty(&self) -> bool {
        self.max_attempts.is_none()
            && self.initial_delay_ms.is_none()
            && self.max_delay_ms.is_none()
            && self.multiplier.is_none()
            && self.jitter.is_none()
    }

    fn apply(&self, profile: &mut RetryProfile) {
        if let Some(max_attempts) = self.max_attempts {
            profile.max_attempts = max_attempts;
        }
        if let Some(initial_delay_ms) = self.initial_delay_ms {
            profile.backoff.initial_delay_ms = initial_delay_ms;
        }
        if let Some(max_delay_ms) = self.max_delay_ms {
            profile.backoff.max_delay_ms = max_delay_ms;
        }
        if let Some(multiplier) = self.multiplier {
            profile.backoff.multiplier = multiplier;
        }
        if let Some(jitter) = self.jitter {
            profile.backoff.jitter = jitter;
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} must be {}", key, expected))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BackoffStrategy;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_KEYS: [&str; 5] = [
        "REBOUND_MAX_ATTEMPTS",
        "REBOUND_INITIAL_DELAY_MS",
        "REBOUND_MAX_DELAY_MS",
        "REBOUND_MULTIPLIER",
        "REBOUND_JITTER",
    ];

    fn create_temp_loader() -> (RetryConfigLoader, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_dir =
            Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).expect("Invalid UTF-8 path");
        let loader = RetryConfigLoader::with_dir(config_dir);
        (loader, temp_dir)
    }

    fn clear_env() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_load_embedded_defaults() {
        clear_env();
        let (loader, _temp) = create_temp_loader();
        let settings = loader.load().unwrap();

        assert_eq!(settings.default.max_attempts, 3);
        assert_eq!(settings.default.backoff.strategy, BackoffStrategy::Exponential);

        let imperative = settings.profile("imperative");
        assert_eq!(imperative.max_attempts, 5);
        assert_eq!(imperative.retry_on, vec!["illegal-argument".to_string()]);
        assert_eq!(imperative.backoff.max_delay_ms, 7000);

        assert!(settings.profiles.contains_key("flaky"));
        assert!(settings.profile("flaky").backoff.jitter);
    }

    #[test]
    #[serial]
    fn test_load_from_project_file() {
        clear_env();
        let (loader, _temp) = create_temp_loader();

        let config_content = r#"
default:
  max-attempts: 7
profiles:
  basic:
    max-attempts: 2
    backoff:
      strategy: none
  custom:
    no-retry-on: [arithmetic]
"#;
        fs::write(loader.config_dir().join(CONFIG_FILE_NAME), config_content).unwrap();

        let settings = loader.load().unwrap();
        assert_eq!(settings.default.max_attempts, 7);
        assert_eq!(settings.profile("basic").max_attempts, 2);
        assert_eq!(settings.profile("basic").backoff.strategy, BackoffStrategy::None);
        assert_eq!(settings.profile("custom").no_retry_on, vec!["arithmetic".to_string()]);
        // untouched embedded profiles survive the merge
        assert_eq!(settings.profile("imperative").max_attempts, 5);
    }

    #[test]
    #[serial]
    fn test_load_explicit_file() {
        clear_env();
        let (loader, temp) = create_temp_loader();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("custom.yaml")).unwrap();
        fs::write(&path, "profiles:\n  fast:\n    max-attempts: 10\n").unwrap();

        let settings = loader.load_file(&path).unwrap();
        assert_eq!(settings.profile("fast").max_attempts, 10);
    }

    #[test]
    fn test_load_explicit_file_missing() {
        let (loader, _temp) = create_temp_loader();
        let result = loader.load_file(Utf8Path::new("/tmp/nonexistent-rebound-12345.yaml"));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    #[serial]
    fn test_invalid_yaml_is_reported() {
        clear_env();
        let (loader, _temp) = create_temp_loader();
        fs::write(
            loader.config_dir().join(CONFIG_FILE_NAME),
            "default:\n  max-attempts: [not, a, number]\n",
        )
        .unwrap();

        let result = loader.load();
        assert!(matches!(result, Err(Error::YamlParse(_))));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("REBOUND_MAX_ATTEMPTS", "9");
        env::set_var("REBOUND_INITIAL_DELAY_MS", "10");
        env::set_var("REBOUND_MAX_DELAY_MS", "50");
        env::set_var("REBOUND_MULTIPLIER", "1.5");
        env::set_var("REBOUND_JITTER", "true");

        let settings = loader.load().unwrap();
        assert_eq!(settings.default.max_attempts, 9);
        assert_eq!(settings.default.backoff.initial_delay_ms, 10);
        assert_eq!(settings.default.backoff.max_delay_ms, 50);
        assert_eq!(settings.default.backoff.multiplier, 1.5);
        assert!(settings.default.backoff.jitter);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_reach_named_profiles() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("REBOUND_MAX_ATTEMPTS", "2");
        env::set_var("REBOUND_INITIAL_DELAY_MS", "1");
        env::set_var("REBOUND_MAX_DELAY_MS", "1");

        let settings = loader.load();
        clear_env();
        let settings = settings.unwrap();

        let recover = settings.profile("recover");
        assert_eq!(recover.max_attempts, 2);
        assert_eq!(recover.backoff.initial_delay_ms, 1);
        assert_eq!(recover.backoff.max_delay_ms, 1);
        // fields without an override keep the profile's own value
        assert_eq!(recover.retry_on, vec!["arithmetic".to_string()]);
        assert_eq!(recover.backoff.strategy, BackoffStrategy::Fixed);

        let imperative = settings.profile("imperative");
        assert_eq!(imperative.max_attempts, 2);
        assert_eq!(imperative.backoff.multiplier, 2.0);
    }

    #[test]
    #[serial]
    fn test_env_overrides_apply_after_explicit_file() {
        let (loader, temp) = create_temp_loader();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("custom.yaml")).unwrap();
        fs::write(&path, "profiles:\n  fast:\n    max-attempts: 10\n").unwrap();

        env::set_var("REBOUND_JITTER", "true");
        let settings = loader.load_file(&path);
        clear_env();

        let fast = settings.unwrap().profile("fast").clone();
        assert_eq!(fast.max_attempts, 10);
        assert!(fast.backoff.jitter);
    }

    #[test]
    #[serial]
    fn test_malformed_env_value() {
        let (loader, _temp) = create_temp_loader();

        env::set_var("REBOUND_MAX_ATTEMPTS", "lots");
        let result = loader.load();
        clear_env();

        match result {
            Err(Error::InvalidConfig { message }) => {
                assert!(message.contains("REBOUND_MAX_ATTEMPTS"))
            }
            other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_merge_replaces_default_and_merges_profiles() {
        let base = RetryConfigLoader::load_embedded().unwrap();
        let mut overlay = RetrySettings::default();
        overlay.default.max_attempts = 11;

        let merged = RetryConfigLoader::merge(base, overlay);
        assert_eq!(merged.default.max_attempts, 11);
        assert!(merged.profiles.contains_key("basic"));
    }
}
