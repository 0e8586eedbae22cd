// Configuration loader
// Loads provider keys from ~/.matetutor/config.toml and environment variables

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, ENV_GEMINI_API_KEY, ENV_GROQ_API_KEY, ENV_OPENAI_API_KEY,
    ENV_PROVIDER,
};
use super::provider::ProviderEntry;
use super::settings::{Config, TutorSettings};

/// Values read from the process environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub gemini_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub provider: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            gemini_api_key: var(ENV_GEMINI_API_KEY),
            groq_api_key: var(ENV_GROQ_API_KEY),
            openai_api_key: var(ENV_OPENAI_API_KEY),
            provider: var(ENV_PROVIDER),
        }
    }

    fn keys(&self) -> [(&'static str, Option<&String>); 3] {
        [
            ("gemini", self.gemini_api_key.as_ref()),
            ("groq", self.groq_api_key.as_ref()),
            ("openai", self.openai_api_key.as_ref()),
        ]
    }
}

/// Default location of the config file.
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration from the config file and environment.
///
/// `path` overrides the default location; an overridden path must exist.
/// A missing credential is not an error here: the session starts
/// uninitialized and tells the student how to provide one.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let env = EnvOverrides::from_env();
    match path {
        Some(p) => {
            if !p.exists() {
                bail!("Configuration file not found: {}", p.display());
            }
            load_config_with(Some(p), &env)
        }
        None => {
            let default = default_config_path()?;
            let existing = default.exists().then_some(default);
            load_config_with(existing.as_deref(), &env)
        }
    }
}

/// Build the configuration from an optional file and explicit environment
/// values.
pub fn load_config_with(path: Option<&Path>, env: &EnvOverrides) -> Result<Config> {
    let mut config = match path {
        Some(p) => read_config_file(p)?,
        None => Config::default(),
    };

    // Environment keys fill in what the file leaves blank; they never
    // replace a key written in the file.
    for (provider_type, key) in env.keys() {
        let Some(key) = key else { continue };
        match config
            .providers
            .iter_mut()
            .find(|p| p.provider_type() == provider_type)
        {
            Some(entry) if entry.api_key().trim().is_empty() => entry.set_api_key(key.clone()),
            Some(_) => {}
            None => {
                if let Some(entry) = ProviderEntry::from_key(provider_type, key.clone()) {
                    tracing::debug!(provider = provider_type, "Using API key from environment");
                    config.providers.push(entry);
                }
            }
        }
    }

    if let Some(provider) = &env.provider {
        config
            .select_provider(provider)
            .with_context(|| format!("Invalid {} value", ENV_PROVIDER))?;
    }

    config.ensure_provider();

    config
        .validate()
        .context("Configuration validation failed")?;

    tracing::debug!(
        source = ?config.source,
        providers = config.providers.len(),
        active = config.active_entry().map(|p| p.provider_type()).unwrap_or("none"),
        "Configuration loaded"
    );

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Config> {
    #[derive(Deserialize)]
    struct TomlConfig {
        #[serde(default)]
        active_provider: Option<String>,
        #[serde(default = "default_streaming")]
        streaming_enabled: bool,
        #[serde(default)]
        tutor: TutorSettings,
        #[serde(default)]
        providers: Vec<ProviderEntry>,
    }

    fn default_streaming() -> bool {
        true
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    let toml_config: TomlConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

    let mut config = Config::with_providers(toml_config.providers);
    config.active_provider = toml_config.active_provider;
    config.streaming_enabled = toml_config.streaming_enabled;
    config.tutor = toml_config.tutor;
    config.source = Some(path.to_path_buf());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_no_file_no_env_yields_keyless_gemini() {
        let config = load_config_with(None, &EnvOverrides::default()).unwrap();
        let active = config.active_entry().unwrap();
        assert_eq!(active.provider_type(), "gemini");
        assert_eq!(active.api_key(), "");
        assert!(config.source.is_none());
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"
            active_provider = "groq"
            streaming_enabled = false

            [tutor]
            max_tokens = 1024
            temperature = 0.4

            [[providers]]
            type = "gemini"
            api_key = "AIza-file"

            [[providers]]
            type = "groq"
            api_key = "gsk_file"
            "#,
        );
        let config = load_config_with(Some(file.path()), &EnvOverrides::default()).unwrap();

        assert!(!config.streaming_enabled);
        assert_eq!(config.tutor.max_tokens, 1024);
        assert_eq!(config.tutor.temperature, Some(0.4));
        assert_eq!(config.active_entry().unwrap().api_key(), "gsk_file");
        assert_eq!(config.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_env_key_fills_blank_file_key() {
        let file = write_config("[[providers]]\ntype = \"gemini\"\napi_key = \"\"\n");
        let env = EnvOverrides {
            gemini_api_key: Some("AIza-env".to_string()),
            ..Default::default()
        };
        let config = load_config_with(Some(file.path()), &env).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.active_entry().unwrap().api_key(), "AIza-env");
    }

    #[test]
    fn test_file_key_wins_over_env() {
        let file = write_config("[[providers]]\ntype = \"gemini\"\napi_key = \"AIza-file\"\n");
        let env = EnvOverrides {
            gemini_api_key: Some("AIza-env".to_string()),
            ..Default::default()
        };
        let config = load_config_with(Some(file.path()), &env).unwrap();
        assert_eq!(config.active_entry().unwrap().api_key(), "AIza-file");
    }

    #[test]
    fn test_env_provider_selects_groq() {
        let env = EnvOverrides {
            gemini_api_key: Some("AIza-env".to_string()),
            groq_api_key: Some("gsk_env".to_string()),
            provider: Some("groq".to_string()),
            ..Default::default()
        };
        let config = load_config_with(None, &env).unwrap();
        let active = config.active_entry().unwrap();
        assert_eq!(active.provider_type(), "groq");
        assert_eq!(active.api_key(), "gsk_env");
    }

    #[test]
    fn test_env_provider_unknown_fails() {
        let env = EnvOverrides {
            provider: Some("claude".to_string()),
            ..Default::default()
        };
        let err = load_config_with(None, &env).unwrap_err();
        assert!(format!("{:#}", err).contains("MATETUTOR_PROVIDER"));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let file = write_config("providers = [[[");
        let err = load_config_with(Some(file.path()), &EnvOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse configuration file"));
    }

    #[test]
    fn test_invalid_temperature_fails_validation() {
        let file = write_config("[tutor]\ntemperature = 9.0\n");
        assert!(load_config_with(Some(file.path()), &EnvOverrides::default()).is_err());
    }

    #[test]
    fn test_missing_override_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
