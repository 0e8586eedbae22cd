// Configuration structs

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::constants::{DEFAULT_MAX_TOKENS, DEFAULT_PROVIDER, VALID_PROVIDERS};
use super::provider::ProviderEntry;

/// Generation settings applied to every tutor request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TutorSettings {
    /// Maximum tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for TutorSettings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Configured providers, in file order
    pub providers: Vec<ProviderEntry>,

    /// Provider selected by type tag or display name (first entry when unset)
    pub active_provider: Option<String>,

    /// Stream replies as they are generated (default: true)
    pub streaming_enabled: bool,

    pub tutor: TutorSettings,

    /// File the configuration was read from, if any
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_providers(Vec::new())
    }
}

impl Config {
    pub fn with_providers(providers: Vec<ProviderEntry>) -> Self {
        Self {
            providers,
            active_provider: None,
            streaming_enabled: true,
            tutor: TutorSettings::default(),
            source: None,
        }
    }

    /// The entry the session should use.
    pub fn active_entry(&self) -> Option<&ProviderEntry> {
        match &self.active_provider {
            Some(selector) => self.providers.iter().find(|p| p.matches(selector)),
            None => self.providers.first(),
        }
    }

    pub fn active_entry_mut(&mut self) -> Option<&mut ProviderEntry> {
        match self.active_provider.clone() {
            Some(selector) => self.providers.iter_mut().find(|p| p.matches(&selector)),
            None => self.providers.first_mut(),
        }
    }

    /// Select a provider by type, adding a keyless entry when none exists
    /// yet so the session can report the missing credential.
    pub fn select_provider(&mut self, selector: &str) -> Result<()> {
        let selector = selector.trim();
        if !self.providers.iter().any(|p| p.matches(selector)) {
            let lowered = selector.to_ascii_lowercase();
            match ProviderEntry::from_key(&lowered, String::new()) {
                Some(entry) => self.providers.push(entry),
                None => bail!(
                    "Unknown provider '{}'\n\nValid providers: {}",
                    selector,
                    VALID_PROVIDERS.join(", ")
                ),
            }
        }
        self.active_provider = Some(selector.to_string());
        Ok(())
    }

    /// Make sure some provider entry exists.
    pub fn ensure_provider(&mut self) {
        if self.providers.is_empty() {
            if let Some(entry) = ProviderEntry::from_key(DEFAULT_PROVIDER, String::new()) {
                self.providers.push(entry);
            }
        }
    }

    /// Validate configuration
    ///
    /// Blank API keys are allowed: the session starts uninitialized and asks
    /// for a key instead of refusing to launch.
    pub fn validate(&self) -> Result<()> {
        if self.tutor.max_tokens == 0 {
            bail!("tutor.max_tokens must be greater than zero");
        }

        if let Some(t) = self.tutor.temperature {
            if !(0.0..=2.0).contains(&t) {
                bail!("tutor.temperature must be between 0.0 and 2.0 (got {})", t);
            }
        }

        if let Some(selector) = &self.active_provider {
            if !self.providers.iter().any(|p| p.matches(selector)) {
                let configured: Vec<&str> = self.providers.iter().map(|p| p.display_name()).collect();
                bail!(
                    "Active provider '{}' is not configured\n\nConfigured providers: {}",
                    selector,
                    if configured.is_empty() {
                        "(none)".to_string()
                    } else {
                        configured.join(", ")
                    }
                );
            }
        }

        for (idx, entry) in self.providers.iter().enumerate() {
            if let Some(model) = entry.model() {
                if model.trim().is_empty() {
                    bail!("providers[{}] ({}) has an empty model name", idx, entry.display_name());
                }
            }
        }

        Ok(())
    }
}
