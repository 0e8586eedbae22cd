// Provider entry: one configured LLM endpoint

use serde::{Deserialize, Serialize};

/// A single provider entry.
///
/// Serializes with a `type` tag, e.g.:
/// ```toml
/// [[providers]]
/// type = "gemini"
/// api_key = "AIza..."
///
/// [[providers]]
/// type = "groq"
/// api_key = "gsk_..."
/// model = "meta-llama/llama-4-scout-17b-16e-instruct"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderEntry {
    Gemini {
        #[serde(default)]
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Groq {
        #[serde(default)]
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Openai {
        #[serde(default)]
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ProviderEntry {
    /// Entry for `provider_type` with only a key set.
    pub fn from_key(provider_type: &str, api_key: String) -> Option<Self> {
        let entry = match provider_type {
            "gemini" => Self::Gemini {
                api_key,
                model: None,
                base_url: None,
                name: None,
            },
            "groq" => Self::Groq {
                api_key,
                model: None,
                base_url: None,
                name: None,
            },
            "openai" => Self::Openai {
                api_key,
                model: None,
                base_url: None,
                name: None,
            },
            _ => return None,
        };
        Some(entry)
    }

    /// Human-readable name for display.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini { name, .. } => name.as_deref().unwrap_or("Gemini"),
            Self::Groq { name, .. } => name.as_deref().unwrap_or("Groq"),
            Self::Openai { name, .. } => name.as_deref().unwrap_or("OpenAI"),
        }
    }

    /// Short provider-type tag (e.g. "gemini", "groq").
    pub fn provider_type(&self) -> &'static str {
        match self {
            Self::Gemini { .. } => "gemini",
            Self::Groq { .. } => "groq",
            Self::Openai { .. } => "openai",
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            Self::Gemini { api_key, .. } | Self::Groq { api_key, .. } | Self::Openai { api_key, .. } => {
                api_key
            }
        }
    }

    /// Replace the API key (e.g. one corrected at runtime).
    pub fn set_api_key(&mut self, key: impl Into<String>) {
        match self {
            Self::Gemini { api_key, .. } | Self::Groq { api_key, .. } | Self::Openai { api_key, .. } => {
                *api_key = key.into();
            }
        }
    }

    /// Optional model override.
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Gemini { model, .. } | Self::Groq { model, .. } | Self::Openai { model, .. } => {
                model.as_deref()
            }
        }
    }

    pub fn set_model(&mut self, new_model: impl Into<String>) {
        match self {
            Self::Gemini { model, .. } | Self::Groq { model, .. } | Self::Openai { model, .. } => {
                *model = Some(new_model.into());
            }
        }
    }

    /// Whether `selector` names this entry, by type tag or display name.
    pub fn matches(&self, selector: &str) -> bool {
        self.provider_type().eq_ignore_ascii_case(selector) || self.display_name().eq_ignore_ascii_case(selector)
    }
}
