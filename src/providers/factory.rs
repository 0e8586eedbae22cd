// Provider factory
//
// Creates LLM providers from configuration entries

use anyhow::{Context, Result};
use std::sync::Arc;

use super::gemini::GeminiProvider;
use super::openai::OpenAIProvider;
use super::LlmProvider;
use crate::config::ProviderEntry;

/// Create an `LlmProvider` from a configured `ProviderEntry`.
///
/// A blank API key is accepted here; the session reports it when it tries
/// to initialize, so the student can correct it without restarting.
pub fn create_provider_from_entry(entry: &ProviderEntry) -> Result<Arc<dyn LlmProvider>> {
    match entry {
        ProviderEntry::Gemini {
            api_key,
            model,
            base_url,
            ..
        } => {
            let mut provider = GeminiProvider::new(api_key.clone())
                .context("Failed to create Gemini provider")?;
            if let Some(m) = model {
                provider = provider.with_model(m.clone());
            }
            if let Some(url) = base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Arc::new(provider))
        }

        ProviderEntry::Groq {
            api_key,
            model,
            base_url,
            ..
        } => {
            let mut provider = OpenAIProvider::new_groq(api_key.clone())
                .context("Failed to create Groq provider")?;
            if let Some(m) = model {
                provider = provider.with_model(m.clone());
            }
            if let Some(url) = base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Arc::new(provider))
        }

        ProviderEntry::Openai {
            api_key,
            model,
            base_url,
            ..
        } => {
            let mut provider = OpenAIProvider::new_openai(api_key.clone())
                .context("Failed to create OpenAI provider")?;
            if let Some(m) = model {
                provider = provider.with_model(m.clone());
            }
            if let Some(url) = base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Arc::new(provider))
        }
    }
}
