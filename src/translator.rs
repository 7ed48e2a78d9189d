//! Translation gateways.
//!
//! A [`Translator`] turns one batch of paragraphs into the same number of
//! translated paragraphs, in order. The orchestrator never inspects which
//! implementation it holds: [`build_translator`] resolves the configured
//! [`TranslatorKind`] once at startup.
//!
//! * [`LocalTranslator`]: deterministic offline stub, `"[<tgt>] <text>"`.
//!   Used by tests and for dry runs without API keys.
//! * [`RemoteTranslator`](crate::pipeline::llm::RemoteTranslator): an
//!   edgequake-llm chat provider asked for a strict JSON array.

use crate::config::{PipelineConfig, TranslatorKind};
use crate::error::BookError;
use crate::pipeline::llm::RemoteTranslator;
use async_trait::async_trait;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::info;

/// Default model for remote translation when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[async_trait]
pub trait Translator: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Translate `texts` from `src_lang` to `tgt_lang`.
    ///
    /// The result has exactly `texts.len()` items in input order, or the
    /// call fails with [`BookError::ProviderMismatch`].
    async fn translate_batch(
        &self,
        texts: &[String],
        src_lang: &str,
        tgt_lang: &str,
    ) -> Result<Vec<String>, BookError>;
}

/// Offline stub that tags each paragraph with the target language.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTranslator;

#[async_trait]
impl Translator for LocalTranslator {
    fn name(&self) -> &str {
        "local"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _src_lang: &str,
        tgt_lang: &str,
    ) -> Result<Vec<String>, BookError> {
        Ok(texts.iter().map(|t| format!("[{tgt_lang}] {t}")).collect())
    }
}

/// Resolve the configured gateway.
///
/// For a remote kind the provider is taken, in order, from
/// [`PipelineConfig::provider`], from the named edgequake-llm provider with
/// [`PipelineConfig::model`], or (for the name `auto`) from whatever API keys
/// the environment holds.
pub fn build_translator(config: &PipelineConfig) -> Result<Arc<dyn Translator>, BookError> {
    match &config.translator {
        TranslatorKind::Local => {
            info!("Translator: local stub");
            Ok(Arc::new(LocalTranslator))
        }
        TranslatorKind::Remote { provider } => {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            let llm = match &config.provider {
                Some(p) => Arc::clone(p),
                None => create_provider(provider, model)?,
            };
            info!("Translator: {} ({})", provider, model);
            Ok(Arc::new(RemoteTranslator::new(llm, config)))
        }
    }
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, BookError> {
    if name == "auto" {
        let (llm, _embedding) = ProviderFactory::from_env().map_err(|e| {
            BookError::Configuration(format!(
                "No LLM provider could be auto-detected from environment. \
                 Set OPENAI_API_KEY or TRANSLATOR_PROVIDER. Error: {e}"
            ))
        })?;
        return Ok(llm);
    }
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        BookError::Configuration(format!("Translation provider '{name}' is not configured: {e}"))
    })
}
