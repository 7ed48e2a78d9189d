//! Remote translation through an LLM chat provider.
//!
//! Each batch becomes one chat call: the system prompt from
//! [`crate::prompts`] plus a JSON user message holding the paragraphs. The
//! reply must be a JSON array of strings of the same length. An object
//! `{"translations": [...]}` is also accepted, and either form may be
//! wrapped in a ```` ```json ```` fence.
//!
//! ## Retry Strategy
//!
//! Only transport failures are retried (HTTP 429 / 503 / timeouts), with
//! exponential backoff `retry_backoff_ms * 2^attempt`. A reply that parses
//! to the wrong number of items, or does not parse at all, fails the batch
//! immediately.

use crate::config::PipelineConfig;
use crate::error::BookError;
use crate::prompts::{translation_request, TRANSLATION_SYSTEM_PROMPT};
use crate::translator::Translator;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// One system + user chat exchange. The error is a transport failure
/// description.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, String>;
}

/// [`CompletionClient`] over an edgequake-llm provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl CompletionClient for ProviderClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| format!("{}", e))?;
        debug!(
            "Provider reply: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Completion budget is the reserved share of the token window.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.reserved_tokens.max(1) as usize),
        ..Default::default()
    }
}

/// LLM-backed [`Translator`].
pub struct RemoteTranslator {
    client: Arc<dyn CompletionClient>,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl RemoteTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self::with_client(Arc::new(ProviderClient::new(provider, config)), config)
    }

    /// Use an arbitrary completion client (scripted replies in tests, or a
    /// non-edgequake backend).
    pub fn with_client(client: Arc<dyn CompletionClient>, config: &PipelineConfig) -> Self {
        Self {
            client,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }
}

#[async_trait]
impl Translator for RemoteTranslator {
    fn name(&self) -> &str {
        "remote"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        src_lang: &str,
        tgt_lang: &str,
    ) -> Result<Vec<String>, BookError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let user = translation_request(texts, src_lang, tgt_lang);
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Translation batch of {}: retry {}/{} after {}ms",
                    texts.len(),
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.client.complete(TRANSLATION_SYSTEM_PROMPT, &user).await {
                Ok(content) => {
                    let out = parse_translations(&content, texts.len())?;
                    debug!(
                        "Translated {} paragraphs {}→{} in {:?}",
                        texts.len(),
                        src_lang,
                        tgt_lang,
                        start.elapsed()
                    );
                    return Ok(out);
                }
                Err(e) => {
                    warn!("Translation attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e);
                }
            }
        }

        Err(BookError::Provider(format!(
            "{} (after {} retries)",
            last_err.unwrap_or_else(|| "Unknown error".to_string()),
            self.max_retries
        )))
    }
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n?(.*?)\n?```$").unwrap());

fn strip_fence(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => trimmed,
    }
}

/// Parse a provider reply into exactly `expected` strings.
pub fn parse_translations(content: &str, expected: usize) -> Result<Vec<String>, BookError> {
    let body = strip_fence(content);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        BookError::ProviderFormat(format!("{e}; reply starts with {:?}", preview(body)))
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("translations") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(BookError::ProviderFormat(
                    "expected a JSON array or an object with a \"translations\" array".into(),
                ))
            }
        },
        other => {
            return Err(BookError::ProviderFormat(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    let out = items
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            Value::String(s) => Ok(s),
            other => Err(BookError::ProviderFormat(format!(
                "item {i} is {}, not a string",
                json_kind(&other)
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if out.len() != expected {
        return Err(BookError::ProviderMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(s: &str) -> String {
    s.chars().take(60).collect()
}
