//! Model access: the [`ModelClient`] seam and its production adapter.
//!
//! Extraction only needs "prompt in, text out", so that is the whole trait.
//! [`ProviderModel`] adapts any `edgequake_llm` provider to it and bounds
//! every call with the configured timeout. [`ScriptedModel`] returns
//! pre-programmed replies for deterministic runs without API calls.

use crate::config::PipelineConfig;
use crate::error::WelcomePackError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Text-generation capability used by the extraction pipeline.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one prompt and return the model's text reply.
    async fn generate(&self, prompt: &str) -> Result<String, WelcomePackError>;
}

/// [`ModelClient`] backed by an `edgequake_llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout: Duration,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Resolve a provider from the config and wrap it.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, WelcomePackError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }
}

#[async_trait]
impl ModelClient for ProviderModel {
    async fn generate(&self, prompt: &str) -> Result<String, WelcomePackError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];

        let response = tokio::time::timeout(self.timeout, self.provider.chat(&messages, Some(&self.options)))
            .await
            .map_err(|_| {
                warn!("Model call exceeded {}s", self.timeout.as_secs());
                WelcomePackError::ModelTimeout {
                    secs: self.timeout.as_secs(),
                }
            })?
            .map_err(|e| WelcomePackError::ModelCall {
                message: format!("{}", e),
            })?;

        debug!(
            "Model call: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, WelcomePackError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        WelcomePackError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or the
///    default model; the factory reads the matching API key.
/// 3. **Environment pair** `WELCOME_PACK_LLM_PROVIDER` + `WELCOME_PACK_MODEL`,
///    when both are set and non-empty.
/// 4. **Auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, WelcomePackError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("WELCOME_PACK_LLM_PROVIDER"),
        std::env::var("WELCOME_PACK_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| WelcomePackError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

// ── Scripted model ───────────────────────────────────────────────────────

/// One pre-programmed reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// The call fails with [`WelcomePackError::ModelCall`].
    Fail(String),
}

/// [`ModelClient`] that replays replies in order and records every prompt.
///
/// Running out of replies is a [`WelcomePackError::ModelCall`] error.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
    call_count: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// Convenience: a model that answers with these texts, in order.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| ScriptedReply::Text(t.into())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String, WelcomePackError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| WelcomePackError::Internal("scripted model lock poisoned".into()))?
            .pop_front();
        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(message)) => Err(WelcomePackError::ModelCall { message }),
            None => Err(WelcomePackError::ModelCall {
                message: "scripted model has no replies left".into(),
            }),
        }
    }
}
