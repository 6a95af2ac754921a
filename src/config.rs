//! Configuration for the lease → Welcome Pack pipeline.
//!
//! All behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The config is read-only once built and is shared
//! by the orchestrator, the model adapter and the template engine, so a run's
//! behaviour can be logged and reproduced from one value.

use crate::error::WelcomePackError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default location of the Welcome Pack template, relative to the working directory.
pub const DEFAULT_TEMPLATE_PATH: &str = "template/Tenant Welcome Pack Template.docx";

/// Default model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for lease processing.
///
/// # Example
/// ```rust
/// use lease_welcome_pack::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .template_path("assets/welcome.docx")
///     .max_file_size(5 * 1024 * 1024)
///     .model("gemini-2.5-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_file_size, 5 * 1024 * 1024);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Path to the Welcome Pack `.docx` template.
    pub template_path: PathBuf,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_file_size: usize,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai").
    /// If None along with `provider`, the provider is resolved from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Extraction is transcription, not writing; any creativity shows up as
    /// paraphrased legal terms.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Per-model-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Lifetime of signed Welcome Pack download URLs. Default: 300.
    pub signed_url_ttl_secs: u64,

    /// Explicit pdfium library file. If None, the system library is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// Where the optional Special Conditions section sits in the template.
    pub special_conditions: SectionLayout,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            max_file_size: 10 * 1024 * 1024,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            api_timeout_secs: 120,
            signed_url_ttl_secs: 300,
            pdfium_library_path: None,
            special_conditions: SectionLayout::default(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("template_path", &self.template_path)
            .field("max_file_size", &self.max_file_size)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("signed_url_ttl_secs", &self.signed_url_ttl_secs)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("special_conditions", &self.special_conditions)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model name, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template_path = path.into();
        self
    }

    pub fn max_file_size(mut self, bytes: usize) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn signed_url_ttl_secs(mut self, secs: u64) -> Self {
        self.config.signed_url_ttl_secs = secs;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn special_conditions(mut self, layout: SectionLayout) -> Self {
        self.config.special_conditions = layout;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, WelcomePackError> {
        let c = &self.config;
        if c.max_file_size == 0 {
            return Err(WelcomePackError::InvalidConfig(
                "max_file_size must be ≥ 1 byte".into(),
            ));
        }
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(WelcomePackError::InvalidConfig(format!(
                "temperature must be 0.0–2.0, got {}",
                c.temperature
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(WelcomePackError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        let layout = c.special_conditions;
        if layout.body_index != layout.heading_index + 1 {
            return Err(WelcomePackError::InvalidConfig(format!(
                "special conditions body paragraph must directly follow its heading \
                 (heading {}, body {})",
                layout.heading_index, layout.body_index
            )));
        }
        Ok(self.config)
    }
}

// ── Template layout ──────────────────────────────────────────────────────

/// Body-paragraph positions of the optional Special Conditions section.
///
/// These indices are a versioned contract with the template asset: they
/// count top-level body paragraphs only (table content excluded), and must be
/// updated together with the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionLayout {
    pub heading_index: usize,
    pub body_index: usize,
}

impl Default for SectionLayout {
    fn default() -> Self {
        Self {
            heading_index: 11,
            body_index: 12,
        }
    }
}
